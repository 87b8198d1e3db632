//! 完了経験値の分配
//!
//! 真の完了時に一度だけ実行される。二重実行は二重取りになるため、
//! 呼び出し側の行儀ではなくチーム側のラッチで防ぐ。

use bevy::prelude::*;

use crate::constants::CREDIT_POOL;
use crate::entities::medic::Medic;
use crate::systems::team::SurgeryTeam;

/// 完了経験値プールをチームに分配する
///
/// アシスタントなし: リードが 100% を受け取る。
/// アシスタントあり: リードが 50%、残りをアシスタントで均等割り。
/// `credit_awarded` ラッチにより 2 回目以降の呼び出しは no-op
pub fn award_completion_credit(team: &mut SurgeryTeam, q_medics: &mut Query<&mut Medic>) {
    if team.credit_awarded {
        debug!("CREDIT: Already awarded, skipping");
        return;
    }
    team.credit_awarded = true;

    let Some(lead) = team.lead else { return };

    // 消滅済みのアシスタントは分配から外れる
    let assistants: Vec<Entity> = team
        .assistants()
        .iter()
        .copied()
        .filter(|&a| a != lead && q_medics.get(a).is_ok())
        .collect();

    if assistants.is_empty() {
        if let Ok(mut medic) = q_medics.get_mut(lead) {
            medic.experience += CREDIT_POOL;
            info!("CREDIT: Lead {:?} awarded full pool ({})", lead, CREDIT_POOL);
        }
        return;
    }

    let lead_share = CREDIT_POOL * 0.5;
    let assistant_share = (CREDIT_POOL * 0.5) / assistants.len() as f32;

    if let Ok(mut medic) = q_medics.get_mut(lead) {
        medic.experience += lead_share;
    }
    for assistant in &assistants {
        if let Ok(mut medic) = q_medics.get_mut(*assistant) {
            medic.experience += assistant_share;
        }
    }
    info!(
        "CREDIT: Lead {:?} awarded {}, {} assistant(s) awarded {} each",
        lead,
        lead_share,
        assistants.len(),
        assistant_share
    );
}
