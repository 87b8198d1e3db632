//! 候補者の適格性フィルタ
//!
//! 患者と必要能力から、手術チームに入れられる医師の
//! 順序付き一覧を作る。状態は持たない。

use bevy::prelude::*;

use crate::entities::medic::{Medic, MedicKind};
use crate::entities::Downed;
use crate::systems::assist::AssistTask;
use crate::systems::orchestrator::OperateTask;

/// 編成ダイアログに渡す候補者情報
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    pub medic: Entity,
    pub skill: f32,
    pub kind: MedicKind,
    /// 既に別のタスクを持っているか。選択は可能だが、
    /// Commit 時に古いタスクが強制終了される
    pub busy: bool,
}

/// 忙しさ判定用のクエリ型
pub type BusyQuery<'w, 's> = Query<'w, 's, (), Or<(With<OperateTask>, With<AssistTask>)>>;

/// 患者に対する適格な候補者をスキル降順で列挙する
///
/// 条件: 患者本人でない、意識がある、医療の仕事が有効。
/// 死亡した医師はエンティティごと消えているため自然に除外される。
pub fn find_candidates(
    patient: Entity,
    q_medics: &Query<(Entity, &Medic, Option<&Downed>)>,
    q_busy: &BusyQuery,
) -> Vec<Candidate> {
    let mut candidates: Vec<Candidate> = q_medics
        .iter()
        .filter(|(entity, medic, downed)| {
            *entity != patient && downed.is_none() && medic.medical_work_enabled
        })
        .map(|(entity, medic, _)| Candidate {
            medic: entity,
            skill: medic.skill,
            kind: medic.kind,
            busy: q_busy.get(entity).is_ok(),
        })
        .collect();

    // スキル降順。同値はエンティティ順で安定させる
    candidates.sort_by(|a, b| {
        b.skill
            .partial_cmp(&a.skill)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.medic.cmp(&b.medic))
    });
    candidates
}

/// 候補者一覧に特定の医師が含まれるか
pub fn is_eligible(
    patient: Entity,
    medic: Entity,
    q_medics: &Query<(Entity, &Medic, Option<&Downed>)>,
    q_busy: &BusyQuery,
) -> bool {
    find_candidates(patient, q_medics, q_busy)
        .iter()
        .any(|c| c.medic == medic)
}
