//! アシスタントのループ
//!
//! ヘルパーごとに独立した常駐タスク。患者のそばへ移動し、
//! phase flag が立っている間だけ待機 tick を刻む。前提条件が
//! 崩れたらそのヘルパーだけが即座に終了する。ブロックも
//! リトライもしない。リードのタスクを止めることもない。

use bevy::prelude::*;

use crate::constants::{ASSIST_XP_PER_TICK, BEDSIDE_RADIUS};
use crate::entities::medic::Medic;
use crate::entities::patient::{InBed, Patient};
use crate::events::{OnTaskEnded, TaskEndReason};
use crate::systems::orchestrator::OperationPhase;
use crate::systems::team::SurgeryTeam;

/// アシスタントが持つ常駐タスク
#[derive(Component, Debug, Clone)]
pub struct AssistTask {
    pub patient: Entity,
    pub phase: AssistPhase,
}

impl AssistTask {
    pub fn approach(patient: Entity) -> Self {
        Self {
            patient,
            phase: AssistPhase::Approach,
        }
    }
}

/// アシストタスク内のフェーズ
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssistPhase {
    /// 患者のベッドサイドへ移動中
    Approach,
    /// ベッドサイドで手術を補助している
    Assist,
}

/// アシスタントのループを 1 tick 進めるシステム
pub fn assist_loop_system(
    mut commands: Commands,
    mut q_assistants: Query<(Entity, &mut AssistTask, &mut Medic, &Transform)>,
    q_teams: Query<(&SurgeryTeam, &OperationPhase)>,
    q_patients: Query<(&Transform, Option<&InBed>), With<Patient>>,
    mut ev_task_ended: MessageWriter<OnTaskEnded>,
) {
    for (assistant, mut task, mut medic, transform) in q_assistants.iter_mut() {
        let patient = task.patient;

        // 毎 tick の再検証。どれか一つでも崩れたらこのヘルパーだけ終了
        let patient_state = q_patients.get(patient);
        let team_state = q_teams.get(patient);

        let valid = match (&patient_state, &team_state) {
            (Ok((_, in_bed)), Ok((team, phase))) => {
                if !team.is_member(assistant) {
                    false
                } else if team.in_progress {
                    in_bed.is_some()
                } else {
                    // flag がまだ立っていない場合、開始前なら待機を続ける。
                    // 終了後なら継続の根拠がない
                    matches!(phase, OperationPhase::Staffing | OperationPhase::Ready)
                }
            }
            _ => false,
        };

        if !valid {
            debug!("ASSIST: {:?} no longer applicable, ending loop", assistant);
            commands.entity(assistant).remove::<AssistTask>();
            ev_task_ended.write(OnTaskEnded {
                medic: assistant,
                reason: TaskEndReason::NoLongerApplicable,
            });
            continue;
        }

        match task.phase {
            AssistPhase::Approach => {
                let Ok((patient_transform, _)) = patient_state else {
                    continue;
                };
                let distance = transform
                    .translation
                    .truncate()
                    .distance(patient_transform.translation.truncate());
                if distance <= BEDSIDE_RADIUS {
                    task.phase = AssistPhase::Assist;
                    debug!("ASSIST: {:?} at bedside of {:?}", assistant, patient);
                }
            }
            AssistPhase::Assist => {
                // 補助中は毎 tick わずかな経験値を得る
                let in_progress = team_state.map(|(team, _)| team.in_progress).unwrap_or(false);
                if in_progress {
                    medic.experience += ASSIST_XP_PER_TICK;
                }
            }
        }
    }
}
