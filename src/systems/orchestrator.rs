//! 手術実行のオーケストレーター
//!
//! 一つの手術予約のライフサイクルを所有する状態機械。
//! `Staffing -> Ready -> Running -> Completed | Cancelled | Failed`
//!
//! オーケストレーター自体はスレッドを持たない。状態遷移は全て
//! tick 境界で、リードまたはヘルパーのシステム実行中に同期的に起きる。
//! どの終了経路でもクリーンアップ（ヘルパー停止・phase flag 解除）を
//! ちょうど一度だけ実行する。

use bevy::ecs::system::SystemParam;
use bevy::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::SurgeryConfig;
use crate::constants::{BEDSIDE_RADIUS, WORK_PER_TICK};
use crate::entities::medic::{Destination, Medic};
use crate::entities::patient::{InBed, Patient};
use crate::entities::Downed;
use crate::events::{
    ClaimRequest, OnAwaitingConfirm, OnOperationEnded, OnOperationStarted, OnStaffingRejected,
    OnTaskEnded, OperationCancelRequest, OperationOutcome, StartConfirmRequest, TaskEndReason,
};
use crate::systems::assist::AssistTask;
use crate::systems::bonus::{compute_team_bonus, lead_baseline, member_profiles};
use crate::systems::credit::award_completion_credit;
use crate::systems::team::SurgeryTeam;

/// 手術予約の実行フェーズ。患者エンティティに付く
#[derive(Component, Debug, Clone, PartialEq)]
pub enum OperationPhase {
    /// チーム編成中。リードが決まるまでここに留まる
    Staffing,
    /// 編成確定済み。リードの請求を待っている
    Ready,
    /// 実行中。`work_done` が積み上がる
    Running { work_done: f32 },
    Completed,
    Cancelled,
    Failed,
}

impl OperationPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Failed)
    }
}

/// リードが持つ手術タスク
#[derive(Component, Debug, Clone)]
pub struct OperateTask {
    pub patient: Entity,
    pub phase: OperateTaskPhase,
}

/// リードのタスク内フェーズ
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OperateTaskPhase {
    /// 患者のベッドサイドへ移動中
    Approach,
    /// 到着済み。操作側の開始確認を待っている
    AwaitConfirm,
    /// 手術を実行中。成功率は開始時点のスナップショット
    Perform { success_chance: f32 },
}

/// 完了時の結果判定に使う乱数源。テストではシード固定で差し替える
#[derive(Resource)]
pub struct OutcomeRng(pub StdRng);

impl Default for OutcomeRng {
    fn default() -> Self {
        Self(StdRng::from_entropy())
    }
}

// ============================================================
// Ready: 請求の発行と検証
// ============================================================

/// Ready 状態の予約についてリードに請求を出させるシステム
pub fn lead_dispatch_system(
    q_teams: Query<(Entity, &SurgeryTeam, &OperationPhase)>,
    q_medics: Query<(Entity, Option<&Downed>), With<Medic>>,
    q_operate: Query<&OperateTask>,
    mut ev_claims: MessageWriter<ClaimRequest>,
) {
    for (patient, team, phase) in q_teams.iter() {
        if !matches!(phase, OperationPhase::Ready) {
            continue;
        }
        let Some(lead) = team.lead else { continue };
        let Ok((_, downed)) = q_medics.get(lead) else { continue };
        if downed.is_some() || q_operate.get(lead).is_ok() {
            // リードが行動不能か、別のタスクを持っている間は待つ
            continue;
        }
        ev_claims.write(ClaimRequest {
            medic: lead,
            patient,
        });
    }
}

/// 請求を検証するシステム
///
/// リード以外からの請求は拒否し、請求者のタスクを Incompletable で
/// 終了させる。チームの状態には一切触れない
pub fn claim_system(
    mut commands: Commands,
    mut ev_claims: MessageReader<ClaimRequest>,
    q_teams: Query<(&SurgeryTeam, &OperationPhase)>,
    q_patient_pos: Query<&Transform, With<Patient>>,
    q_operate: Query<&OperateTask>,
    mut ev_task_ended: MessageWriter<OnTaskEnded>,
) {
    for ev in ev_claims.read() {
        let Ok((team, phase)) = q_teams.get(ev.patient) else {
            warn!("ORCH: Claim for patient {:?} without an assignment", ev.patient);
            ev_task_ended.write(OnTaskEnded {
                medic: ev.medic,
                reason: TaskEndReason::Incompletable,
            });
            continue;
        };

        if team.lead != Some(ev.medic) {
            warn!(
                "ORCH: Claim by {:?} rejected, lead is {:?}",
                ev.medic, team.lead
            );
            ev_task_ended.write(OnTaskEnded {
                medic: ev.medic,
                reason: TaskEndReason::Incompletable,
            });
            continue;
        }
        if !matches!(phase, OperationPhase::Ready) {
            ev_task_ended.write(OnTaskEnded {
                medic: ev.medic,
                reason: TaskEndReason::Incompletable,
            });
            continue;
        }
        if q_operate.get(ev.medic).is_ok() {
            // 既に別の手術タスクを持っている。解放されるまで予約は Ready のまま
            continue;
        }
        let Ok(patient_pos) = q_patient_pos.get(ev.patient) else {
            ev_task_ended.write(OnTaskEnded {
                medic: ev.medic,
                reason: TaskEndReason::Incompletable,
            });
            continue;
        };

        commands.entity(ev.medic).insert((
            OperateTask {
                patient: ev.patient,
                phase: OperateTaskPhase::Approach,
            },
            Destination(patient_pos.translation.truncate()),
        ));
        info!("ORCH: Lead {:?} claimed operation on {:?}", ev.medic, ev.patient);
    }
}

// ============================================================
// Ready -> Running: 開始確認
// ============================================================

#[derive(SystemParam)]
pub struct ConfirmParams<'w, 's> {
    pub commands: Commands<'w, 's>,
    pub config: Res<'w, SurgeryConfig>,
    pub q_teams: Query<'w, 's, (&'static mut SurgeryTeam, &'static mut OperationPhase)>,
    pub q_operate: Query<'w, 's, (Entity, &'static mut OperateTask)>,
    pub q_medics: Query<'w, 's, &'static Medic>,
    pub q_downed: Query<'w, 's, (), With<Downed>>,
    pub q_patient_pos: Query<'w, 's, &'static Transform, With<Patient>>,
    pub ev_started: MessageWriter<'w, OnOperationStarted>,
    pub ev_task_ended: MessageWriter<'w, OnTaskEnded>,
}

/// 開始確認の応答を処理するシステム
///
/// 確認が取れたら phase flag を立て、ボーナスを計算・適用し、
/// 全アシスタントのループを起動する。拒否されたらリードの
/// タスクを Incompletable で終わらせ、予約は Ready に戻る
pub fn confirm_system(mut ev_confirms: MessageReader<StartConfirmRequest>, mut p: ConfirmParams) {
    for ev in ev_confirms.read() {
        let Ok((mut team, mut phase)) = p.q_teams.get_mut(ev.patient) else {
            continue;
        };
        if !matches!(*phase, OperationPhase::Ready) {
            continue;
        }
        let Some(lead) = team.lead else { continue };
        // リードのタスクが確認待ちであることを検証する
        let Ok((_, mut task)) = p.q_operate.get_mut(lead) else {
            continue;
        };
        if task.patient != ev.patient || task.phase != OperateTaskPhase::AwaitConfirm {
            continue;
        }

        if !ev.confirm {
            p.commands.entity(lead).remove::<OperateTask>();
            p.ev_task_ended.write(OnTaskEnded {
                medic: lead,
                reason: TaskEndReason::Incompletable,
            });
            info!("ORCH: Start declined for patient {:?}", ev.patient);
            continue;
        }

        // ボーナスは開始時点の構成でスナップショットする
        let baseline = p
            .q_medics
            .get(lead)
            .map(|m| lead_baseline(m.skill))
            .unwrap_or(0.0);
        let profiles = member_profiles(&team.members, &p.q_medics);
        let bonus = compute_team_bonus(&profiles, baseline, &p.config);
        team.speed_multiplier = bonus.speed_multiplier;
        team.success_bonus = bonus.success_bonus;
        team.in_progress = true;
        *phase = OperationPhase::Running { work_done: 0.0 };
        task.phase = OperateTaskPhase::Perform {
            success_chance: bonus.total_success,
        };

        // アシスタントのループを起動する
        let patient_pos = p
            .q_patient_pos
            .get(ev.patient)
            .map(|t| t.translation.truncate())
            .unwrap_or_default();
        let assistants: Vec<Entity> = team.assistants().to_vec();
        for assistant in assistants {
            if p.q_medics.get(assistant).is_err() || p.q_downed.get(assistant).is_ok() {
                warn!("ORCH: Assistant {:?} unavailable at start, skipping", assistant);
                continue;
            }
            p.commands.entity(assistant).insert((
                AssistTask::approach(ev.patient),
                Destination(patient_pos),
            ));
        }

        info!(
            "ORCH: Operation started on {:?} (lead {:?}, speed x{:.2}, success {:.0}%)",
            ev.patient,
            lead,
            bonus.speed_multiplier,
            bonus.total_success * 100.0
        );
        p.ev_started.write(OnOperationStarted {
            patient: ev.patient,
            lead,
            speed_multiplier: bonus.speed_multiplier,
            success_chance: bonus.total_success,
        });
    }
}

// ============================================================
// Running: リードの tick
// ============================================================

#[derive(SystemParam)]
pub struct OperateParams<'w, 's> {
    pub commands: Commands<'w, 's>,
    pub config: Res<'w, SurgeryConfig>,
    pub rng: ResMut<'w, OutcomeRng>,
    pub q_leads: Query<'w, 's, (Entity, &'static mut OperateTask, &'static Transform)>,
    pub q_teams: Query<'w, 's, (&'static mut SurgeryTeam, &'static mut OperationPhase)>,
    pub q_patients: Query<'w, 's, (&'static Transform, Option<&'static InBed>), With<Patient>>,
    pub q_medics: Query<'w, 's, &'static mut Medic>,
    pub q_assist: Query<'w, 's, (Entity, &'static AssistTask)>,
    pub ev_await: MessageWriter<'w, OnAwaitingConfirm>,
    pub ev_op_ended: MessageWriter<'w, OnOperationEnded>,
    pub ev_task_ended: MessageWriter<'w, OnTaskEnded>,
    pub ev_cancel: MessageWriter<'w, OperationCancelRequest>,
}

/// リードの手術タスクを 1 tick 進めるシステム
pub fn operate_task_system(mut p: OperateParams) {
    let mut finished: Vec<(Entity, Entity, bool)> = Vec::new();

    for (lead, mut task, lead_transform) in p.q_leads.iter_mut() {
        let patient = task.patient;

        // 毎 tick の再検証: 患者と予約がまだ有効か
        let Ok((team, mut phase)) = p.q_teams.get_mut(patient) else {
            warn!("ORCH: Lead {:?} lost its assignment, ending task", lead);
            p.commands.entity(lead).remove::<OperateTask>();
            p.ev_task_ended.write(OnTaskEnded {
                medic: lead,
                reason: TaskEndReason::PatientInvalid,
            });
            continue;
        };
        if team.lead != Some(lead) {
            // 編成が変わっている。古いタスクはここで終わる
            p.commands.entity(lead).remove::<OperateTask>();
            p.ev_task_ended.write(OnTaskEnded {
                medic: lead,
                reason: TaskEndReason::Superseded,
            });
            continue;
        }
        let patient_ok = p
            .q_patients
            .get(patient)
            .map(|(_, in_bed)| in_bed.is_some())
            .unwrap_or(false);

        match task.phase {
            OperateTaskPhase::Approach => {
                if !patient_ok {
                    p.commands.entity(lead).remove::<OperateTask>();
                    p.ev_task_ended.write(OnTaskEnded {
                        medic: lead,
                        reason: TaskEndReason::Incompletable,
                    });
                    continue;
                }
                let Ok((patient_transform, _)) = p.q_patients.get(patient) else {
                    continue;
                };
                let distance = lead_transform
                    .translation
                    .truncate()
                    .distance(patient_transform.translation.truncate());
                if distance <= BEDSIDE_RADIUS {
                    task.phase = OperateTaskPhase::AwaitConfirm;
                    info!("ORCH: Lead {:?} at bedside of {:?}, awaiting confirm", lead, patient);
                    p.ev_await.write(OnAwaitingConfirm { patient, lead });
                }
            }
            OperateTaskPhase::AwaitConfirm => {
                // 確認待ち。この tick は何もしない
                if !patient_ok {
                    p.commands.entity(lead).remove::<OperateTask>();
                    p.ev_task_ended.write(OnTaskEnded {
                        medic: lead,
                        reason: TaskEndReason::Incompletable,
                    });
                }
            }
            OperateTaskPhase::Perform { success_chance } => {
                if !patient_ok {
                    p.ev_cancel.write(OperationCancelRequest {
                        patient,
                        reason: TaskEndReason::PatientInvalid,
                    });
                    continue;
                }
                let OperationPhase::Running { ref mut work_done } = *phase else {
                    continue;
                };
                if !team.in_progress {
                    continue;
                }

                *work_done += WORK_PER_TICK * team.speed_multiplier;
                if *work_done < p.config.total_work {
                    continue;
                }

                // 完了。結果判定はここで一度だけ行う
                let roll: f32 = p.rng.0.gen_range(0.0..1.0);
                let success = roll < success_chance;
                finished.push((patient, lead, success));
            }
        }
    }

    for (patient, lead, success) in finished {
        let Ok((mut team, mut phase)) = p.q_teams.get_mut(patient) else {
            continue;
        };
        // 完了時のクリーンアップ: リードのタスクと全アシストを止め、
        // phase flag を下ろす。ボーナスの適用はここで終わる
        p.commands.entity(lead).remove::<(OperateTask, Destination)>();
        p.ev_task_ended.write(OnTaskEnded {
            medic: lead,
            reason: TaskEndReason::Succeeded,
        });
        for (medic, assist) in p.q_assist.iter() {
            if assist.patient == patient {
                p.commands.entity(medic).remove::<(AssistTask, Destination)>();
                p.ev_task_ended.write(OnTaskEnded {
                    medic,
                    reason: TaskEndReason::Succeeded,
                });
            }
        }
        team.in_progress = false;

        if success {
            *phase = OperationPhase::Completed;
            award_completion_credit(&mut team, &mut p.q_medics);
            info!("ORCH: Operation on {:?} completed (lead {:?})", patient, lead);
            p.ev_op_ended.write(OnOperationEnded {
                patient,
                outcome: OperationOutcome::Completed,
            });
        } else {
            *phase = OperationPhase::Failed;
            warn!("ORCH: Operation on {:?} failed (lead {:?})", patient, lead);
            p.ev_op_ended.write(OnOperationEnded {
                patient,
                outcome: OperationOutcome::Failed,
            });
        }
    }
}

// ============================================================
// 無効化の検知と実行中断
// ============================================================

/// 予約を無効化する外部イベントを検知するシステム
///
/// リードの死亡・患者の離床・メンバーの適格性喪失は、いつ起きても
/// 現在の実行に対して致命的で、黙って無視されることはない
pub fn invalidation_system(
    q_teams: Query<(Entity, &SurgeryTeam, &OperationPhase)>,
    q_medics: Query<(&Medic, Option<&Downed>)>,
    q_in_bed: Query<(), With<InBed>>,
    q_operate: Query<&OperateTask>,
    mut ev_cancel: MessageWriter<OperationCancelRequest>,
) {
    for (patient, team, phase) in q_teams.iter() {
        if phase.is_terminal() {
            continue;
        }

        // リードの死亡は予約そのものを消す（実行中かどうかを問わない）
        if let Some(lead) = team.lead {
            if q_medics.get(lead).is_err() {
                warn!("ORCH: Lead of {:?} died, removing assignment", patient);
                ev_cancel.write(OperationCancelRequest {
                    patient,
                    reason: TaskEndReason::LeadDied,
                });
                continue;
            }
        }

        if !matches!(phase, OperationPhase::Running { .. }) {
            continue;
        }

        // 患者が手術可能な状態でなくなった
        if q_in_bed.get(patient).is_err() {
            ev_cancel.write(OperationCancelRequest {
                patient,
                reason: TaskEndReason::PatientInvalid,
            });
            continue;
        }

        // メンバーの適格性喪失（死亡・行動不能・作業設定の無効化）
        let mut lost_member = false;
        for &member in &team.members {
            match q_medics.get(member) {
                Ok((medic, downed)) => {
                    if downed.is_some() || !medic.medical_work_enabled {
                        lost_member = true;
                    }
                }
                Err(_) => lost_member = true,
            }
        }
        if lost_member {
            warn!("ORCH: Team member of {:?} lost eligibility mid-run", patient);
            ev_cancel.write(OperationCancelRequest {
                patient,
                reason: TaskEndReason::NoLongerApplicable,
            });
            continue;
        }

        // リードのタスクが外部から強制終了されていたら実行は続けられない
        if let Some(lead) = team.lead {
            let has_task = q_operate
                .get(lead)
                .map(|t| t.patient == patient)
                .unwrap_or(false);
            if !has_task {
                ev_cancel.write(OperationCancelRequest {
                    patient,
                    reason: TaskEndReason::Superseded,
                });
            }
        }
    }
}

/// 取り消し要求を実行するシステム
///
/// 実行中断のクリーンアップが走るのはここだけ。終端フェーズの
/// 予約への要求は無視されるため、クリーンアップは二重には走らない
pub fn termination_system(
    mut commands: Commands,
    mut ev_cancel: MessageReader<OperationCancelRequest>,
    mut q_teams: Query<(&mut SurgeryTeam, &mut OperationPhase)>,
    q_operate: Query<(Entity, &OperateTask)>,
    q_assist: Query<(Entity, &AssistTask)>,
    mut ev_task_ended: MessageWriter<OnTaskEnded>,
    mut ev_op_ended: MessageWriter<OnOperationEnded>,
) {
    for ev in ev_cancel.read() {
        let Ok((mut team, mut phase)) = q_teams.get_mut(ev.patient) else {
            continue;
        };
        if phase.is_terminal() {
            continue;
        }
        let was_running = matches!(*phase, OperationPhase::Running { .. });

        stop_team_tasks(
            &mut commands,
            ev.patient,
            &q_operate,
            &q_assist,
            ev.reason,
            &mut ev_task_ended,
        );
        team.in_progress = false;

        match ev.reason {
            TaskEndReason::Superseded => {
                // 実行だけを中断し、予約は新しい構成で継続する
                *phase = if team.lead.is_some() {
                    OperationPhase::Ready
                } else {
                    OperationPhase::Staffing
                };
                if was_running {
                    info!("ORCH: Run on {:?} superseded by membership change", ev.patient);
                    ev_op_ended.write(OnOperationEnded {
                        patient: ev.patient,
                        outcome: OperationOutcome::Cancelled(ev.reason),
                    });
                }
            }
            TaskEndReason::Discarded | TaskEndReason::LeadDied => {
                // 予約そのものを取り除く
                *phase = OperationPhase::Cancelled;
                commands
                    .entity(ev.patient)
                    .remove::<(SurgeryTeam, OperationPhase)>();
                info!("ORCH: Assignment on {:?} removed ({:?})", ev.patient, ev.reason);
                ev_op_ended.write(OnOperationEnded {
                    patient: ev.patient,
                    outcome: OperationOutcome::Cancelled(ev.reason),
                });
            }
            TaskEndReason::PatientInvalid | TaskEndReason::NoLongerApplicable => {
                *phase = OperationPhase::Cancelled;
                info!("ORCH: Run on {:?} cancelled ({:?})", ev.patient, ev.reason);
                ev_op_ended.write(OnOperationEnded {
                    patient: ev.patient,
                    outcome: OperationOutcome::Cancelled(ev.reason),
                });
            }
            _ => {
                warn!("ORCH: Unexpected cancel reason {:?} for {:?}", ev.reason, ev.patient);
            }
        }
    }
}

/// この患者を対象とする全メンバーのタスクを止める
///
/// どの終了経路からも必ず呼ばれる中心的なクリーンアップ。
/// ヘルパーを古い予約の上に放置しない
fn stop_team_tasks(
    commands: &mut Commands,
    patient: Entity,
    q_operate: &Query<(Entity, &OperateTask)>,
    q_assist: &Query<(Entity, &AssistTask)>,
    reason: TaskEndReason,
    ev_task_ended: &mut MessageWriter<OnTaskEnded>,
) {
    for (medic, task) in q_operate.iter() {
        if task.patient == patient {
            commands.entity(medic).remove::<(OperateTask, Destination)>();
            ev_task_ended.write(OnTaskEnded { medic, reason });
        }
    }
    for (medic, task) in q_assist.iter() {
        if task.patient == patient {
            commands.entity(medic).remove::<(AssistTask, Destination)>();
            ev_task_ended.write(OnTaskEnded { medic, reason });
        }
    }
}

/// 通知メッセージのログ出力システム
pub fn outcome_log_system(
    mut ev_await: MessageReader<OnAwaitingConfirm>,
    mut ev_started: MessageReader<OnOperationStarted>,
    mut ev_task_ended: MessageReader<OnTaskEnded>,
    mut ev_op_ended: MessageReader<OnOperationEnded>,
    mut ev_rejected: MessageReader<OnStaffingRejected>,
) {
    for ev in ev_await.read() {
        debug!("ORCH: {:?} awaiting confirm at {:?}", ev.lead, ev.patient);
    }
    for ev in ev_started.read() {
        debug!(
            "ORCH: Started on {:?} (x{:.2}, {:.0}%)",
            ev.patient,
            ev.speed_multiplier,
            ev.success_chance * 100.0
        );
    }
    for ev in ev_task_ended.read() {
        debug!("ORCH: Task of {:?} ended ({:?})", ev.medic, ev.reason);
    }
    for ev in ev_op_ended.read() {
        debug!("ORCH: Operation on {:?} ended ({:?})", ev.patient, ev.outcome);
    }
    for ev in ev_rejected.read() {
        debug!("ORCH: Staffing rejected for {:?} ({:?})", ev.patient, ev.reason);
    }
}
