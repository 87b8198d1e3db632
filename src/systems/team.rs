//! 手術チームの共有レコードと編成ロジック
//!
//! `SurgeryTeam` は患者エンティティが所有する共有レコード。
//! 書き込むのは編成システム（このモジュール）とオーケストレーターの
//! 2 者だけ。実行中の編成変更はライブ状態の書き換えではなく
//! 実行中断として扱う。

use bevy::ecs::system::SystemParam;
use bevy::prelude::*;

use crate::config::SurgeryConfig;
use crate::entities::medic::Medic;
use crate::entities::patient::Patient;
use crate::entities::{ActorId, Downed};
use crate::events::{
    OnStaffingRejected, OnTaskEnded, OperationCancelRequest, ScheduleOperationRequest,
    StaffingError, TaskEndReason, TeamAssignmentOp, TeamAssignmentRequest,
};
use crate::persistence::TeamPresets;
use crate::systems::assist::AssistTask;
use crate::systems::bonus::{compute_team_bonus, lead_baseline, member_profiles};
use crate::systems::eligibility::{is_eligible, BusyQuery};
use crate::systems::orchestrator::{OperateTask, OperationPhase};

/// 一人の患者に対する手術チームの共有レコード
#[derive(Component, Debug, Clone, PartialEq)]
pub struct SurgeryTeam {
    /// 手術の種類
    pub operation: String,
    /// 主たるタスクを実行できる唯一の医師
    pub lead: Option<Entity>,
    /// リードを先頭に置いた順序付きメンバー一覧（重複なし）
    pub members: Vec<Entity>,
    /// リードのタスクが生産フェーズにある間だけ true
    pub in_progress: bool,
    /// 最後に計算した速度倍率（派生値、いつでも再計算できる）
    pub speed_multiplier: f32,
    /// 最後に計算した成功率ボーナス（派生値）
    pub success_bonus: f32,
    /// 完了経験値を既に分配したかのラッチ
    pub credit_awarded: bool,
}

impl SurgeryTeam {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            lead: None,
            members: Vec::new(),
            in_progress: false,
            speed_multiplier: 1.0,
            success_bonus: 0.0,
            credit_awarded: false,
        }
    }

    /// リードを交代する。アシスタントは引き継がず、チームは
    /// 新しいリードだけにリセットされる
    pub fn select_lead(&mut self, medic: Entity) {
        self.lead = Some(medic);
        self.members.clear();
        self.members.push(medic);
    }

    /// アシスタントの追加・削除。変更があったら true
    pub fn toggle_assistant(&mut self, medic: Entity, want: bool, max_team_size: usize) -> bool {
        if want {
            if Some(medic) == self.lead || self.members.contains(&medic) {
                return false;
            }
            if self.members.len() >= max_team_size {
                return false;
            }
            self.members.push(medic);
            true
        } else {
            if Some(medic) == self.lead {
                return false;
            }
            let before = self.members.len();
            self.members.retain(|&m| m != medic);
            self.members.len() != before
        }
    }

    /// リードを除いたアシスタント一覧
    pub fn assistants(&self) -> &[Entity] {
        if self.members.is_empty() {
            &[]
        } else {
            &self.members[1..]
        }
    }

    pub fn is_member(&self, medic: Entity) -> bool {
        self.members.contains(&medic)
    }
}

#[derive(SystemParam)]
pub struct TeamAssemblyParams<'w, 's> {
    pub commands: Commands<'w, 's>,
    pub config: Res<'w, SurgeryConfig>,
    pub presets: Res<'w, TeamPresets>,
    pub q_teams: Query<'w, 's, (&'static mut SurgeryTeam, &'static mut OperationPhase)>,
    pub q_pool: Query<'w, 's, (Entity, &'static Medic, Option<&'static Downed>)>,
    pub q_medics: Query<'w, 's, &'static Medic>,
    pub q_busy: BusyQuery<'w, 's>,
    pub q_ids: Query<'w, 's, (Entity, &'static ActorId)>,
    pub q_operate: Query<'w, 's, (Entity, &'static OperateTask)>,
    pub q_assist: Query<'w, 's, (Entity, &'static AssistTask)>,
    pub ev_rejected: MessageWriter<'w, OnStaffingRejected>,
    pub ev_task_ended: MessageWriter<'w, OnTaskEnded>,
    pub ev_cancel: MessageWriter<'w, OperationCancelRequest>,
}

/// 手術予約の作成システム
pub fn schedule_operation_system(
    mut commands: Commands,
    config: Res<SurgeryConfig>,
    mut ev_requests: MessageReader<ScheduleOperationRequest>,
    q_patients: Query<Entity, With<Patient>>,
    q_teams: Query<(), With<SurgeryTeam>>,
    mut ev_rejected: MessageWriter<OnStaffingRejected>,
) {
    for ev in ev_requests.read() {
        if q_patients.get(ev.patient).is_err() {
            warn!("TEAM: Schedule request for non-patient {:?}", ev.patient);
            ev_rejected.write(OnStaffingRejected {
                patient: ev.patient,
                reason: StaffingError::NoAssignment,
            });
            continue;
        }
        if config.is_excluded(&ev.operation) {
            info!("TEAM: Operation '{}' is excluded from team assembly", ev.operation);
            ev_rejected.write(OnStaffingRejected {
                patient: ev.patient,
                reason: StaffingError::OperationExcluded,
            });
            continue;
        }
        if q_teams.get(ev.patient).is_ok() {
            warn!("TEAM: Patient {:?} already has a scheduled operation", ev.patient);
            continue;
        }

        commands.entity(ev.patient).insert((
            SurgeryTeam::new(ev.operation.clone()),
            OperationPhase::Staffing,
        ));
        info!("TEAM: Scheduled '{}' for patient {:?}", ev.operation, ev.patient);
    }
}

/// チーム編成の要求を処理するシステム
pub fn team_assignment_system(
    mut ev_requests: MessageReader<TeamAssignmentRequest>,
    mut params: TeamAssemblyParams,
) {
    for ev in ev_requests.read() {
        let patient = ev.patient;
        let Ok((mut team, mut phase)) = params.q_teams.get_mut(patient) else {
            params.ev_rejected.write(OnStaffingRejected {
                patient,
                reason: StaffingError::NoAssignment,
            });
            continue;
        };
        let was_running = matches!(*phase, OperationPhase::Running { .. });

        let changed = match &ev.op {
            TeamAssignmentOp::SelectLead { medic } => {
                if !is_eligible(patient, *medic, &params.q_pool, &params.q_busy) {
                    params.ev_rejected.write(OnStaffingRejected {
                        patient,
                        reason: StaffingError::Ineligible,
                    });
                    false
                } else {
                    team.select_lead(*medic);
                    info!("TEAM: {:?} selected as lead for patient {:?}", medic, patient);
                    true
                }
            }
            TeamAssignmentOp::ToggleAssistant { medic, want } => {
                if *want && !is_eligible(patient, *medic, &params.q_pool, &params.q_busy) {
                    params.ev_rejected.write(OnStaffingRejected {
                        patient,
                        reason: StaffingError::Ineligible,
                    });
                    false
                } else {
                    team.toggle_assistant(*medic, *want, params.config.max_team_size)
                }
            }
            TeamAssignmentOp::ApplyPreset { name } => apply_preset(
                name,
                patient,
                &mut team,
                &params.presets,
                &params.config,
                &params.q_ids,
                &params.q_pool,
                &params.q_busy,
                &mut params.ev_rejected,
            ),
            TeamAssignmentOp::Commit => {
                if team.lead.is_none() {
                    params.ev_rejected.write(OnStaffingRejected {
                        patient,
                        reason: StaffingError::LeadUnset,
                    });
                    continue;
                }
                // 旧メンバーの下で走っているタスクを全て無効化する。
                // 新しいリードが次の tick 以降に改めて請求する
                end_stale_tasks(
                    patient,
                    &mut params.commands,
                    &params.q_operate,
                    &params.q_assist,
                    &mut params.ev_task_ended,
                );
                if matches!(*phase, OperationPhase::Staffing) {
                    *phase = OperationPhase::Ready;
                }
                info!(
                    "TEAM: Committed team for patient {:?} (lead {:?}, {} member(s))",
                    patient,
                    team.lead,
                    team.members.len()
                );
                true
            }
            TeamAssignmentOp::Discard => {
                info!("TEAM: Discarding operation for patient {:?}", patient);
                params.ev_cancel.write(OperationCancelRequest {
                    patient,
                    reason: TaskEndReason::Discarded,
                });
                continue;
            }
        };

        if changed {
            refresh_cached_bonus(&mut team, &params.q_medics, &params.config);
            // 実行中に受理された編成変更は現在の実行を無効化する。
            // ヘルパーのループと適用済みボーナスは開始時点の
            // スナップショットであり、安全に差し替えられない
            if was_running {
                params.ev_cancel.write(OperationCancelRequest {
                    patient,
                    reason: TaskEndReason::Superseded,
                });
            }
        }
    }
}

/// キャッシュ済みボーナスを現在の構成から再計算する
pub fn refresh_cached_bonus(
    team: &mut SurgeryTeam,
    q_medics: &Query<&Medic>,
    config: &SurgeryConfig,
) {
    let baseline = team
        .lead
        .and_then(|l| q_medics.get(l).ok())
        .map(|m| lead_baseline(m.skill))
        .unwrap_or(0.0);
    let profiles = member_profiles(&team.members, q_medics);
    let bonus = compute_team_bonus(&profiles, baseline, config);
    team.speed_multiplier = bonus.speed_multiplier;
    team.success_bonus = bonus.success_bonus;
}

/// この患者を対象とするタスクを全て強制終了する
fn end_stale_tasks(
    patient: Entity,
    commands: &mut Commands,
    q_operate: &Query<(Entity, &OperateTask)>,
    q_assist: &Query<(Entity, &AssistTask)>,
    ev_task_ended: &mut MessageWriter<OnTaskEnded>,
) {
    for (medic, task) in q_operate.iter() {
        if task.patient == patient {
            commands.entity(medic).remove::<OperateTask>();
            ev_task_ended.write(OnTaskEnded {
                medic,
                reason: TaskEndReason::Superseded,
            });
            debug!("TEAM: Ended stale operate task of {:?}", medic);
        }
    }
    for (medic, task) in q_assist.iter() {
        if task.patient == patient {
            commands.entity(medic).remove::<AssistTask>();
            ev_task_ended.write(OnTaskEnded {
                medic,
                reason: TaskEndReason::Superseded,
            });
            debug!("TEAM: Ended stale assist task of {:?}", medic);
        }
    }
}

/// 保存済みプリセットをチームに適用する。変更があったら true
#[allow(clippy::too_many_arguments)]
fn apply_preset(
    name: &str,
    patient: Entity,
    team: &mut SurgeryTeam,
    presets: &TeamPresets,
    config: &SurgeryConfig,
    q_ids: &Query<(Entity, &ActorId)>,
    q_pool: &Query<(Entity, &Medic, Option<&Downed>)>,
    q_busy: &BusyQuery,
    ev_rejected: &mut MessageWriter<OnStaffingRejected>,
) -> bool {
    let Some(preset) = presets.0.iter().find(|p| p.name == name) else {
        warn!("TEAM: Unknown preset '{}'", name);
        ev_rejected.write(OnStaffingRejected {
            patient,
            reason: StaffingError::PresetUnavailable,
        });
        return false;
    };

    let resolve = |id: ActorId| q_ids.iter().find(|(_, aid)| **aid == id).map(|(e, _)| e);

    let Some(lead) = resolve(preset.lead) else {
        warn!("TEAM: Preset '{}' lead {:?} is not present", name, preset.lead);
        ev_rejected.write(OnStaffingRejected {
            patient,
            reason: StaffingError::PresetUnavailable,
        });
        return false;
    };
    if !is_eligible(patient, lead, q_pool, q_busy) {
        ev_rejected.write(OnStaffingRejected {
            patient,
            reason: StaffingError::PresetUnavailable,
        });
        return false;
    }

    team.select_lead(lead);
    for &assistant_id in &preset.assistants {
        let Some(assistant) = resolve(assistant_id) else {
            // 不在のアシスタントは飛ばして残りを適用する
            warn!("TEAM: Preset assistant {:?} is not present, skipping", assistant_id);
            continue;
        };
        if is_eligible(patient, assistant, q_pool, q_busy) {
            team.toggle_assistant(assistant, true, config.max_team_size);
        }
    }
    info!(
        "TEAM: Applied preset '{}' to patient {:?} ({} member(s))",
        name,
        patient,
        team.members.len()
    );
    true
}
