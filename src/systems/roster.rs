//! 予定された手術の一覧
//!
//! 操作側のタブ表示やテストのための読み取り専用ビュー。
//! 描画はしない。

use bevy::prelude::*;

use crate::systems::orchestrator::OperationPhase;
use crate::systems::team::SurgeryTeam;

/// 一覧の 1 行分
#[derive(Debug, Clone, PartialEq)]
pub struct RosterEntry {
    pub patient: Entity,
    pub operation: String,
    pub lead: Option<Entity>,
    pub team_size: usize,
    pub phase: OperationPhase,
}

/// 現在予定されている手術を列挙する
pub fn scheduled_operations(
    q_teams: &Query<(Entity, &SurgeryTeam, &OperationPhase)>,
) -> Vec<RosterEntry> {
    let mut entries: Vec<RosterEntry> = q_teams
        .iter()
        .map(|(patient, team, phase)| RosterEntry {
            patient,
            operation: team.operation.clone(),
            lead: team.lead,
            team_size: team.members.len(),
            phase: phase.clone(),
        })
        .collect();
    entries.sort_by_key(|e| e.patient);
    entries
}
