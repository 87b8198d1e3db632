//! コアロジックのプラグイン

use bevy::prelude::*;

use crate::config::SurgeryConfig;
use crate::entities::medic::medic_movement_system;
use crate::persistence::TeamPresets;
use crate::systems::assist::assist_loop_system;
use crate::systems::orchestrator::{
    claim_system, confirm_system, invalidation_system, lead_dispatch_system, operate_task_system,
    outcome_log_system, termination_system, OutcomeRng,
};
use crate::systems::team::{schedule_operation_system, team_assignment_system};
use crate::systems::SimSystemSet;

pub struct LogicPlugin;

impl Plugin for LogicPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<SurgeryConfig>()
            .init_resource::<OutcomeRng>()
            .init_resource::<TeamPresets>()
            .configure_sets(
                Update,
                (
                    SimSystemSet::Staffing,
                    SimSystemSet::Logic,
                    SimSystemSet::Actor,
                )
                    .chain(),
            )
            .add_systems(
                Update,
                (schedule_operation_system, team_assignment_system)
                    .chain()
                    .in_set(SimSystemSet::Staffing),
            )
            .add_systems(
                Update,
                (
                    lead_dispatch_system,
                    claim_system,
                    confirm_system,
                    operate_task_system,
                    invalidation_system,
                    termination_system,
                    assist_loop_system,
                    outcome_log_system,
                )
                    .chain()
                    .in_set(SimSystemSet::Logic),
            )
            .add_systems(Update, medic_movement_system.in_set(SimSystemSet::Actor));
    }
}
