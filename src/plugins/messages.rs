use bevy::prelude::*;

use crate::events::{
    ClaimRequest, OnAwaitingConfirm, OnOperationEnded, OnOperationStarted, OnStaffingRejected,
    OnTaskEnded, OperationCancelRequest, ScheduleOperationRequest, StartConfirmRequest,
    TeamAssignmentRequest,
};

pub struct MessagesPlugin;

impl Plugin for MessagesPlugin {
    fn build(&self, app: &mut App) {
        app.add_message::<ScheduleOperationRequest>()
            .add_message::<TeamAssignmentRequest>()
            .add_message::<ClaimRequest>()
            .add_message::<StartConfirmRequest>()
            .add_message::<OperationCancelRequest>()
            .add_message::<OnAwaitingConfirm>()
            .add_message::<OnOperationStarted>()
            .add_message::<OnOperationEnded>()
            .add_message::<OnTaskEnded>()
            .add_message::<OnStaffingRejected>();
    }
}
