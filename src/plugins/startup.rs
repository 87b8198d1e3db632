//! デモシナリオのプラグイン
//!
//! バイナリ実行時に小さな病棟を組み立て、チーム編成から手術完了まで
//! を一通り流して終了する。ライブラリ利用時には追加しない。

use bevy::app::AppExit;
use bevy::prelude::*;

use crate::config::SurgeryConfig;
use crate::entities::medic::{spawn_medic, MedicKind};
use crate::entities::patient::spawn_patient;
use crate::entities::ActorId;
use crate::events::{
    OnAwaitingConfirm, OnOperationEnded, ScheduleOperationRequest, StartConfirmRequest,
    TeamAssignmentOp, TeamAssignmentRequest,
};
use crate::systems::SimSystemSet;

pub struct StartupPlugin;

impl Plugin for StartupPlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(SurgeryConfig {
            // デモが数秒で終わるよう作業量だけ小さくする
            total_work: 300.0,
            ..Default::default()
        })
        .insert_resource(DemoState::default())
        .add_systems(Startup, spawn_demo_ward)
        .add_systems(Update, demo_driver_system.before(SimSystemSet::Staffing));
    }
}

/// デモで使うアクターの控え
#[derive(Resource, Debug)]
struct DemoActors {
    patient: Entity,
    lead: Entity,
    assistants: Vec<Entity>,
}

#[derive(Resource, Debug, Default)]
struct DemoState {
    tick: u32,
}

fn spawn_demo_ward(mut commands: Commands) {
    let patient = spawn_patient(&mut commands, ActorId(1), Vec2::new(0.0, 0.0));
    let lead = spawn_medic(
        &mut commands,
        ActorId(2),
        14.0,
        MedicKind::Standard,
        Vec2::new(-80.0, 40.0),
    );
    let assistants = vec![
        spawn_medic(
            &mut commands,
            ActorId(3),
            8.0,
            MedicKind::Standard,
            Vec2::new(60.0, -50.0),
        ),
        spawn_medic(
            &mut commands,
            ActorId(4),
            0.0,
            MedicKind::Automaton,
            Vec2::new(90.0, 30.0),
        ),
    ];
    commands.insert_resource(DemoActors {
        patient,
        lead,
        assistants,
    });
}

/// 編成から完了までを台本どおりに進めるシステム
fn demo_driver_system(
    mut state: ResMut<DemoState>,
    actors: Option<Res<DemoActors>>,
    mut ev_schedule: MessageWriter<ScheduleOperationRequest>,
    mut ev_assign: MessageWriter<TeamAssignmentRequest>,
    mut ev_confirm: MessageWriter<StartConfirmRequest>,
    mut ev_await: MessageReader<OnAwaitingConfirm>,
    mut ev_ended: MessageReader<OnOperationEnded>,
    mut app_exit: MessageWriter<AppExit>,
) {
    let Some(actors) = actors else { return };
    state.tick += 1;

    match state.tick {
        1 => {
            ev_schedule.write(ScheduleOperationRequest {
                patient: actors.patient,
                operation: "install-prosthetic".into(),
            });
        }
        2 => {
            ev_assign.write(TeamAssignmentRequest {
                patient: actors.patient,
                op: TeamAssignmentOp::SelectLead { medic: actors.lead },
            });
            for &assistant in &actors.assistants {
                ev_assign.write(TeamAssignmentRequest {
                    patient: actors.patient,
                    op: TeamAssignmentOp::ToggleAssistant {
                        medic: assistant,
                        want: true,
                    },
                });
            }
        }
        3 => {
            ev_assign.write(TeamAssignmentRequest {
                patient: actors.patient,
                op: TeamAssignmentOp::Commit,
            });
        }
        _ => {}
    }

    for ev in ev_await.read() {
        info!("DEMO: Confirming operation on {:?}", ev.patient);
        ev_confirm.write(StartConfirmRequest {
            patient: ev.patient,
            confirm: true,
        });
    }

    for ev in ev_ended.read() {
        info!("DEMO: Operation ended ({:?}), exiting", ev.outcome);
        app_exit.write(AppExit::Success);
    }
}
