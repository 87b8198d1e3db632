//! 統合テスト用のヘルパー
//!
//! ヘッドレスの `App` を組み立て、編成から実行までの流れを
//! メッセージ駆動で進める。
#![allow(dead_code)]

use bevy::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;

use ward_crew::config::SurgeryConfig;
use ward_crew::entities::medic::{Medic, MedicKind};
use ward_crew::entities::patient::{InBed, Patient};
use ward_crew::entities::ActorId;
use ward_crew::events::{
    OnOperationEnded, OnStaffingRejected, OnTaskEnded, OperationOutcome, ScheduleOperationRequest,
    StaffingError, StartConfirmRequest, TaskEndReason, TeamAssignmentOp, TeamAssignmentRequest,
};
use ward_crew::plugins::{LogicPlugin, MessagesPlugin};
use ward_crew::systems::orchestrator::{OperationPhase, OutcomeRng};
use ward_crew::systems::team::SurgeryTeam;
use ward_crew::systems::SimSystemSet;

/// 通知メッセージの記録
#[derive(Resource, Default)]
pub struct Recorded {
    pub outcomes: Vec<(Entity, OperationOutcome)>,
    pub task_ends: Vec<(Entity, TaskEndReason)>,
    pub rejections: Vec<(Entity, StaffingError)>,
}

fn record_system(
    mut recorded: ResMut<Recorded>,
    mut ev_outcomes: MessageReader<OnOperationEnded>,
    mut ev_task_ends: MessageReader<OnTaskEnded>,
    mut ev_rejections: MessageReader<OnStaffingRejected>,
) {
    for ev in ev_outcomes.read() {
        recorded.outcomes.push((ev.patient, ev.outcome));
    }
    for ev in ev_task_ends.read() {
        recorded.task_ends.push((ev.medic, ev.reason));
    }
    for ev in ev_rejections.read() {
        recorded.rejections.push((ev.patient, ev.reason.clone()));
    }
}

/// 小さな作業量と確定成功のテスト用設定
pub fn quick_config() -> SurgeryConfig {
    SurgeryConfig {
        total_work: 5.0,
        max_success_chance: 1.0,
        ..Default::default()
    }
}

pub fn test_app(config: SurgeryConfig) -> App {
    let mut app = App::new();
    app.add_plugins((MessagesPlugin, LogicPlugin));
    app.insert_resource(config);
    app.insert_resource(OutcomeRng(StdRng::seed_from_u64(7)));
    app.init_resource::<Recorded>();
    // コアの後に走らせ、同じ tick 内の通知を取りこぼさない
    app.add_systems(Update, record_system.after(SimSystemSet::Logic));
    app
}

pub fn send<M: Message>(app: &mut App, message: M) {
    app.world_mut()
        .resource_mut::<Messages<M>>()
        .write(message);
}

pub fn spawn_patient(app: &mut App, id: u32) -> Entity {
    app.world_mut()
        .spawn((Patient, InBed, ActorId(id), Transform::default()))
        .id()
}

pub fn spawn_medic(app: &mut App, id: u32, skill: f32, kind: MedicKind) -> Entity {
    // ベッドサイドに直接置く。移動は別のテストで見る
    app.world_mut()
        .spawn((Medic::new(skill, kind), ActorId(id), Transform::default()))
        .id()
}

/// 予約の作成・リード選択・アシスタント追加・確定までを一息で行う。
/// 終了時にはリードがベッドサイドで開始確認を待っている
pub fn assemble_committed_team(
    app: &mut App,
    lead_skill: f32,
    assistant_skills: &[f32],
) -> (Entity, Entity, Vec<Entity>) {
    let patient = spawn_patient(app, 100);
    let lead = spawn_medic(app, 1, lead_skill, MedicKind::Standard);
    let assistants: Vec<Entity> = assistant_skills
        .iter()
        .enumerate()
        .map(|(i, &skill)| spawn_medic(app, 2 + i as u32, skill, MedicKind::Standard))
        .collect();

    send(
        app,
        ScheduleOperationRequest {
            patient,
            operation: "install-prosthetic".into(),
        },
    );
    app.update();

    send(
        app,
        TeamAssignmentRequest {
            patient,
            op: TeamAssignmentOp::SelectLead { medic: lead },
        },
    );
    for &assistant in &assistants {
        send(
            app,
            TeamAssignmentRequest {
                patient,
                op: TeamAssignmentOp::ToggleAssistant {
                    medic: assistant,
                    want: true,
                },
            },
        );
    }
    app.update();

    send(
        app,
        TeamAssignmentRequest {
            patient,
            op: TeamAssignmentOp::Commit,
        },
    );
    app.update();

    (patient, lead, assistants)
}

/// 開始確認を返して実行フェーズに入れる
pub fn confirm_start(app: &mut App, patient: Entity) {
    send(
        app,
        StartConfirmRequest {
            patient,
            confirm: true,
        },
    );
    app.update();
}

/// 予約が終端フェーズに達するか消えるまで tick を回す
pub fn run_until_settled(app: &mut App, patient: Entity, max_ticks: usize) {
    for _ in 0..max_ticks {
        let settled = app
            .world()
            .get::<OperationPhase>(patient)
            .map(|phase| phase.is_terminal())
            .unwrap_or(true);
        if settled {
            return;
        }
        app.update();
    }
    panic!("operation did not settle within {} ticks", max_ticks);
}

pub fn team(app: &App, patient: Entity) -> Option<&SurgeryTeam> {
    app.world().get::<SurgeryTeam>(patient)
}

pub fn phase(app: &App, patient: Entity) -> Option<&OperationPhase> {
    app.world().get::<OperationPhase>(patient)
}
