//! チーム編成から手術終了までの統合テスト

mod common;

use bevy::prelude::*;

use common::*;
use ward_crew::config::SurgeryConfig;
use ward_crew::constants::CREDIT_POOL;
use ward_crew::entities::medic::{Medic, MedicKind};
use ward_crew::entities::patient::InBed;
use ward_crew::events::{
    ClaimRequest, OperationOutcome, ScheduleOperationRequest, StartConfirmRequest, TaskEndReason,
    TeamAssignmentOp, TeamAssignmentRequest,
};
use ward_crew::systems::assist::AssistTask;
use ward_crew::systems::orchestrator::{OperateTask, OperateTaskPhase, OperationPhase};
use ward_crew::systems::roster::scheduled_operations;
use ward_crew::systems::team::SurgeryTeam;

#[test]
fn full_operation_completes_and_awards_credit() {
    let mut app = test_app(quick_config());
    let (patient, lead, assistants) = assemble_committed_team(&mut app, 20.0, &[8.0, 8.0]);
    confirm_start(&mut app, patient);

    assert!(matches!(
        phase(&app, patient),
        Some(OperationPhase::Running { .. })
    ));
    assert!(team(&app, patient).unwrap().in_progress);

    run_until_settled(&mut app, patient, 50);

    assert_eq!(phase(&app, patient), Some(&OperationPhase::Completed));
    let team = team(&app, patient).unwrap();
    assert!(!team.in_progress);
    assert!(team.credit_awarded);

    // 後始末: 誰もタスクを持っていない
    assert!(app.world().get::<OperateTask>(lead).is_none());
    for &assistant in &assistants {
        assert!(app.world().get::<AssistTask>(assistant).is_none());
    }

    // リード 50%、アシスタント 25% ずつ（+ アシスト中の微量の経験値）
    let lead_xp = app.world().get::<Medic>(lead).unwrap().experience;
    assert_eq!(lead_xp, CREDIT_POOL * 0.5);
    for &assistant in &assistants {
        let xp = app.world().get::<Medic>(assistant).unwrap().experience;
        assert!(xp >= CREDIT_POOL * 0.25);
        assert!(xp < CREDIT_POOL * 0.25 + 5.0);
    }
}

#[test]
fn solo_lead_receives_the_full_pool() {
    let mut app = test_app(quick_config());
    let (patient, lead, _) = assemble_committed_team(&mut app, 20.0, &[]);
    confirm_start(&mut app, patient);
    run_until_settled(&mut app, patient, 50);

    assert_eq!(phase(&app, patient), Some(&OperationPhase::Completed));
    let lead_xp = app.world().get::<Medic>(lead).unwrap().experience;
    assert_eq!(lead_xp, CREDIT_POOL);
}

#[test]
fn claim_by_non_lead_is_rejected() {
    let mut app = test_app(quick_config());
    let (patient, lead, _) = assemble_committed_team(&mut app, 20.0, &[8.0]);
    let outsider = spawn_medic(&mut app, 50, 15.0, MedicKind::Standard);

    let before = team(&app, patient).unwrap().clone();
    send(
        &mut app,
        ClaimRequest {
            medic: outsider,
            patient,
        },
    );
    app.update();

    // 請求者のタスクは Incompletable で終わり、チームは変わらない
    let recorded = app.world().resource::<Recorded>();
    assert!(recorded
        .task_ends
        .iter()
        .any(|&(m, r)| m == outsider && r == TaskEndReason::Incompletable));
    assert!(app.world().get::<OperateTask>(outsider).is_none());
    let after = team(&app, patient).unwrap();
    assert_eq!(after.lead, before.lead);
    assert_eq!(after.members, before.members);
    assert_eq!(after.lead, Some(lead));
}

#[test]
fn lead_death_mid_run_cancels_and_removes_assignment() {
    let mut app = test_app(quick_config());
    let (patient, lead, assistants) = assemble_committed_team(&mut app, 20.0, &[8.0, 8.0]);
    confirm_start(&mut app, patient);
    app.update();

    // リードが死亡する
    app.world_mut().entity_mut(lead).despawn();
    app.update();
    app.update();

    // 予約ごと消え、ヘルパーは全員止まり、経験値の分配は起きない
    assert!(team(&app, patient).is_none());
    assert!(phase(&app, patient).is_none());
    for &assistant in &assistants {
        assert!(app.world().get::<AssistTask>(assistant).is_none());
        let xp = app.world().get::<Medic>(assistant).unwrap().experience;
        assert!(xp < CREDIT_POOL * 0.25);
    }
    let recorded = app.world().resource::<Recorded>();
    assert!(recorded.outcomes.iter().any(|&(p, o)| {
        p == patient && o == OperationOutcome::Cancelled(TaskEndReason::LeadDied)
    }));
}

#[test]
fn patient_leaving_bed_cancels_the_run() {
    let mut app = test_app(quick_config());
    let (patient, lead, assistants) = assemble_committed_team(&mut app, 20.0, &[8.0]);
    confirm_start(&mut app, patient);
    app.update();

    app.world_mut().entity_mut(patient).remove::<InBed>();
    app.update();
    app.update();

    assert_eq!(phase(&app, patient), Some(&OperationPhase::Cancelled));
    let team = team(&app, patient).unwrap();
    assert!(!team.in_progress);
    assert!(!team.credit_awarded);
    assert!(app.world().get::<OperateTask>(lead).is_none());
    for &assistant in &assistants {
        assert!(app.world().get::<AssistTask>(assistant).is_none());
    }
}

#[test]
fn membership_change_mid_run_supersedes_the_run() {
    let mut app = test_app(quick_config());
    let (patient, lead, assistants) = assemble_committed_team(&mut app, 20.0, &[8.0, 8.0]);
    confirm_start(&mut app, patient);
    app.update();
    assert!(team(&app, patient).unwrap().in_progress);

    // 実行中にアシスタントを外す。ライブ状態の書き換えではなく
    // 実行の中断として扱われる
    send(
        &mut app,
        TeamAssignmentRequest {
            patient,
            op: TeamAssignmentOp::ToggleAssistant {
                medic: assistants[1],
                want: false,
            },
        },
    );
    app.update();
    app.update();

    let team_after = team(&app, patient).unwrap();
    assert!(!team_after.in_progress);
    assert_eq!(phase(&app, patient), Some(&OperationPhase::Ready));
    assert!(!team_after.is_member(assistants[1]));
    for &assistant in &assistants {
        assert!(app.world().get::<AssistTask>(assistant).is_none());
    }
    // リードは改めて請求し直すことはあっても、実行を続けてはいない
    if let Some(task) = app.world().get::<OperateTask>(lead) {
        assert!(!matches!(task.phase, OperateTaskPhase::Perform { .. }));
    }

    let recorded = app.world().resource::<Recorded>();
    assert!(recorded.outcomes.iter().any(|&(p, o)| {
        p == patient && o == OperationOutcome::Cancelled(TaskEndReason::Superseded)
    }));
}

#[test]
fn superseded_run_can_be_restarted_and_completed() {
    let mut app = test_app(quick_config());
    let (patient, _lead, assistants) = assemble_committed_team(&mut app, 20.0, &[8.0, 8.0]);
    confirm_start(&mut app, patient);
    app.update();

    send(
        &mut app,
        TeamAssignmentRequest {
            patient,
            op: TeamAssignmentOp::ToggleAssistant {
                medic: assistants[0],
                want: false,
            },
        },
    );
    app.update();
    assert_eq!(phase(&app, patient), Some(&OperationPhase::Ready));

    // リードが改めて請求し、確認後に完走できる
    for _ in 0..3 {
        app.update();
    }
    confirm_start(&mut app, patient);
    run_until_settled(&mut app, patient, 50);
    assert_eq!(phase(&app, patient), Some(&OperationPhase::Completed));
}

#[test]
fn declined_confirmation_returns_to_ready() {
    let mut app = test_app(quick_config());
    let (patient, lead, _) = assemble_committed_team(&mut app, 20.0, &[8.0]);

    send(
        &mut app,
        StartConfirmRequest {
            patient,
            confirm: false,
        },
    );
    app.update();

    assert_eq!(phase(&app, patient), Some(&OperationPhase::Ready));
    assert!(!team(&app, patient).unwrap().in_progress);
    let recorded = app.world().resource::<Recorded>();
    assert!(recorded
        .task_ends
        .iter()
        .any(|&(m, r)| m == lead && r == TaskEndReason::Incompletable));

    // 次の tick 以降、リードは改めて請求して確認待ちに戻る
    app.update();
    app.update();
    let task = app.world().get::<OperateTask>(lead).unwrap();
    assert_eq!(task.phase, OperateTaskPhase::AwaitConfirm);
}

#[test]
fn failed_outcome_runs_the_same_cleanup() {
    // 成功率の上限を 0 にすると結果判定は必ず失敗になる
    let mut app = test_app(SurgeryConfig {
        total_work: 5.0,
        max_success_chance: 0.0,
        ..Default::default()
    });
    let (patient, lead, assistants) = assemble_committed_team(&mut app, 20.0, &[8.0]);
    confirm_start(&mut app, patient);
    run_until_settled(&mut app, patient, 50);

    assert_eq!(phase(&app, patient), Some(&OperationPhase::Failed));
    let team = team(&app, patient).unwrap();
    assert!(!team.in_progress);
    // 失敗時は経験値プールを分配しない
    assert!(!team.credit_awarded);
    assert!(app.world().get::<OperateTask>(lead).is_none());
    for &assistant in &assistants {
        assert!(app.world().get::<AssistTask>(assistant).is_none());
    }
}

#[test]
fn excluded_operation_is_refused_at_scheduling() {
    let mut app = test_app(SurgeryConfig {
        excluded_operations: vec!["harvest-organ".into()],
        ..quick_config()
    });
    let patient = spawn_patient(&mut app, 100);

    send(
        &mut app,
        ScheduleOperationRequest {
            patient,
            operation: "harvest-organ".into(),
        },
    );
    app.update();

    assert!(team(&app, patient).is_none());
    let recorded = app.world().resource::<Recorded>();
    assert!(!recorded.rejections.is_empty());
}

#[test]
fn distant_lead_walks_to_the_bedside_before_confirming() {
    let mut app = test_app(quick_config());
    let patient = spawn_patient(&mut app, 100);
    let lead = app
        .world_mut()
        .spawn((
            Medic::new(20.0, MedicKind::Standard),
            ward_crew::entities::ActorId(1),
            Transform::from_xyz(100.0, 0.0, 1.0),
        ))
        .id();

    send(
        &mut app,
        ScheduleOperationRequest {
            patient,
            operation: "install-prosthetic".into(),
        },
    );
    app.update();
    send(
        &mut app,
        TeamAssignmentRequest {
            patient,
            op: TeamAssignmentOp::SelectLead { medic: lead },
        },
    );
    app.update();
    send(
        &mut app,
        TeamAssignmentRequest {
            patient,
            op: TeamAssignmentOp::Commit,
        },
    );
    app.update();

    // まだ遠いので移動中
    let task = app.world().get::<OperateTask>(lead).unwrap();
    assert_eq!(task.phase, OperateTaskPhase::Approach);

    for _ in 0..20 {
        app.update();
    }
    let task = app.world().get::<OperateTask>(lead).unwrap();
    assert_eq!(task.phase, OperateTaskPhase::AwaitConfirm);
}

#[test]
fn roster_lists_scheduled_operations() {
    use bevy::ecs::system::RunSystemOnce;

    let mut app = test_app(quick_config());
    let (patient, lead, _) = assemble_committed_team(&mut app, 20.0, &[8.0]);

    let entries = app
        .world_mut()
        .run_system_once(
            |q_teams: Query<(Entity, &SurgeryTeam, &OperationPhase)>| {
                scheduled_operations(&q_teams)
            },
        )
        .unwrap();

    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].patient, patient);
    assert_eq!(entries[0].lead, Some(lead));
    assert_eq!(entries[0].operation, "install-prosthetic");
    assert_eq!(entries[0].team_size, 2);
}
