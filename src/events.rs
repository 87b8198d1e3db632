//! メッセージ定義
//!
//! 操作側（ダイアログ/外部コラボレーター）からの要求メッセージと、
//! コアが発火する通知メッセージをここに集約する。
//! Decide -> Execute の流れは全て要求メッセージ経由で行う。

use bevy::prelude::*;

// ============================================================
// 要求メッセージ (Operator -> Core)
// ============================================================

/// 患者への手術予約の作成要求
#[derive(Message, Debug, Clone)]
pub struct ScheduleOperationRequest {
    pub patient: Entity,
    /// 手術の種類（除外リストとの照合に使う）
    pub operation: String,
}

/// チーム編成の変更要求（編成ダイアログ -> チーム）
#[derive(Message, Debug, Clone)]
pub struct TeamAssignmentRequest {
    pub patient: Entity,
    pub op: TeamAssignmentOp,
}

/// 編成操作の種別
#[derive(Debug, Clone)]
pub enum TeamAssignmentOp {
    /// リードを交代する。アシスタントは引き継がれず、チームはリセットされる
    SelectLead { medic: Entity },
    /// アシスタントの追加・削除
    ToggleAssistant { medic: Entity, want: bool },
    /// 保存済みプリセットを適用する
    ApplyPreset { name: String },
    /// 編成を確定し、リードのみが手術を開始できるようにする
    Commit,
    /// 予約ごと破棄する
    Discard,
}

/// 手術タスクの請求要求（医師 -> オーケストレーター）
/// リード以外からの請求は拒否される
#[derive(Message, Debug, Clone)]
pub struct ClaimRequest {
    pub medic: Entity,
    pub patient: Entity,
}

/// 手術開始の確認応答（操作側 -> オーケストレーター）
#[derive(Message, Debug, Clone)]
pub struct StartConfirmRequest {
    pub patient: Entity,
    pub confirm: bool,
}

/// 実行中の手術の取り消し要求（どのコンポーネントからでも発行できる）
#[derive(Message, Debug, Clone)]
pub struct OperationCancelRequest {
    pub patient: Entity,
    pub reason: TaskEndReason,
}

// ============================================================
// 通知メッセージ (Core -> Operator)
// ============================================================

/// リードがベッドサイドに到着し、開始確認を待っている
#[derive(Message, Debug, Clone)]
pub struct OnAwaitingConfirm {
    pub patient: Entity,
    pub lead: Entity,
}

/// 手術が開始された（phase flag が立った）
#[derive(Message, Debug, Clone)]
pub struct OnOperationStarted {
    pub patient: Entity,
    pub lead: Entity,
    pub speed_multiplier: f32,
    pub success_chance: f32,
}

/// 手術が終了した（正常・失敗・取り消しのいずれか）
#[derive(Message, Debug, Clone)]
pub struct OnOperationEnded {
    pub patient: Entity,
    pub outcome: OperationOutcome,
}

/// 医師のタスクが終了した
#[derive(Message, Debug, Clone)]
pub struct OnTaskEnded {
    pub medic: Entity,
    pub reason: TaskEndReason,
}

/// 編成要求が受理されなかった
#[derive(Message, Debug, Clone)]
pub struct OnStaffingRejected {
    pub patient: Entity,
    pub reason: StaffingError,
}

// ============================================================
// 種別 enum
// ============================================================

/// 手術の最終結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationOutcome {
    Completed,
    Failed,
    Cancelled(TaskEndReason),
}

/// タスク終了の理由コード
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskEndReason {
    /// 正常終了
    Succeeded,
    /// 請求が拒否された・開始条件を満たせなかった
    Incompletable,
    /// 編成変更により古いタスクが無効化された
    Superseded,
    /// 予約ごと破棄された
    Discarded,
    /// アシスト継続の前提条件が崩れた
    NoLongerApplicable,
    /// リードが死亡した
    LeadDied,
    /// 患者が無効になった（消滅・死亡・離床）
    PatientInvalid,
}

/// 編成段階のエラー（致命的ではない。予約は Staffing に留まる）
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StaffingError {
    /// 適格な候補者がいない
    NoCandidates,
    /// リード未設定のまま確定しようとした
    LeadUnset,
    /// 候補者が適格性を満たしていない
    Ineligible,
    /// この手術の種類はチーム編成の対象外
    OperationExcluded,
    /// 指定された名前のプリセットが存在しない、または解決できない
    PresetUnavailable,
    /// 対象の患者に予約が存在しない
    NoAssignment,
}
