//! シミュレーション定数
//!
//! 1 tick = 1 回の `Update` 実行。全てのレートは tick 単位で定義する。

// ============================================================
// 移動 (Movement)
// ============================================================

/// 医師の 1 tick あたりの移動距離
pub const MEDIC_MOVE_STEP: f32 = 8.0;

/// ベッドサイドに「到着した」と見なす距離
pub const BEDSIDE_RADIUS: f32 = 12.0;

// ============================================================
// 手術の進行 (Operation progress)
// ============================================================

/// リードが 1 tick に積み上げる基本作業量（速度倍率を掛ける前）
pub const WORK_PER_TICK: f32 = 1.0;

// ============================================================
// 経験値 (Experience)
// ============================================================

/// 完了時に分配される経験値プールの総量
pub const CREDIT_POOL: f32 = 1000.0;

/// アシスト中、1 tick ごとに得る経験値
pub const ASSIST_XP_PER_TICK: f32 = 0.05;

// ============================================================
// 成功率のベースライン (Outcome baseline)
// ============================================================

/// リードのスキルが 0 の時の基礎成功率
pub const SUCCESS_BASE: f32 = 0.70;

/// スキル 1 ポイントごとの基礎成功率の上昇量
pub const SUCCESS_PER_SKILL: f32 = 0.015;
