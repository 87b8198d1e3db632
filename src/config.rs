//! 手術チームの設定
//!
//! 元はグローバルな可変設定だったものを、起動時に挿入される
//! 読み取り専用の `Resource` に置き換えている。コアのシステムは
//! この値を一切変更しない。

use bevy::prelude::*;

/// チーム編成とボーナス計算のパラメーター
#[derive(Resource, Debug, Clone)]
pub struct SurgeryConfig {
    /// アシスタント 1 人あたりの速度ボーナス係数
    pub speed_bonus_per_assistant: f32,
    /// アシスタント 1 人あたりの成功率ボーナス係数
    pub success_bonus_per_assistant: f32,
    /// チームの最大人数（リードを含む）
    pub max_team_size: usize,
    /// 速度倍率の上限
    pub max_speed_multiplier: f32,
    /// 成功率の上限（ボーナス項と最終値の両方に適用）
    pub max_success_chance: f32,
    /// スキル値の正規化係数（スキルの最大値）
    pub skill_normalization: f32,
    /// スキルを持たない自動機械アシスタントの固定速度ボーナス
    pub automaton_speed_bonus: f32,
    /// スキルを持たない自動機械アシスタントの固定成功率ボーナス
    pub automaton_success_bonus: f32,
    /// チーム編成を許可しない手術の種類
    pub excluded_operations: Vec<String>,
    /// 手術完了に必要な総作業量
    pub total_work: f32,
}

impl Default for SurgeryConfig {
    fn default() -> Self {
        Self {
            speed_bonus_per_assistant: 0.5,
            success_bonus_per_assistant: 0.25,
            max_team_size: 3,
            max_speed_multiplier: 1.95,
            max_success_chance: 0.98,
            skill_normalization: 20.0,
            automaton_speed_bonus: 0.3,
            automaton_success_bonus: 0.1,
            excluded_operations: Vec::new(),
            total_work: 5000.0,
        }
    }
}

impl SurgeryConfig {
    /// この手術の種類がチーム編成の対象外かどうか
    pub fn is_excluded(&self, operation: &str) -> bool {
        self.excluded_operations.iter().any(|o| o == operation)
    }

    /// リードを除いたアシスタントの最大数
    pub fn max_assistants(&self) -> usize {
        self.max_team_size.saturating_sub(1)
    }
}
