//! チーム構成ボーナスの計算
//!
//! チーム構成から速度倍率と成功率ボーナスを導出する純粋関数。
//! 副作用を持たないため、編成ダイアログのライブ表示から
//! 毎 tick 呼び直しても安全。

use bevy::prelude::*;

use crate::config::SurgeryConfig;
use crate::constants::{SUCCESS_BASE, SUCCESS_PER_SKILL};
use crate::entities::medic::{Medic, MedicKind};

/// ボーナス計算に必要なメンバー情報のスナップショット
///
/// 種別は編成時に一度だけ解決する。tick ごとに医師の実体から
/// 推定し直すことはしない。
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MemberProfile {
    /// スキルに比例して寄与する通常の医師
    Standard { skill: f32 },
    /// 固定値で寄与する自動機械
    Fixed,
}

/// 計算結果
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TeamBonus {
    /// リードの作業速度に掛かる倍率 [1.0, max_speed_multiplier]
    pub speed_multiplier: f32,
    /// 成功率への加算ボーナス [0.0, max_success_chance]
    pub success_bonus: f32,
    /// ベースラインとボーナスを合算した最終成功率（上限適用済み）
    pub total_success: f32,
}

impl TeamBonus {
    /// ボーナスなしの基準値
    pub fn baseline(lead_baseline: f32, config: &SurgeryConfig) -> Self {
        Self {
            speed_multiplier: 1.0,
            success_bonus: 0.0,
            total_success: lead_baseline.min(config.max_success_chance),
        }
    }
}

/// リードのスキルから基礎成功率を求める
pub fn lead_baseline(skill: f32) -> f32 {
    SUCCESS_BASE + skill * SUCCESS_PER_SKILL
}

/// チーム構成からボーナスを計算する
///
/// `members` はリードを先頭（index 0）に置いたチーム全体。
/// リード自身は寄与しない。速度とボーナス項と最終成功率の
/// 3 つの上限は互いに独立して適用される。
pub fn compute_team_bonus(
    members: &[MemberProfile],
    lead_baseline: f32,
    config: &SurgeryConfig,
) -> TeamBonus {
    let mut speed = 1.0_f32;
    let mut success = 0.0_f32;

    for profile in members.iter().skip(1) {
        match profile {
            MemberProfile::Standard { skill } => {
                let scale = skill / config.skill_normalization;
                speed += scale * config.speed_bonus_per_assistant;
                success += scale * config.success_bonus_per_assistant;
            }
            MemberProfile::Fixed => {
                speed += config.automaton_speed_bonus;
                success += config.automaton_success_bonus;
            }
        }
    }

    let speed_multiplier = speed.clamp(1.0, config.max_speed_multiplier);
    let success_bonus = success.clamp(0.0, config.max_success_chance);
    let total_success = (lead_baseline + success_bonus).min(config.max_success_chance);

    TeamBonus {
        speed_multiplier,
        success_bonus,
        total_success,
    }
}

/// メンバーのエンティティ列からスナップショットを作る
///
/// 消滅済みのメンバーはスキップする（その時点の構成で計算する）。
pub fn member_profiles(members: &[Entity], q_medics: &Query<&Medic>) -> Vec<MemberProfile> {
    members
        .iter()
        .filter_map(|&m| q_medics.get(m).ok())
        .map(|medic| match medic.kind {
            MedicKind::Standard => MemberProfile::Standard { skill: medic.skill },
            MedicKind::Automaton => MemberProfile::Fixed,
        })
        .collect()
}
