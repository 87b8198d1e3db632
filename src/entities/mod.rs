//! アクター（医師・患者）のコンポーネントとスポーン処理

pub mod medic;
pub mod patient;

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

/// セーブデータ上で安定なアクター識別子
///
/// `Entity` は実行ごとに変わるため、永続化とプリセットでは
/// この ID でアクターを参照する。スポーン時に必ず付与する。
#[derive(
    Component, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct ActorId(pub u32);

/// 意識を失って行動できない状態
#[derive(Component, Debug, Default)]
pub struct Downed;
