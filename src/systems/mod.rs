pub mod assist;
pub mod bonus;
pub mod credit;
pub mod eligibility;
pub mod orchestrator;
pub mod roster;
pub mod team;

use bevy::prelude::*;

/// システムの実行順序を制御するセット
#[derive(SystemSet, Debug, Clone, PartialEq, Eq, Hash)]
pub enum SimSystemSet {
    /// 予約の作成・チーム編成（操作側からの要求処理）
    Staffing,
    /// オーケストレーターとアシストのコアロジック
    Logic,
    /// エンティティの移動（ロジックに基づく実際のアクション）
    Actor,
}
