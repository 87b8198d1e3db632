//! ward-crew: 手術チームのコーディネーション・シミュレーション
//!
//! 一人の患者に対して、リードの医師と複数のアシスタントが
//! 協働で手術を行う。編成・ボーナス計算・実行の状態機械・
//! ヘルパーのループ・後始末をこのクレートが受け持つ。
//! 描画と実際の経路探索は対象外。

pub mod config;
pub mod constants;
pub mod entities;
pub mod events;
pub mod persistence;
pub mod plugins;
pub mod systems;
