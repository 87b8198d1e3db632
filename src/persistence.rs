//! チーム構成の永続化
//!
//! `Entity` は実行ごとに変わるため、セーブデータでは `ActorId` で
//! アクターを参照する。リード・メンバー一覧・phase flag が正確に
//! 往復することがここの契約。キャッシュ済みボーナスは派生値なので
//! 保存せず、復元後に再計算する。

use std::collections::HashMap;

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::entities::ActorId;
use crate::systems::team::SurgeryTeam;

/// 永続化境界のエラー
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("actor {0:?} has no stable id")]
    MissingActorId(Entity),
    #[error("actor id {0:?} is not present in this world")]
    UnknownActor(ActorId),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// セーブデータ上のチーム構成
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedTeam {
    pub operation: String,
    pub lead: Option<ActorId>,
    pub members: Vec<ActorId>,
    pub in_progress: bool,
}

/// 保存済みのチームプリセット
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamPreset {
    pub name: String,
    pub lead: ActorId,
    pub assistants: Vec<ActorId>,
}

/// 名前付きプリセットの一覧
#[derive(Resource, Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamPresets(pub Vec<TeamPreset>);

/// ライブのチームをセーブ形式に変換する
pub fn save_team(team: &SurgeryTeam, q_ids: &Query<&ActorId>) -> Result<SavedTeam, PersistError> {
    let resolve = |entity: Entity| {
        q_ids
            .get(entity)
            .map(|id| *id)
            .map_err(|_| PersistError::MissingActorId(entity))
    };

    let lead = team.lead.map(resolve).transpose()?;
    let members = team
        .members
        .iter()
        .map(|&m| resolve(m))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(SavedTeam {
        operation: team.operation.clone(),
        lead,
        members,
        in_progress: team.in_progress,
    })
}

/// セーブ形式からライブのチームを復元する
///
/// `index` は現在のワールドの `ActorId -> Entity` 対応表。
/// 未知の ID は欠損データとしてエラーにする
pub fn restore_team(
    saved: &SavedTeam,
    index: &HashMap<ActorId, Entity>,
) -> Result<SurgeryTeam, PersistError> {
    let resolve = |id: ActorId| index.get(&id).copied().ok_or(PersistError::UnknownActor(id));

    let mut team = SurgeryTeam::new(saved.operation.clone());
    team.lead = saved.lead.map(resolve).transpose()?;
    team.members = saved
        .members
        .iter()
        .map(|&id| resolve(id))
        .collect::<Result<Vec<_>, _>>()?;
    team.in_progress = saved.in_progress;
    Ok(team)
}

/// ワールド内のアクターから `ActorId -> Entity` 対応表を作る
pub fn actor_index(q_ids: &Query<(Entity, &ActorId)>) -> HashMap<ActorId, Entity> {
    q_ids.iter().map(|(entity, id)| (*id, entity)).collect()
}

pub fn team_to_json(saved: &SavedTeam) -> Result<String, PersistError> {
    Ok(serde_json::to_string(saved)?)
}

pub fn team_from_json(json: &str) -> Result<SavedTeam, PersistError> {
    Ok(serde_json::from_str(json)?)
}

pub fn presets_to_json(presets: &TeamPresets) -> Result<String, PersistError> {
    Ok(serde_json::to_string(presets)?)
}

pub fn presets_from_json(json: &str) -> Result<TeamPresets, PersistError> {
    Ok(serde_json::from_str(json)?)
}
