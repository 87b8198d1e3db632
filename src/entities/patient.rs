//! 患者エンティティ

use bevy::prelude::*;

use super::ActorId;

/// 患者のコンポーネント
///
/// 手術予約（`SurgeryTeam`）は患者エンティティが所有する。
/// 患者が消滅すれば予約も一緒に消える。
#[derive(Component, Debug, Default)]
pub struct Patient;

/// ベッドに寝ている状態。手術はこのマーカーがある間だけ有効
#[derive(Component, Debug, Default)]
pub struct InBed;

/// 患者をスポーンするヘルパー
pub fn spawn_patient(commands: &mut Commands, id: ActorId, pos: Vec2) -> Entity {
    let entity = commands
        .spawn((Patient, InBed, id, Transform::from_xyz(pos.x, pos.y, 0.5)))
        .id();
    info!("SPAWN: Patient {:?} at {:?}", entity, pos);
    entity
}
