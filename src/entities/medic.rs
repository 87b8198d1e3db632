//! 医師エンティティ

use bevy::prelude::*;

use super::ActorId;
use crate::constants::MEDIC_MOVE_STEP;

/// 医師のコンポーネント
#[derive(Component, Debug)]
pub struct Medic {
    /// 医療スキル (0.0-20.0)
    pub skill: f32,
    pub kind: MedicKind,
    /// 医療の仕事が作業設定で有効か
    pub medical_work_enabled: bool,
    /// 蓄積された経験値
    pub experience: f32,
}

impl Medic {
    pub fn new(skill: f32, kind: MedicKind) -> Self {
        Self {
            skill,
            kind,
            medical_work_enabled: true,
            experience: 0.0,
        }
    }
}

/// 医師の種別
///
/// ボーナス計算の寄与方法を編成時に一度だけ決める閉じたタグ。
/// tick ごとに種別を推定し直すことはしない。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MedicKind {
    /// スキルに応じて寄与する通常の医師
    #[default]
    Standard,
    /// スキルを持たず、固定値で寄与する自動機械
    Automaton,
}

/// 移動先
#[derive(Component, Debug, Clone, Copy)]
pub struct Destination(pub Vec2);

/// 医師をスポーンするヘルパー
pub fn spawn_medic(
    commands: &mut Commands,
    id: ActorId,
    skill: f32,
    kind: MedicKind,
    pos: Vec2,
) -> Entity {
    let entity = commands
        .spawn((
            Medic::new(skill, kind),
            id,
            Transform::from_xyz(pos.x, pos.y, 1.0),
        ))
        .id();
    info!("SPAWN: Medic {:?} (skill {}, {:?}) at {:?}", entity, skill, kind, pos);
    entity
}

/// 医師の移動システム
///
/// `Destination` を持つ医師を 1 tick につき一定距離だけ近づける。
/// 経路探索は行わない（直線移動で外部の移動機構を代替する）。
pub fn medic_movement_system(
    mut commands: Commands,
    mut query: Query<(Entity, &mut Transform, &Destination), With<Medic>>,
) {
    for (entity, mut transform, dest) in query.iter_mut() {
        let current = transform.translation.truncate();
        let to_target = dest.0 - current;
        let distance = to_target.length();

        if distance > MEDIC_MOVE_STEP {
            let step = to_target.normalize() * MEDIC_MOVE_STEP;
            transform.translation += step.extend(0.0);
        } else {
            transform.translation = dest.0.extend(transform.translation.z);
            commands.entity(entity).remove::<Destination>();
            debug!("MOVE: Medic {:?} reached destination {:?}", entity, dest.0);
        }
    }
}
