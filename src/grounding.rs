//! Grounding classifier: decides from raw contact normals whether a tracked body is standing on
//! something. Flags are rebuilt from scratch after every step, so they can never drift away from
//! what the physics world reports.

use bevy::prelude::*;
use bevy_rapier2d::prelude::RapierContext;

use crate::config::Tuning;
use crate::enemy::EnemyPhysics;
use crate::physics::ContactSource;
use crate::player::PlayerPhysics;
use crate::state::FrameSet;

pub struct GroundingPlugin;

impl Plugin for GroundingPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(
            PostUpdate,
            (
                classify_grounding::<PlayerPhysics>,
                classify_grounding::<EnemyPhysics>,
            )
                .in_set(FrameSet::Detect),
        );
    }
}

/// Component that carries a per-step grounded flag.
pub trait GroundSensor: Component {
    fn set_grounded(&mut self, grounded: bool);
}

/// True when any contact normal (seen from `entity`) points up by more than `up_threshold`. The
/// first qualifying contact wins; contacts are never averaged.
pub fn is_grounded(contacts: &impl ContactSource, entity: Entity, up_threshold: f32) -> bool {
    if contacts.contact_count(entity) == 0 {
        return false;
    }
    contacts
        .contact_normals(entity)
        .any(|normal| normal.y > up_threshold)
}

pub(crate) fn classify_grounding<T: GroundSensor>(
    rapier: Res<RapierContext>,
    tuning: Res<Tuning>,
    mut sensors: Query<(Entity, &mut T)>,
) {
    let threshold = tuning.grounding.up_threshold;
    for (entity, mut sensor) in &mut sensors {
        sensor.set_grounded(is_grounded(&*rapier, entity, threshold));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::ContactTable;

    const THRESHOLD: f32 = 0.15;

    fn pair() -> (World, Entity, Entity) {
        let mut world = World::new();
        let body = world.spawn_empty().id();
        let ground = world.spawn_empty().id();
        (world, body, ground)
    }

    #[test]
    fn upward_normal_grounds() {
        let (_world, body, ground) = pair();
        let mut table = ContactTable::default();
        table.touch(body, ground, Vec2::Y);
        assert!(is_grounded(&table, body, THRESHOLD));
    }

    #[test]
    fn horizontal_normal_does_not_ground() {
        let (_world, body, wall) = pair();
        let mut table = ContactTable::default();
        table.touch(body, wall, Vec2::X);
        assert!(!is_grounded(&table, body, THRESHOLD));
    }

    #[test]
    fn no_contacts_is_never_grounded() {
        let (_world, body, _) = pair();
        let table = ContactTable::default();
        assert!(!is_grounded(&table, body, THRESHOLD));

        let mut sensor = PlayerPhysics { is_grounded: true };
        sensor.set_grounded(is_grounded(&table, body, THRESHOLD));
        assert!(!sensor.is_grounded);
    }

    #[test]
    fn normal_is_read_from_the_queried_side() {
        let (_world, body, ceiling) = pair();
        let mut table = ContactTable::default();
        // Registered from the ceiling's side: it is pushed up, so the body sees a downward normal.
        table.touch(ceiling, body, Vec2::Y);
        assert!(!is_grounded(&table, body, THRESHOLD));
        assert!(is_grounded(&table, ceiling, THRESHOLD));
    }

    mod rapier_world {
        use bevy::asset::AssetPlugin;
        use bevy::hierarchy::HierarchyPlugin;
        use bevy::transform::TransformPlugin;
        use bevy_rapier2d::prelude::*;

        use super::*;
        use crate::collision::{
            detect_player_enemy_contacts, resolve_contacts, CollisionLog, ContactActor, ContactRole,
        };
        use crate::enemy::{Enemy, EnemyKind};
        use crate::physics::{sync_motion, Motion};
        use crate::player::{Player, PLAYER_RADIUS};

        struct Scene {
            app: App,
            ball: Entity,
            ground: Entity,
        }

        /// A player ball dropped onto a fixed slab that also counts as an enemy.
        fn resting_ball() -> Scene {
            let mut app = App::new();
            app.add_plugins((
                MinimalPlugins,
                TransformPlugin,
                HierarchyPlugin,
                AssetPlugin::default(),
            ))
            .init_asset::<Mesh>()
            .add_plugins(RapierPhysicsPlugin::<NoUserData>::pixels_per_meter(100.0))
            .init_resource::<Tuning>()
            .init_resource::<CollisionLog>()
            .add_systems(
                PostUpdate,
                (
                    sync_motion,
                    classify_grounding::<PlayerPhysics>,
                    detect_player_enemy_contacts,
                )
                    .chain()
                    .after(PhysicsSet::Writeback),
            );
            app.world_mut()
                .resource_mut::<RapierConfiguration>()
                .timestep_mode = TimestepMode::Fixed {
                dt: 1.0 / 60.0,
                substeps: 4,
            };

            let ground = app
                .world_mut()
                .spawn((
                    TransformBundle::from_transform(Transform::from_xyz(0.0, 0.0, 0.0)),
                    RigidBody::Fixed,
                    Collider::cuboid(200.0, 10.0),
                    Enemy::new(EnemyKind::Obstacle, [-200.0, 200.0]),
                    Motion::default(),
                ))
                .id();
            let ball = app
                .world_mut()
                .spawn((
                    TransformBundle::from_transform(Transform::from_xyz(
                        0.0,
                        10.0 + PLAYER_RADIUS + 2.0,
                        0.0,
                    )),
                    RigidBody::Dynamic,
                    Collider::ball(PLAYER_RADIUS),
                    LockedAxes::ROTATION_LOCKED,
                    Velocity::zero(),
                    Player,
                    PlayerPhysics::default(),
                    Motion::default(),
                ))
                .id();

            for _ in 0..60 {
                app.update();
            }
            Scene { app, ball, ground }
        }

        #[test]
        fn ball_on_slab_is_grounded_and_slab_is_not() {
            let scene = resting_ball();
            let world = scene.app.world();
            let rapier = world.resource::<RapierContext>();

            assert!(is_grounded(rapier, scene.ball, THRESHOLD));
            assert!(!is_grounded(rapier, scene.ground, THRESHOLD));
            assert!(world.get::<PlayerPhysics>(scene.ball).unwrap().is_grounded);
        }

        #[test]
        fn touching_player_and_enemy_give_one_record() {
            let mut scene = resting_ball();
            let world = scene.app.world();
            let rapier = world.resource::<RapierContext>();
            let actors = [
                ContactActor {
                    entity: scene.ball,
                    role: ContactRole::Player,
                    velocity: Vec2::ZERO,
                },
                ContactActor {
                    entity: scene.ground,
                    role: ContactRole::Enemy,
                    velocity: Vec2::ZERO,
                },
            ];
            let mut log = CollisionLog::default();
            resolve_contacts(rapier, &actors, 450.0, &mut log);
            assert_eq!(log.len(), 1);
            assert!(log.iter().all(|record| !record.player_wins_collision));

            scene.app.world_mut().resource_mut::<CollisionLog>().clear();
            scene.app.update();
            let scheduled = scene.app.world().resource::<CollisionLog>();
            assert_eq!(scheduled.len(), 1);
        }
    }

    #[test]
    fn any_qualifying_contact_is_enough() {
        let (mut world, body, wall) = pair();
        let slope = world.spawn_empty().id();
        let mut table = ContactTable::default();
        table.touch(body, wall, Vec2::new(-1.0, 0.0));
        table.touch(body, slope, Vec2::new(0.7, 0.2).normalize());
        assert!(is_grounded(&table, body, THRESHOLD));

        let mut shallow = ContactTable::default();
        shallow.touch(body, slope, Vec2::new(0.995, 0.1).normalize());
        assert!(!is_grounded(&shallow, body, THRESHOLD));
    }
}
