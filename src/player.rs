//! Player entity lifecycle management. The level module decides where the avatar appears; this
//! module knows which components make up a player and cleans it up when the level is torn down.
//!
//! All memory for components is owned by Bevy's ECS tables; despawning the entity drops the
//! components and lets Rapier release the simulated body in the same step.

use bevy::prelude::*;
use bevy_rapier2d::prelude::*;

use crate::config::Tuning;
use crate::grounding::GroundSensor;
use crate::level::LevelScoped;
use crate::physics::Motion;

pub const PLAYER_RADIUS: f32 = 16.0;

/// Marker component used by many systems (camera follow, contact resolution, grapple aiming) to
/// identify the player entity. The component itself stores no data.
#[derive(Component)]
pub struct Player;

/// Grounding flag recomputed from the player's contacts every step.
#[derive(Component, Debug, Default, Clone, Copy)]
pub struct PlayerPhysics {
    pub is_grounded: bool,
}

impl GroundSensor for PlayerPhysics {
    fn set_grounded(&mut self, grounded: bool) {
        self.is_grounded = grounded;
    }
}

#[derive(Component, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Health {
    pub hp: i32,
    pub max: i32,
}

impl Health {
    pub fn full(max: i32) -> Self {
        Self { hp: max, max }
    }

    pub fn damage(&mut self, amount: i32) {
        self.hp -= amount;
    }

    pub fn is_depleted(&self) -> bool {
        self.hp <= 0
    }
}

/// Spawns the player at `position` (world units). The body is a single ball shape with rotation
/// locked so contact normals stay meaningful for grounding.
pub fn spawn_player(
    commands: &mut Commands,
    asset_server: &AssetServer,
    tuning: &Tuning,
    position: Vec2,
) -> Entity {
    let texture = asset_server.load("textures/blob.png");
    let sprite_size = Vec2::splat(PLAYER_RADIUS * 2.0);

    let entity = commands
        .spawn((
            Name::new("Player"),
            Player,
            LevelScoped,
            SpriteBundle {
                texture,
                sprite: Sprite {
                    custom_size: Some(sprite_size),
                    ..default()
                },
                transform: Transform::from_translation(position.extend(1.0)),
                ..default()
            },
            Motion::at(position),
            PlayerPhysics::default(),
            Health::full(tuning.player.max_hp),
        ))
        .insert((
            RigidBody::Dynamic,
            Collider::ball(PLAYER_RADIUS),
            ColliderMassProperties::Mass(1.0),
            Friction::coefficient(0.6),
            LockedAxes::ROTATION_LOCKED,
            Velocity::zero(),
            ExternalForce::default(),
            ExternalImpulse::default(),
            Ccd::enabled(),
        ))
        .id();

    info!("Spawned player at {position:?}");
    entity
}
