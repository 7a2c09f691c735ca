//! Enemy components and the per-frame decision step. Each enemy gets one horizontal force per
//! frame: pursuit for swarm/common enemies, a fixed patrol band for obstacles, nothing while frozen.

use bevy::prelude::*;
use bevy_rapier2d::prelude::*;

use crate::config::{EnemyTuning, Tuning};
use crate::grounding::GroundSensor;
use crate::level::LevelScoped;
use crate::physics::Motion;
use crate::player::Player;
use crate::state::{GameSet, GameState};

pub struct EnemyPlugin;

impl Plugin for EnemyPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<SwarmAvoidance>().add_systems(
            Update,
            (tick_freeze, drive_enemies)
                .chain()
                .in_set(GameSet::Ai)
                .run_if(in_state(GameState::Playing)),
        );
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnemyKind {
    Swarm,
    Common,
    Obstacle,
}

impl EnemyKind {
    pub fn is_destructable(self) -> bool {
        !matches!(self, EnemyKind::Obstacle)
    }

    /// Maps the LDtk enum value to a kind.
    pub fn from_identifier(identifier: &str) -> Option<Self> {
        match identifier {
            "Swarm" => Some(EnemyKind::Swarm),
            "Common" => Some(EnemyKind::Common),
            "Obstacle" => Some(EnemyKind::Obstacle),
            _ => None,
        }
    }

    pub fn body_size(self) -> Vec2 {
        match self {
            EnemyKind::Swarm => Vec2::splat(20.0),
            EnemyKind::Common => Vec2::splat(32.0),
            EnemyKind::Obstacle => Vec2::new(48.0, 32.0),
        }
    }

    fn color(self) -> Color {
        match self {
            EnemyKind::Swarm => Color::srgb(0.85, 0.55, 0.2),
            EnemyKind::Common => Color::srgb(0.8, 0.2, 0.25),
            EnemyKind::Obstacle => Color::srgb(0.45, 0.45, 0.5),
        }
    }
}

#[derive(Component, Debug, Clone, PartialEq)]
pub struct Enemy {
    pub kind: EnemyKind,
    /// `[min_x, max_x]` in world units.
    pub movement_area: [f32; 2],
    destructable: bool,
    pub freeze_time_ms: f32,
}

impl Enemy {
    pub fn new(kind: EnemyKind, movement_area: [f32; 2]) -> Self {
        let [a, b] = movement_area;
        Self {
            kind,
            movement_area: [a.min(b), a.max(b)],
            destructable: kind.is_destructable(),
            freeze_time_ms: 0.0,
        }
    }

    pub fn destructable(&self) -> bool {
        self.destructable
    }

    pub fn is_frozen(&self) -> bool {
        self.freeze_time_ms > 0.0
    }

    pub fn freeze(&mut self, duration_ms: f32) {
        self.freeze_time_ms = duration_ms.max(0.0);
    }

    pub fn tick_freeze(&mut self, elapsed_ms: f32) {
        self.freeze_time_ms = (self.freeze_time_ms - elapsed_ms.max(0.0)).max(0.0);
    }
}

#[derive(Component, Debug, Default, Clone, Copy)]
pub struct EnemyPhysics {
    pub is_grounded: bool,
}

impl GroundSensor for EnemyPhysics {
    fn set_grounded(&mut self, grounded: bool) {
        self.is_grounded = grounded;
    }
}

/// Current travel direction of a patrolling obstacle (`1.0` right, `-1.0` left).
#[derive(Component, Debug, Clone, Copy)]
pub struct Patrol {
    pub direction: f32,
}

impl Default for Patrol {
    fn default() -> Self {
        Self { direction: 1.0 }
    }
}

/// How swarm enemies react to crowding. No proximity radius or avoidance vector has been chosen
/// yet, so the only policy is `Inactive` and swarm enemies always fall through to pursuit.
#[derive(Resource, Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum SwarmAvoidance {
    #[default]
    Inactive,
}

impl SwarmAvoidance {
    pub fn too_close_to_swarm(&self, _position: Vec2, _neighbours: &[Vec2]) -> bool {
        match self {
            SwarmAvoidance::Inactive => false,
        }
    }
}

/// `-1.0` toward a player on the left, `1.0` toward one on the right, `0.0` when level.
pub fn pursuit_direction(enemy_x: f32, player_x: f32) -> f32 {
    if player_x < enemy_x {
        -1.0
    } else if player_x > enemy_x {
        1.0
    } else {
        0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PatrolDecision {
    pub force: f32,
    pub direction: f32,
}

/// Obstacle patrol between the band bounds. Direction flips within half a grid cell of either
/// bound; a body found outside the band is pushed back toward its center.
pub fn patrol_step(
    x: f32,
    area: [f32; 2],
    direction: f32,
    tuning: &EnemyTuning,
) -> PatrolDecision {
    let [min_x, max_x] = area;
    if x < min_x || x > max_x {
        let toward_center = if x < min_x { 1.0 } else { -1.0 };
        return PatrolDecision {
            force: toward_center * tuning.recenter_force,
            direction: toward_center,
        };
    }

    let margin = tuning.grid_cell_width * 0.5;
    let direction = if x >= max_x - margin {
        -1.0
    } else if x <= min_x + margin {
        1.0
    } else if direction == 0.0 {
        1.0
    } else {
        direction.signum()
    };

    PatrolDecision {
        force: direction * tuning.patrol_force,
        direction,
    }
}

/// Horizontal force for one enemy this frame, plus its (possibly updated) patrol direction.
pub fn decide_force(
    enemy: &Enemy,
    position: Vec2,
    player_x: Option<f32>,
    patrol_direction: f32,
    crowded: bool,
    tuning: &EnemyTuning,
) -> PatrolDecision {
    let idle = PatrolDecision {
        force: 0.0,
        direction: patrol_direction,
    };
    if enemy.is_frozen() {
        return idle;
    }

    match enemy.kind {
        EnemyKind::Obstacle => {
            patrol_step(position.x, enemy.movement_area, patrol_direction, tuning)
        }
        // Crowding has no avoidance response yet; a crowded swarm enemy just holds still.
        EnemyKind::Swarm if crowded => idle,
        EnemyKind::Swarm | EnemyKind::Common => match player_x {
            Some(player_x) => PatrolDecision {
                force: pursuit_direction(position.x, player_x) * tuning.pursuit_force,
                direction: patrol_direction,
            },
            None => idle,
        },
    }
}

/// Counts freeze timers down by the elapsed frame time.
fn tick_freeze(time: Res<Time>, mut enemies: Query<&mut Enemy>) {
    let elapsed_ms = time.delta_seconds() * 1000.0;
    for mut enemy in &mut enemies {
        if enemy.is_frozen() {
            enemy.tick_freeze(elapsed_ms);
        }
    }
}

fn drive_enemies(
    tuning: Res<Tuning>,
    avoidance: Res<SwarmAvoidance>,
    player: Query<&Motion, With<Player>>,
    others: Query<(Entity, &Motion), Without<Player>>,
    mut enemies: Query<(Entity, &Enemy, &Motion, &mut Patrol, &mut ExternalForce)>,
) {
    let player_x = player.get_single().ok().map(|motion| motion.position.x);
    let bodies: Vec<(Entity, Vec2)> = others.iter().map(|(e, m)| (e, m.position)).collect();

    for (entity, enemy, motion, mut patrol, mut force) in &mut enemies {
        let crowded = enemy.kind == EnemyKind::Swarm && {
            let neighbours: Vec<Vec2> = bodies
                .iter()
                .filter(|(other, _)| *other != entity)
                .map(|(_, position)| *position)
                .collect();
            avoidance.too_close_to_swarm(motion.position, &neighbours)
        };

        let decision = decide_force(
            enemy,
            motion.position,
            player_x,
            patrol.direction,
            crowded,
            &tuning.enemy,
        );
        if decision.direction != patrol.direction {
            debug!("Enemy {entity:?} turns to {}", decision.direction);
            patrol.direction = decision.direction;
        }
        force.force = Vec2::new(decision.force, 0.0);
    }
}

/// Spawns an enemy body at `position` with its patrol band.
pub fn spawn_enemy(
    commands: &mut Commands,
    kind: EnemyKind,
    position: Vec2,
    movement_area: [f32; 2],
) -> Entity {
    let size = kind.body_size();
    commands
        .spawn((
            Name::new(format!("{kind:?}Enemy")),
            Enemy::new(kind, movement_area),
            EnemyPhysics::default(),
            Patrol::default(),
            LevelScoped,
            SpriteBundle {
                sprite: Sprite {
                    color: kind.color(),
                    custom_size: Some(size),
                    ..default()
                },
                transform: Transform::from_translation(position.extend(0.9)),
                ..default()
            },
            Motion::at(position),
        ))
        .insert((
            RigidBody::Dynamic,
            Collider::cuboid(size.x * 0.5, size.y * 0.5),
            ColliderMassProperties::Mass(1.0),
            Damping {
                linear_damping: 1.0,
                angular_damping: 0.0,
            },
            LockedAxes::ROTATION_LOCKED,
            Velocity::zero(),
            ExternalForce::default(),
        ))
        .id()
}
