//! Rigid-body world integration. Rapier owns every simulated body, shape, and joint; this module
//! installs it, mirrors its results into the `Motion` component after each step, and exposes the
//! narrow contact queries the gameplay layer needs through the `ContactSource` trait.
//!
//! Bodies live as components on their owning entity, so despawning the entity is what releases the
//! simulated body. There is no separate handle to forget: the body cannot outlive the entity and the
//! entity cannot be removed without Rapier observing the removal.

use bevy::prelude::*;
use bevy_rapier2d::prelude::*;

use crate::config::Tuning;
use crate::state::{FrameSet, GameState};

pub struct PhysicsPlugin {
    pub pixels_per_meter: f32,
}

impl Plugin for PhysicsPlugin {
    fn build(&self, app: &mut App) {
        app.add_plugins(RapierPhysicsPlugin::<NoUserData>::pixels_per_meter(
            self.pixels_per_meter,
        ))
        .add_systems(Startup, configure_timestep)
        .add_systems(OnEnter(GameState::Paused), pause_simulation)
        .add_systems(OnExit(GameState::Paused), resume_simulation)
        .add_systems(PostUpdate, sync_motion.in_set(FrameSet::Detect));
    }
}

/// Kinematic snapshot of a simulated entity, rewritten from the physics world every step.
#[derive(Component, Debug, Clone, Copy, PartialEq)]
pub struct Motion {
    pub position: Vec2,
    /// Rotation in degrees, counter-clockwise.
    pub angle: f32,
    pub velocity: Vec2,
    pub scale: Vec2,
}

impl Default for Motion {
    fn default() -> Self {
        Self {
            position: Vec2::ZERO,
            angle: 0.0,
            velocity: Vec2::ZERO,
            scale: Vec2::ONE,
        }
    }
}

impl Motion {
    pub fn at(position: Vec2) -> Self {
        Self {
            position,
            ..default()
        }
    }

    pub fn is_finite(&self) -> bool {
        self.position.is_finite() && self.velocity.is_finite()
    }
}

fn pause_simulation(mut config: ResMut<RapierConfiguration>) {
    config.physics_pipeline_active = false;
}

fn resume_simulation(mut config: ResMut<RapierConfiguration>) {
    config.physics_pipeline_active = true;
}

/// Variable outer timestep from wall-clock time, split into a fixed number of sub-steps.
fn configure_timestep(mut config: ResMut<RapierConfiguration>, tuning: Res<Tuning>) {
    config.timestep_mode = TimestepMode::Variable {
        max_dt: tuning.physics.max_dt,
        time_scale: 1.0,
        substeps: tuning.physics.substeps.max(1),
    };
}

pub fn sync_motion(mut query: Query<(&Transform, Option<&Velocity>, &mut Motion)>) {
    for (transform, velocity, mut motion) in &mut query {
        let position = transform.translation.truncate();
        let linvel = velocity.map(|v| v.linvel).unwrap_or(Vec2::ZERO);
        if !position.is_finite() || !linvel.is_finite() {
            // Keep the last sane snapshot; the next step usually recovers.
            warn!("Non-finite physics state {position:?} / {linvel:?}; keeping previous motion");
            continue;
        }

        motion.position = position;
        motion.angle = transform.rotation.to_euler(EulerRot::XYZ).2.to_degrees();
        motion.velocity = linvel;
        motion.scale = transform.scale.truncate();
    }
}

/// Contact queries against the physics world. Normals are reported from the perspective of the
/// queried entity: a positive `y` means the entity is resting on top of whatever it touches.
pub trait ContactSource {
    /// Size of the entity's contact list, touching or merely overlapping in the broad phase.
    fn contact_count(&self, entity: Entity) -> usize;

    /// Whether the two colliders currently share at least one active contact point.
    fn touching(&self, a: Entity, b: Entity) -> bool;

    fn contact_normals<'a>(&'a self, entity: Entity) -> Box<dyn Iterator<Item = Vec2> + 'a>;
}

impl ContactSource for RapierContext {
    fn contact_count(&self, entity: Entity) -> usize {
        self.contact_pairs_with(entity).count()
    }

    fn touching(&self, a: Entity, b: Entity) -> bool {
        self.contact_pair(a, b)
            .is_some_and(|pair| pair.has_any_active_contact())
    }

    fn contact_normals<'a>(&'a self, entity: Entity) -> Box<dyn Iterator<Item = Vec2> + 'a> {
        Box::new(
            self.contact_pairs_with(entity)
                .filter(|pair| pair.has_any_active_contact())
                .flat_map(move |pair| {
                    // Rapier's manifold normal points from collider1 towards collider2.
                    let sign = if pair.collider1() == entity { -1.0 } else { 1.0 };
                    pair.manifolds()
                        .filter(|manifold| manifold.num_points() > 0)
                        .map(|manifold| manifold.normal() * sign)
                        .collect::<Vec<_>>()
                }),
        )
    }
}

/// In-memory contact list for exercising contact logic without a physics world.
#[cfg(test)]
#[derive(Default)]
pub struct ContactTable {
    contacts: Vec<(Entity, Entity, Vec2)>,
}

#[cfg(test)]
impl ContactTable {
    /// Registers a touching pair; `normal` is expressed from `a`'s point of view.
    pub fn touch(&mut self, a: Entity, b: Entity, normal: Vec2) {
        self.contacts.push((a, b, normal));
    }
}

#[cfg(test)]
impl ContactSource for ContactTable {
    fn contact_count(&self, entity: Entity) -> usize {
        self.contacts
            .iter()
            .filter(|(a, b, _)| *a == entity || *b == entity)
            .count()
    }

    fn touching(&self, a: Entity, b: Entity) -> bool {
        self.contacts
            .iter()
            .any(|(x, y, _)| (*x == a && *y == b) || (*x == b && *y == a))
    }

    fn contact_normals<'a>(&'a self, entity: Entity) -> Box<dyn Iterator<Item = Vec2> + 'a> {
        Box::new(self.contacts.iter().filter_map(move |(a, b, normal)| {
            if *a == entity {
                Some(*normal)
            } else if *b == entity {
                Some(-*normal)
            } else {
                None
            }
        }))
    }
}
