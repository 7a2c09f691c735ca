//! Player/enemy contact resolution. After every physics step the touching player/enemy pairs are
//! turned into `CollisionRecord`s that the outcome handler drains later in the same frame.
//!
//! The scan is pairwise over every player/enemy body, which is fine for the tens of actors a level
//! holds. Terrain contact is not resolved here; the grounding classifier owns that.

use bevy::prelude::*;
use bevy_rapier2d::prelude::RapierContext;

use crate::config::Tuning;
use crate::enemy::Enemy;
use crate::physics::{sync_motion, ContactSource, Motion};
use crate::player::Player;
use crate::state::FrameSet;

pub struct CollisionPlugin;

impl Plugin for CollisionPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<CollisionLog>().add_systems(
            PostUpdate,
            detect_player_enemy_contacts
                .after(sync_motion)
                .in_set(FrameSet::Detect),
        );
    }
}

/// One detected player/enemy contact. `subject` is whichever side came first in the scan; the
/// record does not say which side is the player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollisionRecord {
    pub subject: Entity,
    pub other: Entity,
    pub player_wins_collision: bool,
}

/// Append-only record list for the current step. Duplicates are kept; the outcome handler drains
/// the whole list once per step.
#[derive(Resource, Default, Debug)]
pub struct CollisionLog {
    records: Vec<CollisionRecord>,
}

impl CollisionLog {
    pub fn push(&mut self, record: CollisionRecord) {
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CollisionRecord> {
        self.records.iter()
    }

    pub fn drain(&mut self) -> std::vec::Drain<'_, CollisionRecord> {
        self.records.drain(..)
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactRole {
    Player,
    Enemy,
}

#[derive(Debug, Clone, Copy)]
pub struct ContactActor {
    pub entity: Entity,
    pub role: ContactRole,
    pub velocity: Vec2,
}

/// Only the player's own post-step speed decides the winner. The engine has already applied the
/// contact response, so a player that bounced off slowly has lost.
pub fn player_wins(player_velocity: Vec2, winning_speed: f32) -> bool {
    player_velocity.length() > winning_speed
}

/// Appends one record per touching player/enemy pair, scanning pairs `(i, j)` with `i < j` in the
/// order given.
pub fn resolve_contacts(
    contacts: &impl ContactSource,
    actors: &[ContactActor],
    winning_speed: f32,
    log: &mut CollisionLog,
) {
    for (i, first) in actors.iter().enumerate() {
        // An empty contact list cannot touch anything; skip the pair queries.
        if contacts.contact_count(first.entity) == 0 {
            continue;
        }

        for second in &actors[i + 1..] {
            let player = match (first.role, second.role) {
                (ContactRole::Player, ContactRole::Enemy) => first,
                (ContactRole::Enemy, ContactRole::Player) => second,
                _ => continue,
            };

            if contacts.contact_count(second.entity) == 0
                || !contacts.touching(first.entity, second.entity)
            {
                continue;
            }

            log.push(CollisionRecord {
                subject: first.entity,
                other: second.entity,
                player_wins_collision: player_wins(player.velocity, winning_speed),
            });
        }
    }
}

pub(crate) fn detect_player_enemy_contacts(
    rapier: Res<RapierContext>,
    tuning: Res<Tuning>,
    bodies: Query<(Entity, &Motion, Has<Player>, Has<Enemy>)>,
    mut log: ResMut<CollisionLog>,
) {
    let actors: Vec<ContactActor> = bodies
        .iter()
        .filter_map(|(entity, motion, is_player, is_enemy)| {
            let role = if is_player {
                ContactRole::Player
            } else if is_enemy {
                ContactRole::Enemy
            } else {
                return None;
            };
            Some(ContactActor {
                entity,
                role,
                velocity: motion.velocity,
            })
        })
        .collect();

    let before = log.len();
    resolve_contacts(
        &*rapier,
        &actors,
        tuning.collision.winning_speed(),
        &mut log,
    );
    if log.len() > before {
        debug!("{} player/enemy contact(s) this step", log.len() - before);
    }
}
