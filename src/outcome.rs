//! Collision outcome handler. Drains every `CollisionRecord` produced this step exactly once and
//! applies the result: a fast player destroys a destructible enemy, otherwise an unfrozen enemy
//! freezes and the player loses a hit point.

use std::collections::HashSet;

use bevy::prelude::*;

use crate::audio::SfxEvent;
use crate::collision::{CollisionLog, CollisionRecord};
use crate::config::Tuning;
use crate::enemy::Enemy;
use crate::player::{Health, Player};
use crate::state::FrameSet;
use crate::ui::{HealthBar, ScoreDisplay, SessionStats};

pub struct OutcomePlugin;

impl Plugin for OutcomePlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(
            PostUpdate,
            resolve_collision_outcomes.in_set(FrameSet::Resolve),
        );
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    DestroyEnemy,
    FreezeEnemy,
    /// Enemy already frozen; nothing happens.
    Ignore,
}

pub fn decide_outcome(player_wins_collision: bool, enemy: &Enemy) -> Outcome {
    if player_wins_collision && enemy.destructable() {
        Outcome::DestroyEnemy
    } else if !enemy.is_frozen() {
        Outcome::FreezeEnemy
    } else {
        Outcome::Ignore
    }
}

/// Splits a record into `(player, enemy)`; `None` when either side is gone or the roles do not
/// match (an entity destroyed earlier in the same drain, for example).
fn roles(
    record: &CollisionRecord,
    is_player: impl Fn(Entity) -> bool,
    is_enemy: impl Fn(Entity) -> bool,
) -> Option<(Entity, Entity)> {
    if is_player(record.subject) && is_enemy(record.other) {
        Some((record.subject, record.other))
    } else if is_enemy(record.subject) && is_player(record.other) {
        Some((record.other, record.subject))
    } else {
        None
    }
}

#[allow(clippy::too_many_arguments)]
pub fn resolve_collision_outcomes(
    mut commands: Commands,
    mut log: ResMut<CollisionLog>,
    tuning: Res<Tuning>,
    mut stats: ResMut<SessionStats>,
    mut players: Query<&mut Health, With<Player>>,
    mut enemies: Query<&mut Enemy>,
    mut scores: Query<&mut ScoreDisplay>,
    mut health_bars: Query<&mut HealthBar>,
    mut sfx: EventWriter<SfxEvent>,
) {
    if log.is_empty() {
        return;
    }

    // Each enemy is resolved at most once per drain, however many records name it.
    let mut processed: HashSet<Entity> = HashSet::new();

    for record in log.drain() {
        let Some((player, enemy_entity)) = roles(
            &record,
            |e| players.contains(e),
            |e| enemies.contains(e),
        ) else {
            continue;
        };
        if !processed.insert(enemy_entity) {
            continue;
        }
        let Ok(mut enemy) = enemies.get_mut(enemy_entity) else {
            continue;
        };

        match decide_outcome(record.player_wins_collision, &enemy) {
            Outcome::DestroyEnemy => {
                commands.entity(enemy_entity).despawn_recursive();
                stats.kills += 1;
                for mut score in &mut scores {
                    score.points += tuning.collision.kill_points;
                }
                sfx.send(SfxEvent::Kill);
                info!(
                    "Destroyed {:?} enemy {enemy_entity:?}; kills = {}",
                    enemy.kind, stats.kills
                );
            }
            Outcome::FreezeEnemy => {
                enemy.freeze(tuning.collision.freeze_time_ms);
                sfx.send(SfxEvent::Fail);
                if let Ok(mut health) = players.get_mut(player) {
                    health.damage(1);
                    info!("Player hit by {:?} enemy; hp = {}", enemy.kind, health.hp);
                    for mut bar in &mut health_bars {
                        bar.hp -= 1;
                    }
                }
            }
            Outcome::Ignore => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::{resolve_contacts, ContactActor, ContactRole};
    use crate::enemy::EnemyKind;
    use crate::physics::ContactTable;

    struct Arena {
        app: App,
        player: Entity,
        score: Entity,
        bar: Entity,
    }

    fn arena() -> Arena {
        let mut app = App::new();
        app.init_resource::<Tuning>()
            .init_resource::<CollisionLog>()
            .init_resource::<SessionStats>()
            .add_event::<SfxEvent>()
            .add_systems(Update, resolve_collision_outcomes);

        let player = app.world_mut().spawn((Player, Health::full(5))).id();
        let score = app.world_mut().spawn(ScoreDisplay::default()).id();
        let bar = app.world_mut().spawn(HealthBar { hp: 5 }).id();
        Arena {
            app,
            player,
            score,
            bar,
        }
    }

    impl Arena {
        fn enemy(&mut self, kind: EnemyKind, freeze_time_ms: f32) -> Entity {
            let mut enemy = Enemy::new(kind, [0.0, 100.0]);
            enemy.freeze_time_ms = freeze_time_ms;
            self.app.world_mut().spawn(enemy).id()
        }

        fn record(&mut self, enemy: Entity, player_wins_collision: bool) {
            self.app
                .world_mut()
                .resource_mut::<CollisionLog>()
                .push(CollisionRecord {
                    subject: enemy,
                    other: self.player,
                    player_wins_collision,
                });
        }

        fn hp(&self) -> i32 {
            self.app.world().get::<Health>(self.player).unwrap().hp
        }

        fn bar_hp(&self) -> i32 {
            self.app.world().get::<HealthBar>(self.bar).unwrap().hp
        }

        fn points(&self) -> u32 {
            self.app.world().get::<ScoreDisplay>(self.score).unwrap().points
        }

        fn kills(&self) -> u32 {
            self.app.world().resource::<SessionStats>().kills
        }

        fn freeze(&self, enemy: Entity) -> f32 {
            self.app.world().get::<Enemy>(enemy).unwrap().freeze_time_ms
        }
    }

    #[test]
    fn outcome_table() {
        let common = Enemy::new(EnemyKind::Common, [0.0, 1.0]);
        let obstacle = Enemy::new(EnemyKind::Obstacle, [0.0, 1.0]);
        let mut frozen = common.clone();
        frozen.freeze(800.0);

        assert_eq!(decide_outcome(true, &common), Outcome::DestroyEnemy);
        assert_eq!(decide_outcome(false, &common), Outcome::FreezeEnemy);
        assert_eq!(decide_outcome(true, &obstacle), Outcome::FreezeEnemy);
        assert_eq!(decide_outcome(false, &frozen), Outcome::Ignore);
        assert_eq!(decide_outcome(true, &frozen), Outcome::DestroyEnemy);
    }

    #[test]
    fn fast_player_destroys_common_enemy() {
        let mut arena = arena();
        let enemy = arena.enemy(EnemyKind::Common, 0.0);

        // Detection and resolution end to end: 600 > 0.9 * 500.
        let actors = [
            ContactActor {
                entity: arena.player,
                role: ContactRole::Player,
                velocity: Vec2::new(600.0, 0.0),
            },
            ContactActor {
                entity: enemy,
                role: ContactRole::Enemy,
                velocity: Vec2::ZERO,
            },
        ];
        let mut table = ContactTable::default();
        table.touch(arena.player, enemy, Vec2::X);
        let winning_speed = Tuning::default().collision.winning_speed();
        resolve_contacts(
            &table,
            &actors,
            winning_speed,
            &mut arena.app.world_mut().resource_mut::<CollisionLog>(),
        );

        arena.app.update();

        assert!(arena.app.world().get_entity(enemy).is_none());
        assert_eq!(arena.kills(), 1);
        assert_eq!(arena.points(), 5);
        assert_eq!(arena.hp(), 5);
        assert!(arena.app.world().resource::<CollisionLog>().is_empty());
    }

    #[test]
    fn slow_player_freezes_enemy_and_loses_hp() {
        let mut arena = arena();
        let enemy = arena.enemy(EnemyKind::Common, 0.0);
        arena.record(enemy, false);

        arena.app.update();

        assert_eq!(arena.freeze(enemy), 1500.0);
        assert_eq!(arena.hp(), 4);
        assert_eq!(arena.bar_hp(), 4);
        assert_eq!(arena.kills(), 0);
        assert_eq!(arena.points(), 0);
    }

    #[test]
    fn frozen_enemy_cannot_hurt_again() {
        let mut arena = arena();
        let enemy = arena.enemy(EnemyKind::Common, 800.0);
        arena.record(enemy, false);

        arena.app.update();

        assert_eq!(arena.freeze(enemy), 800.0);
        assert_eq!(arena.hp(), 5);
        assert_eq!(arena.bar_hp(), 5);
    }

    #[test]
    fn repeated_records_for_one_enemy_apply_once() {
        let mut arena = arena();
        let enemy = arena.enemy(EnemyKind::Swarm, 0.0);
        arena.record(enemy, false);
        arena.record(enemy, false);
        arena.record(enemy, true);

        arena.app.update();

        assert_eq!(arena.hp(), 4);
        assert!(arena.app.world().get_entity(enemy).is_some());
        assert!(arena.app.world().resource::<CollisionLog>().is_empty());
    }

    #[test]
    fn obstacle_survives_a_winning_hit() {
        let mut arena = arena();
        let obstacle = arena.enemy(EnemyKind::Obstacle, 0.0);
        arena.record(obstacle, true);

        arena.app.update();

        assert!(arena.app.world().get_entity(obstacle).is_some());
        assert_eq!(arena.freeze(obstacle), 1500.0);
        assert_eq!(arena.hp(), 4);
        assert_eq!(arena.kills(), 0);
    }

    #[test]
    fn health_bars_only_follow_a_damaged_player() {
        let mut arena = arena();
        let ghost = arena.app.world_mut().spawn(Player).id();
        let enemy = arena.enemy(EnemyKind::Common, 0.0);
        arena
            .app
            .world_mut()
            .resource_mut::<CollisionLog>()
            .push(CollisionRecord {
                subject: ghost,
                other: enemy,
                player_wins_collision: false,
            });

        arena.app.update();

        assert_eq!(arena.bar_hp(), 5);
        assert_eq!(arena.hp(), 5);
        assert_eq!(arena.freeze(enemy), 0.0);
    }

    #[test]
    fn every_score_display_is_awarded() {
        let mut arena = arena();
        let second = arena.app.world_mut().spawn(ScoreDisplay { points: 10 }).id();
        let a = arena.enemy(EnemyKind::Common, 0.0);
        let b = arena.enemy(EnemyKind::Swarm, 0.0);
        arena.record(a, true);
        arena.record(b, true);

        arena.app.update();

        assert_eq!(arena.kills(), 2);
        assert_eq!(arena.points(), 10);
        assert_eq!(
            arena.app.world().get::<ScoreDisplay>(second).unwrap().points,
            20
        );
    }
}
