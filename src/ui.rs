//! HUD and pause overlay. The score, health, and timer readouts are plain UI entities whose
//! components hold the displayed values; gameplay code adjusts those values and the refresh
//! system rewrites the text.
//!
//! UI entities are part of Bevy's ECS; once despawned, all associated style/text components are
//! dropped automatically.

use bevy::prelude::*;

use crate::config::Tuning;
use crate::player::Health;
use crate::state::{GameSet, GameState};

/// Registers HUD spawning/refresh and the pause overlay.
pub struct UiPlugin;

impl Plugin for UiPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<SessionStats>()
            .add_event::<SessionReset>()
            .add_systems(Startup, spawn_hud)
            .add_systems(
                Update,
                (
                    tick_timers.run_if(in_state(GameState::Playing)),
                    reset_session,
                    sync_health_bars,
                    refresh_hud_text,
                )
                    .chain()
                    .in_set(GameSet::Effects),
            )
            .add_systems(OnEnter(GameState::Paused), spawn_pause_menu)
            .add_systems(OnExit(GameState::Paused), despawn_pause_menu);
    }
}

/// Counters that outlive individual entities for the current run.
#[derive(Resource, Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SessionStats {
    pub kills: u32,
}

/// Clears score, kills, health readouts, and timers, e.g. after the player dies.
#[derive(Event, Debug, Clone, Copy)]
pub struct SessionReset;

#[derive(Component, Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ScoreDisplay {
    pub points: u32,
}

#[derive(Component, Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthBar {
    pub hp: i32,
}

#[derive(Component, Debug, Default, Clone, Copy, PartialEq)]
pub struct TimerDisplay {
    pub elapsed: f32,
}

#[derive(Component)]
struct PauseMenu;

const HUD_FONT_SIZE: f32 = 26.0;

fn hud_text(value: String) -> TextBundle {
    TextBundle::from_section(
        value,
        TextStyle {
            font_size: HUD_FONT_SIZE,
            color: Color::srgba(0.95, 0.95, 0.95, 1.0),
            ..default()
        },
    )
}

fn spawn_hud(mut commands: Commands, tuning: Res<Tuning>) {
    commands
        .spawn((
            Name::new("Hud"),
            NodeBundle {
                style: Style {
                    position_type: PositionType::Absolute,
                    top: Val::Px(12.0),
                    left: Val::Px(16.0),
                    column_gap: Val::Px(28.0),
                    ..default()
                },
                ..default()
            },
        ))
        .with_children(|parent| {
            parent.spawn((ScoreDisplay::default(), hud_text(score_label(0))));
            parent.spawn((
                HealthBar {
                    hp: tuning.player.max_hp,
                },
                hud_text(health_label(tuning.player.max_hp)),
            ));
            parent.spawn((TimerDisplay::default(), hud_text(timer_label(0.0))));
        });
}

pub fn score_label(points: u32) -> String {
    format!("Score {points}")
}

pub fn health_label(hp: i32) -> String {
    let hearts = hp.max(0) as usize;
    format!("HP {}", "\u{2665}".repeat(hearts))
}

pub fn timer_label(elapsed: f32) -> String {
    let total = elapsed.max(0.0) as u32;
    format!("{:02}:{:02}", total / 60, total % 60)
}

fn tick_timers(time: Res<Time>, mut timers: Query<&mut TimerDisplay>) {
    for mut timer in &mut timers {
        timer.elapsed += time.delta_seconds();
    }
}

fn reset_session(
    mut events: EventReader<SessionReset>,
    tuning: Res<Tuning>,
    mut stats: ResMut<SessionStats>,
    mut scores: Query<&mut ScoreDisplay>,
    mut health_bars: Query<&mut HealthBar>,
    mut timers: Query<&mut TimerDisplay>,
) {
    if events.read().count() == 0 {
        return;
    }

    *stats = SessionStats::default();
    for mut score in &mut scores {
        score.points = 0;
    }
    for mut bar in &mut health_bars {
        bar.hp = tuning.player.max_hp;
    }
    for mut timer in &mut timers {
        timer.elapsed = 0.0;
    }
    info!("Session stats reset");
}

/// A freshly spawned player brings its own hit points; the readouts follow it.
fn sync_health_bars(players: Query<&Health, Added<Health>>, mut health_bars: Query<&mut HealthBar>) {
    let Some(health) = players.iter().next() else {
        return;
    };
    for mut bar in &mut health_bars {
        bar.hp = health.hp;
    }
}

/// Rewrites only the readouts whose values changed this frame.
fn refresh_hud_text(
    mut scores: Query<(&ScoreDisplay, &mut Text), Changed<ScoreDisplay>>,
    mut health_bars: Query<(&HealthBar, &mut Text), (Changed<HealthBar>, Without<ScoreDisplay>)>,
    mut timers: Query<
        (&TimerDisplay, &mut Text),
        (Without<ScoreDisplay>, Without<HealthBar>),
    >,
) {
    for (score, mut text) in &mut scores {
        text.sections[0].value = score_label(score.points);
    }
    for (bar, mut text) in &mut health_bars {
        text.sections[0].value = health_label(bar.hp);
    }
    for (timer, mut text) in &mut timers {
        let label = timer_label(timer.elapsed);
        if text.sections[0].value != label {
            text.sections[0].value = label;
        }
    }
}

/// Spawns a full-screen UI node with centered text. Nodes live in the `Ui` world and are rendered
/// by the UI camera automatically.
fn spawn_pause_menu(mut commands: Commands) {
    commands
        .spawn((
            PauseMenu,
            Name::new("PauseMenu"),
            NodeBundle {
                background_color: BackgroundColor(Color::srgba(0.0, 0.0, 0.0, 0.6)),
                style: Style {
                    width: Val::Percent(100.0),
                    height: Val::Percent(100.0),
                    align_items: AlignItems::Center,
                    justify_content: JustifyContent::Center,
                    ..default()
                },
                ..default()
            },
        ))
        .with_children(|parent| {
            parent.spawn(TextBundle::from_section(
                "Paused\nPress ESC to resume",
                TextStyle {
                    font_size: 36.0,
                    color: Color::srgba(0.9, 0.9, 0.9, 1.0),
                    ..default()
                },
            ));
        });
}

/// Removes the pause menu overlay on state exit.
fn despawn_pause_menu(mut commands: Commands, query: Query<Entity, With<PauseMenu>>) {
    for entity in &query {
        commands.entity(entity).despawn_recursive();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_format_values() {
        assert_eq!(score_label(15), "Score 15");
        assert_eq!(health_label(3), "HP \u{2665}\u{2665}\u{2665}");
        assert_eq!(health_label(-2), "HP ");
        assert_eq!(timer_label(125.7), "02:05");
    }

    #[test]
    fn session_reset_restores_every_display() {
        let mut app = App::new();
        app.init_resource::<Tuning>()
            .insert_resource(SessionStats { kills: 4 })
            .add_event::<SessionReset>()
            .add_systems(Update, reset_session);

        let score = app.world_mut().spawn(ScoreDisplay { points: 20 }).id();
        let bar = app.world_mut().spawn(HealthBar { hp: 1 }).id();
        let timer = app.world_mut().spawn(TimerDisplay { elapsed: 42.0 }).id();

        app.world_mut().send_event(SessionReset);
        app.update();

        let max_hp = Tuning::default().player.max_hp;
        assert_eq!(app.world().resource::<SessionStats>().kills, 0);
        assert_eq!(app.world().get::<ScoreDisplay>(score).unwrap().points, 0);
        assert_eq!(app.world().get::<HealthBar>(bar).unwrap().hp, max_hp);
        assert_eq!(app.world().get::<TimerDisplay>(timer).unwrap().elapsed, 0.0);
    }

    #[test]
    fn new_player_refills_health_bar() {
        let mut app = App::new();
        app.add_systems(Update, sync_health_bars);
        let bar = app.world_mut().spawn(HealthBar { hp: 2 }).id();

        app.update();
        assert_eq!(app.world().get::<HealthBar>(bar).unwrap().hp, 2);

        app.world_mut().spawn(Health::full(5));
        app.update();
        assert_eq!(app.world().get::<HealthBar>(bar).unwrap().hp, 5);
    }
}
