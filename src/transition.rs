//! Level transitions with a fade. Touching a goal tile (IntGrid value 2) moves on to the next level
//! in the project; running out of hit points restarts the current one with a fresh session.
//! The level swap happens at the midpoint of the fade, while the screen is fully black.

use bevy::prelude::*;

use crate::level::{LevelAssets, LevelConfig};
use crate::physics::Motion;
use crate::player::{Health, Player, PLAYER_RADIUS};
use crate::state::{GameSet, GameState};
use crate::terrain::CollisionMap;
use crate::ui::SessionReset;

/// Registers the transition triggers and fade overlay.
pub struct TransitionPlugin;

impl Plugin for TransitionPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<TransitionState>()
            .add_systems(Startup, spawn_fade_overlay)
            .add_systems(
                Update,
                (check_level_goal, check_player_defeated, update_transition)
                    .chain()
                    .in_set(GameSet::Effects)
                    .run_if(in_state(GameState::Playing)),
            )
            .add_systems(Update, update_fade_overlay);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionKind {
    /// Reload the current level and reset the session.
    Restart,
    /// Load the level with this LDtk identifier.
    NextLevel(String),
}

/// Tracks the current transition and its timing.
#[derive(Resource)]
pub struct TransitionState {
    pub kind: Option<TransitionKind>,
    pub fade_timer: f32,
    pub fade_duration: f32,
    switched: bool,
}

impl Default for TransitionState {
    fn default() -> Self {
        Self {
            kind: None,
            fade_timer: 0.0,
            fade_duration: 1.0,
            switched: false,
        }
    }
}

impl TransitionState {
    pub fn is_transitioning(&self) -> bool {
        self.kind.is_some()
    }

    pub fn start_transition(&mut self, kind: TransitionKind) {
        self.kind = Some(kind);
        self.fade_timer = 0.0;
        self.switched = false;
    }

    pub fn reset(&mut self) {
        self.kind = None;
        self.fade_timer = 0.0;
        self.switched = false;
    }

    /// Returns the current fade alpha (0.0 = transparent, 1.0 = fully black)
    pub fn get_fade_alpha(&self) -> f32 {
        if !self.is_transitioning() {
            return 0.0;
        }

        let half_duration = self.fade_duration * 0.5;
        if self.fade_timer < half_duration {
            self.fade_timer / half_duration
        } else {
            (1.0 - (self.fade_timer - half_duration) / half_duration).max(0.0)
        }
    }
}

/// Identifier of the level after `current`; wraps to the first level after the last one.
pub fn next_level(order: &[String], current: Option<&str>) -> Option<String> {
    let index = current
        .and_then(|id| order.iter().position(|level| level == id))
        .map_or(0, |i| i + 1);
    order.get(index).or_else(|| order.first()).cloned()
}

#[derive(Component)]
pub struct FadeOverlay;

fn spawn_fade_overlay(mut commands: Commands) {
    commands.spawn((
        FadeOverlay,
        Name::new("FadeOverlay"),
        NodeBundle {
            background_color: BackgroundColor(Color::srgba(0.0, 0.0, 0.0, 0.0)),
            style: Style {
                position_type: PositionType::Absolute,
                width: Val::Percent(100.0),
                height: Val::Percent(100.0),
                ..default()
            },
            z_index: ZIndex::Global(100),
            ..default()
        },
    ));
}

fn update_fade_overlay(
    transition: Res<TransitionState>,
    mut overlay_query: Query<&mut BackgroundColor, With<FadeOverlay>>,
) {
    if !transition.is_changed() {
        return;
    }
    let alpha = transition.get_fade_alpha();
    for mut background in &mut overlay_query {
        background.0 = Color::srgba(0.0, 0.0, 0.0, alpha);
    }
}

fn check_level_goal(
    player_query: Query<&Motion, With<Player>>,
    collision_map: Res<CollisionMap>,
    level_assets: Res<LevelAssets>,
    mut transition: ResMut<TransitionState>,
) {
    if transition.is_transitioning() {
        return;
    }
    let Ok(motion) = player_query.get_single() else {
        return;
    };
    if !collision_map.touches_goal(motion.position, PLAYER_RADIUS) {
        return;
    }

    let current = level_assets.level_identifier.as_deref();
    let Some(target) = next_level(&level_assets.level_order, current) else {
        warn!("Goal reached but the project lists no levels");
        return;
    };
    if Some(target.as_str()) == level_assets.level_order.first().map(String::as_str) {
        info!("All levels cleared; starting over");
    }
    info!("Goal reached in {current:?}; moving on to '{target}'");
    transition.start_transition(TransitionKind::NextLevel(target));
}

fn check_player_defeated(
    player_query: Query<&Health, With<Player>>,
    mut transition: ResMut<TransitionState>,
) {
    if transition.is_transitioning() {
        return;
    }
    let Ok(health) = player_query.get_single() else {
        return;
    };
    if health.is_depleted() {
        info!("Player defeated; restarting level");
        transition.start_transition(TransitionKind::Restart);
    }
}

/// Advances the fade and switches level at the midpoint.
fn update_transition(
    time: Res<Time>,
    mut transition: ResMut<TransitionState>,
    mut next_state: ResMut<NextState<GameState>>,
    mut level_config: ResMut<LevelConfig>,
    mut resets: EventWriter<SessionReset>,
) {
    if !transition.is_transitioning() {
        return;
    }

    transition.fade_timer += time.delta_seconds();

    let half_duration = transition.fade_duration * 0.5;
    if !transition.switched && transition.fade_timer >= half_duration {
        transition.switched = true;
        match transition.kind.clone() {
            Some(TransitionKind::Restart) => {
                resets.send(SessionReset);
            }
            Some(TransitionKind::NextLevel(identifier)) => {
                level_config.start_level = Some(identifier);
            }
            None => {}
        }
        next_state.set(GameState::Loading);
    }

    if transition.fade_timer >= transition.fade_duration {
        transition.reset();
    }
}
