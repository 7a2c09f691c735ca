//! High-level plugin composition.
//!
//! The `GrapplePlatformerPlugin` glues together all domain-specific plugins and sets up the frame
//! ordering: input, enemy decisions and effects run in `Update` ahead of the physics step; contact
//! detection, the camera, and outcome resolution run in `PostUpdate` once Rapier has written the
//! stepped bodies back.

use bevy::prelude::*;
use bevy::transform::TransformSystem;
use bevy_rapier2d::prelude::PhysicsSet;

use crate::audio::GameAudioPlugin;
use crate::camera::{CameraPlugin, FollowCamera, ParallaxBackground};
use crate::collision::CollisionPlugin;
use crate::enemy::EnemyPlugin;
use crate::grapple::GrapplePlugin;
use crate::grounding::GroundingPlugin;
use crate::level::{LevelConfig, LevelPlugin};
use crate::movement::MovementPlugin;
use crate::outcome::OutcomePlugin;
use crate::state::{toggle_pause, FrameSet, GameSet, GameState};
use crate::terrain::TerrainPlugin;
use crate::transition::TransitionPlugin;
use crate::ui::UiPlugin;

/// Bundles every gameplay plugin. Physics and configuration are added separately in `main`
/// because they need values decided before the app is built.
pub struct GrapplePlatformerPlugin;

impl Plugin for GrapplePlatformerPlugin {
    fn build(&self, app: &mut App) {
        app.init_state::<GameState>()
            .add_plugins((
                LevelPlugin,      // LDtk loading, bounds, entity hydration.
                TerrainPlugin,    // IntGrid to static colliders + goal tiles.
                CollisionPlugin,  // Player/enemy contact records.
                GroundingPlugin,  // Contact-normal grounding flags.
                OutcomePlugin,    // Destroy/freeze/damage resolution.
                EnemyPlugin,      // Pursuit and patrol forces.
                MovementPlugin,   // Player run/jump input.
                GrapplePlugin,    // Rope aim, reel, release.
                CameraPlugin,     // Layered follow camera.
                GameAudioPlugin,  // Sound effect events.
                UiPlugin,         // HUD + pause overlay.
                TransitionPlugin, // Goal/defeat fades.
            ))
            .configure_sets(
                Update,
                (GameSet::Input, GameSet::Ai, GameSet::Effects)
                    .chain()
                    .run_if(in_state(GameState::Playing)),
            )
            .configure_sets(
                PostUpdate,
                (FrameSet::Detect, FrameSet::Camera, FrameSet::Resolve)
                    .chain()
                    .after(PhysicsSet::Writeback)
                    .before(TransformSystem::TransformPropagate)
                    .run_if(in_state(GameState::Playing)),
            )
            .add_systems(Startup, setup_camera)
            .add_systems(Update, toggle_pause);
    }
}

/// Spawns the 2D camera tagged with `FollowCamera` and the background that tracks it.
fn setup_camera(mut commands: Commands, config: Res<LevelConfig>, asset_server: Res<AssetServer>) {
    let mut camera = Camera2dBundle::default();
    camera.projection.scale = config.camera_zoom.max(0.0001);
    commands.spawn((Name::new("MainCamera"), camera, FollowCamera));

    commands.spawn((
        Name::new("Background"),
        ParallaxBackground,
        SpriteBundle {
            texture: asset_server.load("textures/background.png"),
            transform: Transform::from_translation(Vec3::new(0.0, 0.0, -10.0)),
            ..default()
        },
    ));
}
