//! Application entry point: loads tuning, composes the Bevy runtime, physics, and window
//! configuration, then hands control to `GrapplePlatformerPlugin` defined in `app.rs`.

mod app;
mod audio;
mod camera;
mod collision;
mod config;
mod enemy;
mod grapple;
mod grounding;
mod level;
mod movement;
mod outcome;
mod physics;
mod player;
mod state;
mod terrain;
mod transition;
mod ui;

#[cfg(all(target_arch = "wasm32", feature = "web"))]
mod wasm;

use app::GrapplePlatformerPlugin;
use config::{ConfigPlugin, TUNING_PATH};
use physics::PhysicsPlugin;
use bevy::asset::AssetPlugin;
use bevy::prelude::*;
use bevy::render::texture::ImagePlugin;
use bevy::window::{Window, WindowResizeConstraints, WindowResolution};

fn main() {
    #[cfg(all(target_arch = "wasm32", feature = "web"))]
    wasm::set_panic_hook();

    // Read before the app exists: the physics plugin fixes its pixel scale at build time.
    let config = ConfigPlugin::from_file(TUNING_PATH);
    let pixels_per_meter = config.tuning.physics.pixels_per_meter;

    // 1280x720 logical resolution keeps the LDtk pixel grid 1:1 with world units at zoom 1.
    let primary_window = Window {
        title: "Grapple Platformer".to_string(),
        resolution: WindowResolution::new(1280.0, 720.0),
        resizable: true,
        resize_constraints: WindowResizeConstraints {
            min_width: 640.0,
            min_height: 360.0,
            max_width: f32::INFINITY,
            max_height: f32::INFINITY,
        },
        canvas: cfg!(all(target_arch = "wasm32", feature = "web"))
            .then(|| "#bevy-canvas".to_owned()),
        ..default()
    };

    // Nearest-neighbor sampling for crisp pixels; asset watching only on desktop.
    let mut default_plugins = DefaultPlugins
        .set(WindowPlugin {
            primary_window: Some(primary_window),
            ..default()
        })
        .set(ImagePlugin::default_nearest());

    #[cfg(not(target_arch = "wasm32"))]
    {
        default_plugins = default_plugins.set(AssetPlugin {
            file_path: "assets".to_owned(),
            watch_for_changes_override: Some(true),
            ..default()
        });
    }

    #[cfg(all(target_arch = "wasm32", feature = "web"))]
    {
        default_plugins = default_plugins.set(AssetPlugin {
            file_path: "assets".to_owned(),
            watch_for_changes_override: Some(false),
            ..default()
        });
    }

    App::new()
        .insert_resource(ClearColor(Color::srgb(0.02, 0.02, 0.04)))
        .add_plugins(default_plugins)
        .add_plugins(config)
        .add_plugins(PhysicsPlugin { pixels_per_meter })
        .add_plugins(GrapplePlatformerPlugin)
        .run();
}
