//! Gameplay tuning loaded from `assets/config/tuning.ron`.
//!
//! Every section carries `#[serde(default)]`, so a partial file only overrides the values it names
//! and a missing file simply leaves the built-in defaults in place. The resource is inserted once
//! at startup; systems borrow it immutably through `Res<Tuning>`.

use std::{fs, path::Path};

use bevy::prelude::*;
use serde::Deserialize;

pub const TUNING_PATH: &str = "assets/config/tuning.ron";

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct PhysicsTuning {
    pub pixels_per_meter: f32,
    pub substeps: usize,
    pub max_dt: f32,
}

impl Default for PhysicsTuning {
    fn default() -> Self {
        Self {
            pixels_per_meter: 100.0,
            substeps: 4,
            max_dt: 1.0 / 30.0,
        }
    }
}

/// Constants for the player/enemy "who wins" rule and its consequences.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct CollisionTuning {
    pub min_collision_speed: f32,
    pub win_ratio: f32,
    pub freeze_time_ms: f32,
    pub kill_points: u32,
}

impl Default for CollisionTuning {
    fn default() -> Self {
        Self {
            min_collision_speed: 500.0,
            win_ratio: 0.9,
            freeze_time_ms: 1500.0,
            kill_points: 5,
        }
    }
}

impl CollisionTuning {
    /// Speed the player must exceed to win a contact.
    pub fn winning_speed(&self) -> f32 {
        self.win_ratio * self.min_collision_speed
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct GroundingTuning {
    pub up_threshold: f32,
}

impl Default for GroundingTuning {
    fn default() -> Self {
        Self { up_threshold: 0.15 }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct CameraTuning {
    pub quick_speed: f32,
    pub pan_step: f32,
    pub focal_offset: f32,
    pub vertical_threshold: f32,
    pub grapple_blend_step: f32,
    pub recovery_blend_step: f32,
}

impl Default for CameraTuning {
    fn default() -> Self {
        Self {
            quick_speed: 900.0,
            pan_step: 5.0,
            focal_offset: 200.0,
            vertical_threshold: 50.0,
            grapple_blend_step: 0.02,
            recovery_blend_step: 0.02,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct GrappleTuning {
    pub min_length: f32,
    pub max_length: f32,
    /// Length change per second while a reel key is held.
    pub reel_speed: f32,
    /// Spring pulling the rope toward its current length. Zero keeps a slack, inextensible rope.
    pub spring_stiffness: f32,
    pub spring_damping: f32,
}

impl Default for GrappleTuning {
    fn default() -> Self {
        Self {
            min_length: 100.0,
            max_length: 450.0,
            reel_speed: 180.0,
            spring_stiffness: 0.0,
            spring_damping: 0.0,
        }
    }
}

/// Forces are applied to unit-mass bodies, so they read directly as accelerations in px/s².
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct EnemyTuning {
    pub pursuit_force: f32,
    pub patrol_force: f32,
    pub recenter_force: f32,
    pub grid_cell_width: f32,
}

impl Default for EnemyTuning {
    fn default() -> Self {
        Self {
            pursuit_force: 400.0,
            patrol_force: 600.0,
            recenter_force: 4_000.0,
            grid_cell_width: 32.0,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct PlayerTuning {
    pub move_force: f32,
    pub air_force: f32,
    pub jump_impulse: f32,
    pub max_run_speed: f32,
    pub max_hp: i32,
}

impl Default for PlayerTuning {
    fn default() -> Self {
        Self {
            move_force: 2_400.0,
            air_force: 1_200.0,
            jump_impulse: 650.0,
            max_run_speed: 1_200.0,
            max_hp: 5,
        }
    }
}

#[derive(Debug, Deserialize, Resource, Clone, PartialEq, Default)]
#[serde(default)]
pub struct Tuning {
    pub physics: PhysicsTuning,
    pub collision: CollisionTuning,
    pub grounding: GroundingTuning,
    pub camera: CameraTuning,
    pub grapple: GrappleTuning,
    pub enemy: EnemyTuning,
    pub player: PlayerTuning,
}

impl Tuning {
    pub fn from_ron(text: &str) -> Result<Self, String> {
        ron::from_str(text).map_err(|e| format!("parse RON: {e}"))
    }

    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, String> {
        let data = fs::read_to_string(path.as_ref()).map_err(|e| format!("read config: {e}"))?;
        Self::from_ron(&data)
    }

    /// Loads the file or falls back to defaults, returning the failure message alongside.
    pub fn load_or_default(path: impl AsRef<Path>) -> (Self, Option<String>) {
        match Self::load_from_file(path) {
            Ok(tuning) => (tuning, None),
            Err(e) => (Self::default(), Some(e)),
        }
    }

    /// Flags values that would break the per-frame invariants (inverted ranges, stalled blends).
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.grapple.min_length > self.grapple.max_length {
            warnings.push(format!(
                "grapple.min_length ({}) exceeds grapple.max_length ({})",
                self.grapple.min_length, self.grapple.max_length
            ));
        }
        if self.grapple.spring_stiffness < 0.0 || self.grapple.spring_damping < 0.0 {
            warnings.push("grapple spring stiffness and damping must not be negative".to_owned());
        }
        if self.camera.pan_step <= 0.0 {
            warnings.push("camera.pan_step must be positive".to_owned());
        }
        if self.camera.grapple_blend_step <= 0.0 || self.camera.recovery_blend_step <= 0.0 {
            warnings.push("camera blend steps must be positive".to_owned());
        }
        if self.collision.freeze_time_ms < 0.0 {
            warnings.push("collision.freeze_time_ms must not be negative".to_owned());
        }
        if self.physics.substeps == 0 {
            warnings.push("physics.substeps must be at least 1".to_owned());
        }
        warnings
    }
}

/// Installs the loaded `Tuning` resource. Loading happens before the app is built (the physics
/// plugin needs `pixels_per_meter` at build time), so problems are replayed into the log once the
/// log plugin is up.
pub struct ConfigPlugin {
    pub tuning: Tuning,
    pub load_error: Option<String>,
}

impl ConfigPlugin {
    pub fn from_file(path: impl AsRef<Path>) -> Self {
        let (tuning, load_error) = Tuning::load_or_default(path);
        Self { tuning, load_error }
    }
}

impl Plugin for ConfigPlugin {
    fn build(&self, app: &mut App) {
        let mut messages = Vec::new();
        if let Some(error) = &self.load_error {
            messages.push(format!("Using default tuning: {error}"));
        }
        messages.extend(self.tuning.validate());

        app.insert_resource(self.tuning.clone())
            .insert_resource(TuningReport(messages))
            .add_systems(Startup, report_tuning);
    }
}

#[derive(Resource, Default)]
struct TuningReport(Vec<String>);

fn report_tuning(report: Res<TuningReport>) {
    if report.0.is_empty() {
        info!("Tuning loaded from '{TUNING_PATH}'.");
    }
    for message in &report.0 {
        warn!("Tuning: {message}");
    }
}
