//! Camera controller. The follow position is built by a fixed sequence of stages, each one taking
//! the position produced so far and the persistent `CameraRig` state:
//!
//! 1. speed-pan: push the view ahead of a fast-moving player,
//! 2. center-reset: walk a finished pan back to the player,
//! 3. vertical follow: hold Y inside a dead zone around a remembered center,
//! 4. grapple attraction: blend toward the active grapple anchor,
//! 5. boundary clamp: keep the view inside the level unless a grapple is active,
//! 6. grapple recovery: ease back from where the camera was after a grapple ends.
//!
//! Later stages override earlier ones, so the order is part of the behavior. The clamp has the final
//! say except while a grapple point is active.

use bevy::prelude::*;
use bevy::window::PrimaryWindow;

use crate::config::{CameraTuning, Tuning};
use crate::grapple::GrappleSession;
use crate::level::WorldBounds;
use crate::physics::Motion;
use crate::player::Player;
use crate::state::FrameSet;

/// Plugin that registers the camera pipeline and the systems that follow the camera.
pub struct CameraPlugin;

impl Plugin for CameraPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<CameraRig>().add_systems(
            PostUpdate,
            (recenter_on_spawn, follow_player_camera, sync_parallax)
                .chain()
                .in_set(FrameSet::Camera)
                .run_if(has_player_and_camera),
        );
    }
}

/// Marker component so the follow system can locate the camera entity without relying on names.
#[derive(Component)]
pub struct FollowCamera;

/// Background layer that tracks the final camera position every frame.
#[derive(Component)]
pub struct ParallaxBackground;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PanState {
    #[default]
    Centered,
    PannedRight,
    PannedLeft,
}

impl PanState {
    fn sign(self) -> f32 {
        match self {
            PanState::Centered => 0.0,
            PanState::PannedRight => 1.0,
            PanState::PannedLeft => -1.0,
        }
    }

    fn opposes(self, other: PanState) -> bool {
        matches!(
            (self, other),
            (PanState::PannedRight, PanState::PannedLeft)
                | (PanState::PannedLeft, PanState::PannedRight)
        )
    }
}

/// Persistent camera state carried from one frame to the next.
#[derive(Resource, Debug, Clone, PartialEq, Default)]
pub struct CameraRig {
    pub position: Vec2,
    pub panned: PanState,
    pub speedy: bool,
    pub shift_index: i32,
    /// Focal offset of the current pan, signed by direction.
    pub objective_x: Option<f32>,
    pub center_y: Option<f32>,
    /// Blend factor toward the grapple anchor; saturates in use once it passes 1.
    pub grapple_shift: f32,
    pub after_grapple: bool,
    /// Blend factor of the post-grapple recovery.
    pub reset_shift: f32,
    pub prev_position: Vec2,
}

impl CameraRig {
    pub fn at(position: Vec2) -> Self {
        Self {
            position,
            prev_position: position,
            ..default()
        }
    }

    /// Horizontal pan offset for the current shift index, never past the focal offset.
    fn pan_offset(&self, tuning: &CameraTuning) -> f32 {
        let Some(objective) = self.objective_x else {
            return 0.0;
        };
        let travelled = (self.shift_index.max(0) as f32 * tuning.pan_step).min(objective.abs());
        travelled * objective.signum()
    }

    fn max_shift_index(tuning: &CameraTuning) -> i32 {
        (tuning.focal_offset / tuning.pan_step.max(f32::EPSILON)).ceil() as i32
    }
}

/// Everything the pipeline reads from the rest of the world for one frame.
#[derive(Debug, Clone, Copy)]
pub struct CameraInputs {
    pub player_position: Vec2,
    pub player_velocity: Vec2,
    /// Position of the active grapple point, if any.
    pub grapple_anchor: Option<Vec2>,
    /// Half the visible area in world units.
    pub half_view: Vec2,
    pub bounds: Option<WorldBounds>,
}

pub type CameraStage = fn(&mut CameraRig, Vec2, &CameraInputs, &CameraTuning) -> Vec2;

pub const CAMERA_PIPELINE: [CameraStage; 6] = [
    speed_pan,
    center_reset,
    vertical_follow,
    grapple_attraction,
    boundary_clamp,
    grapple_recovery,
];

/// Runs the full pipeline and stores the result. Returns `None` without touching the rig when the
/// player state is not finite.
pub fn step_camera(
    rig: &mut CameraRig,
    inputs: &CameraInputs,
    tuning: &CameraTuning,
) -> Option<Vec2> {
    if !inputs.player_position.is_finite() || !inputs.player_velocity.is_finite() {
        return None;
    }

    let position = CAMERA_PIPELINE
        .iter()
        .fold(inputs.player_position, |position, stage| {
            stage(rig, position, inputs, tuning)
        });

    rig.prev_position = position;
    rig.position = position;
    Some(position)
}

pub fn speed_pan(
    rig: &mut CameraRig,
    position: Vec2,
    inputs: &CameraInputs,
    tuning: &CameraTuning,
) -> Vec2 {
    let vx = inputs.player_velocity.x;
    let direction = if vx > tuning.quick_speed {
        PanState::PannedRight
    } else if vx < -tuning.quick_speed {
        PanState::PannedLeft
    } else {
        PanState::Centered
    };

    if direction == PanState::Centered || rig.panned.opposes(direction) {
        rig.speedy = false;
        return position;
    }

    rig.speedy = true;
    rig.panned = direction;
    rig.objective_x = Some(direction.sign() * tuning.focal_offset);
    rig.shift_index = (rig.shift_index + 1).min(CameraRig::max_shift_index(tuning));
    position + Vec2::X * rig.pan_offset(tuning)
}

pub fn center_reset(
    rig: &mut CameraRig,
    position: Vec2,
    _inputs: &CameraInputs,
    tuning: &CameraTuning,
) -> Vec2 {
    if rig.speedy || rig.objective_x.is_none() {
        return position;
    }

    if rig.shift_index > 1 {
        rig.shift_index -= 1;
        return position + Vec2::X * rig.pan_offset(tuning);
    }

    rig.shift_index = 0;
    rig.objective_x = None;
    rig.panned = PanState::Centered;
    position
}

pub fn vertical_follow(
    rig: &mut CameraRig,
    position: Vec2,
    inputs: &CameraInputs,
    tuning: &CameraTuning,
) -> Vec2 {
    let player_y = inputs.player_position.y;
    let mut center = *rig.center_y.get_or_insert(player_y);
    let offset = player_y - center;

    if offset.abs() > tuning.vertical_threshold {
        // Drag the remembered center so the player sits on the edge of the dead zone.
        center = player_y - tuning.vertical_threshold * offset.signum();
        rig.center_y = Some(center);
    }

    Vec2::new(position.x, center)
}

pub fn grapple_attraction(
    rig: &mut CameraRig,
    position: Vec2,
    inputs: &CameraInputs,
    tuning: &CameraTuning,
) -> Vec2 {
    match inputs.grapple_anchor {
        Some(anchor) => {
            rig.after_grapple = false;
            rig.reset_shift = 0.0;
            rig.grapple_shift += tuning.grapple_blend_step;
            position.lerp(anchor, rig.grapple_shift.min(1.0))
        }
        None => {
            if rig.grapple_shift > 0.0 {
                rig.after_grapple = true;
                rig.reset_shift = 0.0;
                rig.grapple_shift = 0.0;
            }
            position
        }
    }
}

pub fn boundary_clamp(
    _rig: &mut CameraRig,
    position: Vec2,
    inputs: &CameraInputs,
    _tuning: &CameraTuning,
) -> Vec2 {
    if inputs.grapple_anchor.is_some() {
        return position;
    }
    match inputs.bounds {
        Some(bounds) => clamp_to_bounds(position, inputs.half_view, bounds),
        None => position,
    }
}

pub fn grapple_recovery(
    rig: &mut CameraRig,
    position: Vec2,
    _inputs: &CameraInputs,
    tuning: &CameraTuning,
) -> Vec2 {
    if !rig.after_grapple {
        return position;
    }

    rig.reset_shift += tuning.recovery_blend_step;
    let blended = rig.prev_position.lerp(position, rig.reset_shift.min(1.0));
    if rig.reset_shift >= 1.0 {
        rig.after_grapple = false;
        rig.reset_shift = 0.0;
    }
    blended
}

/// X stays within `[left + half_w, right - half_w]`; Y never drops below `bottom + half_h`, so the
/// view never shows past the level floor. A level narrower than the view is centered.
pub fn clamp_to_bounds(position: Vec2, half_view: Vec2, bounds: WorldBounds) -> Vec2 {
    let min_x = bounds.origin.x + half_view.x;
    let max_x = bounds.origin.x + bounds.size.x - half_view.x;
    let x = if min_x <= max_x {
        position.x.clamp(min_x, max_x)
    } else {
        bounds.origin.x + bounds.size.x * 0.5
    };

    let floor_y = bounds.origin.y + half_view.y;
    Vec2::new(x, position.y.max(floor_y))
}

/// Run condition that only schedules the follow system when both a player and camera exist. This
/// prevents `get_single` failures during level transitions when entities may be missing.
fn has_player_and_camera(
    player_query: Query<Entity, With<Player>>,
    camera_query: Query<Entity, With<FollowCamera>>,
) -> bool {
    !player_query.is_empty() && !camera_query.is_empty()
}

/// Snaps the rig onto a freshly spawned player so a level start never pans in from the old spot.
fn recenter_on_spawn(player: Query<&Motion, Added<Player>>, mut rig: ResMut<CameraRig>) {
    if let Ok(motion) = player.get_single() {
        *rig = CameraRig::at(motion.position);
    }
}

fn follow_player_camera(
    mut rig: ResMut<CameraRig>,
    tuning: Res<Tuning>,
    session: Res<GrappleSession>,
    bounds: Option<Res<WorldBounds>>,
    windows: Query<&Window, With<PrimaryWindow>>,
    player: Query<&Motion, With<Player>>,
    mut camera: Query<(&mut Transform, &OrthographicProjection), With<FollowCamera>>,
) {
    let Ok(motion) = player.get_single() else {
        return;
    };
    let Ok((mut camera_transform, projection)) = camera.get_single_mut() else {
        return;
    };

    let half_view = windows
        .get_single()
        .map(|window| window.resolution.size() * 0.5 * projection.scale)
        .unwrap_or(Vec2::ZERO);

    let inputs = CameraInputs {
        player_position: motion.position,
        player_velocity: motion.velocity,
        grapple_anchor: session.active_anchor(),
        half_view,
        bounds: bounds.map(|b| *b),
    };

    let Some(position) = step_camera(&mut rig, &inputs, &tuning.camera) else {
        warn!("Skipping camera update for non-finite player state {motion:?}");
        return;
    };

    camera_transform.translation.x = position.x;
    camera_transform.translation.y = position.y;
}

fn sync_parallax(
    rig: Res<CameraRig>,
    mut backgrounds: Query<&mut Transform, (With<ParallaxBackground>, Without<FollowCamera>)>,
) {
    for mut transform in &mut backgrounds {
        transform.translation.x = rig.position.x;
        transform.translation.y = rig.position.y;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HALF_VIEW: Vec2 = Vec2::new(640.0, 360.0);

    fn tuning() -> CameraTuning {
        CameraTuning::default()
    }

    fn inputs(position: Vec2, velocity: Vec2) -> CameraInputs {
        CameraInputs {
            player_position: position,
            player_velocity: velocity,
            grapple_anchor: None,
            half_view: HALF_VIEW,
            bounds: None,
        }
    }

    fn bounds() -> WorldBounds {
        WorldBounds {
            origin: Vec2::ZERO,
            size: Vec2::new(4_000.0, 2_000.0),
        }
    }

    #[test]
    fn speed_pan_steps_toward_focal_offset_and_stops() {
        let t = tuning();
        let mut rig = CameraRig::at(Vec2::ZERO);
        let fast = inputs(Vec2::ZERO, Vec2::new(1_000.0, 0.0));

        let first = step_camera(&mut rig, &fast, &t).unwrap();
        assert_eq!(first.x, 5.0);
        assert_eq!(rig.panned, PanState::PannedRight);
        let second = step_camera(&mut rig, &fast, &t).unwrap();
        assert_eq!(second.x, 10.0);

        for _ in 0..100 {
            step_camera(&mut rig, &fast, &t);
        }
        assert_eq!(rig.position.x, 200.0);
    }

    #[test]
    fn slow_player_is_not_panned() {
        let t = tuning();
        let mut rig = CameraRig::at(Vec2::ZERO);
        let position = step_camera(&mut rig, &inputs(Vec2::ZERO, Vec2::new(899.0, 0.0)), &t);
        assert_eq!(position, Some(Vec2::ZERO));
        assert!(!rig.speedy);
        assert_eq!(rig.panned, PanState::Centered);
    }

    #[test]
    fn pan_walks_back_to_center_then_resets() {
        let t = tuning();
        let mut rig = CameraRig::at(Vec2::ZERO);
        let fast = inputs(Vec2::ZERO, Vec2::new(-1_000.0, 0.0));
        for _ in 0..4 {
            step_camera(&mut rig, &fast, &t);
        }
        assert_eq!(rig.position.x, -20.0);

        let slow = inputs(Vec2::ZERO, Vec2::ZERO);
        assert_eq!(step_camera(&mut rig, &slow, &t).unwrap().x, -15.0);
        assert_eq!(step_camera(&mut rig, &slow, &t).unwrap().x, -10.0);
        assert_eq!(step_camera(&mut rig, &slow, &t).unwrap().x, -5.0);
        assert_eq!(step_camera(&mut rig, &slow, &t).unwrap().x, 0.0);
        assert_eq!(rig.panned, PanState::Centered);
        assert_eq!(rig.objective_x, None);
    }

    #[test]
    fn reversing_while_panned_recenters_before_panning_again() {
        let t = tuning();
        let mut rig = CameraRig::at(Vec2::ZERO);
        let right = inputs(Vec2::ZERO, Vec2::new(1_000.0, 0.0));
        step_camera(&mut rig, &right, &t);
        step_camera(&mut rig, &right, &t);

        let left = inputs(Vec2::ZERO, Vec2::new(-1_000.0, 0.0));
        let position = step_camera(&mut rig, &left, &t).unwrap();
        assert!(!rig.speedy);
        assert_eq!(position.x, 5.0);

        step_camera(&mut rig, &left, &t);
        assert_eq!(rig.panned, PanState::Centered);
        let position = step_camera(&mut rig, &left, &t).unwrap();
        assert_eq!(rig.panned, PanState::PannedLeft);
        assert_eq!(position.x, -5.0);
    }

    #[test]
    fn small_hops_stay_inside_the_dead_zone() {
        let t = tuning();
        let mut rig = CameraRig::at(Vec2::new(0.0, 100.0));
        assert_eq!(
            step_camera(&mut rig, &inputs(Vec2::new(0.0, 100.0), Vec2::ZERO), &t)
                .unwrap()
                .y,
            100.0
        );
        let hop = step_camera(&mut rig, &inputs(Vec2::new(0.0, 140.0), Vec2::ZERO), &t).unwrap();
        assert_eq!(hop.y, 100.0);

        let climb = step_camera(&mut rig, &inputs(Vec2::new(0.0, 200.0), Vec2::ZERO), &t).unwrap();
        assert_eq!(climb.y, 150.0);
        let fall = step_camera(&mut rig, &inputs(Vec2::new(0.0, 60.0), Vec2::ZERO), &t).unwrap();
        assert_eq!(fall.y, 110.0);
    }

    #[test]
    fn sustained_climb_trails_by_the_dead_zone() {
        let t = tuning();
        let mut rig = CameraRig::at(Vec2::ZERO);
        step_camera(&mut rig, &inputs(Vec2::ZERO, Vec2::ZERO), &t).unwrap();

        for frame in 1..=12 {
            let player_y = frame as f32 * 20.0;
            let view = step_camera(&mut rig, &inputs(Vec2::new(0.0, player_y), Vec2::ZERO), &t)
                .unwrap();
            let expected = (player_y - t.vertical_threshold).max(0.0);
            assert_eq!(view.y, expected, "frame {frame}");
            assert_eq!(rig.center_y, Some(expected));
        }
    }

    #[test]
    fn clamp_pins_camera_to_level_edges() {
        let b = bounds();
        assert_eq!(
            clamp_to_bounds(Vec2::new(10.0, 800.0), HALF_VIEW, b),
            Vec2::new(640.0, 800.0)
        );
        assert_eq!(
            clamp_to_bounds(Vec2::new(3_900.0, 800.0), HALF_VIEW, b),
            Vec2::new(3_360.0, 800.0)
        );
        assert_eq!(
            clamp_to_bounds(Vec2::new(1_000.0, 5.0), HALF_VIEW, b),
            Vec2::new(1_000.0, 360.0)
        );
    }

    #[test]
    fn narrow_level_is_centered() {
        let b = WorldBounds {
            origin: Vec2::new(100.0, 0.0),
            size: Vec2::new(600.0, 2_000.0),
        };
        assert_eq!(clamp_to_bounds(Vec2::new(0.0, 900.0), HALF_VIEW, b).x, 400.0);
    }

    #[test]
    fn clamp_runs_last_without_grapple() {
        let t = tuning();
        let mut rig = CameraRig::at(Vec2::new(640.0, 400.0));
        let mut frame = inputs(Vec2::new(50.0, 400.0), Vec2::ZERO);
        frame.bounds = Some(bounds());
        assert_eq!(step_camera(&mut rig, &frame, &t).unwrap().x, 640.0);
    }

    #[test]
    fn grapple_blends_toward_anchor_and_overrides_clamp() {
        let t = tuning();
        let mut rig = CameraRig::at(Vec2::new(100.0, 400.0));
        let mut frame = inputs(Vec2::new(100.0, 400.0), Vec2::ZERO);
        frame.bounds = Some(bounds());
        frame.grapple_anchor = Some(Vec2::new(200.0, 400.0));

        let first = step_camera(&mut rig, &frame, &t).unwrap();
        assert!((first.x - 102.0).abs() < 1e-3);
        assert!(rig.grapple_shift > 0.0);

        for _ in 0..80 {
            step_camera(&mut rig, &frame, &t);
        }
        // Blend saturates at the anchor, which sits inside the left clamp margin.
        assert!((rig.position.x - 200.0).abs() < 1e-3);
    }

    #[test]
    fn detaching_starts_recovery_until_blend_completes() {
        let t = tuning();
        let mut rig = CameraRig::at(Vec2::new(500.0, 400.0));
        let mut frame = inputs(Vec2::new(500.0, 400.0), Vec2::ZERO);
        frame.grapple_anchor = Some(Vec2::new(900.0, 400.0));
        for _ in 0..60 {
            step_camera(&mut rig, &frame, &t);
        }
        let held = rig.position;

        frame.grapple_anchor = None;
        let first = step_camera(&mut rig, &frame, &t).unwrap();
        assert!(rig.after_grapple);
        assert_eq!(rig.grapple_shift, 0.0);
        let expected = held.lerp(Vec2::new(500.0, 400.0), 0.02);
        assert!((first - expected).length() < 1e-3);

        for _ in 0..60 {
            step_camera(&mut rig, &frame, &t);
        }
        assert!(!rig.after_grapple);
        assert!((rig.position - Vec2::new(500.0, 400.0)).length() < 1e-3);
    }

    #[test]
    fn new_grapple_cancels_recovery() {
        let t = tuning();
        let mut rig = CameraRig::at(Vec2::ZERO);
        rig.after_grapple = true;
        rig.reset_shift = 0.4;
        let mut frame = inputs(Vec2::ZERO, Vec2::ZERO);
        frame.grapple_anchor = Some(Vec2::new(100.0, 0.0));
        step_camera(&mut rig, &frame, &t);
        assert!(!rig.after_grapple);
        assert_eq!(rig.reset_shift, 0.0);
    }

    #[test]
    fn non_finite_player_leaves_camera_untouched() {
        let t = tuning();
        let mut rig = CameraRig::at(Vec2::new(7.0, 8.0));
        let before = rig.clone();
        let frame = inputs(Vec2::new(f32::NAN, 0.0), Vec2::ZERO);
        assert_eq!(step_camera(&mut rig, &frame, &t), None);
        assert_eq!(rig, before);
    }
}
