use bevy::input::keyboard::KeyCode;
use bevy::prelude::*;
use bevy_rapier2d::prelude::*;

use crate::audio::SfxEvent;
use crate::config::{PlayerTuning, Tuning};
use crate::grapple::GrappleSession;
use crate::player::{Player, PlayerPhysics};
use crate::state::{GameSet, GameState};

pub struct MovementPlugin;

impl Plugin for MovementPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(
            Update,
            (read_player_input, cap_run_speed)
                .chain()
                .in_set(GameSet::Input)
                .run_if(in_state(GameState::Playing)),
        );
    }
}

/// -1, 0 or 1 from the left/right keys; both held cancel out.
pub fn input_axis(left: bool, right: bool) -> f32 {
    match (left, right) {
        (true, false) => -1.0,
        (false, true) => 1.0,
        _ => 0.0,
    }
}

pub fn drive_force(axis: f32, grounded: bool, tuning: &PlayerTuning) -> Vec2 {
    let strength = if grounded {
        tuning.move_force
    } else {
        tuning.air_force
    };
    Vec2::new(axis * strength, 0.0)
}

/// Jumping needs ground underfoot; while on the rope the jump key releases instead.
pub fn can_jump(grounded: bool, grappled: bool) -> bool {
    grounded && !grappled
}

pub fn cap_horizontal(vx: f32, max_speed: f32) -> f32 {
    vx.clamp(-max_speed, max_speed)
}

pub fn read_player_input(
    keyboard: Res<ButtonInput<KeyCode>>,
    tuning: Res<Tuning>,
    session: Res<GrappleSession>,
    mut query: Query<(&PlayerPhysics, &mut ExternalForce, &mut ExternalImpulse), With<Player>>,
    mut sfx: EventWriter<SfxEvent>,
) {
    for (physics, mut force, mut impulse) in &mut query {
        let axis = input_axis(
            keyboard.pressed(KeyCode::KeyA) || keyboard.pressed(KeyCode::ArrowLeft),
            keyboard.pressed(KeyCode::KeyD) || keyboard.pressed(KeyCode::ArrowRight),
        );
        force.force = drive_force(axis, physics.is_grounded, &tuning.player);

        if keyboard.just_pressed(KeyCode::Space)
            && can_jump(physics.is_grounded, session.is_attached())
        {
            impulse.impulse = Vec2::new(0.0, tuning.player.jump_impulse);
            sfx.send(SfxEvent::Jump);
        }
    }
}

/// Ground running is capped; swinging on the rope may exceed the cap.
fn cap_run_speed(
    tuning: Res<Tuning>,
    session: Res<GrappleSession>,
    mut query: Query<&mut Velocity, With<Player>>,
) {
    if session.is_attached() {
        return;
    }
    for mut velocity in &mut query {
        let capped = cap_horizontal(velocity.linvel.x, tuning.player.max_run_speed);
        if capped != velocity.linvel.x {
            velocity.linvel.x = capped;
        }
    }
}
