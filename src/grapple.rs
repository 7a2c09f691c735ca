//! Grapple hook. A left click picks the grapple point nearest the cursor that the player can reach
//! and see, then ties the player to it with a rope joint. W/S reel the rope in and out within the
//! configured length range, and an optional spring keeps it taut; right click or jump lets go.
//!
//! Which grapple (if any) is attached, and which point is selected, lives in `GrappleSession`
//! rather than in free-floating flags, so the camera and input code read one shared source.

use bevy::prelude::*;
use bevy::window::PrimaryWindow;
use bevy_rapier2d::prelude::*;

use crate::audio::SfxEvent;
use crate::camera::FollowCamera;
use crate::config::{GrappleTuning, Tuning};
use crate::level::LevelScoped;
use crate::physics::Motion;
use crate::player::Player;
use crate::state::{FrameSet, GameSet, GameState};

pub struct GrapplePlugin;

impl Plugin for GrapplePlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<GrappleSession>()
            .add_systems(
                Update,
                (attach_grapple, steer_grapple)
                    .chain()
                    .in_set(GameSet::Input)
                    .after(crate::movement::read_player_input)
                    .run_if(in_state(GameState::Playing)),
            )
            .add_systems(PostUpdate, draw_grapple_line.in_set(FrameSet::Camera));
    }
}

/// Fixed anchor the player can hook onto.
#[derive(Component, Debug, Default, Clone, Copy)]
pub struct GrapplePoint {
    pub active: bool,
}

/// Visual rope between the player and the anchor.
#[derive(Component)]
pub struct GrappleLine;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Grapple {
    /// Entity carrying the rope joint (the player).
    pub holder: Entity,
    pub anchor: Entity,
    pub anchor_position: Vec2,
    pub line: Entity,
    pub length: f32,
}

#[derive(Resource, Debug, Default)]
pub struct GrappleSession {
    grapple: Option<Grapple>,
}

impl GrappleSession {
    pub fn is_attached(&self) -> bool {
        self.grapple.is_some()
    }

    pub fn grapple(&self) -> Option<&Grapple> {
        self.grapple.as_ref()
    }

    pub fn active_point(&self) -> Option<Entity> {
        self.grapple.map(|g| g.anchor)
    }

    /// Position of the active grapple point, which the camera blends toward.
    pub fn active_anchor(&self) -> Option<Vec2> {
        self.grapple.map(|g| g.anchor_position)
    }

    /// Refuses a second grapple while one is attached.
    pub fn attach(&mut self, grapple: Grapple) -> bool {
        if self.grapple.is_some() {
            return false;
        }
        self.grapple = Some(grapple);
        true
    }

    pub fn detach(&mut self) -> Option<Grapple> {
        self.grapple.take()
    }

    pub fn set_length(&mut self, length: f32) {
        if let Some(grapple) = self.grapple.as_mut() {
            grapple.length = length;
        }
    }

    /// Forgets the grapple without touching entities; used when the level is torn down anyway.
    pub fn reset(&mut self) {
        self.grapple = None;
    }
}

pub fn clamp_length(length: f32, tuning: &GrappleTuning) -> f32 {
    let min = tuning.min_length.min(tuning.max_length);
    length.clamp(min, tuning.max_length)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GrappleAction {
    Hold,
    /// Signed length change for this frame; negative shortens.
    Reel(f32),
    Release,
}

pub fn decide_grapple_action(
    shorten: bool,
    lengthen: bool,
    release: bool,
    dt: f32,
    tuning: &GrappleTuning,
) -> GrappleAction {
    if release {
        return GrappleAction::Release;
    }
    match (shorten, lengthen) {
        (true, false) => GrappleAction::Reel(-tuning.reel_speed * dt),
        (false, true) => GrappleAction::Reel(tuning.reel_speed * dt),
        _ => GrappleAction::Hold,
    }
}

/// Nearest point to the cursor among those within `reach` of the player.
pub fn select_grapple_point(
    player: Vec2,
    cursor: Vec2,
    points: impl IntoIterator<Item = (Entity, Vec2)>,
    reach: f32,
) -> Option<(Entity, Vec2)> {
    points
        .into_iter()
        .filter(|(_, position)| position.distance(player) <= reach)
        .min_by(|(_, a), (_, b)| a.distance_squared(cursor).total_cmp(&b.distance_squared(cursor)))
}

/// A ray hit closer than the target means something solid is in the way.
pub fn line_of_sight(hit_distance: Option<f32>, target_distance: f32) -> bool {
    const SLACK: f32 = 1.0;
    hit_distance.map_or(true, |toi| toi + SLACK >= target_distance)
}

/// Stiffness and damping of the rope spring, when one is configured.
pub fn rope_spring(tuning: &GrappleTuning) -> Option<(f32, f32)> {
    (tuning.spring_stiffness > 0.0)
        .then(|| (tuning.spring_stiffness, tuning.spring_damping.max(0.0)))
}

fn rope(anchor: Entity, length: f32, tuning: &GrappleTuning) -> ImpulseJoint {
    let mut builder = RopeJointBuilder::new(length);
    if let Some((stiffness, damping)) = rope_spring(tuning) {
        builder = builder.motor_position(length, stiffness, damping);
    }
    ImpulseJoint::new(anchor, builder.build())
}

#[allow(clippy::too_many_arguments)]
fn attach_grapple(
    mut commands: Commands,
    mouse: Res<ButtonInput<MouseButton>>,
    tuning: Res<Tuning>,
    rapier: Res<RapierContext>,
    mut session: ResMut<GrappleSession>,
    windows: Query<&Window, With<PrimaryWindow>>,
    cameras: Query<(&Camera, &GlobalTransform), With<FollowCamera>>,
    player: Query<(Entity, &Motion), With<Player>>,
    mut points: Query<(Entity, &Transform, &mut GrapplePoint)>,
    mut sfx: EventWriter<SfxEvent>,
) {
    if !mouse.just_pressed(MouseButton::Left) || session.is_attached() {
        return;
    }
    let Ok((player_entity, player_motion)) = player.get_single() else {
        return;
    };
    let Ok(window) = windows.get_single() else {
        return;
    };
    let Some(cursor) = window.cursor_position() else {
        return;
    };
    let Ok((camera, camera_transform)) = cameras.get_single() else {
        return;
    };
    let Some(cursor_world) = camera.viewport_to_world_2d(camera_transform, cursor) else {
        return;
    };

    let origin = player_motion.position;
    let candidates: Vec<(Entity, Vec2)> = points
        .iter()
        .map(|(entity, transform, _)| (entity, transform.translation.truncate()))
        .collect();
    let Some((anchor, anchor_position)) =
        select_grapple_point(origin, cursor_world, candidates, tuning.grapple.max_length)
    else {
        return;
    };

    let distance = origin.distance(anchor_position);
    let direction = (anchor_position - origin).normalize_or_zero();
    let filter = QueryFilter::default()
        .exclude_sensors()
        .exclude_collider(player_entity);
    let hit = rapier
        .cast_ray(origin, direction, distance, true, filter)
        .map(|(_, toi)| toi);
    if !line_of_sight(hit, distance) {
        debug!("Grapple point {anchor:?} is blocked");
        return;
    }

    let length = clamp_length(distance, &tuning.grapple);
    let line = commands
        .spawn((
            Name::new("GrappleLine"),
            GrappleLine,
            LevelScoped,
            SpriteBundle {
                sprite: Sprite {
                    color: Color::srgb(0.85, 0.8, 0.6),
                    custom_size: Some(Vec2::new(1.0, 2.0)),
                    ..default()
                },
                transform: Transform::from_translation(origin.extend(0.5)),
                ..default()
            },
        ))
        .id();
    commands.entity(player_entity).insert(rope(anchor, length, &tuning.grapple));

    if let Ok((_, _, mut point)) = points.get_mut(anchor) {
        point.active = true;
    }
    session.attach(Grapple {
        holder: player_entity,
        anchor,
        anchor_position,
        line,
        length,
    });
    sfx.send(SfxEvent::GrappleAttach);
    info!("Grapple attached to {anchor:?} at length {length:.0}");
}

fn steer_grapple(
    mut commands: Commands,
    time: Res<Time>,
    keyboard: Res<ButtonInput<KeyCode>>,
    mouse: Res<ButtonInput<MouseButton>>,
    tuning: Res<Tuning>,
    mut session: ResMut<GrappleSession>,
    mut points: Query<&mut GrapplePoint>,
) {
    let Some(grapple) = session.grapple().copied() else {
        return;
    };

    // An anchor that vanished (level teardown) releases the rope as well.
    let anchor_gone = points.get(grapple.anchor).is_err();
    let action = decide_grapple_action(
        keyboard.pressed(KeyCode::KeyW),
        keyboard.pressed(KeyCode::KeyS),
        anchor_gone
            || mouse.just_pressed(MouseButton::Right)
            || keyboard.just_pressed(KeyCode::Space),
        time.delta_seconds(),
        &tuning.grapple,
    );

    match action {
        GrappleAction::Hold => {}
        GrappleAction::Reel(delta) => {
            let length = clamp_length(grapple.length + delta, &tuning.grapple);
            if length != grapple.length {
                session.set_length(length);
                commands
                    .entity(grapple.holder)
                    .insert(rope(grapple.anchor, length, &tuning.grapple));
            }
        }
        GrappleAction::Release => {
            release(&mut commands, &mut session, &mut points);
        }
    }
}

/// Drops the joint and the rope visual, and deselects the point.
pub fn release(
    commands: &mut Commands,
    session: &mut GrappleSession,
    points: &mut Query<&mut GrapplePoint>,
) {
    let Some(grapple) = session.detach() else {
        return;
    };
    if let Some(mut holder) = commands.get_entity(grapple.holder) {
        holder.remove::<ImpulseJoint>();
    }
    if let Some(line) = commands.get_entity(grapple.line) {
        line.despawn_recursive();
    }
    if let Ok(mut point) = points.get_mut(grapple.anchor) {
        point.active = false;
    }
    info!("Grapple released from {:?}", grapple.anchor);
}

fn draw_grapple_line(
    session: Res<GrappleSession>,
    player: Query<&Motion, With<Player>>,
    mut lines: Query<(&mut Transform, &mut Sprite), With<GrappleLine>>,
) {
    let Some(grapple) = session.grapple() else {
        return;
    };
    let Ok(motion) = player.get_single() else {
        return;
    };
    let Ok((mut transform, mut sprite)) = lines.get_mut(grapple.line) else {
        return;
    };

    let span = grapple.anchor_position - motion.position;
    let midpoint = motion.position + span * 0.5;
    transform.translation = midpoint.extend(transform.translation.z);
    transform.rotation = Quat::from_rotation_z(span.y.atan2(span.x));
    sprite.custom_size = Some(Vec2::new(span.length().max(1.0), 2.0));
}

/// Spawns a fixed, non-colliding grapple anchor.
pub fn spawn_grapple_point(commands: &mut Commands, position: Vec2) -> Entity {
    commands
        .spawn((
            Name::new("GrapplePoint"),
            GrapplePoint::default(),
            LevelScoped,
            SpriteBundle {
                sprite: Sprite {
                    color: Color::srgb(0.3, 0.75, 0.9),
                    custom_size: Some(Vec2::splat(14.0)),
                    ..default()
                },
                transform: Transform::from_translation(position.extend(0.4)),
                ..default()
            },
            RigidBody::Fixed,
            Collider::ball(7.0),
            Sensor,
        ))
        .id()
}
