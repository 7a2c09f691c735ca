//! LDtk level orchestration: loads project data, tracks metadata, publishes the level bounds, and
//! turns LDtk entity instances into gameplay entities.
//!
//! All persistent data is stored in Bevy resources (`LevelConfig`, `LevelAssets`, `WorldBounds`).
//! Gameplay entities spawned for a level carry `LevelScoped` and are despawned together when the
//! level is reloaded, which also releases their Rapier bodies and joints.

use bevy::asset::LoadState;
use bevy::prelude::*;
use bevy_ecs_ldtk::prelude::*;
use bevy_ecs_ldtk::LevelIid;

use crate::collision::CollisionLog;
use crate::config::Tuning;
use crate::enemy::{spawn_enemy, EnemyKind};
use crate::grapple::{spawn_grapple_point, GrappleSession};
use crate::player::spawn_player;
use crate::state::GameState;

/// Registers LDtk asset plumbing, level teardown, and entity hydration.
pub struct LevelPlugin;

impl Plugin for LevelPlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(LevelConfig::default())
            .init_resource::<LevelAssets>()
            .insert_resource(LevelSelection::index(0))
            .insert_resource(LdtkSettings {
                level_spawn_behavior: LevelSpawnBehavior::UseWorldTranslation {
                    load_level_neighbors: false,
                },
                set_clear_color: SetClearColor::FromLevelBackground,
                ..default()
            })
            .add_plugins(LdtkPlugin)
            .add_systems(
                OnEnter(GameState::Loading),
                (despawn_level_entities, spawn_world).chain(),
            )
            .add_systems(
                Update,
                (
                    monitor_level_loading.run_if(in_state(GameState::Loading)),
                    prepare_level,
                ),
            );
    }
}

/// Which LDtk project + level to load, how to shift it in world space, and the tile/zoom scale.
#[derive(Resource, Clone)]
pub struct LevelConfig {
    pub project_path: String,
    pub start_level: Option<String>,
    pub frame_shift: Vec2,
    pub tile_size: f32,
    pub camera_zoom: f32,
}

impl Default for LevelConfig {
    fn default() -> Self {
        Self {
            project_path: "levels/platformer.ldtk".to_owned(),
            start_level: Some("Level_0".to_owned()),
            frame_shift: Vec2::ZERO,
            tile_size: 32.0,
            camera_zoom: 1.0,
        }
    }
}

/// Mirror of the currently loaded level's metadata. Optional fields become `Some` once assets are
/// available.
#[derive(Resource, Default)]
pub struct LevelAssets {
    pub project: Option<Handle<LdtkProject>>,
    pub project_path: Option<String>,
    pub level_identifier: Option<String>,
    pub level_size: Option<Vec2>,
    /// Identifiers of every level in the project, in project order.
    pub level_order: Vec<String>,
}

/// World-space rectangle of the active level; `origin` is its bottom-left corner.
#[derive(Resource, Debug, Default, Clone, Copy, PartialEq)]
pub struct WorldBounds {
    pub origin: Vec2,
    pub size: Vec2,
}

/// Marker on the LDtk world entity so we can despawn it before loading another level.
#[derive(Component)]
pub struct LevelRoot;

/// Gameplay entity that belongs to the current level and goes away with it.
#[derive(Component, Debug, Default, Clone, Copy)]
pub struct LevelScoped;

/// Set on LDtk entity instances once their gameplay counterpart exists.
#[derive(Component)]
pub struct Hydrated;

fn despawn_level_entities(
    mut commands: Commands,
    scoped: Query<Entity, With<LevelScoped>>,
    mut log: ResMut<CollisionLog>,
    mut session: ResMut<GrappleSession>,
) {
    let count = scoped.iter().count();
    for entity in &scoped {
        commands.entity(entity).despawn_recursive();
    }
    log.clear();
    session.reset();
    commands.remove_resource::<WorldBounds>();
    if count > 0 {
        info!("Tore down {count} level entities");
    }
}

fn spawn_world(
    mut commands: Commands,
    world: Query<Entity, With<LevelRoot>>,
    asset_server: Res<AssetServer>,
    config: Res<LevelConfig>,
    mut level_assets: ResMut<LevelAssets>,
    mut selection: ResMut<LevelSelection>,
) {
    for entity in &world {
        commands.entity(entity).despawn_recursive();
    }

    let project_handle: Handle<LdtkProject> = asset_server.load(config.project_path.clone());
    level_assets.project = Some(project_handle.clone());
    level_assets.project_path = Some(config.project_path.clone());

    *selection = config
        .start_level
        .as_ref()
        .map(|label| LevelSelection::Identifier(label.clone()))
        .unwrap_or_else(|| LevelSelection::index(0));

    commands.spawn((
        LevelRoot,
        Name::new("LevelRoot"),
        LdtkWorldBundle {
            ldtk_handle: project_handle,
            transform: Transform::from_translation(config.frame_shift.extend(0.0)),
            ..default()
        },
    ));
}

fn monitor_level_loading(
    asset_server: Res<AssetServer>,
    mut level_assets: ResMut<LevelAssets>,
    projects: Res<Assets<LdtkProject>>,
    config: Res<LevelConfig>,
    mut next_state: ResMut<NextState<GameState>>,
) {
    let Some(project_handle) = level_assets.project.clone() else {
        return;
    };

    match asset_server.get_load_state(project_handle.id()) {
        Some(LoadState::Loaded) => {
            if let Some(project) = projects.get(&project_handle) {
                let levels = &project.json_data().levels;
                level_assets.level_order =
                    levels.iter().map(|level| level.identifier.clone()).collect();

                let level_data = config
                    .start_level
                    .as_ref()
                    .and_then(|identifier| {
                        levels.iter().find(|level| &level.identifier == identifier)
                    })
                    .or_else(|| levels.first());

                if let Some(level) = level_data {
                    level_assets.level_identifier = Some(level.identifier.clone());
                    level_assets.level_size =
                        Some(Vec2::new(level.px_wid as f32, level.px_hei as f32));
                    info!(
                        "Loaded level '{}' ({}x{} px)",
                        level.identifier, level.px_wid, level.px_hei
                    );
                }
            }

            next_state.set(GameState::Playing);
        }
        Some(LoadState::Failed(_)) => {
            let path = level_assets.project_path.as_deref().unwrap_or("<unknown>");
            warn!(
                "Unable to load LDtk project at '{}'; continuing with an empty world.",
                path
            );
            next_state.set(GameState::Playing);
        }
        _ => {}
    }
}

/// Where an instance hydrates to, decided from its LDtk identifier and fields.
#[derive(Debug, Clone, PartialEq)]
pub enum Hydration {
    Player,
    Enemy {
        kind: EnemyKind,
        movement_area: [f32; 2],
    },
    GrapplePoint,
}

/// Half-width of the patrol band when an enemy instance names no area.
const DEFAULT_PATROL_REACH: f32 = 128.0;

/// Maps an LDtk instance to the gameplay entity it stands for. `x` is the instance's world x.
pub fn classify_instance(
    identifier: &str,
    enemy_kind: Option<&str>,
    area: (Option<f32>, Option<f32>),
    x: f32,
) -> Result<Hydration, String> {
    match identifier {
        "Player" => Ok(Hydration::Player),
        "GrapplePoint" => Ok(Hydration::GrapplePoint),
        "Enemy" => {
            let kind = enemy_kind
                .and_then(EnemyKind::from_identifier)
                .ok_or_else(|| format!("enemy instance has unknown kind {enemy_kind:?}"))?;
            let movement_area = [
                area.0.unwrap_or(x - DEFAULT_PATROL_REACH),
                area.1.unwrap_or(x + DEFAULT_PATROL_REACH),
            ];
            Ok(Hydration::Enemy {
                kind,
                movement_area,
            })
        }
        other => Err(format!("no gameplay entity for LDtk identifier '{other}'")),
    }
}

/// Once LDtk has placed a level in world space, publishes its bounds and spawns the gameplay
/// entities its instances describe.
#[allow(clippy::too_many_arguments)]
pub fn prepare_level(
    mut commands: Commands,
    mut events: EventReader<LevelEvent>,
    asset_server: Res<AssetServer>,
    tuning: Res<Tuning>,
    level_assets: Res<LevelAssets>,
    levels: Query<(&LevelIid, &GlobalTransform)>,
    instances: Query<(Entity, &EntityInstance, &GlobalTransform), Without<Hydrated>>,
) {
    let transformed: Vec<&LevelIid> = events
        .read()
        .filter_map(|event| match event {
            LevelEvent::Transformed(iid) => Some(iid),
            _ => None,
        })
        .collect();
    if transformed.is_empty() {
        return;
    }

    for iid in transformed {
        let Some((_, transform)) = levels.iter().find(|(level, _)| *level == iid) else {
            continue;
        };
        let size = level_assets.level_size.unwrap_or(Vec2::ZERO);
        commands.insert_resource(WorldBounds {
            origin: transform.translation().truncate(),
            size,
        });
    }

    let mut players = 0;
    for (entity, instance, transform) in &instances {
        commands.entity(entity).insert(Hydrated);
        let position = transform.translation().truncate();
        let hydration = classify_instance(
            &instance.identifier,
            instance.get_enum_field("kind").ok().map(String::as_str),
            (
                instance.get_maybe_float_field("area_min").ok().copied().flatten(),
                instance.get_maybe_float_field("area_max").ok().copied().flatten(),
            ),
            position.x,
        );

        match hydration {
            Ok(Hydration::Player) => {
                players += 1;
                if players > 1 {
                    warn!("Ignoring extra player instance at {position}");
                    continue;
                }
                spawn_player(&mut commands, &asset_server, &tuning, position);
            }
            Ok(Hydration::Enemy {
                kind,
                movement_area,
            }) => {
                spawn_enemy(&mut commands, kind, position, movement_area);
            }
            Ok(Hydration::GrapplePoint) => {
                spawn_grapple_point(&mut commands, position);
            }
            Err(error) => warn!("{error}"),
        }
    }

    if players == 0 {
        warn!("Level has no Player instance; nothing to control");
    }
}
