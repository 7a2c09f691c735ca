use std::collections::{BTreeMap, HashSet};

use bevy::math::IVec2;
use bevy::prelude::*;
use bevy_ecs_ldtk::prelude::*;
use bevy_rapier2d::prelude::*;

use crate::level::{prepare_level, LevelConfig, LevelScoped, WorldBounds};

/// IntGrid value marking solid ground.
pub const SOLID_TILE: i32 = 1;
/// IntGrid value marking the level exit.
pub const GOAL_TILE: i32 = 2;

pub struct TerrainPlugin;

impl Plugin for TerrainPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<CollisionMap>()
            .add_systems(Update, rebuild_terrain.after(prepare_level));
    }
}

#[derive(Component)]
pub struct Terrain;

#[derive(Resource, Default)]
pub struct CollisionMap {
    pub tile_size: Vec2,
    pub origin: Vec2,
    pub solids: HashSet<IVec2>,
    pub goals: HashSet<IVec2>,
}

impl CollisionMap {
    pub fn clear(&mut self) {
        self.solids.clear();
        self.goals.clear();
    }

    pub fn tile_at(&self, world: Vec2) -> IVec2 {
        if self.tile_size.x <= 0.0 || self.tile_size.y <= 0.0 {
            return IVec2::ZERO;
        }
        ((world - self.origin) / self.tile_size).floor().as_ivec2()
    }

    /// True when the center or any edge midpoint of a body of `radius` lies in a goal tile.
    pub fn touches_goal(&self, position: Vec2, radius: f32) -> bool {
        if self.goals.is_empty() {
            return false;
        }
        [
            Vec2::ZERO,
            Vec2::new(-radius, 0.0),
            Vec2::new(radius, 0.0),
            Vec2::new(0.0, -radius),
            Vec2::new(0.0, radius),
        ]
        .iter()
        .any(|offset| self.goals.contains(&self.tile_at(position + *offset)))
    }
}

/// Horizontal stretch of solid tiles in one row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SolidRun {
    pub row: i32,
    pub start: i32,
    pub len: i32,
}

/// Groups solid tiles into maximal horizontal runs so each row needs few colliders.
pub fn merge_solid_runs(solids: &HashSet<IVec2>) -> Vec<SolidRun> {
    let mut rows: BTreeMap<i32, Vec<i32>> = BTreeMap::new();
    for tile in solids {
        rows.entry(tile.y).or_default().push(tile.x);
    }

    let mut runs = Vec::new();
    for (row, mut xs) in rows {
        xs.sort_unstable();
        let mut current: Option<SolidRun> = None;
        for x in xs {
            current = match current {
                Some(mut run) if run.start + run.len == x => {
                    run.len += 1;
                    Some(run)
                }
                Some(run) => {
                    runs.push(run);
                    Some(SolidRun { row, start: x, len: 1 })
                }
                None => Some(SolidRun { row, start: x, len: 1 }),
            };
        }
        runs.extend(current);
    }
    runs
}

/// Center and half extents of a run's collider in world space.
pub fn run_rectangle(run: SolidRun, origin: Vec2, tile_size: Vec2) -> (Vec2, Vec2) {
    let half = Vec2::new(run.len as f32 * tile_size.x, tile_size.y) * 0.5;
    let corner = origin + Vec2::new(run.start as f32, run.row as f32) * tile_size;
    (corner + half, half)
}

fn rebuild_terrain(
    mut commands: Commands,
    mut events: EventReader<LevelEvent>,
    int_cells: Query<(&GridCoords, &IntGridCell)>,
    terrain: Query<Entity, With<Terrain>>,
    config: Res<LevelConfig>,
    bounds: Option<Res<WorldBounds>>,
    mut map: ResMut<CollisionMap>,
) {
    let mut needs_rebuild = false;
    for event in events.read() {
        match event {
            LevelEvent::Transformed(_) => needs_rebuild = true,
            LevelEvent::Despawned(_) => map.clear(),
            _ => {}
        }
    }
    if !needs_rebuild {
        return;
    }

    for entity in &terrain {
        commands.entity(entity).despawn_recursive();
    }

    map.clear();
    map.tile_size = Vec2::splat(config.tile_size);
    map.origin = bounds.map(|b| b.origin).unwrap_or(Vec2::ZERO);

    for (coords, cell) in &int_cells {
        let tile = IVec2::new(coords.x, coords.y);
        match cell.value {
            SOLID_TILE => {
                map.solids.insert(tile);
            }
            GOAL_TILE => {
                map.goals.insert(tile);
            }
            _ => {}
        }
    }

    let runs = merge_solid_runs(&map.solids);
    for run in &runs {
        let (center, half) = run_rectangle(*run, map.origin, map.tile_size);
        commands.spawn((
            Name::new("Terrain"),
            Terrain,
            LevelScoped,
            TransformBundle::from_transform(Transform::from_translation(center.extend(0.0))),
            RigidBody::Fixed,
            Collider::cuboid(half.x, half.y),
            Friction::coefficient(0.6),
        ));
    }

    if map.solids.is_empty() {
        warn!(
            "Collision map is empty. Ensure your LDtk IntGrid layer marks solid tiles with value {SOLID_TILE}."
        );
    } else {
        info!(
            "Built {} terrain colliders from {} solid tiles; {} goal tiles",
            runs.len(),
            map.solids.len(),
            map.goals.len()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiles(coords: &[(i32, i32)]) -> HashSet<IVec2> {
        coords.iter().map(|&(x, y)| IVec2::new(x, y)).collect()
    }

    #[test]
    fn merges_adjacent_tiles_per_row() {
        let mut runs = merge_solid_runs(&tiles(&[(0, 0), (1, 0), (2, 0), (5, 0), (1, 3)]));
        runs.sort_by_key(|run| (run.row, run.start));
        assert_eq!(
            runs,
            vec![
                SolidRun { row: 0, start: 0, len: 3 },
                SolidRun { row: 0, start: 5, len: 1 },
                SolidRun { row: 3, start: 1, len: 1 },
            ]
        );
    }

    #[test]
    fn run_rectangle_covers_its_tiles() {
        let (center, half) = run_rectangle(
            SolidRun { row: 1, start: 2, len: 3 },
            Vec2::new(100.0, 0.0),
            Vec2::splat(32.0),
        );
        assert_eq!(half, Vec2::new(48.0, 16.0));
        assert_eq!(center, Vec2::new(100.0 + 64.0 + 48.0, 48.0));
    }

    #[test]
    fn goal_is_found_from_body_edges() {
        let map = CollisionMap {
            tile_size: Vec2::splat(32.0),
            origin: Vec2::ZERO,
            solids: HashSet::new(),
            goals: tiles(&[(3, 0)]),
        };
        assert_eq!(map.tile_at(Vec2::new(100.0, 10.0)), IVec2::new(3, 0));
        assert!(map.touches_goal(Vec2::new(100.0, 10.0), 16.0));
        // Center in tile 2, right edge reaches tile 3.
        assert!(map.touches_goal(Vec2::new(84.0, 10.0), 16.0));
        assert!(!map.touches_goal(Vec2::new(40.0, 10.0), 16.0));
    }
}
