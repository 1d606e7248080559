//! Composition of the published map from raster, rooms and entities.

use crate::{
	EntityKind, LayerKind, MapEntity, MapLayer, MapSize, MapTransform, RasterMap, RobotMap,
	SegmentMeta, rasterize_polygon,
};
use deebot_core::{GridPoint, Result, WorldPoint};
use deebot_proto::{Room, RobotPose, TracePoint, VirtualWall, VirtualWallKind};
use log::{debug, warn};

/// When less than this fraction of room-polygon pixels lands on raster
/// floor, the configured rotation does not match the raster and the map is
/// published without the raster layers.
const MIN_POLYGON_COVERAGE: f64 = 0.05;

/// Grid used when no raster has been decoded yet.
const FALLBACK_GRID: (u32, u32) = (800, 800);

/// Static build parameters, taken from the configuration.
#[derive(Clone, Copy, Debug)]
pub struct MapBuilderConfig {
	pub rotation_deg: u16,
	pub mm_per_pixel: f64,
	pub max_layer_pixels: usize,
	pub min_floor_pixels: usize,
}

/// Everything one map build composes.
pub struct MapInput<'a> {
	pub raster: Option<&'a RasterMap>,
	pub rooms: &'a [Room],
	pub walls: &'a [VirtualWall],
	pub robot: Option<RobotPose>,
	pub charger: Option<RobotPose>,
	pub path: &'a [TracePoint],
}

pub struct MapBuilder {
	config: MapBuilderConfig,
}

impl MapBuilder {
	#[must_use]
	pub fn new(config: MapBuilderConfig) -> MapBuilder {
		MapBuilder { config }
	}

	/// The transform matching a raster (or the fallback grid), with the
	/// configured rotation applied.
	pub fn transform_for(&self, raster: Option<&RasterMap>) -> Result<MapTransform> {
		let (width, height) = raster.map_or(FALLBACK_GRID, |r| {
			if self.config.rotation_deg % 180 == 90 {
				(r.height, r.width)
			} else {
				(r.width, r.height)
			}
		});
		MapTransform::new(width, height, self.config.mm_per_pixel, self.config.rotation_deg)
	}

	/// Builds a map, or `None` when a guardrail says this poll should not
	/// publish.
	pub fn build(&self, input: &MapInput) -> Result<Option<RobotMap>> {
		let rotated = input.raster.map(|raster| raster.rotated(self.config.rotation_deg));
		let transform = self.transform_for(input.raster)?;

		let mut layers = Vec::new();
		let segment_layers = self.segment_layers(input.rooms, &transform);

		let include_raster = match &rotated {
			Some(raster) => {
				if polygon_coverage(&segment_layers, raster) < MIN_POLYGON_COVERAGE
					&& !segment_layers.is_empty()
					&& !raster.floor.is_empty()
				{
					warn!("room polygons do not cover the raster floor; publishing without raster layers");
					false
				} else {
					true
				}
			}
			None => false,
		};

		if let (true, Some(raster)) = (include_raster, &rotated) {
			if raster.floor.len() < self.config.min_floor_pixels {
				debug!(
					"skipping map publish: {} floor pixels is below the minimum {}",
					raster.floor.len(),
					self.config.min_floor_pixels
				);
				return Ok(None);
			}
			layers.push(layer_from_set(LayerKind::Floor, &raster.floor));
			layers.push(layer_from_set(LayerKind::Wall, &raster.walls));
		}
		layers.extend(segment_layers);

		let total_pixels: usize = layers.iter().map(|layer| layer.pixels.len()).sum();
		if total_pixels > self.config.max_layer_pixels {
			debug!(
				"skipping map publish: {total_pixels} layer pixels exceed the maximum {}",
				self.config.max_layer_pixels
			);
			return Ok(None);
		}

		let entities = self.build_entities(&transform, input.robot, input.charger, input.path, input.walls);

		let pixel_size_cm = self.config.mm_per_pixel / 10.0;
		Ok(Some(RobotMap {
			size_cm: MapSize {
				x: (f64::from(transform.width_px) * pixel_size_cm).round() as u32,
				y: (f64::from(transform.height_px) * pixel_size_cm).round() as u32,
			},
			pixel_size_cm,
			layers,
			entities,
			transform,
		}))
	}

	fn segment_layers(&self, rooms: &[Room], transform: &MapTransform) -> Vec<MapLayer> {
		let mut layers = Vec::with_capacity(rooms.len());
		for room in rooms {
			if room.polygon.len() < 3 {
				warn!("room {} has a degenerate polygon, skipping", room.areaid);
				continue;
			}
			let polygon: Vec<(f64, f64)> = room
				.polygon
				.iter()
				.map(|point| transform.world_to_grid_f(*point))
				.collect();
			let pixels = rasterize_polygon(&polygon, transform.width_px, transform.height_px);
			layers.push(MapLayer {
				kind: LayerKind::Segment,
				pixels,
				meta: Some(SegmentMeta {
					segment_id: room.areaid,
					name: room.label_name().map(str::to_string),
					room_cleaning_preferences: room.preferences,
				}),
			});
		}
		layers
	}

	/// Builds the dynamic entity list: charger, robot, trace path, then
	/// the virtual restrictions. The live poll rebuilds only these.
	#[must_use]
	pub fn build_entities(
		&self,
		transform: &MapTransform,
		robot: Option<RobotPose>,
		charger: Option<RobotPose>,
		path: &[TracePoint],
		walls: &[VirtualWall],
	) -> Vec<MapEntity> {
		let mut entities = Vec::new();

		if let Some(charger) = charger {
			entities.push(MapEntity {
				kind: EntityKind::Charger,
				points: vec![transform.world_to_grid(charger.position())],
				angle_deg: None,
			});
		}
		if let Some(robot) = robot {
			entities.push(MapEntity {
				kind: EntityKind::Robot,
				points: vec![transform.world_to_grid(robot.position())],
				angle_deg: Some(robot.angle_deg),
			});
		}
		if !path.is_empty() {
			let mut points: Vec<GridPoint> = Vec::with_capacity(path.len());
			for trace_point in path {
				let grid = transform.world_to_grid(WorldPoint::new(trace_point.x_mm, trace_point.y_mm));
				if points.last() != Some(&grid) {
					points.push(grid);
				}
			}
			entities.push(MapEntity {
				kind: EntityKind::Path,
				points,
				angle_deg: None,
			});
		}
		for wall in walls {
			if let Some(entity) = restriction_entity(transform, wall) {
				entities.push(entity);
			}
		}
		entities
	}
}

/// Maps one virtual restriction to an entity: two dots stay a line, three
/// or more become the axis-aligned bounding rectangle of their corners.
fn restriction_entity(transform: &MapTransform, wall: &VirtualWall) -> Option<MapEntity> {
	match wall.dots.len() {
		0 | 1 => {
			warn!("virtual wall {} has {} dots, skipping", wall.vwid, wall.dots.len());
			None
		}
		2 => Some(MapEntity {
			kind: EntityKind::VirtualWall,
			points: wall.dots.iter().map(|dot| transform.world_to_grid(*dot)).collect(),
			angle_deg: None,
		}),
		_ => {
			let min_x = wall.dots.iter().map(|d| d.x_mm).min()?;
			let max_x = wall.dots.iter().map(|d| d.x_mm).max()?;
			let min_y = wall.dots.iter().map(|d| d.y_mm).min()?;
			let max_y = wall.dots.iter().map(|d| d.y_mm).max()?;
			let corners = [
				WorldPoint::new(min_x, min_y),
				WorldPoint::new(max_x, min_y),
				WorldPoint::new(max_x, max_y),
				WorldPoint::new(min_x, max_y),
			];
			Some(MapEntity {
				kind: match wall.kind {
					VirtualWallKind::Regular => EntityKind::NoGo,
					VirtualWallKind::NoMop => EntityKind::NoMop,
				},
				points: corners.iter().map(|corner| transform.world_to_grid(*corner)).collect(),
				angle_deg: None,
			})
		}
	}
}

fn layer_from_set(kind: LayerKind, pixels: &std::collections::HashSet<GridPoint>) -> MapLayer {
	let mut sorted: Vec<GridPoint> = pixels.iter().copied().collect();
	sorted.sort_by_key(|p| (p.y, p.x));
	MapLayer {
		kind,
		pixels: sorted,
		meta: None,
	}
}

/// Fraction of segment pixels that land on raster floor.
fn polygon_coverage(segments: &[MapLayer], raster: &RasterMap) -> f64 {
	let total: usize = segments.iter().map(|layer| layer.pixels.len()).sum();
	if total == 0 {
		return 1.0;
	}
	let covered: usize = segments
		.iter()
		.flat_map(|layer| &layer.pixels)
		.filter(|pixel| raster.floor.contains(pixel))
		.count();
	covered as f64 / total as f64
}

#[cfg(test)]
mod tests {
	use super::*;
	use deebot_proto::RoomPreferences;
	use pretty_assertions::assert_eq;
	use std::collections::HashSet;

	fn config() -> MapBuilderConfig {
		MapBuilderConfig {
			rotation_deg: 0,
			mm_per_pixel: 50.0,
			max_layer_pixels: 100_000,
			min_floor_pixels: 1,
		}
	}

	/// A 20x20 raster whose top-left 10x10 tile is floor and bottom half
	/// is wall, at 5 cm per pixel.
	fn raster() -> RasterMap {
		let mut floor = HashSet::new();
		let mut walls = HashSet::new();
		for y in 0..10 {
			for x in 0..10 {
				floor.insert(GridPoint::new(x, y));
			}
		}
		for y in 10..20 {
			for x in 0..20 {
				walls.insert(GridPoint::new(x, y));
			}
		}
		RasterMap {
			width: 20,
			height: 20,
			resolution_cm: 5,
			floor,
			walls,
		}
	}

	/// A room over the floor tile: world x -400..0, y 0..400.
	fn floor_room(areaid: u32) -> Room {
		Room {
			areaid,
			label_id: 5,
			polygon: vec![
				WorldPoint::new(-400, 0),
				WorldPoint::new(0, 0),
				WorldPoint::new(0, 400),
				WorldPoint::new(-400, 400),
			],
			connections: vec![],
			preferences: RoomPreferences::default(),
		}
	}

	fn input<'a>(raster: Option<&'a RasterMap>, rooms: &'a [Room]) -> MapInput<'a> {
		MapInput {
			raster,
			rooms,
			walls: &[],
			robot: None,
			charger: None,
			path: &[],
		}
	}

	#[test]
	fn floor_and_wall_layers_come_first_and_sorted() -> Result<()> {
		let raster = raster();
		let rooms = [floor_room(7)];
		let map = MapBuilder::new(config())
			.build(&input(Some(&raster), &rooms))?
			.expect("map is published");

		assert_eq!(map.layers[0].kind, LayerKind::Floor);
		assert_eq!(map.layers[1].kind, LayerKind::Wall);
		assert_eq!(map.layers[2].kind, LayerKind::Segment);
		assert_eq!(map.layers[0].pixels.len(), 100);
		assert_eq!(map.layers[1].pixels.len(), 200);

		let mut sorted = map.layers[0].pixels.clone();
		sorted.sort_by_key(|p| (p.y, p.x));
		assert_eq!(map.layers[0].pixels, sorted);

		assert_eq!(map.size_cm, MapSize { x: 100, y: 100 });
		assert_eq!(map.pixel_size_cm, 5.0);
		Ok(())
	}

	#[test]
	fn segment_meta_carries_areaid_and_label() -> Result<()> {
		let raster = raster();
		let rooms = [floor_room(42)];
		let map = MapBuilder::new(config())
			.build(&input(Some(&raster), &rooms))?
			.expect("map is published");

		let segment = map.segment_layers().next().expect("one segment");
		let meta = segment.meta.as_ref().expect("segment meta");
		assert_eq!(meta.segment_id, 42);
		assert_eq!(meta.name.as_deref(), Some("Kitchen"));
		assert!(!segment.pixels.is_empty());
		// All pixels stay inside the grid.
		assert!(segment.pixels.iter().all(|p| p.x < 20 && p.y < 20));
		Ok(())
	}

	#[test]
	fn mismatched_rooms_drop_the_raster_layers() -> Result<()> {
		let raster = raster();
		// Room entirely over the wall half: no floor coverage.
		let rooms = [Room {
			polygon: vec![
				WorldPoint::new(-400, -400),
				WorldPoint::new(400, -400),
				WorldPoint::new(400, -100),
				WorldPoint::new(-400, -100),
			],
			..floor_room(3)
		}];
		let map = MapBuilder::new(config())
			.build(&input(Some(&raster), &rooms))?
			.expect("map is still published");
		assert!(map.floor_layer().is_none());
		assert_eq!(map.segment_layers().count(), 1);
		Ok(())
	}

	#[test]
	fn too_many_pixels_skip_the_publish() -> Result<()> {
		let raster = raster();
		let mut config = config();
		config.max_layer_pixels = 10;
		assert!(MapBuilder::new(config).build(&input(Some(&raster), &[]))?.is_none());
		Ok(())
	}

	#[test]
	fn too_few_floor_pixels_skip_the_publish() -> Result<()> {
		let raster = raster();
		let mut config = config();
		config.min_floor_pixels = 1000;
		assert!(MapBuilder::new(config).build(&input(Some(&raster), &[]))?.is_none());
		Ok(())
	}

	#[test]
	fn no_raster_builds_segments_on_the_fallback_grid() -> Result<()> {
		let rooms = [floor_room(1)];
		let map = MapBuilder::new(config())
			.build(&input(None, &rooms))?
			.expect("map is published");
		assert!(map.floor_layer().is_none());
		assert_eq!(map.transform.width_px, 800);
		assert_eq!(map.segment_layers().count(), 1);
		Ok(())
	}

	#[test]
	fn entities_are_projected_and_ordered() -> Result<()> {
		let raster = raster();
		let robot = RobotPose {
			x_mm: -250,
			y_mm: 250,
			angle_deg: 45.0,
		};
		let charger = RobotPose {
			x_mm: 0,
			y_mm: 0,
			angle_deg: 0.0,
		};
		let path = [
			TracePoint { x_mm: -250, y_mm: 250, flag: 0 },
			TracePoint { x_mm: -230, y_mm: 250, flag: 0 },
			TracePoint { x_mm: -200, y_mm: 250, flag: 0 },
		];
		let walls = [
			VirtualWall {
				vwid: 1,
				kind: VirtualWallKind::Regular,
				dots: vec![WorldPoint::new(-400, 0), WorldPoint::new(0, 0)],
			},
			VirtualWall {
				vwid: 2,
				kind: VirtualWallKind::NoMop,
				dots: vec![
					WorldPoint::new(0, 0),
					WorldPoint::new(200, 0),
					WorldPoint::new(200, 200),
					WorldPoint::new(0, 200),
				],
			},
		];
		let map = MapBuilder::new(config())
			.build(&MapInput {
				raster: Some(&raster),
				rooms: &[],
				walls: &walls,
				robot: Some(robot),
				charger: Some(charger),
				path: &path,
			})?
			.expect("map is published");

		let kinds: Vec<EntityKind> = map.entities.iter().map(|e| e.kind).collect();
		assert_eq!(
			kinds,
			vec![
				EntityKind::Charger,
				EntityKind::Robot,
				EntityKind::Path,
				EntityKind::VirtualWall,
				EntityKind::NoMop,
			]
		);

		assert_eq!(map.entities[0].points, vec![GridPoint::new(10, 10)]);
		assert_eq!(map.entities[1].points, vec![GridPoint::new(5, 5)]);
		assert_eq!(map.entities[1].angle_deg, Some(45.0));
		// 20 mm is less than half a pixel; the middle point deduplicates.
		assert_eq!(map.entities[2].points.len(), 2);
		assert_eq!(map.entities[4].points.len(), 4);
		Ok(())
	}

	#[test]
	fn degenerate_room_is_skipped() -> Result<()> {
		let raster = raster();
		let rooms = [Room {
			polygon: vec![WorldPoint::new(0, 0)],
			..floor_room(9)
		}];
		let map = MapBuilder::new(config())
			.build(&input(Some(&raster), &rooms))?
			.expect("map is published");
		assert_eq!(map.segment_layers().count(), 0);
		Ok(())
	}
}
