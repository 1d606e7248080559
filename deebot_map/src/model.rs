//! The normalized layered map model published upward.

use crate::MapTransform;
use deebot_core::GridPoint;
use deebot_proto::RoomPreferences;
use serde::Serialize;

/// Layer kinds in their fixed emission order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LayerKind {
	Floor,
	Wall,
	Segment,
}

/// Metadata carried by segment layers.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentMeta {
	/// The firmware `areaid`, stable across polls of one map.
	pub segment_id: u32,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub name: Option<String>,
	pub room_cleaning_preferences: RoomPreferences,
}

/// One pixel layer of the map.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MapLayer {
	#[serde(rename = "type")]
	pub kind: LayerKind,
	/// Sorted in `(y, x)` order; consumers and tests rely on determinism.
	pub pixels: Vec<GridPoint>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub meta: Option<SegmentMeta>,
}

/// Entity kinds overlaid on the layers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum EntityKind {
	Robot,
	Charger,
	Path,
	NoGo,
	NoMop,
	VirtualWall,
}

/// One point or polyline entity.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MapEntity {
	#[serde(rename = "type")]
	pub kind: EntityKind,
	pub points: Vec<GridPoint>,
	/// Robot heading, degrees. Only the robot entity carries one.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub angle_deg: Option<f32>,
}

/// Physical map size in centimeters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct MapSize {
	pub x: u32,
	pub y: u32,
}

/// The published map: static layers, dynamic entities and the transform
/// they were projected with.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RobotMap {
	pub size_cm: MapSize,
	pub pixel_size_cm: f64,
	pub layers: Vec<MapLayer>,
	pub entities: Vec<MapEntity>,
	pub transform: MapTransform,
}

impl RobotMap {
	/// The floor layer, if the raster survived the coverage check.
	#[must_use]
	pub fn floor_layer(&self) -> Option<&MapLayer> {
		self.layers.iter().find(|layer| layer.kind == LayerKind::Floor)
	}

	#[must_use]
	pub fn segment_layers(&self) -> impl Iterator<Item = &MapLayer> {
		self.layers.iter().filter(|layer| layer.kind == LayerKind::Segment)
	}

	/// True when layers and entities match, ignoring nothing; used by the
	/// live poll to publish only real changes.
	#[must_use]
	pub fn same_entities(&self, entities: &[MapEntity]) -> bool {
		self.entities == entities
	}
}
