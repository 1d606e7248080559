//! Domain structures decoded from the firmware protocol.

use deebot_core::WorldPoint;
use serde::{Deserialize, Serialize};

/// Cleaning preferences the firmware stores per room.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomPreferences {
	pub suction: u8,
	pub water: u8,
	pub times: u8,
	pub sequence: u8,
}

/// One room of the active map.
///
/// `areaid` is the stable segment identifier exposed upward; the firmware
/// may reassign it after a merge or split.
#[derive(Clone, Debug, PartialEq)]
pub struct Room {
	pub areaid: u32,
	pub label_id: u8,
	pub polygon: Vec<WorldPoint>,
	pub connections: Vec<u8>,
	pub preferences: RoomPreferences,
}

impl Room {
	/// Human-readable name of the firmware label, if the label is known.
	#[must_use]
	pub fn label_name(&self) -> Option<&'static str> {
		label_name(self.label_id)
	}
}

/// Firmware room label table. Unknown ids stay unnamed rather than guessing.
#[must_use]
pub fn label_name(label_id: u8) -> Option<&'static str> {
	Some(match label_id {
		0 => "Default",
		1 => "Living Room",
		2 => "Dining Room",
		3 => "Bedroom",
		4 => "Study",
		5 => "Kitchen",
		6 => "Bathroom",
		7 => "Laundry",
		8 => "Lounge",
		9 => "Storeroom",
		10 => "Kids Room",
		11 => "Sunroom",
		12 => "Corridor",
		13 => "Balcony",
		14 => "Gym",
		_ => return None,
	})
}

/// Virtual restriction kinds as the firmware encodes them.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VirtualWallKind {
	/// A regular keep-out: a line for two dots, a no-go zone for more.
	Regular,
	/// A mopping-only keep-out zone.
	NoMop,
}

impl VirtualWallKind {
	#[must_use]
	pub fn to_u8(self) -> u8 {
		match self {
			VirtualWallKind::Regular => 0,
			VirtualWallKind::NoMop => 1,
		}
	}

	#[must_use]
	pub fn from_u8(value: u8) -> VirtualWallKind {
		if value == 1 {
			VirtualWallKind::NoMop
		} else {
			VirtualWallKind::Regular
		}
	}
}

/// One virtual restriction. Two dots are a line wall, three or more span a
/// rectangular zone.
#[derive(Clone, Debug, PartialEq)]
pub struct VirtualWall {
	pub vwid: u32,
	pub kind: VirtualWallKind,
	pub dots: Vec<WorldPoint>,
}

/// What the robot is currently doing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkType {
	Auto,
	Area,
	Custom,
	Return,
	RemoteControl,
	Goto,
	Unknown(u8),
}

impl WorkType {
	#[must_use]
	pub fn to_u8(self) -> u8 {
		match self {
			WorkType::Auto => 0,
			WorkType::Area => 1,
			WorkType::Custom => 2,
			WorkType::Return => 3,
			WorkType::RemoteControl => 4,
			WorkType::Goto => 5,
			WorkType::Unknown(value) => value,
		}
	}

	#[must_use]
	pub fn from_u8(value: u8) -> WorkType {
		match value {
			0 => WorkType::Auto,
			1 => WorkType::Area,
			2 => WorkType::Custom,
			3 => WorkType::Return,
			4 => WorkType::RemoteControl,
			5 => WorkType::Goto,
			other => WorkType::Unknown(other),
		}
	}
}

/// Lifecycle phase of the current work unit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkPhase {
	Idle,
	Running,
	Paused,
}

impl WorkPhase {
	#[must_use]
	pub fn from_u8(value: u8) -> WorkPhase {
		match value {
			1 => WorkPhase::Running,
			2 => WorkPhase::Paused,
			_ => WorkPhase::Idle,
		}
	}
}

/// Work-state topic value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WorkState {
	pub worktype: WorkType,
	pub phase: WorkPhase,
	pub workcause: u8,
}

/// Charge-state topic value. Persisted in the runtime cache.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChargeState {
	pub is_on_charger: u8,
	pub charge_state: u8,
}

/// A firmware-reported condition with an on/off state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Alert {
	pub alert_type: u16,
	pub state: u8,
}

impl Alert {
	#[must_use]
	pub fn is_triggered(&self) -> bool {
		self.state == 1
	}
}

/// Robot pose in world millimeters with heading in degrees.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RobotPose {
	pub x_mm: i32,
	pub y_mm: i32,
	pub angle_deg: f32,
}

impl RobotPose {
	#[must_use]
	pub fn position(&self) -> WorldPoint {
		WorldPoint::new(self.x_mm, self.y_mm)
	}
}

/// Robot and charger positions as the position service reports them.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Positions {
	pub robot: RobotPose,
	pub charger: Option<RobotPose>,
}

/// Accumulated or per-run cleaning statistics.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanStatistics {
	pub area_m2: u32,
	pub duration_s: u32,
	pub count: u32,
}

/// Consumable parts tracked by the lifespan service.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LifespanPart {
	MainBrush,
	SideBrush,
	Hepa,
	All,
}

impl LifespanPart {
	#[must_use]
	pub fn to_u8(self) -> u8 {
		match self {
			LifespanPart::All => 0,
			LifespanPart::MainBrush => 1,
			LifespanPart::SideBrush => 2,
			LifespanPart::Hepa => 3,
		}
	}

	#[must_use]
	pub fn from_u8(value: u8) -> Option<LifespanPart> {
		Some(match value {
			0 => LifespanPart::All,
			1 => LifespanPart::MainBrush,
			2 => LifespanPart::SideBrush,
			3 => LifespanPart::Hepa,
			_ => return None,
		})
	}
}

/// Remaining life of one consumable.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PartLife {
	pub part: LifespanPart,
	pub left: u16,
	pub total: u16,
}

impl PartLife {
	/// Remaining life as a percentage, clamped to 0..=100.
	#[must_use]
	pub fn percent(&self) -> u8 {
		if self.total == 0 {
			return 0;
		}
		let percent = u32::from(self.left) * 100 / u32::from(self.total);
		percent.min(100) as u8
	}
}

/// Geometry header of a compressed map response, already normalized.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CompressedMapInfo {
	pub map_width: u32,
	pub map_height: u32,
	pub columns: u32,
	pub rows: u32,
	pub submap_width: u32,
	pub submap_height: u32,
	pub resolution_cm: u16,
}

impl CompressedMapInfo {
	/// Applies the firmware resolution heuristic: values of 20 and above
	/// are millimeters, smaller ones are already centimeters.
	#[must_use]
	pub fn normalize_resolution(raw: u16) -> u16 {
		if raw >= 20 { raw / 10 } else { raw }
	}
}

/// Raw compressed map: geometry header plus one LZMA payload per tile.
#[derive(Clone, Debug, PartialEq)]
pub struct CompressedMapResponse {
	pub mapid: u32,
	pub info: CompressedMapInfo,
	pub submaps: Vec<Vec<u8>>,
}

/// One decoded point of the robot's driven path.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TracePoint {
	pub x_mm: i32,
	pub y_mm: i32,
	pub flag: u8,
}
