//! The change-event stream published to the capability layer.

use crate::{BatteryFlag, FanPreset, RobotStatus, StatusError, WaterPreset};
use deebot_map::RobotMap;
use std::sync::Arc;

/// Events emitted by the orchestrator. All deduplicated at value level:
/// an event fires only when the carried value actually changed.
#[derive(Clone, Debug)]
pub enum RobotEvent {
	StatusChanged {
		status: RobotStatus,
		error: Option<StatusError>,
	},
	BatteryChanged {
		level: u8,
		flag: Option<BatteryFlag>,
	},
	MapUpdated(Arc<RobotMap>),
	SettingsChanged {
		fan: FanPreset,
		water: WaterPreset,
	},
}
