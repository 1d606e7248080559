//! Decoders for the topic messages the runtime state is derived from.
//!
//! All are fixed little-endian layouts. Decoders are plain functions so
//! subscribers can store them as function pointers.

use crate::{ChargeState, CleanStatistics, RobotPose, WorkPhase, WorkState, WorkType};
use deebot_core::{Result, io::PayloadReader};
use deebot_ros::{ResolveMode, TopicEndpoint};

/// Battery level topic: a single percent byte.
pub fn decode_battery(payload: &[u8]) -> Result<u8> {
	PayloadReader::new(payload).read_u8()
}

/// Charge-state topic: on-charger flag and charge phase.
pub fn decode_charge_state(payload: &[u8]) -> Result<ChargeState> {
	let mut reader = PayloadReader::new(payload);
	Ok(ChargeState {
		is_on_charger: reader.read_u8()?,
		charge_state: reader.read_u8()?,
	})
}

/// Work-state topic: work type, lifecycle phase and cause.
pub fn decode_work_state(payload: &[u8]) -> Result<WorkState> {
	let mut reader = PayloadReader::new(payload);
	Ok(WorkState {
		worktype: WorkType::from_u8(reader.read_u8()?),
		phase: WorkPhase::from_u8(reader.read_u8()?),
		workcause: reader.read_u8()?,
	})
}

/// Pose topic: meters and radians as floats, normalized to millimeters
/// and degrees.
pub fn decode_pose(payload: &[u8]) -> Result<RobotPose> {
	let mut reader = PayloadReader::new(payload);
	let x_m = reader.read_f32()?;
	let y_m = reader.read_f32()?;
	let yaw_rad = reader.read_f32()?;
	Ok(RobotPose {
		x_mm: (x_m * 1000.0).round() as i32,
		y_mm: (y_m * 1000.0).round() as i32,
		angle_deg: yaw_rad.to_degrees(),
	})
}

/// Live statistics topic, published while a clean runs.
pub fn decode_statistics(payload: &[u8]) -> Result<CleanStatistics> {
	let mut reader = PayloadReader::new(payload);
	Ok(CleanStatistics {
		area_m2: reader.read_u32()?,
		duration_s: reader.read_u32()?,
		count: reader.read_u32()?,
	})
}

/// The battery level topic.
#[must_use]
pub fn battery_endpoint() -> (TopicEndpoint, ResolveMode) {
	(
		TopicEndpoint::new(&["/pltf/brd/battery_info"], "pltf_msgs/BatteryInfo"),
		ResolveMode::Normal,
	)
}

/// The charge state topic.
#[must_use]
pub fn charge_state_endpoint() -> (TopicEndpoint, ResolveMode) {
	(
		TopicEndpoint::new(&["/pltf/charge_state"], "pltf_msgs/ChargeState"),
		ResolveMode::Normal,
	)
}

/// The work state topic.
#[must_use]
pub fn work_state_endpoint() -> (TopicEndpoint, ResolveMode) {
	(
		TopicEndpoint::new(&["/work_manager/work_state"], "work_manager_msgs/WorkState"),
		ResolveMode::Normal,
	)
}

/// The pose topic. Firmware revisions renamed it twice; candidates are
/// tried in order and the first with a publisher wins.
#[must_use]
pub fn pose_endpoint() -> (TopicEndpoint, ResolveMode) {
	(
		TopicEndpoint::new(
			&[
				"/prediction/UpdatePose",
				"/prediction/PredictPose",
				"/prediction/Pose",
			],
			"prediction_msgs/Pose",
		),
		ResolveMode::Normal,
	)
}

/// The live statistics topic. Registering a subscriber for it crashes the
/// firmware's statistics daemon, hence the safe-resolve path.
#[must_use]
pub fn statistics_endpoint() -> (TopicEndpoint, ResolveMode) {
	(
		TopicEndpoint::new(&["/clean/statistics"], "clean_msgs/CleanStatistics"),
		ResolveMode::SafeResolve,
	)
}
