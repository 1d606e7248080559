//! Configuration model.
//!
//! One field per configuration key, all optional in the YAML file. Key names
//! are camelCase on disk to match the orchestration layer's config format.
//!
//! ```yaml
//! rosMasterUri: "http://127.0.0.1:11311"
//! detailedMapRotationDegrees: 270
//! tracePathEnabled: true
//! ```

use crate::{RobotError, Result};
use serde::Deserialize;
use std::{path::Path, time::Duration};

/// Full configuration of the robot integration.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Config {
	/// XML-RPC base URI of the ROS master.
	#[serde(default = "default_master_uri")]
	pub ros_master_uri: String,

	/// Caller id advertised in handshakes and XML-RPC calls.
	#[serde(default = "default_caller_id")]
	pub ros_caller_id: String,

	/// TCP connect timeout in milliseconds.
	#[serde(default = "default_connect_timeout_ms")]
	pub ros_connect_timeout_ms: u64,

	/// Per-call read timeout in milliseconds.
	#[serde(default = "default_call_timeout_ms")]
	pub ros_call_timeout_ms: u64,

	/// Emit verbose transport diagnostics.
	#[serde(default)]
	pub ros_debug: bool,

	/// Path of the mdsctl Unix socket.
	#[serde(default = "default_mdsctl_socket_path")]
	pub mdsctl_socket_path: String,

	/// mdsctl command timeout in milliseconds.
	#[serde(default = "default_mdsctl_timeout_ms")]
	pub mdsctl_timeout_ms: u64,

	/// Secret required to open a remote manual-control session.
	#[serde(default)]
	pub manual_control_session_code: Option<String>,

	/// Map rotation, one of 0, 90, 180, 270. Out-of-range values fall back
	/// to 270 at validation time.
	#[serde(default = "default_rotation")]
	pub detailed_map_rotation_degrees: u16,

	/// Millimeters of world space per published map pixel. Must be positive.
	#[serde(default = "default_mm_per_pixel")]
	pub detailed_map_world_mm_per_pixel: f64,

	/// Skip publishing a map whose layers exceed this many pixels in total.
	#[serde(default = "default_max_layer_pixels")]
	pub detailed_map_max_layer_pixels: usize,

	/// Skip publishing a map with fewer floor pixels than this.
	#[serde(default = "default_min_floor_pixels")]
	pub detailed_map_min_floor_pixels: usize,

	/// TTL of the compressed-raster cache in milliseconds.
	#[serde(default = "default_map_refresh_interval_ms")]
	pub detailed_map_refresh_interval_ms: u64,

	/// Dynamic-entity poll cadence in milliseconds.
	#[serde(default = "default_live_poll_interval_ms")]
	pub live_position_poll_interval_ms: u64,

	/// Runtime-state poll cadence in milliseconds.
	#[serde(default = "default_power_poll_interval_ms")]
	pub power_state_poll_interval_ms: u64,

	/// Settings poll cadence in milliseconds.
	#[serde(default = "default_settings_poll_interval_ms")]
	pub cleaning_settings_poll_interval_ms: u64,

	/// Staleness window for battery and charge topic reads, milliseconds.
	#[serde(default = "default_power_stale_after_ms")]
	pub power_state_stale_after_ms: u64,

	/// Staleness window for work-state topic reads, milliseconds.
	#[serde(default = "default_work_stale_after_ms")]
	pub work_state_stale_after_ms: u64,

	/// Gate trace polling.
	#[serde(default = "default_true")]
	pub trace_path_enabled: bool,

	/// Coordinate scale of decoded trace points: raw units per
	/// `unit / 100` millimeters. The observed firmware value 10 means raw
	/// values are tenths of a millimeter.
	#[serde(default = "default_trace_unit_mm")]
	pub trace_point_unit_mm: u16,

	/// FIFO cap of the live trace buffer.
	#[serde(default = "default_trace_max_points")]
	pub trace_path_max_points: usize,

	/// How many tail chunks to request per trace poll.
	#[serde(default = "default_trace_tail_entries")]
	pub trace_tail_entries: u16,

	/// Path of the persisted runtime-state cache.
	#[serde(default = "default_runtime_cache_path")]
	pub runtime_state_cache_path: String,

	/// Minimum interval between runtime-cache disk writes, milliseconds.
	#[serde(default = "default_cache_write_min_interval_ms")]
	pub runtime_state_cache_write_min_interval_ms: u64,
}

fn default_master_uri() -> String {
	"http://127.0.0.1:11311".to_string()
}
fn default_caller_id() -> String {
	"/deebot_bridge".to_string()
}
fn default_connect_timeout_ms() -> u64 {
	3000
}
fn default_call_timeout_ms() -> u64 {
	5000
}
fn default_mdsctl_socket_path() -> String {
	"/tmp/mds_cmd.sock".to_string()
}
fn default_mdsctl_timeout_ms() -> u64 {
	2000
}
fn default_rotation() -> u16 {
	270
}
fn default_mm_per_pixel() -> f64 {
	50.0
}
fn default_max_layer_pixels() -> usize {
	500_000
}
fn default_min_floor_pixels() -> usize {
	50
}
fn default_map_refresh_interval_ms() -> u64 {
	60_000
}
fn default_live_poll_interval_ms() -> u64 {
	2000
}
fn default_power_poll_interval_ms() -> u64 {
	5000
}
fn default_settings_poll_interval_ms() -> u64 {
	30_000
}
fn default_power_stale_after_ms() -> u64 {
	30_000
}
fn default_work_stale_after_ms() -> u64 {
	15_000
}
fn default_true() -> bool {
	true
}
fn default_trace_unit_mm() -> u16 {
	10
}
fn default_trace_max_points() -> usize {
	5000
}
fn default_trace_tail_entries() -> u16 {
	200
}
fn default_runtime_cache_path() -> String {
	"/tmp/valetudo_ecovacs_runtime_state.json".to_string()
}
fn default_cache_write_min_interval_ms() -> u64 {
	10_000
}

impl Default for Config {
	fn default() -> Config {
		serde_yaml_ng::from_str("{}").expect("defaults are complete")
	}
}

impl Config {
	/// Parses a YAML config document and normalizes it.
	pub fn from_string(yaml: &str) -> Result<Config> {
		let mut config: Config = serde_yaml_ng::from_str(yaml)
			.map_err(|e| RobotError::InvalidArgument(format!("config: {e}")))?;
		config.validate()?;
		Ok(config)
	}

	/// Reads and parses a YAML config file.
	pub fn from_path(path: &Path) -> Result<Config> {
		let text = std::fs::read_to_string(path)
			.map_err(|e| RobotError::InvalidArgument(format!("config {}: {e}", path.display())))?;
		Config::from_string(&text)
	}

	/// Normalizes and checks the configuration.
	///
	/// An unknown rotation falls back to 270; a non-positive pixel scale is
	/// a hard error because the map transform divides by it.
	pub fn validate(&mut self) -> Result<()> {
		if !matches!(self.detailed_map_rotation_degrees, 0 | 90 | 180 | 270) {
			log::warn!(
				"detailedMapRotationDegrees {} is not a multiple of 90, falling back to 270",
				self.detailed_map_rotation_degrees
			);
			self.detailed_map_rotation_degrees = 270;
		}
		if self.detailed_map_world_mm_per_pixel <= 0.0 {
			return Err(RobotError::InvalidArgument(
				"detailedMapWorldMmPerPixel must be positive".to_string(),
			));
		}
		Ok(())
	}

	#[must_use]
	pub fn connect_timeout(&self) -> Duration {
		Duration::from_millis(self.ros_connect_timeout_ms)
	}

	#[must_use]
	pub fn call_timeout(&self) -> Duration {
		Duration::from_millis(self.ros_call_timeout_ms)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn defaults_are_sane() {
		let config = Config::default();
		assert_eq!(config.ros_master_uri, "http://127.0.0.1:11311");
		assert_eq!(config.mdsctl_socket_path, "/tmp/mds_cmd.sock");
		assert_eq!(config.detailed_map_rotation_degrees, 270);
		assert!(config.trace_path_enabled);
	}

	#[test]
	fn parses_partial_yaml() -> Result<()> {
		let config = Config::from_string("rosCallerId: /test\ndetailedMapRotationDegrees: 90\n")?;
		assert_eq!(config.ros_caller_id, "/test");
		assert_eq!(config.detailed_map_rotation_degrees, 90);
		assert_eq!(config.ros_call_timeout_ms, 5000);
		Ok(())
	}

	#[rstest::rstest]
	#[case(45, 270)]
	#[case(91, 270)]
	#[case(360, 270)]
	#[case(90, 90)]
	#[case(0, 0)]
	fn rotation_normalization(#[case] configured: u16, #[case] expected: u16) -> Result<()> {
		let config = Config::from_string(&format!("detailedMapRotationDegrees: {configured}\n"))?;
		assert_eq!(config.detailed_map_rotation_degrees, expected);
		Ok(())
	}

	#[test]
	fn non_positive_pixel_scale_is_rejected() {
		let err = Config::from_string("detailedMapWorldMmPerPixel: 0\n").unwrap_err();
		assert!(matches!(err, RobotError::InvalidArgument(_)));
	}

	#[test]
	fn unknown_keys_are_rejected() {
		assert!(Config::from_string("definitelyNotAKey: 1\n").is_err());
	}
}
