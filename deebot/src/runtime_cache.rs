//! Persisted runtime state.
//!
//! The firmware forgets pose and charge information across its own daemon
//! restarts, so the last known values are cached on disk: loaded at
//! startup, updated in memory on every runtime-state poll, written with a
//! debounce and flushed once on shutdown.

use deebot_proto::{ChargeState, RobotPose};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::{
	path::{Path, PathBuf},
	time::{Duration, Instant},
};

/// The cached values. All optional; a fresh install starts empty.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RuntimeState {
	pub robot_pose: Option<RobotPose>,
	pub battery: Option<u8>,
	pub charge_state: Option<ChargeState>,
}

/// Disk-backed runtime state with debounced writes.
pub struct RuntimeCache {
	path: PathBuf,
	state: RuntimeState,
	dirty: bool,
	last_write: Option<Instant>,
	write_min_interval: Duration,
}

impl RuntimeCache {
	/// Loads the cache, falling back to an empty state on a missing or
	/// unreadable file.
	#[must_use]
	pub fn load(path: &Path, write_min_interval: Duration) -> RuntimeCache {
		let state = match std::fs::read_to_string(path) {
			Ok(text) => match serde_json::from_str(&text) {
				Ok(state) => state,
				Err(e) => {
					warn!("runtime cache {} is corrupt ({e}), starting empty", path.display());
					RuntimeState::default()
				}
			},
			Err(e) => {
				debug!("runtime cache {} not loaded: {e}", path.display());
				RuntimeState::default()
			}
		};
		RuntimeCache {
			path: path.to_path_buf(),
			state,
			dirty: false,
			last_write: None,
			write_min_interval,
		}
	}

	#[must_use]
	pub fn state(&self) -> &RuntimeState {
		&self.state
	}

	/// Merges newly observed values. Fields stay untouched when `None`.
	/// Returns whether anything changed.
	pub fn update(
		&mut self,
		robot_pose: Option<RobotPose>,
		battery: Option<u8>,
		charge_state: Option<ChargeState>,
	) -> bool {
		let mut changed = false;
		if robot_pose.is_some() && robot_pose != self.state.robot_pose {
			self.state.robot_pose = robot_pose;
			changed = true;
		}
		if battery.is_some() && battery != self.state.battery {
			self.state.battery = battery;
			changed = true;
		}
		if charge_state.is_some() && charge_state != self.state.charge_state {
			self.state.charge_state = charge_state;
			changed = true;
		}
		if changed {
			self.dirty = true;
		}
		changed
	}

	/// Writes the state if it is dirty and the debounce window has passed.
	pub fn maybe_flush(&mut self) {
		if !self.dirty {
			return;
		}
		if let Some(last) = self.last_write {
			if last.elapsed() < self.write_min_interval {
				return;
			}
		}
		self.flush();
	}

	/// Writes the state unconditionally if dirty. Called on shutdown.
	pub fn flush(&mut self) {
		if !self.dirty {
			return;
		}
		match serde_json::to_string(&self.state) {
			Ok(json) => match std::fs::write(&self.path, json) {
				Ok(()) => {
					self.dirty = false;
					self.last_write = Some(Instant::now());
					debug!("runtime cache written to {}", self.path.display());
				}
				Err(e) => warn!("runtime cache write to {} failed: {e}", self.path.display()),
			},
			Err(e) => warn!("runtime cache serialization failed: {e}"),
		}
	}
}
