//! The typed upward facade.
//!
//! Capability adapters in the orchestration layer hold a [`Robot`] and
//! dispatch to these operations; the core never knows about capability
//! types. Every operation is async and fails with a
//! [`deebot_core::RobotError`] kind.

use crate::{FanPreset, MdsctlCommand, Orchestrator, RobotEvent, WaterPreset};
use deebot_core::{Result, RobotError, WorldPoint};
use deebot_map::RobotMap;
use deebot_proto::{
	CleanStatistics, LifespanPart, PartLife, VirtualWall, VirtualWallKind, WorkType,
	services::work::RemoteMove,
};
use log::info;
use std::sync::Arc;
use tokio::{sync::broadcast, task::JoinHandle};

/// A requested virtual restriction, before the firmware assigns an id.
#[derive(Clone, Debug, PartialEq)]
pub struct RestrictionRequest {
	pub kind: VirtualWallKind,
	pub dots: Vec<WorldPoint>,
}

/// Handle to a running robot integration.
pub struct Robot {
	orchestrator: Arc<Orchestrator>,
	tasks: Vec<JoinHandle<()>>,
}

impl Robot {
	/// Connects to the robot's ROS master and starts the polling loops.
	pub fn connect(config: deebot_core::Config) -> Result<Robot> {
		let orchestrator = Orchestrator::new(config)?;
		let tasks = orchestrator.start();
		Ok(Robot { orchestrator, tasks })
	}

	/// A facade over an orchestrator whose loops were not started. Used
	/// by one-shot tooling.
	pub fn without_loops(config: deebot_core::Config) -> Result<Robot> {
		Ok(Robot {
			orchestrator: Orchestrator::new(config)?,
			tasks: Vec::new(),
		})
	}

	/// Stops the loops, flushes state and waits for task termination.
	pub async fn shutdown(mut self) {
		self.orchestrator.shutdown().await;
		futures::future::join_all(self.tasks.drain(..)).await;
	}

	/// The change-event stream.
	#[must_use]
	pub fn events(&self) -> broadcast::Receiver<RobotEvent> {
		self.orchestrator.subscribe()
	}

	// ----- map -------------------------------------------------------------

	/// The most recently published map.
	pub async fn map_snapshot(&self) -> Option<Arc<RobotMap>> {
		self.orchestrator.map_snapshot().await
	}

	/// Schedules a full map poll.
	pub fn request_map_refresh(&self) {
		self.orchestrator.request_map_refresh();
	}

	pub async fn active_map_id(&self) -> Result<u32> {
		self.orchestrator.active_map_id().await
	}

	/// The rooms of the active map, fetched fresh.
	pub async fn rooms(&self) -> Result<Vec<deebot_proto::Room>> {
		let mapid = self.orchestrator.active_map_id().await?;
		Ok(self.orchestrator.services.spot_area.rooms(mapid).await?.rooms)
	}

	// ----- virtual restrictions --------------------------------------------

	pub async fn virtual_restrictions(&self) -> Result<Vec<VirtualWall>> {
		let mapid = self.orchestrator.active_map_id().await?;
		self.orchestrator.services.virtual_wall.virtual_walls(mapid).await
	}

	/// Replaces the full restriction set: deletes every existing one, then
	/// adds the requested ones.
	pub async fn set_virtual_restrictions(&self, requests: &[RestrictionRequest]) -> Result<()> {
		let mapid = self.orchestrator.active_map_id().await?;
		let existing = self.orchestrator.services.virtual_wall.virtual_walls(mapid).await?;
		for wall in existing {
			self
				.orchestrator
				.services
				.virtual_wall
				.delete_restriction(mapid, wall.vwid)
				.await?;
		}
		for request in requests {
			self
				.orchestrator
				.services
				.virtual_wall
				.add_restriction(mapid, request.kind, &request.dots)
				.await?;
		}
		self.orchestrator.request_map_refresh();
		Ok(())
	}

	// ----- segments --------------------------------------------------------

	/// Starts cleaning the given segments.
	pub async fn execute_segment_action(&self, areaids: &[u32]) -> Result<()> {
		self.orchestrator.active_map_id().await?;
		self.orchestrator.services.work.start_area_clean(areaids).await
	}

	pub async fn rename_segment(&self, areaid: u32, label_id: u8) -> Result<()> {
		let mapid = self.orchestrator.active_map_id().await?;
		self
			.orchestrator
			.services
			.spot_area
			.set_room_label(mapid, areaid, label_id)
			.await?;
		self.orchestrator.request_map_refresh();
		Ok(())
	}

	pub async fn set_room_cleaning_preferences(
		&self,
		areaid: u32,
		times: u8,
		water: u8,
		suction: u8,
	) -> Result<()> {
		let mapid = self.orchestrator.active_map_id().await?;
		self
			.orchestrator
			.services
			.spot_area
			.set_room_cleaning_preferences(mapid, areaid, times, water, suction)
			.await
	}

	pub async fn set_room_sequence(&self, order: &[(u32, u8)]) -> Result<()> {
		let mapid = self.orchestrator.active_map_id().await?;
		self.orchestrator.services.spot_area.set_room_sequence(mapid, order).await
	}

	// ----- basic control ---------------------------------------------------

	pub async fn start_cleaning(&self) -> Result<()> {
		self.orchestrator.services.work.start_auto_clean().await
	}

	/// Cleans custom rectangles given in world millimeters.
	pub async fn start_custom_cleaning(&self, rects: &[(WorldPoint, WorldPoint)]) -> Result<()> {
		self.orchestrator.services.work.start_custom_clean(rects).await
	}

	pub async fn stop_cleaning(&self) -> Result<()> {
		self.orchestrator.services.work.stop_clean().await
	}

	pub async fn pause(&self) -> Result<()> {
		let worktype = self.current_worktype().await;
		self.orchestrator.services.work.pause(worktype).await
	}

	pub async fn resume(&self) -> Result<()> {
		let worktype = self.current_worktype().await;
		self.orchestrator.services.work.resume(worktype).await
	}

	pub async fn return_home(&self) -> Result<()> {
		self.orchestrator.services.work.return_to_dock().await
	}

	pub async fn empty_dust_bin(&self) -> Result<()> {
		self.orchestrator.services.work.collect_dust().await
	}

	async fn current_worktype(&self) -> WorkType {
		let stale = std::time::Duration::from_millis(self.orchestrator.config().work_state_stale_after_ms);
		self
			.orchestrator
			.topic_work_state(stale)
			.map_or(WorkType::Auto, |work| work.worktype)
	}

	// ----- manual control --------------------------------------------------

	/// Opens a manual-control session. Requires the configured session
	/// code; the vendor daemon refuses the live channel without it.
	pub async fn open_manual_control(&self, code: &str) -> Result<()> {
		let expected = self
			.orchestrator
			.config()
			.manual_control_session_code
			.clone()
			.ok_or_else(|| {
				RobotError::InvalidArgument("manualControlSessionCode is not configured".to_string())
			})?;
		if code != expected {
			return Err(RobotError::InvalidArgument(
				"manual control session code mismatch".to_string(),
			));
		}

		self.orchestrator.mdsctl.send(&MdsctlCommand::SetPwdState { state: 1 }).await?;
		self
			.orchestrator
			.mdsctl
			.send(&MdsctlCommand::LiveLaunchPwdState {
				state: 1,
				password: expected,
			})
			.await?;
		self
			.orchestrator
			.mdsctl
			.send(&MdsctlCommand::StartPushStream { light_state: 1 })
			.await?;
		self.orchestrator.set_manual_session(true).await;
		info!("manual control session opened");
		Ok(())
	}

	pub async fn close_manual_control(&self) -> Result<()> {
		self.orchestrator.mdsctl.send(&MdsctlCommand::StopPushStream).await?;
		self.orchestrator.mdsctl.send(&MdsctlCommand::SetPwdState { state: 0 }).await?;
		self.orchestrator.set_manual_session(false).await;
		info!("manual control session closed");
		Ok(())
	}

	pub async fn manual_move(&self, verb: RemoteMove, angular: Option<i16>) -> Result<()> {
		if !self.orchestrator.manual_session_open().await {
			return Err(RobotError::InvalidArgument(
				"no manual control session is open".to_string(),
			));
		}
		self.orchestrator.services.work.remote_move(verb, angular).await
	}

	// ----- presets ---------------------------------------------------------

	pub async fn fan_preset(&self) -> Result<FanPreset> {
		if let Some((fan, _)) = self.orchestrator.current_presets().await {
			return Ok(fan);
		}
		Ok(FanPreset::from_value(self.orchestrator.services.setting.fan_mode().await?))
	}

	pub async fn set_fan_preset(&self, preset: FanPreset) -> Result<()> {
		self.orchestrator.services.setting.set_fan_mode(preset.to_value()).await
	}

	pub async fn water_preset(&self) -> Result<WaterPreset> {
		if let Some((_, water)) = self.orchestrator.current_presets().await {
			return Ok(water);
		}
		Ok(WaterPreset::from_value(
			self.orchestrator.services.setting.water_level().await?,
		))
	}

	pub async fn set_water_preset(&self, preset: WaterPreset) -> Result<()> {
		self
			.orchestrator
			.services
			.setting
			.set_water_level(preset.to_value())
			.await
	}

	// ----- consumables and statistics --------------------------------------

	/// Remaining life of all tracked consumables.
	pub async fn consumables(&self) -> Result<Vec<PartLife>> {
		self.orchestrator.services.lifespan.lifespan(LifespanPart::All).await
	}

	pub async fn reset_consumable(&self, part: LifespanPart) -> Result<()> {
		self.orchestrator.services.lifespan.reset(part).await
	}

	pub async fn total_statistics(&self) -> Result<CleanStatistics> {
		self.orchestrator.services.statistics.total_statistics().await
	}

	pub async fn last_clean_statistics(&self) -> Result<CleanStatistics> {
		self.orchestrator.services.statistics.last_clean_statistics().await
	}

	/// Statistics of the clean currently running, from the live topic.
	/// `None` while the robot is idle or the value went stale.
	pub async fn live_statistics(&self) -> Option<CleanStatistics> {
		let stale = std::time::Duration::from_millis(self.orchestrator.config().power_state_stale_after_ms);
		self.orchestrator.topic_statistics(stale)
	}

	// ----- toggles ---------------------------------------------------------

	pub async fn carpet_boost(&self) -> Result<bool> {
		self.orchestrator.services.setting.suction_boost_on_carpet().await
	}

	pub async fn set_carpet_boost(&self, enabled: bool) -> Result<()> {
		self
			.orchestrator
			.services
			.setting
			.set_suction_boost_on_carpet(enabled)
			.await
	}

	pub async fn room_preferences_enabled(&self) -> Result<bool> {
		self.orchestrator.services.setting.room_preferences_enabled().await
	}

	pub async fn set_room_preferences_enabled(&self, enabled: bool) -> Result<()> {
		self
			.orchestrator
			.services
			.setting
			.set_room_preferences_enabled(enabled)
			.await
	}

	pub async fn auto_collect_enabled(&self) -> Result<bool> {
		self.orchestrator.services.setting.auto_collect_enabled().await
	}

	pub async fn set_auto_collect_enabled(&self, enabled: bool) -> Result<()> {
		self
			.orchestrator
			.services
			.setting
			.set_auto_collect_enabled(enabled)
			.await
	}

	/// Plays one of the robot's canned voice files.
	pub async fn play_audio(&self, file_number: u32) -> Result<()> {
		self
			.orchestrator
			.mdsctl
			.send(&MdsctlCommand::play_audio(file_number))
			.await
			.map(|_| ())
	}
}
