//! The polling orchestrator.
//!
//! Owns the service clients, topic subscribers and all mutable runtime
//! state. Four loops run until shutdown: the triggered full map poll, the
//! serialized live-entity poll, the runtime-state poll and the settings
//! poll. Every published value goes through value-level deduplication.

use crate::{
	DerivedStatus, FanPreset, MdsctlClient, RobotEvent, RuntimeCache, Services, Topics,
	WaterPreset, derive_status,
};
use deebot_core::{Config, Result, RobotError};
use deebot_map::{MapBuilder, MapBuilderConfig, MapInput, RasterMap, RobotMap, assemble_raster};
use deebot_proto::{Room, TraceBuffer, TracePoint, VirtualWall, decode_trace};
use deebot_ros::{EndpointResolver, MasterClient, MasterResolver, MasterTopicResolver, TopicResolver};
use log::{debug, info, warn};
use std::{
	path::Path,
	sync::Arc,
	time::{Duration, Instant},
};
use tokio::{
	sync::{Mutex, Notify, broadcast, watch},
	task::JoinHandle,
	time::sleep,
};

/// Fallback cadence of the full map poll when nobody requests one.
const MAP_POLL_FALLBACK: Duration = Duration::from_secs(15);

/// Capacity of the event channel; a lagging consumer loses oldest events.
const EVENT_CHANNEL_CAPACITY: usize = 64;

struct RasterCache {
	raster: RasterMap,
	mapid: u32,
	fetched_at: Instant,
}

#[derive(Default)]
struct SharedState {
	active_map_id: Option<u32>,
	raster: Option<RasterCache>,
	rooms: Vec<Room>,
	walls: Vec<VirtualWall>,
	trace: TraceBuffer,
	trace_cursor: u16,
	last_map: Option<Arc<RobotMap>>,
	last_status: Option<DerivedStatus>,
	last_battery: Option<u8>,
	presets: Option<(FanPreset, WaterPreset)>,
	manual_session_open: bool,
}

/// The long-running core. Construct with [`Orchestrator::new`], start the
/// loops with [`Orchestrator::start`], stop with
/// [`Orchestrator::shutdown`].
pub struct Orchestrator {
	config: Arc<Config>,
	pub(crate) services: Services,
	topics: Topics,
	pub(crate) mdsctl: MdsctlClient,
	builder: MapBuilder,
	events_tx: broadcast::Sender<RobotEvent>,
	state: Mutex<SharedState>,
	cache: Mutex<RuntimeCache>,
	map_refresh: Notify,
	stop_tx: watch::Sender<bool>,
}

impl Orchestrator {
	pub fn new(config: Config) -> Result<Arc<Orchestrator>> {
		let master = Arc::new(MasterClient::new(
			&config.ros_master_uri,
			&config.ros_caller_id,
			config.call_timeout(),
		)?);
		Self::with_resolvers(
			config,
			Arc::new(MasterResolver::new(master.clone())),
			Arc::new(MasterTopicResolver::new(master)),
		)
	}

	/// Shared constructor; tests pin the resolvers to a fake firmware.
	pub(crate) fn with_resolvers(
		config: Config,
		resolver: Arc<dyn EndpointResolver>,
		topic_resolver: Arc<dyn TopicResolver>,
	) -> Result<Arc<Orchestrator>> {
		let config = Arc::new(config);
		let services = Services::connect(&config, resolver);
		let topics = Topics::spawn(&config, topic_resolver);
		let mdsctl = MdsctlClient::new(
			&config.mdsctl_socket_path,
			Duration::from_millis(config.mdsctl_timeout_ms),
		);
		let builder = MapBuilder::new(MapBuilderConfig {
			rotation_deg: config.detailed_map_rotation_degrees,
			mm_per_pixel: config.detailed_map_world_mm_per_pixel,
			max_layer_pixels: config.detailed_map_max_layer_pixels,
			min_floor_pixels: config.detailed_map_min_floor_pixels,
		});
		let cache = RuntimeCache::load(
			Path::new(&config.runtime_state_cache_path),
			Duration::from_millis(config.runtime_state_cache_write_min_interval_ms),
		);
		let (events_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
		let (stop_tx, _) = watch::channel(false);

		let state = SharedState {
			trace: TraceBuffer::new(config.trace_path_max_points),
			..SharedState::default()
		};

		Ok(Arc::new(Orchestrator {
			config,
			services,
			topics,
			mdsctl,
			builder,
			events_tx,
			state: Mutex::new(state),
			cache: Mutex::new(cache),
			map_refresh: Notify::new(),
			stop_tx,
		}))
	}

	pub(crate) fn config(&self) -> &Config {
		&self.config
	}

	pub fn subscribe(&self) -> broadcast::Receiver<RobotEvent> {
		self.events_tx.subscribe()
	}

	fn emit(&self, event: RobotEvent) {
		// A send error only means nobody is listening right now.
		let _ = self.events_tx.send(event);
	}

	/// Requests one full map poll. Never blocks; polls never overlap.
	pub fn request_map_refresh(&self) {
		self.map_refresh.notify_one();
	}

	/// Spawns the polling loops.
	pub fn start(self: &Arc<Self>) -> Vec<JoinHandle<()>> {
		info!("orchestrator starting");
		vec![
			tokio::spawn(self.clone().map_poll_loop()),
			tokio::spawn(self.clone().live_poll_loop()),
			tokio::spawn(self.clone().runtime_poll_loop()),
			tokio::spawn(self.clone().settings_poll_loop()),
		]
	}

	/// Stops the loops and subscribers and flushes the runtime cache.
	pub async fn shutdown(&self) {
		info!("orchestrator shutting down");
		let _ = self.stop_tx.send(true);
		self.map_refresh.notify_waiters();
		self.topics.shutdown().await;
		self.cache.lock().await.flush();
	}

	fn stopped(&self) -> bool {
		*self.stop_tx.borrow()
	}

	/// The currently active map id, learned on demand.
	pub async fn active_map_id(&self) -> Result<u32> {
		if let Some(mapid) = self.state.lock().await.active_map_id {
			return Ok(mapid);
		}
		let mapid = self
			.services
			.map
			.active_map_id()
			.await
			.map_err(|_| RobotError::NotInitialized)?;
		self.state.lock().await.active_map_id = Some(mapid);
		Ok(mapid)
	}

	/// The most recently published map, if any poll has succeeded yet.
	pub async fn map_snapshot(&self) -> Option<Arc<RobotMap>> {
		self.state.lock().await.last_map.clone()
	}

	/// Latest work-state topic value within its staleness window.
	pub(crate) fn topic_work_state(&self, stale_after: Duration) -> Option<deebot_proto::WorkState> {
		self.topics.work.latest(stale_after)
	}

	/// Latest live-statistics topic value within its staleness window.
	pub(crate) fn topic_statistics(&self, stale_after: Duration) -> Option<deebot_proto::CleanStatistics> {
		self.topics.statistics.latest(stale_after)
	}

	pub(crate) async fn set_manual_session(&self, open: bool) {
		self.state.lock().await.manual_session_open = open;
	}

	pub(crate) async fn manual_session_open(&self) -> bool {
		self.state.lock().await.manual_session_open
	}

	pub(crate) async fn current_presets(&self) -> Option<(FanPreset, WaterPreset)> {
		self.state.lock().await.presets
	}

	// ----- full map poll ---------------------------------------------------

	async fn map_poll_loop(self: Arc<Self>) {
		let mut stop_rx = self.stop_tx.subscribe();
		loop {
			tokio::select! {
				() = self.map_refresh.notified() => {}
				() = sleep(MAP_POLL_FALLBACK) => {}
				_ = stop_rx.changed() => {}
			}
			if self.stopped() {
				break;
			}
			if let Err(e) = self.poll_map_once().await {
				warn!("full map poll failed: {e}");
			}
		}
		debug!("map poll loop stopped");
	}

	async fn poll_map_once(&self) -> Result<()> {
		let mapid = self.services.map.active_map_id().await?;
		let rooms = self.services.spot_area.rooms(mapid).await?.rooms;
		let walls = self.services.virtual_wall.virtual_walls(mapid).await?;
		let positions = self.services.position.positions().await?;
		let raster = self.raster_for(mapid).await?;

		let stale_after = Duration::from_millis(self.config.power_state_stale_after_ms);
		let robot = self.topics.pose.latest(stale_after).or(Some(positions.robot));

		let mut state = self.state.lock().await;
		state.active_map_id = Some(mapid);
		state.rooms = rooms;
		state.walls = walls;
		let path: Vec<TracePoint> = state.trace.iter().copied().collect();

		let map = self.builder.build(&MapInput {
			raster: raster.as_ref(),
			rooms: &state.rooms,
			walls: &state.walls,
			robot,
			charger: positions.charger,
			path: &path,
		})?;

		if let Some(map) = map {
			let map = Arc::new(map);
			state.last_map = Some(map.clone());
			drop(state);
			self.emit(RobotEvent::MapUpdated(map));
		} else {
			debug!("map poll finished without publishing");
		}
		Ok(())
	}

	/// The compressed raster, refetched only after its cache TTL expires
	/// or when the active map changed.
	async fn raster_for(&self, mapid: u32) -> Result<Option<RasterMap>> {
		let ttl = Duration::from_millis(self.config.detailed_map_refresh_interval_ms);
		{
			let state = self.state.lock().await;
			if let Some(cache) = &state.raster {
				if cache.mapid == mapid && cache.fetched_at.elapsed() < ttl {
					return Ok(Some(cache.raster.clone()));
				}
			}
		}

		let response = self.services.map.compressed_map(mapid).await?;
		let raster = assemble_raster(&response)?;
		self.state.lock().await.raster = Some(RasterCache {
			raster: raster.clone(),
			mapid,
			fetched_at: Instant::now(),
		});
		Ok(Some(raster))
	}

	// ----- live entity poll ------------------------------------------------

	async fn live_poll_loop(self: Arc<Self>) {
		let mut stop_rx = self.stop_tx.subscribe();
		let mut interval =
			tokio::time::interval(Duration::from_millis(self.config.live_position_poll_interval_ms));
		// The loop body runs to completion before the next tick is taken,
		// so overlapping polls cannot happen; late ticks are dropped.
		interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

		loop {
			tokio::select! {
				_ = interval.tick() => {}
				_ = stop_rx.changed() => {}
			}
			if self.stopped() {
				break;
			}
			if let Err(e) = self.poll_live_once().await {
				debug!("live entity poll failed: {e}");
			}
		}
		debug!("live poll loop stopped");
	}

	async fn poll_live_once(&self) -> Result<()> {
		let positions = self.services.position.positions().await?;
		if self.config.trace_path_enabled {
			if let Err(e) = self.poll_trace_once().await {
				debug!("trace poll failed: {e}");
			}
		}

		let stale_after = Duration::from_millis(self.config.power_state_stale_after_ms);
		let robot = self.topics.pose.latest(stale_after).or(Some(positions.robot));

		let mut state = self.state.lock().await;
		let Some(last_map) = state.last_map.clone() else {
			// Nothing published yet; the full poll builds the first map.
			return Ok(());
		};

		let path: Vec<TracePoint> = state.trace.iter().copied().collect();
		let entities = self.builder.build_entities(
			&last_map.transform,
			robot,
			positions.charger,
			&path,
			&state.walls,
		);

		if !last_map.same_entities(&entities) {
			let mut updated = (*last_map).clone();
			updated.entities = entities;
			let updated = Arc::new(updated);
			state.last_map = Some(updated.clone());
			drop(state);
			self.emit(RobotEvent::MapUpdated(updated));
		}
		Ok(())
	}

	async fn poll_trace_once(&self) -> Result<()> {
		let cursor = self.state.lock().await.trace_cursor;
		let window = self
			.services
			.trace
			.trace(cursor, self.config.trace_tail_entries)
			.await?;

		let mut state = self.state.lock().await;
		if window.total_points < cursor {
			// The firmware restarted its trace for a new clean.
			state.trace.clear();
			state.trace_cursor = 0;
		}
		if !window.data.is_empty() {
			let points = decode_trace(&window.data, self.config.trace_point_unit_mm)?;
			state.trace.extend(&points);
		}
		state.trace_cursor = window.total_points;
		Ok(())
	}

	// ----- runtime state poll ----------------------------------------------

	async fn runtime_poll_loop(self: Arc<Self>) {
		let mut stop_rx = self.stop_tx.subscribe();
		let mut interval =
			tokio::time::interval(Duration::from_millis(self.config.power_state_poll_interval_ms));
		interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

		loop {
			tokio::select! {
				_ = interval.tick() => {}
				_ = stop_rx.changed() => {}
			}
			if self.stopped() {
				break;
			}
			// Refresh failures keep the previous status.
			if let Err(e) = self.poll_runtime_state_once().await {
				debug!("runtime state poll failed: {e}");
			}
		}
		debug!("runtime state poll loop stopped");
	}

	async fn poll_runtime_state_once(&self) -> Result<()> {
		let power_stale = Duration::from_millis(self.config.power_state_stale_after_ms);
		let work_stale = Duration::from_millis(self.config.work_state_stale_after_ms);

		let work = self.topics.work.latest(work_stale);
		let charge = self.topics.charge.latest(power_stale);
		let battery = self.topics.battery.latest(power_stale);
		let pose = self.topics.pose.latest(power_stale);
		let alerts = self.services.alert.active_alerts().await?;

		let derived = derive_status(work.as_ref(), charge.as_ref(), battery, &alerts);

		{
			let mut state = self.state.lock().await;
			if state.last_status.as_ref() != Some(&derived) {
				state.last_status = Some(derived.clone());
				let event = RobotEvent::StatusChanged {
					status: derived.status,
					error: derived.error.clone(),
				};
				drop(state);
				self.emit(event);
			} else {
				drop(state);
			}
		}
		if let Some(level) = battery {
			let mut state = self.state.lock().await;
			if state.last_battery != Some(level) {
				state.last_battery = Some(level);
				drop(state);
				self.emit(RobotEvent::BatteryChanged {
					level,
					flag: derived.battery_flag,
				});
			}
		}

		let mut cache = self.cache.lock().await;
		cache.update(pose, battery, charge);
		cache.maybe_flush();
		Ok(())
	}

	// ----- settings poll ---------------------------------------------------

	async fn settings_poll_loop(self: Arc<Self>) {
		let mut stop_rx = self.stop_tx.subscribe();
		let mut interval = tokio::time::interval(Duration::from_millis(
			self.config.cleaning_settings_poll_interval_ms,
		));
		interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

		loop {
			tokio::select! {
				_ = interval.tick() => {}
				_ = stop_rx.changed() => {}
			}
			if self.stopped() {
				break;
			}
			if let Err(e) = self.poll_settings_once().await {
				debug!("settings poll failed: {e}");
			}
		}
		debug!("settings poll loop stopped");
	}

	async fn poll_settings_once(&self) -> Result<()> {
		let fan = FanPreset::from_value(self.services.setting.fan_mode().await?);
		let water = WaterPreset::from_value(self.services.setting.water_level().await?);

		let mut state = self.state.lock().await;
		if state.presets != Some((fan, water)) {
			state.presets = Some((fan, water));
			drop(state);
			self.emit(RobotEvent::SettingsChanged { fan, water });
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{
		RobotStatus,
		test_support::{Firmware, NoTopics, PinnedResolver, spawn_firmware, test_config},
	};
	use std::sync::atomic::Ordering;
	use tokio::sync::broadcast::error::TryRecvError;

	fn orchestrator(firmware: &Firmware, config: Config) -> Arc<Orchestrator> {
		Orchestrator::with_resolvers(
			config,
			Arc::new(PinnedResolver { addr: firmware.addr }),
			Arc::new(NoTopics),
		)
		.expect("orchestrator builds")
	}

	fn drain(events: &mut broadcast::Receiver<RobotEvent>) -> Vec<RobotEvent> {
		let mut drained = Vec::new();
		while let Ok(event) = events.try_recv() {
			drained.push(event);
		}
		drained
	}

	#[tokio::test]
	async fn raster_cache_is_reused_within_its_ttl() {
		let firmware = spawn_firmware();
		let dir = tempfile::tempdir().unwrap();
		// Default TTL is one minute, far longer than this test.
		let orchestrator = orchestrator(&firmware, test_config(dir.path()));

		orchestrator.poll_map_once().await.unwrap();
		orchestrator.poll_map_once().await.unwrap();

		assert_eq!(firmware.state.compressed_fetches.load(Ordering::SeqCst), 1);
		assert!(orchestrator.map_snapshot().await.is_some());
		orchestrator.shutdown().await;
	}

	#[tokio::test]
	async fn raster_cache_expires_after_its_ttl() {
		let firmware = spawn_firmware();
		let dir = tempfile::tempdir().unwrap();
		let mut config = test_config(dir.path());
		config.detailed_map_refresh_interval_ms = 0;
		let orchestrator = orchestrator(&firmware, config);

		orchestrator.poll_map_once().await.unwrap();
		orchestrator.poll_map_once().await.unwrap();

		assert_eq!(firmware.state.compressed_fetches.load(Ordering::SeqCst), 2);
		orchestrator.shutdown().await;
	}

	#[tokio::test]
	async fn trace_cursor_resets_when_the_firmware_restarts_its_trace() {
		let firmware = spawn_firmware();
		let dir = tempfile::tempdir().unwrap();
		let orchestrator = orchestrator(&firmware, test_config(dir.path()));

		orchestrator.poll_trace_once().await.unwrap();
		{
			let state = orchestrator.state.lock().await;
			assert_eq!(state.trace.len(), 3);
			assert_eq!(state.trace_cursor, 3);
		}

		// The firmware now reports fewer total points than our cursor:
		// its trace daemon restarted for a new clean.
		orchestrator.poll_trace_once().await.unwrap();
		{
			let state = orchestrator.state.lock().await;
			assert_eq!(state.trace.len(), 2);
			assert_eq!(state.trace_cursor, 2);
		}
		orchestrator.shutdown().await;
	}

	#[tokio::test]
	async fn unchanged_status_emits_no_second_event() {
		let firmware = spawn_firmware();
		let dir = tempfile::tempdir().unwrap();
		let orchestrator = orchestrator(&firmware, test_config(dir.path()));
		let mut events = orchestrator.subscribe();

		// All topics are stale, the firmware reports no triggered alert.
		orchestrator.poll_runtime_state_once().await.unwrap();
		let first = drain(&mut events);
		assert!(
			matches!(
				first.as_slice(),
				[RobotEvent::StatusChanged {
					status: RobotStatus::Idle,
					error: None,
				}]
			),
			"got {first:?}"
		);

		orchestrator.poll_runtime_state_once().await.unwrap();
		assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));
		orchestrator.shutdown().await;
	}

	#[tokio::test]
	async fn unchanged_settings_emit_no_second_event() {
		let firmware = spawn_firmware();
		let dir = tempfile::tempdir().unwrap();
		let orchestrator = orchestrator(&firmware, test_config(dir.path()));
		let mut events = orchestrator.subscribe();

		orchestrator.poll_settings_once().await.unwrap();
		assert!(matches!(
			events.try_recv(),
			Ok(RobotEvent::SettingsChanged { .. })
		));

		orchestrator.poll_settings_once().await.unwrap();
		assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));

		// A firmware-side change surfaces again.
		firmware.state.fan_mode.store(4, Ordering::SeqCst);
		orchestrator.poll_settings_once().await.unwrap();
		assert!(matches!(
			events.try_recv(),
			Ok(RobotEvent::SettingsChanged {
				fan: FanPreset::Max,
				..
			})
		));
		orchestrator.shutdown().await;
	}

	#[tokio::test]
	async fn live_poll_publishes_only_when_entities_change() {
		let firmware = spawn_firmware();
		let dir = tempfile::tempdir().unwrap();
		let orchestrator = orchestrator(&firmware, test_config(dir.path()));
		let mut events = orchestrator.subscribe();

		orchestrator.poll_map_once().await.unwrap();
		drain(&mut events);

		// Nothing moved; the rebuilt entities match the published map.
		orchestrator.poll_live_once().await.unwrap();
		assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));

		// Move the robot by ten pixels; the live poll must republish.
		firmware.state.robot_x_mm.store(250, Ordering::SeqCst);
		orchestrator.poll_live_once().await.unwrap();
		assert!(matches!(events.try_recv(), Ok(RobotEvent::MapUpdated(_))));
		orchestrator.shutdown().await;
	}
}
