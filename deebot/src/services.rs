//! Wiring of service clients and topic subscribers to the firmware.

use deebot_core::Config;
use deebot_proto::{
	ChargeState, CleanStatistics, RobotPose, WorkState, decode_battery, decode_charge_state,
	decode_pose, decode_statistics, decode_work_state,
	services::{
		alert::{self, AlertService},
		lifespan::{self, LifespanService},
		map::{self, MapService},
		position::{self, PositionService},
		setting::{self, SettingService},
		spot_area::{self, SpotAreaService},
		statistics::{self, StatisticsService},
		trace_log::{self, TraceService},
		virtual_wall::{self, VirtualWallService},
		work::{self, WorkService},
	},
	battery_endpoint, charge_state_endpoint, pose_endpoint, statistics_endpoint,
	work_state_endpoint,
};
use deebot_ros::{EndpointResolver, ServiceClient, ServiceEndpoint, TopicResolver, TopicSubscriber};
use std::sync::Arc;

/// All firmware services, persistent clients for the frequently polled
/// ones and ephemeral clients for occasional commands.
pub struct Services {
	pub map: MapService,
	pub spot_area: SpotAreaService,
	pub virtual_wall: VirtualWallService,
	pub work: WorkService,
	pub setting: SettingService,
	pub lifespan: LifespanService,
	pub position: PositionService,
	pub statistics: StatisticsService,
	pub trace: TraceService,
	pub alert: AlertService,
}

impl Services {
	#[must_use]
	pub fn connect(config: &Config, resolver: Arc<dyn EndpointResolver>) -> Services {
		let persistent = |endpoint: ServiceEndpoint| {
			ServiceClient::persistent(
				endpoint,
				resolver.clone(),
				&config.ros_caller_id,
				config.connect_timeout(),
				config.call_timeout(),
			)
		};
		let ephemeral = |endpoint: ServiceEndpoint| {
			ServiceClient::ephemeral(
				endpoint,
				resolver.clone(),
				&config.ros_caller_id,
				config.connect_timeout(),
				config.call_timeout(),
			)
		};

		Services {
			map: MapService::new(persistent(map::endpoint())),
			spot_area: SpotAreaService::new(persistent(spot_area::endpoint())),
			position: PositionService::new(persistent(position::endpoint())),
			trace: TraceService::new(persistent(trace_log::endpoint())),
			alert: AlertService::new(persistent(alert::endpoint())),
			virtual_wall: VirtualWallService::new(ephemeral(virtual_wall::endpoint())),
			work: WorkService::new(ephemeral(work::endpoint())),
			setting: SettingService::new(ephemeral(setting::endpoint())),
			lifespan: LifespanService::new(ephemeral(lifespan::endpoint())),
			statistics: StatisticsService::new(ephemeral(statistics::endpoint())),
		}
	}
}

/// The long-lived topic subscriptions.
pub struct Topics {
	pub battery: TopicSubscriber<u8>,
	pub charge: TopicSubscriber<ChargeState>,
	pub work: TopicSubscriber<WorkState>,
	pub pose: TopicSubscriber<RobotPose>,
	pub statistics: TopicSubscriber<CleanStatistics>,
}

impl Topics {
	#[must_use]
	pub fn spawn(config: &Config, resolver: Arc<dyn TopicResolver>) -> Topics {
		let caller_id = &config.ros_caller_id;
		let connect_timeout = config.connect_timeout();

		let (battery_ep, battery_mode) = battery_endpoint();
		let (charge_ep, charge_mode) = charge_state_endpoint();
		let (work_ep, work_mode) = work_state_endpoint();
		let (pose_ep, pose_mode) = pose_endpoint();
		let (stats_ep, stats_mode) = statistics_endpoint();

		Topics {
			battery: TopicSubscriber::spawn(
				battery_ep,
				battery_mode,
				resolver.clone(),
				caller_id,
				connect_timeout,
				decode_battery,
			),
			charge: TopicSubscriber::spawn(
				charge_ep,
				charge_mode,
				resolver.clone(),
				caller_id,
				connect_timeout,
				decode_charge_state,
			),
			work: TopicSubscriber::spawn(
				work_ep,
				work_mode,
				resolver.clone(),
				caller_id,
				connect_timeout,
				decode_work_state,
			),
			pose: TopicSubscriber::spawn(
				pose_ep,
				pose_mode,
				resolver.clone(),
				caller_id,
				connect_timeout,
				decode_pose,
			),
			statistics: TopicSubscriber::spawn(
				stats_ep,
				stats_mode,
				resolver,
				caller_id,
				connect_timeout,
				decode_statistics,
			),
		}
	}

	/// Stops every subscription and awaits task termination.
	pub async fn shutdown(&self) {
		self.battery.shutdown().await;
		self.charge.shutdown().await;
		self.work.shutdown().await;
		self.pose.shutdown().await;
		self.statistics.shutdown().await;
	}
}
