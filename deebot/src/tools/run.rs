//! The `run` subcommand: the long-running integration daemon.

use anyhow::{Context, Result};
use deebot::{Robot, RobotEvent};
use deebot_core::Config;
use log::{info, warn};

pub async fn run(config: Config) -> Result<()> {
	let robot = Robot::connect(config).context("connecting to the robot")?;
	info!("deebot integration running, press Ctrl-C to stop");

	// Log the event stream; the capability layer attaches its own
	// receiver through `Robot::events`.
	let mut events = robot.events();
	let event_logger = tokio::spawn(async move {
		loop {
			match events.recv().await {
				Ok(RobotEvent::StatusChanged { status, error }) => match error {
					Some(error) => warn!(
						"status changed to {status:?}: {} (vendor code {})",
						error.message, error.vendor_error_code
					),
					None => info!("status changed to {status:?}"),
				},
				Ok(RobotEvent::BatteryChanged { level, .. }) => info!("battery at {level}%"),
				Ok(RobotEvent::MapUpdated(map)) => {
					info!(
						"map updated: {} layers, {} entities",
						map.layers.len(),
						map.entities.len()
					);
				}
				Ok(RobotEvent::SettingsChanged { fan, water }) => {
					info!("settings changed: fan {fan:?}, water {water:?}");
				}
				Err(tokio::sync::broadcast::error::RecvError::Lagged(missed)) => {
					warn!("event logger lagged, {missed} events dropped");
				}
				Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
			}
		}
	});

	robot.request_map_refresh();
	tokio::signal::ctrl_c().await.context("waiting for Ctrl-C")?;
	info!("shutting down");
	robot.shutdown().await;
	event_logger.abort();
	Ok(())
}
