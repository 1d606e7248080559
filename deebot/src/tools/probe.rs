//! The `probe` subcommand: a one-shot dump of what the robot reports,
//! for field debugging without the full daemon.

use anyhow::{Context, Result};
use deebot::Robot;
use deebot_core::Config;

pub async fn run(config: Config) -> Result<()> {
	let robot = Robot::without_loops(config).context("connecting to the robot")?;

	let mapid = robot.active_map_id().await.context("querying the active map id")?;
	println!("active map id: {mapid}");

	let rooms = robot.rooms().await?;
	println!("rooms: {}", rooms.len());
	for room in &rooms {
		println!(
			"  #{} {} with {} vertices",
			room.areaid,
			room.label_name().unwrap_or("unnamed"),
			room.polygon.len()
		);
	}

	let restrictions = robot.virtual_restrictions().await?;
	println!("virtual restrictions: {}", restrictions.len());
	for wall in &restrictions {
		println!("  #{} {:?} with {} dots", wall.vwid, wall.kind, wall.dots.len());
	}

	let consumables = robot.consumables().await?;
	for part in &consumables {
		println!("consumable {:?}: {}% left", part.part, part.percent());
	}

	let total = robot.total_statistics().await?;
	println!(
		"lifetime: {} cleans, {} m2, {} s",
		total.count, total.area_m2, total.duration_s
	);

	robot.shutdown().await;
	Ok(())
}
