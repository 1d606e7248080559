//! Work-manage service: one operation per control verb.

use crate::{WorkType, open_response};
use deebot_core::{RobotError, Result, WorldPoint, io::PayloadWriter};
use deebot_ros::{ServiceClient, ServiceEndpoint};

const OP_START: u8 = 1;
const OP_STOP: u8 = 2;
const OP_PAUSE: u8 = 3;
const OP_RESUME: u8 = 4;
const OP_RETURN: u8 = 5;
const OP_COLLECT_DUST: u8 = 6;
const OP_REMOTE_MOVE: u8 = 7;

#[must_use]
pub fn endpoint() -> ServiceEndpoint {
	ServiceEndpoint::new(&["/work_manager/cmd", "/work_cmd"], "work_manager/WorkCmd")
}

/// Manual-control movement verbs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RemoteMove {
	Stop,
	Forward,
	SpinLeft,
	SpinRight,
	Backward,
}

impl RemoteMove {
	#[must_use]
	pub fn to_u8(self) -> u8 {
		match self {
			RemoteMove::Stop => 0,
			RemoteMove::Forward => 1,
			RemoteMove::SpinLeft => 2,
			RemoteMove::SpinRight => 3,
			RemoteMove::Backward => 4,
		}
	}
}

pub struct WorkService {
	client: ServiceClient,
}

impl WorkService {
	#[must_use]
	pub fn new(client: ServiceClient) -> WorkService {
		WorkService { client }
	}

	async fn send(&self, request: Vec<u8>) -> Result<()> {
		open_response(&self.client.call(&request).await?).map(|_| ())
	}

	pub async fn start_auto_clean(&self) -> Result<()> {
		let mut writer = PayloadWriter::new();
		writer.write_u8(OP_START).write_u8(WorkType::Auto.to_u8()).write_u8(0);
		self.send(writer.into_bytes()).await
	}

	/// Cleans the given rooms in order.
	pub async fn start_area_clean(&self, areaids: &[u32]) -> Result<()> {
		if areaids.is_empty() {
			return Err(RobotError::InvalidArgument("no areaids given".to_string()));
		}
		let mut writer = PayloadWriter::new();
		writer
			.write_u8(OP_START)
			.write_u8(WorkType::Area.to_u8())
			.write_u8(areaids.len() as u8);
		for areaid in areaids {
			writer.write_u32(*areaid);
		}
		self.send(writer.into_bytes()).await
	}

	/// Cleans custom rectangles given by two opposite corners each, in
	/// world millimeters.
	pub async fn start_custom_clean(&self, rects: &[(WorldPoint, WorldPoint)]) -> Result<()> {
		if rects.is_empty() {
			return Err(RobotError::InvalidArgument("no rectangles given".to_string()));
		}
		let mut writer = PayloadWriter::new();
		writer
			.write_u8(OP_START)
			.write_u8(WorkType::Custom.to_u8())
			.write_u8(rects.len() as u8);
		for (a, b) in rects {
			writer.write_i32(a.x_mm).write_i32(a.y_mm);
			writer.write_i32(b.x_mm).write_i32(b.y_mm);
		}
		self.send(writer.into_bytes()).await
	}

	pub async fn stop_clean(&self) -> Result<()> {
		self.send(vec![OP_STOP]).await
	}

	/// Pausing and resuming must name the running work type; the firmware
	/// rejects a bare pause.
	pub async fn pause(&self, worktype: WorkType) -> Result<()> {
		self.send(vec![OP_PAUSE, worktype.to_u8()]).await
	}

	pub async fn resume(&self, worktype: WorkType) -> Result<()> {
		self.send(vec![OP_RESUME, worktype.to_u8()]).await
	}

	pub async fn return_to_dock(&self) -> Result<()> {
		self.send(vec![OP_RETURN]).await
	}

	pub async fn collect_dust(&self) -> Result<()> {
		self.send(vec![OP_COLLECT_DUST]).await
	}

	/// One movement step of a manual-control session. `w` is the signed
	/// angular rate for the spin verbs.
	pub async fn remote_move(&self, verb: RemoteMove, w: Option<i16>) -> Result<()> {
		self.send(build_remote_move(verb, w)).await
	}
}

#[must_use]
pub fn build_remote_move(verb: RemoteMove, w: Option<i16>) -> Vec<u8> {
	let mut writer = PayloadWriter::new();
	writer.write_u8(OP_REMOTE_MOVE).write_u8(verb.to_u8());
	match w {
		Some(w) => {
			writer.write_u8(1).write_i16(w);
		}
		None => {
			writer.write_u8(0).write_i16(0);
		}
	}
	writer.into_bytes()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn remote_move_with_angular_rate() {
		let request = build_remote_move(RemoteMove::SpinLeft, Some(-90));
		assert_eq!(request[0], OP_REMOTE_MOVE);
		assert_eq!(request[1], 2);
		assert_eq!(request[2], 1);
		assert_eq!(i16::from_le_bytes([request[3], request[4]]), -90);
	}

	#[test]
	fn remote_move_without_angular_rate() {
		let request = build_remote_move(RemoteMove::Forward, None);
		assert_eq!(request, vec![OP_REMOTE_MOVE, 1, 0, 0, 0]);
	}
}
