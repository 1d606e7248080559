//! Position service: robot and charger poses.

use crate::{Positions, RobotPose, open_response};
use deebot_core::{Result, io::PayloadWriter};
use deebot_ros::{ServiceClient, ServiceEndpoint};

const OP_GET: u8 = 1;

#[must_use]
pub fn endpoint() -> ServiceEndpoint {
	ServiceEndpoint::new(&["/rose_map/get_position", "/position"], "rose_map/GetPosition")
}

pub struct PositionService {
	client: ServiceClient,
}

impl PositionService {
	#[must_use]
	pub fn new(client: ServiceClient) -> PositionService {
		PositionService { client }
	}

	pub async fn positions(&self) -> Result<Positions> {
		let response = self.client.call(&[OP_GET]).await?;
		parse_positions(&response)
	}
}

pub fn parse_positions(payload: &[u8]) -> Result<Positions> {
	let mut reader = open_response(payload)?;
	let robot = RobotPose {
		x_mm: reader.read_i32()?,
		y_mm: reader.read_i32()?,
		angle_deg: f32::from(reader.read_i16()?),
	};
	let has_charger = reader.read_u8()? != 0;
	let charger = if has_charger {
		Some(RobotPose {
			x_mm: reader.read_i32()?,
			y_mm: reader.read_i32()?,
			angle_deg: f32::from(reader.read_i16()?),
		})
	} else {
		None
	};
	Ok(Positions { robot, charger })
}

/// Builds a position response payload. Test fixture helper.
#[must_use]
pub fn build_positions_response(robot: &RobotPose, charger: Option<&RobotPose>) -> Vec<u8> {
	let mut writer = PayloadWriter::new();
	writer
		.write_u8(0)
		.write_i32(robot.x_mm)
		.write_i32(robot.y_mm)
		.write_i16(robot.angle_deg as i16);
	match charger {
		Some(charger) => {
			writer
				.write_u8(1)
				.write_i32(charger.x_mm)
				.write_i32(charger.y_mm)
				.write_i16(charger.angle_deg as i16);
		}
		None => {
			writer.write_u8(0);
		}
	}
	writer.into_bytes()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn positions_round_trip() -> Result<()> {
		let robot = RobotPose {
			x_mm: 1250,
			y_mm: -340,
			angle_deg: 90.0,
		};
		let charger = RobotPose {
			x_mm: 0,
			y_mm: 0,
			angle_deg: 180.0,
		};
		let payload = build_positions_response(&robot, Some(&charger));
		let parsed = parse_positions(&payload)?;
		assert_eq!(parsed.robot, robot);
		assert_eq!(parsed.charger, Some(charger));
		Ok(())
	}

	#[test]
	fn charger_is_optional() -> Result<()> {
		let robot = RobotPose {
			x_mm: 10,
			y_mm: 20,
			angle_deg: 0.0,
		};
		let payload = build_positions_response(&robot, None);
		let parsed = parse_positions(&payload)?;
		assert_eq!(parsed.charger, None);
		Ok(())
	}
}
