//! Virtual-wall service: restriction lines, no-go and no-mop zones.

use crate::{VirtualWall, VirtualWallKind, open_response};
use deebot_core::{RobotError, Result, WorldPoint, io::PayloadWriter};
use deebot_ros::{ServiceClient, ServiceEndpoint};

const OP_GET: u8 = 1;
const OP_ADD: u8 = 2;
const OP_DELETE: u8 = 3;

#[must_use]
pub fn endpoint() -> ServiceEndpoint {
	ServiceEndpoint::new(
		&["/rose_map/virtual_wall", "/map_manager/virtual_wall"],
		"rose_map/VirtualWall",
	)
}

pub struct VirtualWallService {
	client: ServiceClient,
}

impl VirtualWallService {
	#[must_use]
	pub fn new(client: ServiceClient) -> VirtualWallService {
		VirtualWallService { client }
	}

	pub async fn virtual_walls(&self, mapid: u32) -> Result<Vec<VirtualWall>> {
		let mut writer = PayloadWriter::new();
		writer.write_u8(OP_GET).write_u32(mapid);
		let response = self.client.call(&writer.into_bytes()).await?;
		parse_virtual_walls(&response)
	}

	/// Adds a restriction and returns the id the firmware assigned.
	///
	/// Two dots form a line wall, four a rectangular zone; anything else
	/// the firmware has never accepted.
	pub async fn add_restriction(
		&self,
		mapid: u32,
		kind: VirtualWallKind,
		dots: &[WorldPoint],
	) -> Result<u32> {
		if dots.len() != 2 && dots.len() != 4 {
			return Err(RobotError::InvalidArgument(format!(
				"a restriction needs 2 or 4 dots, got {}",
				dots.len()
			)));
		}
		let request = build_add_request(mapid, kind, dots);
		let response = self.client.call(&request).await?;
		open_response(&response)?.read_u32()
	}

	pub async fn delete_restriction(&self, mapid: u32, vwid: u32) -> Result<()> {
		let mut writer = PayloadWriter::new();
		writer.write_u8(OP_DELETE).write_u32(mapid).write_u32(vwid);
		open_response(&self.client.call(&writer.into_bytes()).await?).map(|_| ())
	}
}

pub fn parse_virtual_walls(payload: &[u8]) -> Result<Vec<VirtualWall>> {
	let mut reader = open_response(payload)?;
	let _mapid = reader.read_u32()?;
	let count = reader.read_u8()?;
	let mut walls = Vec::with_capacity(count as usize);
	for _ in 0..count {
		let vwid = reader.read_u32()?;
		let kind = VirtualWallKind::from_u8(reader.read_u8()?);
		let dot_count = reader.read_u8()?;
		let mut dots = Vec::with_capacity(dot_count as usize);
		for _ in 0..dot_count {
			let x_mm = reader.read_i32()?;
			let y_mm = reader.read_i32()?;
			dots.push(WorldPoint::new(x_mm, y_mm));
		}
		walls.push(VirtualWall { vwid, kind, dots });
	}
	Ok(walls)
}

#[must_use]
pub fn build_add_request(mapid: u32, kind: VirtualWallKind, dots: &[WorldPoint]) -> Vec<u8> {
	let mut writer = PayloadWriter::new();
	writer
		.write_u8(OP_ADD)
		.write_u32(mapid)
		.write_u8(kind.to_u8())
		.write_u8(dots.len() as u8);
	for dot in dots {
		writer.write_i32(dot.x_mm);
		writer.write_i32(dot.y_mm);
	}
	writer.into_bytes()
}

/// Builds a wall list response payload. Test fixture helper.
#[must_use]
pub fn build_walls_response(mapid: u32, walls: &[VirtualWall]) -> Vec<u8> {
	let mut writer = PayloadWriter::new();
	writer.write_u8(0).write_u32(mapid).write_u8(walls.len() as u8);
	for wall in walls {
		writer
			.write_u32(wall.vwid)
			.write_u8(wall.kind.to_u8())
			.write_u8(wall.dots.len() as u8);
		for dot in &wall.dots {
			writer.write_i32(dot.x_mm);
			writer.write_i32(dot.y_mm);
		}
	}
	writer.into_bytes()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn wall_list_round_trip() -> Result<()> {
		let walls = vec![
			VirtualWall {
				vwid: 1,
				kind: VirtualWallKind::Regular,
				dots: vec![WorldPoint::new(0, 0), WorldPoint::new(1000, 0)],
			},
			VirtualWall {
				vwid: 2,
				kind: VirtualWallKind::NoMop,
				dots: vec![
					WorldPoint::new(-500, -500),
					WorldPoint::new(500, -500),
					WorldPoint::new(500, 500),
					WorldPoint::new(-500, 500),
				],
			},
		];
		let payload = build_walls_response(4, &walls);
		assert_eq!(parse_virtual_walls(&payload)?, walls);
		Ok(())
	}

	#[test]
	fn add_request_layout() {
		let request = build_add_request(
			7,
			VirtualWallKind::NoMop,
			&[WorldPoint::new(10, -10), WorldPoint::new(20, -20)],
		);
		assert_eq!(request[0], OP_ADD);
		assert_eq!(&request[1..5], &[7, 0, 0, 0]);
		assert_eq!(request[5], 1); // no-mop
		assert_eq!(request[6], 2); // dot count
		assert_eq!(request.len(), 7 + 2 * 8);
	}

	#[test]
	fn rejected_add_maps_to_command_rejected() {
		let err = open_response(&[5]).unwrap_err();
		assert!(matches!(err, RobotError::CommandRejected { result: 5 }));
	}
}
