//! Lifespan service: consumable wear tracking and reset.

use crate::{LifespanPart, PartLife, open_response};
use deebot_core::{RobotError, Result, io::PayloadWriter};
use deebot_ros::{ServiceClient, ServiceEndpoint};

const OP_GET: u8 = 1;
const OP_RESET: u8 = 2;

#[must_use]
pub fn endpoint() -> ServiceEndpoint {
	ServiceEndpoint::new(&["/pltf/lifespan", "/consumable/lifespan"], "pltf_msgs/Lifespan")
}

pub struct LifespanService {
	client: ServiceClient,
}

impl LifespanService {
	#[must_use]
	pub fn new(client: ServiceClient) -> LifespanService {
		LifespanService { client }
	}

	/// Reads life counters. Querying [`LifespanPart::All`] returns one
	/// record per tracked part.
	pub async fn lifespan(&self, part: LifespanPart) -> Result<Vec<PartLife>> {
		let mut writer = PayloadWriter::new();
		writer.write_u8(OP_GET).write_u8(part.to_u8());
		let response = self.client.call(&writer.into_bytes()).await?;
		parse_lifespan_response(&response)
	}

	pub async fn reset(&self, part: LifespanPart) -> Result<()> {
		let mut writer = PayloadWriter::new();
		writer.write_u8(OP_RESET).write_u8(part.to_u8());
		open_response(&self.client.call(&writer.into_bytes()).await?).map(|_| ())
	}
}

pub fn parse_lifespan_response(payload: &[u8]) -> Result<Vec<PartLife>> {
	let mut reader = open_response(payload)?;
	let count = reader.read_u8()?;
	let mut parts = Vec::with_capacity(count as usize);
	for _ in 0..count {
		let raw_part = reader.read_u8()?;
		let part = LifespanPart::from_u8(raw_part)
			.ok_or_else(|| RobotError::protocol(format!("unknown lifespan part {raw_part}")))?;
		parts.push(PartLife {
			part,
			left: reader.read_u16()?,
			total: reader.read_u16()?,
		});
	}
	Ok(parts)
}

/// Builds a lifespan response payload. Test fixture helper.
#[must_use]
pub fn build_lifespan_response(parts: &[PartLife]) -> Vec<u8> {
	let mut writer = PayloadWriter::new();
	writer.write_u8(0).write_u8(parts.len() as u8);
	for part in parts {
		writer
			.write_u8(part.part.to_u8())
			.write_u16(part.left)
			.write_u16(part.total);
	}
	writer.into_bytes()
}
