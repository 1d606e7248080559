//! Map service: active map id and the compressed raster.

use crate::{CompressedMapInfo, CompressedMapResponse, open_response};
use deebot_core::{RobotError, Result, io::PayloadWriter};
use deebot_ros::{ServiceClient, ServiceEndpoint};

const OP_GET_ACTIVE_MAP: u8 = 1;
const OP_GET_COMPRESSED_MAP: u8 = 2;

#[must_use]
pub fn endpoint() -> ServiceEndpoint {
	ServiceEndpoint::new(
		&["/rose_map/get_map", "/map_manager/get_map"],
		"rose_map/GetMap",
	)
}

pub struct MapService {
	client: ServiceClient,
}

impl MapService {
	#[must_use]
	pub fn new(client: ServiceClient) -> MapService {
		MapService { client }
	}

	/// Returns the id of the map the robot currently navigates.
	pub async fn active_map_id(&self) -> Result<u32> {
		let mut writer = PayloadWriter::new();
		writer.write_u8(OP_GET_ACTIVE_MAP);
		let request = writer.into_bytes();
		let response = self.client.call(&request).await?;
		parse_active_map_id(&response)
	}

	/// Fetches the compressed raster of one map.
	pub async fn compressed_map(&self, mapid: u32) -> Result<CompressedMapResponse> {
		let mut writer = PayloadWriter::new();
		writer.write_u8(OP_GET_COMPRESSED_MAP).write_u32(mapid);
		let response = self.client.call(&writer.into_bytes()).await?;
		parse_compressed_map(&response)
	}
}

pub fn parse_active_map_id(payload: &[u8]) -> Result<u32> {
	open_response(payload)?.read_u32()
}

pub fn parse_compressed_map(payload: &[u8]) -> Result<CompressedMapResponse> {
	let mut reader = open_response(payload)?;
	let mapid = reader.read_u32()?;
	let map_width = reader.read_u32()?;
	let map_height = reader.read_u32()?;
	let columns = u32::from(reader.read_u8()?);
	let rows = u32::from(reader.read_u8()?);
	let submap_width = u32::from(reader.read_u16()?);
	let submap_height = u32::from(reader.read_u16()?);
	let resolution_cm = CompressedMapInfo::normalize_resolution(reader.read_u16()?);
	let submap_count = reader.read_u16()?;

	if u32::from(submap_count) < columns * rows {
		return Err(RobotError::protocol(format!(
			"compressed map announces {submap_count} submaps for a {columns}x{rows} grid"
		)));
	}

	let mut submaps = Vec::with_capacity(submap_count as usize);
	for _ in 0..submap_count {
		let len = reader.read_u32()? as usize;
		submaps.push(reader.read_bytes(len)?.to_vec());
	}

	Ok(CompressedMapResponse {
		mapid,
		info: CompressedMapInfo {
			map_width,
			map_height,
			columns,
			rows,
			submap_width,
			submap_height,
			resolution_cm,
		},
		submaps,
	})
}

/// Builds a compressed map response payload. Test fixture helper.
#[must_use]
pub fn build_compressed_map_response(
	mapid: u32,
	info: &CompressedMapInfo,
	raw_resolution: u16,
	submaps: &[Vec<u8>],
) -> Vec<u8> {
	let mut writer = PayloadWriter::new();
	writer
		.write_u8(0)
		.write_u32(mapid)
		.write_u32(info.map_width)
		.write_u32(info.map_height)
		.write_u8(info.columns as u8)
		.write_u8(info.rows as u8)
		.write_u16(info.submap_width as u16)
		.write_u16(info.submap_height as u16)
		.write_u16(raw_resolution)
		.write_u16(submaps.len() as u16);
	for submap in submaps {
		writer.write_u32(submap.len() as u32);
		writer.write_bytes(submap);
	}
	writer.into_bytes()
}
