//! Trace service: the robot's recent path as a compressed hex blob.

use crate::{decode_hex, open_response};
use deebot_core::{Result, io::PayloadWriter};
use deebot_ros::{ServiceClient, ServiceEndpoint};

const OP_GET: u8 = 1;

#[must_use]
pub fn endpoint() -> ServiceEndpoint {
	ServiceEndpoint::new(&["/rose_map/get_trace", "/trace"], "rose_map/GetTrace")
}

/// One trace window: the total number of points the firmware holds and
/// the requested slice as raw (already hex-decoded) compressed bytes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TraceWindow {
	pub total_points: u16,
	pub data: Vec<u8>,
}

pub struct TraceService {
	client: ServiceClient,
}

impl TraceService {
	#[must_use]
	pub fn new(client: ServiceClient) -> TraceService {
		TraceService { client }
	}

	/// Fetches `count` trace entries starting at `start`.
	pub async fn trace(&self, start: u16, count: u16) -> Result<TraceWindow> {
		let mut writer = PayloadWriter::new();
		writer.write_u8(OP_GET).write_u16(start).write_u16(count);
		let response = self.client.call(&writer.into_bytes()).await?;
		parse_trace_response(&response)
	}
}

pub fn parse_trace_response(payload: &[u8]) -> Result<TraceWindow> {
	let mut reader = open_response(payload)?;
	let total_points = reader.read_u16()?;
	let hex_len = reader.read_u32()? as usize;
	let hex = std::str::from_utf8(reader.read_bytes(hex_len)?)
		.map_err(|_| deebot_core::RobotError::protocol("trace blob is not ASCII hex"))?;
	Ok(TraceWindow {
		total_points,
		data: decode_hex(hex)?,
	})
}

/// Builds a trace response payload from raw chunk bytes. Test fixture
/// helper; encodes the bytes as lowercase hex the way the firmware does.
#[must_use]
pub fn build_trace_response(total_points: u16, data: &[u8]) -> Vec<u8> {
	use std::fmt::Write as _;
	let mut hex = String::with_capacity(data.len() * 2);
	for byte in data {
		let _ = write!(hex, "{byte:02x}");
	}
	let mut writer = PayloadWriter::new();
	writer
		.write_u8(0)
		.write_u16(total_points)
		.write_u32(hex.len() as u32)
		.write_bytes(hex.as_bytes());
	writer.into_bytes()
}
