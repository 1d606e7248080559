//! Shared request/response framing of the ecovacs services.
//!
//! Every response opens with a status byte; zero means success. Room
//! update requests share a 17-byte header and 30-byte per-room blocks
//! across the type=4 (attributes) and type=5 (sequence) shapes.

use crate::RoomPreferences;
use deebot_core::{RobotError, Result, io::PayloadReader, io::PayloadWriter};

/// Room update request shapes.
pub const ROOM_UPDATE_ATTRIBUTES: u8 = 4;
pub const ROOM_UPDATE_SEQUENCE: u8 = 5;

const ROOM_UPDATE_HEADER_LEN: usize = 17;
const ROOM_UPDATE_BLOCK_LEN: usize = 30;
const ROOM_BLOCK_SEQUENCE_OFFSET: usize = 29;

/// Opens a service response: checks the status byte and returns a reader
/// positioned at the payload.
pub fn open_response(payload: &[u8]) -> Result<PayloadReader> {
	let mut reader = PayloadReader::new(payload);
	let status = reader.read_u8()?;
	if status != 0 {
		return Err(RobotError::CommandRejected { result: status });
	}
	Ok(reader)
}

/// One room's worth of update data.
#[derive(Clone, Copy, Debug)]
pub struct RoomUpdateBlock {
	pub areaid: u32,
	pub label_id: u8,
	pub preferences: RoomPreferences,
}

/// Builds a room update request: type byte, map id, room count, padding to
/// the 17-byte header, then one 30-byte block per room with the sequence
/// position at block byte 29.
#[must_use]
pub fn room_update_request(kind: u8, mapid: u32, blocks: &[RoomUpdateBlock]) -> Vec<u8> {
	let mut writer = PayloadWriter::with_capacity(ROOM_UPDATE_HEADER_LEN + blocks.len() * ROOM_UPDATE_BLOCK_LEN);
	writer.write_u8(kind).write_u32(mapid).write_u8(blocks.len() as u8);
	writer.write_padding(ROOM_UPDATE_HEADER_LEN - 6);

	for block in blocks {
		let start = writer.len();
		writer
			.write_u32(block.areaid)
			.write_u8(block.label_id)
			.write_u8(block.preferences.suction)
			.write_u8(block.preferences.water)
			.write_u8(block.preferences.times);
		writer.write_padding(ROOM_UPDATE_BLOCK_LEN - 8);
		writer.set_u8_at(start + ROOM_BLOCK_SEQUENCE_OFFSET, block.preferences.sequence);
	}
	writer.into_bytes()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn status_zero_opens_the_payload() -> Result<()> {
		let mut reader = open_response(&[0, 0x2A, 0, 0, 0])?;
		assert_eq!(reader.read_u32()?, 42);
		Ok(())
	}

	#[test]
	fn non_zero_status_is_rejected() {
		let err = open_response(&[3]).unwrap_err();
		assert!(matches!(err, RobotError::CommandRejected { result: 3 }));
	}

	#[test]
	fn empty_response_is_a_protocol_error() {
		assert!(matches!(open_response(&[]), Err(RobotError::Protocol(_))));
	}

	#[test]
	fn room_update_layout() {
		let request = room_update_request(
			ROOM_UPDATE_SEQUENCE,
			7,
			&[RoomUpdateBlock {
				areaid: 0x0000002A,
				label_id: 5,
				preferences: RoomPreferences {
					suction: 2,
					water: 1,
					times: 1,
					sequence: 3,
				},
			}],
		);
		assert_eq!(request.len(), 17 + 30);
		assert_eq!(request[0], 5); // type
		assert_eq!(&request[1..5], &[7, 0, 0, 0]); // mapid
		assert_eq!(request[5], 1); // room count
		assert_eq!(&request[17..21], &[0x2A, 0, 0, 0]); // areaid
		assert_eq!(request[21], 5); // label
		assert_eq!(request[22], 2); // suction
		assert_eq!(request[23], 1); // water
		assert_eq!(request[24], 1); // times
		assert_eq!(request[17 + 29], 3); // sequence position, last block byte
	}
}
