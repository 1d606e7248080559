//! Spot-area service: room enumeration and room attribute updates.
//!
//! The room list is the least regular payload the firmware produces. Each
//! room block is `areaid:u32 | name_len:u32 | label:u8 | point_count:u32 |
//! points | connections | preferences`, but firmware revisions pad between
//! blocks, so the parser scans for the next plausible `point_count`
//! position instead of trusting a running cursor. `areaid` then sits at
//! the fixed offset nine bytes earlier. `name_len` has been zero on every
//! observed firmware; the −9 offset depends on that, so a non-zero value
//! aborts the parse rather than silently misreading ids.

use crate::{
	ROOM_UPDATE_ATTRIBUTES, ROOM_UPDATE_SEQUENCE, Room, RoomPreferences, RoomUpdateBlock,
	open_response, room_update_request,
};
use byteorder::{ByteOrder, LittleEndian};
use deebot_core::{RobotError, Result, WorldPoint, io::PayloadReader, io::PayloadWriter};
use deebot_ros::{ServiceClient, ServiceEndpoint};

const OP_GET_ROOMS: u8 = 1;

/// Offset of `areaid` before the `point_count` field: the u32 name length
/// and the label byte sit between them, the name itself is always empty.
const AREAID_BACKSET: usize = 9;

const MIN_POLYGON_POINTS: u32 = 3;
const MAX_POLYGON_POINTS: u32 = 100;
const MAX_CONNECTIONS: usize = 15;

/// Bytes of one world point in a polygon.
const POINT_LEN: usize = 8;
/// Minimum block tail: connection count plus the four preference bytes.
const MIN_TRAILER_LEN: usize = 5;

#[must_use]
pub fn endpoint() -> ServiceEndpoint {
	ServiceEndpoint::new(
		&["/rose_map/spot_area", "/map_manager/spot_area"],
		"rose_map/SpotArea",
	)
}

/// Room list of one map.
#[derive(Clone, Debug, PartialEq)]
pub struct RoomsResponse {
	pub mapid: u32,
	pub rooms: Vec<Room>,
}

pub struct SpotAreaService {
	client: ServiceClient,
}

impl SpotAreaService {
	#[must_use]
	pub fn new(client: ServiceClient) -> SpotAreaService {
		SpotAreaService { client }
	}

	pub async fn rooms(&self, mapid: u32) -> Result<RoomsResponse> {
		let mut writer = PayloadWriter::new();
		writer.write_u8(OP_GET_ROOMS).write_u32(mapid);
		let response = self.client.call(&writer.into_bytes()).await?;
		parse_rooms_response(&response)
	}

	pub async fn set_room_label(&self, mapid: u32, areaid: u32, label_id: u8) -> Result<()> {
		let block = RoomUpdateBlock {
			areaid,
			label_id,
			preferences: RoomPreferences::default(),
		};
		let request = room_update_request(ROOM_UPDATE_ATTRIBUTES, mapid, &[block]);
		open_response(&self.client.call(&request).await?).map(|_| ())
	}

	pub async fn set_room_cleaning_preferences(
		&self,
		mapid: u32,
		areaid: u32,
		times: u8,
		water: u8,
		suction: u8,
	) -> Result<()> {
		let block = RoomUpdateBlock {
			areaid,
			label_id: 0,
			preferences: RoomPreferences {
				suction,
				water,
				times,
				sequence: 0,
			},
		};
		let request = room_update_request(ROOM_UPDATE_ATTRIBUTES, mapid, &[block]);
		open_response(&self.client.call(&request).await?).map(|_| ())
	}

	/// Reorders rooms: one block per room with its position in the
	/// cleaning sequence.
	pub async fn set_room_sequence(&self, mapid: u32, order: &[(u32, u8)]) -> Result<()> {
		let blocks: Vec<RoomUpdateBlock> = order
			.iter()
			.map(|&(areaid, sequence)| RoomUpdateBlock {
				areaid,
				label_id: 0,
				preferences: RoomPreferences {
					sequence,
					..RoomPreferences::default()
				},
			})
			.collect();
		let request = room_update_request(ROOM_UPDATE_SEQUENCE, mapid, &blocks);
		open_response(&self.client.call(&request).await?).map(|_| ())
	}
}

pub fn parse_rooms_response(payload: &[u8]) -> Result<RoomsResponse> {
	let mut reader = open_response(payload)?;
	let mapid = reader.read_u32()?;
	let room_count = reader.read_u8()?;
	let rooms = parse_room_blocks(reader.read_rest(), room_count)?;
	Ok(RoomsResponse { mapid, rooms })
}

/// Scans `data` for room blocks until `expected` rooms are found or the
/// data runs out.
fn parse_room_blocks(data: &[u8], expected: u8) -> Result<Vec<Room>> {
	let mut rooms = Vec::with_capacity(expected as usize);
	let mut search = AREAID_BACKSET;

	while rooms.len() < expected as usize && search + 4 <= data.len() {
		let point_count = LittleEndian::read_u32(&data[search..search + 4]);
		if !plausible_block(data, search, point_count) {
			search += 1;
			continue;
		}

		let name_len = LittleEndian::read_u32(&data[search - 5..search - 1]);
		if name_len != 0 {
			return Err(RobotError::protocol(format!(
				"room block at offset {} has name_len {name_len}; the areaid offset assumes empty names",
				search - AREAID_BACKSET
			)));
		}

		let (room, end) = parse_room_at(data, search, point_count)?;
		rooms.push(room);
		search = end + AREAID_BACKSET;
	}

	if rooms.len() < expected as usize {
		return Err(RobotError::protocol(format!(
			"found {} of {expected} announced rooms",
			rooms.len()
		)));
	}

	// Areaids are the segment identity; a duplicate means the scan locked
	// onto garbage.
	let mut seen = std::collections::HashSet::new();
	for room in &rooms {
		if !seen.insert(room.areaid) {
			return Err(RobotError::protocol(format!(
				"areaid {} appears twice in one response",
				room.areaid
			)));
		}
	}
	Ok(rooms)
}

fn plausible_block(data: &[u8], count_pos: usize, point_count: u32) -> bool {
	if !(MIN_POLYGON_POINTS..=MAX_POLYGON_POINTS).contains(&point_count) {
		return false;
	}
	let polygon_end = count_pos + 4 + point_count as usize * POINT_LEN;
	if polygon_end + MIN_TRAILER_LEN > data.len() {
		return false;
	}
	let connections = data[polygon_end] as usize;
	connections <= MAX_CONNECTIONS && polygon_end + 1 + connections + 4 <= data.len()
}

/// Parses one room whose `point_count` field starts at `count_pos`.
/// Returns the room and the offset just past its block.
fn parse_room_at(data: &[u8], count_pos: usize, point_count: u32) -> Result<(Room, usize)> {
	let areaid = LittleEndian::read_u32(&data[count_pos - AREAID_BACKSET..count_pos - 5]);
	let label_id = data[count_pos - 1];

	let mut reader = PayloadReader::new(data);
	reader.seek(count_pos + 4)?;

	let mut polygon = Vec::with_capacity(point_count as usize);
	for _ in 0..point_count {
		let x_mm = reader.read_i32()?;
		let y_mm = reader.read_i32()?;
		polygon.push(WorldPoint::new(x_mm, y_mm));
	}

	let connection_count = reader.read_u8()?;
	let connections = reader.read_bytes(connection_count as usize)?.to_vec();
	let preferences = RoomPreferences {
		suction: reader.read_u8()?,
		water: reader.read_u8()?,
		times: reader.read_u8()?,
		sequence: reader.read_u8()?,
	};

	Ok((
		Room {
			areaid,
			label_id,
			polygon,
			connections,
			preferences,
		},
		reader.position(),
	))
}

/// Builds a rooms response payload. Test fixture helper; blocks are
/// emitted back to back the way current firmware does.
#[must_use]
pub fn build_rooms_response(mapid: u32, rooms: &[Room]) -> Vec<u8> {
	let mut writer = PayloadWriter::new();
	writer.write_u8(0).write_u32(mapid).write_u8(rooms.len() as u8);
	for room in rooms {
		write_room_block(&mut writer, room, 0);
	}
	writer.into_bytes()
}

pub(crate) fn write_room_block(writer: &mut PayloadWriter, room: &Room, name_len: u32) {
	writer.write_u32(room.areaid);
	writer.write_u32(name_len);
	writer.write_u8(room.label_id);
	writer.write_u32(room.polygon.len() as u32);
	for point in &room.polygon {
		writer.write_i32(point.x_mm);
		writer.write_i32(point.y_mm);
	}
	writer.write_u8(room.connections.len() as u8);
	writer.write_bytes(&room.connections);
	writer
		.write_u8(room.preferences.suction)
		.write_u8(room.preferences.water)
		.write_u8(room.preferences.times)
		.write_u8(room.preferences.sequence);
}
