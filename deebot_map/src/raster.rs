//! Reassembly of the compressed raster from its submap tiles.

use deebot_core::{GridPoint, RobotError, Result};
use deebot_proto::{CompressedMapResponse, decode_submap};
use std::collections::HashSet;

const PIXEL_FLOOR: u8 = 1;
const PIXEL_WALL: u8 = 2;
const PIXEL_WALL_ALT: u8 = 255;

/// Floor and wall pixel sets of one map, in raster space before any
/// rotation.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RasterMap {
	pub width: u32,
	pub height: u32,
	pub resolution_cm: u16,
	pub floor: HashSet<GridPoint>,
	pub walls: HashSet<GridPoint>,
}

/// Decodes all tiles of a compressed map response and places them on the
/// full raster. Tile `i` sits at column `i % columns`, row `i / columns`;
/// pixels outside the declared map size are dropped.
pub fn assemble_raster(response: &CompressedMapResponse) -> Result<RasterMap> {
	let info = &response.info;
	let tiles_needed = (info.columns * info.rows) as usize;
	if response.submaps.len() < tiles_needed {
		return Err(RobotError::protocol(format!(
			"{} submaps for a {}x{} tile grid",
			response.submaps.len(),
			info.columns,
			info.rows
		)));
	}

	let expected_pixels = (info.submap_width * info.submap_height) as usize;
	let mut raster = RasterMap {
		width: info.map_width,
		height: info.map_height,
		resolution_cm: info.resolution_cm,
		floor: HashSet::new(),
		walls: HashSet::new(),
	};

	for (index, submap) in response.submaps.iter().take(tiles_needed).enumerate() {
		let pixels = decode_submap(submap, expected_pixels)?;
		let base_x = (index as u32 % info.columns) * info.submap_width;
		let base_y = (index as u32 / info.columns) * info.submap_height;

		for (offset, value) in pixels.iter().enumerate() {
			let x = base_x + offset as u32 % info.submap_width;
			let y = base_y + offset as u32 / info.submap_width;
			if x >= info.map_width || y >= info.map_height {
				continue;
			}
			match *value {
				PIXEL_FLOOR => {
					raster.floor.insert(GridPoint::new(x, y));
				}
				PIXEL_WALL | PIXEL_WALL_ALT => {
					raster.walls.insert(GridPoint::new(x, y));
				}
				_ => {}
			}
		}
	}
	Ok(raster)
}

/// Rotates a pixel set clockwise by `quarter_turns` within a `width` x
/// `height` grid. Returns the rotated set and the resulting dimensions.
#[must_use]
pub fn rotate_pixels(
	pixels: &HashSet<GridPoint>,
	width: u32,
	height: u32,
	quarter_turns: u8,
) -> (HashSet<GridPoint>, u32, u32) {
	let mut current: HashSet<GridPoint> = pixels.clone();
	let (mut w, mut h) = (width, height);
	for _ in 0..quarter_turns % 4 {
		current = current
			.iter()
			.map(|p| GridPoint::new(h - 1 - p.y, p.x))
			.collect();
		std::mem::swap(&mut w, &mut h);
	}
	(current, w, h)
}

impl RasterMap {
	/// The raster rotated clockwise by a multiple of 90 degrees.
	#[must_use]
	pub fn rotated(&self, rotation_deg: u16) -> RasterMap {
		let turns = ((rotation_deg / 90) % 4) as u8;
		if turns == 0 {
			return self.clone();
		}
		let (floor, w, h) = rotate_pixels(&self.floor, self.width, self.height, turns);
		let (walls, _, _) = rotate_pixels(&self.walls, self.width, self.height, turns);
		RasterMap {
			width: w,
			height: h,
			resolution_cm: self.resolution_cm,
			floor,
			walls,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use deebot_proto::{CompressedMapInfo, encode_lzma_chunk};

	fn four_tile_response(tiles: [Vec<u8>; 4]) -> CompressedMapResponse {
		CompressedMapResponse {
			mapid: 1,
			info: CompressedMapInfo {
				map_width: 20,
				map_height: 20,
				columns: 2,
				rows: 2,
				submap_width: 10,
				submap_height: 10,
				resolution_cm: 5,
			},
			submaps: tiles.map(|t| encode_lzma_chunk(&t)).to_vec(),
		}
	}

	#[test]
	fn tile_values_classify_into_floor_and_wall() -> Result<()> {
		let raster = assemble_raster(&four_tile_response([
			vec![1u8; 100],
			vec![0u8; 100],
			vec![2u8; 100],
			vec![255u8; 100],
		]))?;

		assert_eq!(raster.resolution_cm, 5);
		// Tile 0 occupies x 0..10, y 0..10.
		assert_eq!(raster.floor.len(), 100);
		assert!(raster.floor.contains(&GridPoint::new(0, 0)));
		assert!(raster.floor.contains(&GridPoint::new(9, 9)));
		assert!(!raster.floor.contains(&GridPoint::new(10, 0)));
		// Tiles 2 and 3 are the bottom row.
		assert_eq!(raster.walls.len(), 200);
		assert!(raster.walls.contains(&GridPoint::new(0, 10)));
		assert!(raster.walls.contains(&GridPoint::new(19, 19)));
		Ok(())
	}

	#[test]
	fn tile_with_wrong_pixel_count_fails() {
		let response = four_tile_response([
			vec![1u8; 100],
			vec![0u8; 99],
			vec![0u8; 100],
			vec![0u8; 100],
		]);
		assert!(assemble_raster(&response).is_err());
	}

	#[test]
	fn missing_tiles_fail() {
		let mut response = four_tile_response([
			vec![0u8; 100],
			vec![0u8; 100],
			vec![0u8; 100],
			vec![0u8; 100],
		]);
		response.submaps.truncate(3);
		assert!(assemble_raster(&response).is_err());
	}

	#[test]
	fn rotation_moves_pixels_clockwise() {
		let mut pixels = HashSet::new();
		pixels.insert(GridPoint::new(0, 0));
		pixels.insert(GridPoint::new(2, 1));
		// 4 wide, 3 tall; clockwise: (x, y) -> (h - 1 - y, x).
		let (rotated, w, h) = rotate_pixels(&pixels, 4, 3, 1);
		assert_eq!((w, h), (3, 4));
		assert!(rotated.contains(&GridPoint::new(2, 0)));
		assert!(rotated.contains(&GridPoint::new(1, 2)));
	}

	#[test]
	fn full_pipeline_from_service_payload() -> Result<()> {
		// The wire payload as the map service returns it, four 10x10
		// tiles at a raw resolution of 50 (millimeters).
		let info = CompressedMapInfo {
			map_width: 20,
			map_height: 20,
			columns: 2,
			rows: 2,
			submap_width: 10,
			submap_height: 10,
			resolution_cm: 5,
		};
		let tiles: Vec<Vec<u8>> = [
			vec![1u8; 100],
			vec![0u8; 100],
			vec![2u8; 100],
			vec![255u8; 100],
		]
		.iter()
		.map(|t| encode_lzma_chunk(t))
		.collect();
		let payload =
			deebot_proto::services::map::build_compressed_map_response(9, &info, 50, &tiles);

		let response = deebot_proto::services::map::parse_compressed_map(&payload)?;
		let raster = assemble_raster(&response)?;

		assert_eq!(raster.resolution_cm, 5);
		assert_eq!(raster.floor.len(), 100);
		assert_eq!(raster.walls.len(), 200);
		assert!(raster.floor.iter().all(|p| p.x < 10 && p.y < 10));
		Ok(())
	}

	#[rstest::rstest]
	#[case(0)]
	#[case(1)]
	#[case(2)]
	#[case(3)]
	fn rotating_forward_and_back_is_identity(#[case] turns: u8) {
		let mut pixels = HashSet::new();
		pixels.insert(GridPoint::new(0, 0));
		pixels.insert(GridPoint::new(7, 2));
		pixels.insert(GridPoint::new(3, 5));
		let (rotated, w, h) = rotate_pixels(&pixels, 8, 6, turns);
		let (restored, w2, h2) = rotate_pixels(&rotated, w, h, (4 - turns) % 4);
		assert_eq!(restored, pixels);
		assert_eq!((w2, h2), (8, 6));
	}
}
