//! The center-origin world/grid transform.
//!
//! World (0,0) sits at the center of the unrotated raster; x grows east, y
//! grows north, grid rows grow south. The configured clockwise rotation is
//! applied on top, so callers always work in the rotated grid the map is
//! published in.

use deebot_core::{GridPoint, RobotError, Result, WorldPoint};
use serde::Serialize;

/// Transform between world millimeters and published-map pixels.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MapTransform {
	/// Published (rotated) grid width.
	pub width_px: u32,
	/// Published (rotated) grid height.
	pub height_px: u32,
	pub mm_per_pixel: f64,
	pub rotation_deg: u16,
}

impl MapTransform {
	pub fn new(width_px: u32, height_px: u32, mm_per_pixel: f64, rotation_deg: u16) -> Result<MapTransform> {
		if mm_per_pixel <= 0.0 {
			return Err(RobotError::InvalidArgument(
				"mm_per_pixel must be positive".to_string(),
			));
		}
		if rotation_deg % 90 != 0 {
			return Err(RobotError::InvalidArgument(format!(
				"rotation {rotation_deg} is not a multiple of 90"
			)));
		}
		Ok(MapTransform {
			width_px,
			height_px,
			mm_per_pixel,
			rotation_deg,
		})
	}

	fn quarter_turns(&self) -> u8 {
		((self.rotation_deg / 90) % 4) as u8
	}

	/// Grid dimensions before rotation; 90 and 270 swap width and height.
	fn unrotated_size(&self) -> (u32, u32) {
		if self.quarter_turns() % 2 == 1 {
			(self.height_px, self.width_px)
		} else {
			(self.width_px, self.height_px)
		}
	}

	/// Projects a world point into the published grid, clamped to bounds.
	#[must_use]
	pub fn world_to_grid(&self, point: WorldPoint) -> GridPoint {
		let (uw, uh) = self.unrotated_size();
		let gx = (f64::from(uw) / 2.0 + f64::from(point.x_mm) / self.mm_per_pixel).round();
		let gy = (f64::from(uh) / 2.0 - f64::from(point.y_mm) / self.mm_per_pixel).round();
		let gx = (gx.max(0.0) as u32).min(uw.saturating_sub(1));
		let gy = (gy.max(0.0) as u32).min(uh.saturating_sub(1));
		rotate_index((gx, gy), uw, uh, self.quarter_turns())
	}

	/// Projects a world point into continuous grid coordinates, without
	/// rounding or clamping. The polygon rasterizer samples these.
	#[must_use]
	pub fn world_to_grid_f(&self, point: WorldPoint) -> (f64, f64) {
		let (uw, uh) = self.unrotated_size();
		let gx = f64::from(uw) / 2.0 + f64::from(point.x_mm) / self.mm_per_pixel;
		let gy = f64::from(uh) / 2.0 - f64::from(point.y_mm) / self.mm_per_pixel;
		rotate_continuous((gx, gy), uw, uh, self.quarter_turns())
	}

	/// Inverse of [`Self::world_to_grid`] up to half a pixel.
	#[must_use]
	pub fn grid_to_world(&self, point: GridPoint) -> WorldPoint {
		let (uw, uh) = self.unrotated_size();
		let (gx, gy) = unrotate_index((point.x, point.y), uw, uh, self.quarter_turns());
		let x_mm = (f64::from(gx) - f64::from(uw) / 2.0) * self.mm_per_pixel;
		let y_mm = (f64::from(uh) / 2.0 - f64::from(gy)) * self.mm_per_pixel;
		WorldPoint::new(x_mm.round() as i32, y_mm.round() as i32)
	}

	/// Converts a zone given by two opposite grid corners into a world
	/// rectangle `(min corner, max corner)`.
	#[must_use]
	pub fn map_zone_to_world_rect(&self, a: GridPoint, b: GridPoint) -> (WorldPoint, WorldPoint) {
		let wa = self.grid_to_world(a);
		let wb = self.grid_to_world(b);
		(
			WorldPoint::new(wa.x_mm.min(wb.x_mm), wa.y_mm.min(wb.y_mm)),
			WorldPoint::new(wa.x_mm.max(wb.x_mm), wa.y_mm.max(wb.y_mm)),
		)
	}
}

/// Rotates a pixel index clockwise `turns` times, starting in a `w` x `h`
/// grid.
fn rotate_index(point: (u32, u32), w: u32, h: u32, turns: u8) -> GridPoint {
	let (mut x, mut y) = point;
	let (mut w, mut h) = (w, h);
	for _ in 0..turns % 4 {
		let next = (h - 1 - y, x);
		x = next.0;
		y = next.1;
		std::mem::swap(&mut w, &mut h);
	}
	GridPoint::new(x, y)
}

/// Inverse of [`rotate_index`]: counter-clockwise by the same turns.
fn unrotate_index(point: (u32, u32), uw: u32, uh: u32, turns: u8) -> (u32, u32) {
	// Rotating clockwise 4 - turns times in the rotated frame undoes the
	// rotation; track the frame dimensions as they swap.
	let (mut w, mut h) = if turns % 2 == 1 { (uh, uw) } else { (uw, uh) };
	let (mut x, mut y) = point;
	for _ in 0..(4 - turns % 4) % 4 {
		let next = (h - 1 - y, x);
		x = next.0;
		y = next.1;
		std::mem::swap(&mut w, &mut h);
	}
	(x, y)
}

/// Rotates continuous grid coordinates clockwise.
fn rotate_continuous(point: (f64, f64), w: u32, h: u32, turns: u8) -> (f64, f64) {
	let (mut x, mut y) = point;
	let (mut w, mut h) = (f64::from(w), f64::from(h));
	for _ in 0..turns % 4 {
		let next = (h - y, x);
		x = next.0;
		y = next.1;
		std::mem::swap(&mut w, &mut h);
	}
	(x, y)
}

#[cfg(test)]
mod tests {
	use super::*;

	fn transform(rotation_deg: u16) -> MapTransform {
		MapTransform::new(100, 80, 50.0, rotation_deg).unwrap()
	}

	#[test]
	fn world_origin_maps_to_raster_center() {
		let t = transform(0);
		assert_eq!(t.world_to_grid(WorldPoint::new(0, 0)), GridPoint::new(50, 40));
	}

	#[test]
	fn y_axis_points_north() {
		let t = transform(0);
		let north = t.world_to_grid(WorldPoint::new(0, 1000));
		assert_eq!(north, GridPoint::new(50, 20));
	}

	#[test]
	fn out_of_range_points_clamp() {
		let t = transform(0);
		assert_eq!(
			t.world_to_grid(WorldPoint::new(1_000_000, -1_000_000)),
			GridPoint::new(99, 79)
		);
		assert_eq!(
			t.world_to_grid(WorldPoint::new(-1_000_000, 1_000_000)),
			GridPoint::new(0, 0)
		);
	}

	#[rstest::rstest]
	#[case(0)]
	#[case(90)]
	#[case(180)]
	#[case(270)]
	fn grid_round_trip_is_within_half_a_pixel(#[case] rotation: u16) {
		let t = transform(rotation);
		for x in [0u32, 1, 17, 49, 50, 79] {
			for y in [0u32, 1, 20, 39, 40, 63] {
				let grid = GridPoint::new(x, y);
				let world = t.grid_to_world(grid);
				let back = t.world_to_grid(world);
				assert_eq!(back, grid, "rotation {rotation}, grid {grid}");
			}
		}
	}

	#[test]
	fn rotation_90_swaps_axes() {
		let t = transform(90);
		// Unrotated grid is 80 wide, 100 tall; the point east of center
		// lands south of center after a clockwise quarter turn.
		let east = t.world_to_grid(WorldPoint::new(1000, 0));
		assert_eq!(east, GridPoint::new(49, 60));
	}

	#[test]
	fn zone_rect_round_trip_stays_within_one_pixel() {
		let t = transform(270);
		let a = GridPoint::new(10, 12);
		let b = GridPoint::new(30, 40);
		let (min, max) = t.map_zone_to_world_rect(a, b);
		let a2 = t.world_to_grid(WorldPoint::new(min.x_mm, min.y_mm));
		let b2 = t.world_to_grid(WorldPoint::new(max.x_mm, max.y_mm));
		let xs = [a.x, b.x];
		let ys = [a.y, b.y];
		for corner in [a2, b2] {
			assert!(xs.iter().any(|x| corner.x.abs_diff(*x) <= 1), "corner {corner}");
			assert!(ys.iter().any(|y| corner.y.abs_diff(*y) <= 1), "corner {corner}");
		}
	}

	#[test]
	fn invalid_scale_is_rejected() {
		assert!(MapTransform::new(10, 10, 0.0, 0).is_err());
		assert!(MapTransform::new(10, 10, -5.0, 0).is_err());
		assert!(MapTransform::new(10, 10, 50.0, 45).is_err());
	}
}
