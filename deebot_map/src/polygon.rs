//! Scanline polygon rasterization.
//!
//! A pixel belongs to the polygon when its center at `(x + 0.5, y + 0.5)`
//! is inside under the even-odd rule. Each row collects the crossings of
//! polygon edges with the horizontal line through the pixel centers and
//! fills the spans between crossing pairs.

use deebot_core::GridPoint;
use itertools::Itertools;

/// Rasterizes a polygon given in continuous grid coordinates. Pixels
/// outside `width` x `height` are clipped. The result is sorted `(y, x)`.
#[must_use]
pub fn rasterize_polygon(polygon: &[(f64, f64)], width: u32, height: u32) -> Vec<GridPoint> {
	if polygon.len() < 3 || width == 0 || height == 0 {
		return Vec::new();
	}

	let min_y = polygon.iter().map(|p| p.1).fold(f64::INFINITY, f64::min);
	let max_y = polygon.iter().map(|p| p.1).fold(f64::NEG_INFINITY, f64::max);
	let first_row = (min_y - 0.5).floor().max(0.0) as u32;
	let last_row = ((max_y - 0.5).ceil().max(0.0) as u32).min(height.saturating_sub(1));

	let mut pixels = Vec::new();
	for y in first_row..=last_row {
		let center_y = f64::from(y) + 0.5;
		let mut crossings = edge_crossings(polygon, center_y);
		if crossings.is_empty() {
			continue;
		}
		crossings.sort_by(|a, b| a.partial_cmp(b).expect("crossings are finite"));

		for (lo, hi) in crossings.iter().tuples() {
			// Pixel x is filled when lo <= x + 0.5 < hi.
			let first = (lo - 0.5).ceil().max(0.0) as u32;
			let last_exclusive = (hi - 0.5).ceil().max(0.0) as u32;
			for x in first..last_exclusive.min(width) {
				pixels.push(GridPoint::new(x, y));
			}
		}
	}
	pixels.sort_by_key(|p| (p.y, p.x));
	pixels
}

/// X coordinates where polygon edges cross the horizontal line `y`. The
/// half-open edge rule (`y1 <= y < y2` or `y2 <= y < y1`) counts shared
/// vertices exactly once.
fn edge_crossings(polygon: &[(f64, f64)], y: f64) -> Vec<f64> {
	let mut crossings = Vec::new();
	for i in 0..polygon.len() {
		let (x1, y1) = polygon[i];
		let (x2, y2) = polygon[(i + 1) % polygon.len()];
		if (y1 <= y && y2 > y) || (y2 <= y && y1 > y) {
			let t = (y - y1) / (y2 - y1);
			crossings.push(x1 + t * (x2 - x1));
		}
	}
	crossings
}
