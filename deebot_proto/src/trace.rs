//! Decoder for the robot's driven-path trace.
//!
//! The trace service returns a hexadecimal blob whose raw bytes are one or
//! more LZMA chunks in the shared custom framing. Decoded records are
//! 5-byte tuples: `i16` x, `i16` y (little-endian) and a flag byte. Raw
//! coordinates are in `tracePointUnitMm / 100` millimeter units; the
//! observed firmware value 10 makes them tenths of a millimeter.

use crate::{
	CHUNK_TRAILER_SLACK, LZMA_PROPS_SIGNATURE, TracePoint, decode_lzma_chunk,
	decode_lzma_chunk_tracked, encode_lzma_chunk,
};
use deebot_core::{RobotError, Result, io::PayloadReader, io::PayloadWriter};
use std::collections::VecDeque;

const TRACE_RECORD_LEN: usize = 5;

/// Decodes a hexadecimal string into bytes.
pub fn decode_hex(hex: &str) -> Result<Vec<u8>> {
	let hex = hex.trim();
	if hex.len() % 2 != 0 {
		return Err(RobotError::protocol("hex blob has odd length"));
	}
	let mut bytes = Vec::with_capacity(hex.len() / 2);
	for pair in hex.as_bytes().chunks(2) {
		let high = hex_digit(pair[0])?;
		let low = hex_digit(pair[1])?;
		bytes.push(high << 4 | low);
	}
	Ok(bytes)
}

fn hex_digit(c: u8) -> Result<u8> {
	match c {
		b'0'..=b'9' => Ok(c - b'0'),
		b'a'..=b'f' => Ok(c - b'a' + 10),
		b'A'..=b'F' => Ok(c - b'A' + 10),
		_ => Err(RobotError::protocol(format!("invalid hex digit {:?}", c as char))),
	}
}

/// Decompresses a trace blob into its raw record bytes.
///
/// A single-chunk decode is attempted first. When it fails, or when more
/// than a trailer's worth of input is left over, the blob is split at each
/// occurrence of the LZMA signature and the chunks are decoded
/// independently and concatenated.
pub fn decompress_trace_blob(data: &[u8]) -> Result<Vec<u8>> {
	match decode_lzma_chunk_tracked(data) {
		Ok((output, consumed)) if data.len() - consumed <= CHUNK_TRAILER_SLACK => return Ok(output),
		_ => {}
	}

	let starts = signature_positions(data);
	if starts.len() <= 1 {
		// Nothing to split at; surface the single-chunk error.
		return decode_lzma_chunk(data);
	}
	log::debug!("trace blob is not a single chunk, splitting at {} signatures", starts.len());

	let mut output = Vec::new();
	for (index, &start) in starts.iter().enumerate() {
		let end = starts.get(index + 1).copied().unwrap_or(data.len());
		output.extend(decode_lzma_chunk(&data[start..end])?);
	}
	Ok(output)
}

fn signature_positions(data: &[u8]) -> Vec<usize> {
	let mut positions = Vec::new();
	let mut offset = 0;
	while offset + LZMA_PROPS_SIGNATURE.len() <= data.len() {
		if data[offset..offset + LZMA_PROPS_SIGNATURE.len()] == LZMA_PROPS_SIGNATURE {
			positions.push(offset);
			// A signature starts a chunk; skip its header so the size
			// field cannot double as a match.
			offset += LZMA_PROPS_SIGNATURE.len();
		} else {
			offset += 1;
		}
	}
	positions
}

/// Decodes a full trace blob into scaled path points.
///
/// Consecutive records at the same position are dropped; the robot emits
/// them while rotating in place.
pub fn decode_trace(data: &[u8], unit_mm: u16) -> Result<Vec<TracePoint>> {
	let raw = decompress_trace_blob(data)?;
	if raw.len() % TRACE_RECORD_LEN != 0 {
		return Err(RobotError::protocol(format!(
			"trace of {} bytes is not a whole number of records",
			raw.len()
		)));
	}

	let mut points: Vec<TracePoint> = Vec::with_capacity(raw.len() / TRACE_RECORD_LEN);
	let mut reader = PayloadReader::new(&raw);
	while !reader.is_empty() {
		let x = reader.read_i16()?;
		let y = reader.read_i16()?;
		let flag = reader.read_u8()?;
		let point = TracePoint {
			x_mm: i32::from(x) * i32::from(unit_mm) / 100,
			y_mm: i32::from(y) * i32::from(unit_mm) / 100,
			flag,
		};
		if points
			.last()
			.is_none_or(|last| (last.x_mm, last.y_mm) != (point.x_mm, point.y_mm))
		{
			points.push(point);
		}
	}
	Ok(points)
}

/// Encodes points into one compressed trace chunk. The inverse of
/// [`decode_trace`] for coordinates that fit the raw `i16` range.
pub fn encode_trace_chunk(points: &[TracePoint], unit_mm: u16) -> Vec<u8> {
	let mut writer = PayloadWriter::with_capacity(points.len() * TRACE_RECORD_LEN);
	for point in points {
		writer.write_i16((point.x_mm * 100 / i32::from(unit_mm)) as i16);
		writer.write_i16((point.y_mm * 100 / i32::from(unit_mm)) as i16);
		writer.write_u8(point.flag);
	}
	encode_lzma_chunk(&writer.into_bytes())
}

/// Rolling live-path buffer with FIFO eviction.
#[derive(Debug, Default)]
pub struct TraceBuffer {
	points: VecDeque<TracePoint>,
	max_points: usize,
}

impl TraceBuffer {
	#[must_use]
	pub fn new(max_points: usize) -> TraceBuffer {
		TraceBuffer {
			points: VecDeque::new(),
			max_points,
		}
	}

	/// Appends points, skipping any that repeat the current tail position,
	/// and evicts from the front beyond the cap.
	pub fn extend(&mut self, points: &[TracePoint]) {
		for point in points {
			if let Some(last) = self.points.back() {
				if (last.x_mm, last.y_mm) == (point.x_mm, point.y_mm) {
					continue;
				}
			}
			self.points.push_back(*point);
			while self.points.len() > self.max_points {
				self.points.pop_front();
			}
		}
	}

	pub fn clear(&mut self) {
		self.points.clear();
	}

	#[must_use]
	pub fn len(&self) -> usize {
		self.points.len()
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.points.is_empty()
	}

	pub fn iter(&self) -> impl Iterator<Item = &TracePoint> {
		self.points.iter()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn point(x_mm: i32, y_mm: i32) -> TracePoint {
		TracePoint { x_mm, y_mm, flag: 0 }
	}

	#[test]
	fn hex_decoding() -> Result<()> {
		assert_eq!(decode_hex("5d000004 ".trim())?, vec![0x5D, 0, 0, 4]);
		assert_eq!(decode_hex("DEADbeef")?, vec![0xDE, 0xAD, 0xBE, 0xEF]);
		assert!(decode_hex("abc").is_err());
		assert!(decode_hex("zz").is_err());
		Ok(())
	}

	#[test]
	fn single_chunk_round_trip() -> Result<()> {
		let points = vec![point(0, 0), point(120, -340), point(121, -340)];
		let chunk = encode_trace_chunk(&points, 10);
		assert_eq!(decode_trace(&chunk, 10)?, points);
		Ok(())
	}

	#[test]
	fn concatenated_chunks_decode_in_order() -> Result<()> {
		let first = vec![point(0, 0), point(10, 10), point(20, 0)];
		let second = vec![point(30, -10), point(40, 0), point(50, 10)];
		let mut blob = encode_trace_chunk(&first, 10);
		blob.extend(encode_trace_chunk(&second, 10));

		let decoded = decode_trace(&blob, 10)?;
		let expected: Vec<TracePoint> = first.into_iter().chain(second).collect();
		assert_eq!(decoded, expected);
		Ok(())
	}

	#[test]
	fn consecutive_duplicates_are_dropped() -> Result<()> {
		let points = vec![point(5, 5), point(5, 5), point(5, 5), point(6, 5)];
		let chunk = encode_trace_chunk(&points, 10);
		assert_eq!(decode_trace(&chunk, 10)?, vec![point(5, 5), point(6, 5)]);
		Ok(())
	}

	#[test]
	fn unit_scale_applies() -> Result<()> {
		// At unit 20 a raw count is a fifth of a millimeter.
		let points = vec![point(100, -40)];
		let chunk = encode_trace_chunk(&points, 20);
		assert_eq!(decode_trace(&chunk, 20)?, points);
		Ok(())
	}

	#[test]
	fn truncated_record_fails() {
		let chunk = encode_lzma_chunk(&[1, 2, 3, 4, 5, 6, 7]);
		assert!(decode_trace(&chunk, 10).is_err());
	}

	#[test]
	fn buffer_evicts_fifo() {
		let mut buffer = TraceBuffer::new(3);
		buffer.extend(&[point(1, 0), point(2, 0), point(3, 0), point(4, 0)]);
		let xs: Vec<i32> = buffer.iter().map(|p| p.x_mm).collect();
		assert_eq!(xs, vec![2, 3, 4]);
	}

	#[test]
	fn buffer_skips_repeated_tail() {
		let mut buffer = TraceBuffer::new(10);
		buffer.extend(&[point(1, 1)]);
		buffer.extend(&[point(1, 1), point(2, 2)]);
		assert_eq!(buffer.len(), 2);
	}
}
