//! Decompression of the vendor's LZMA payloads.
//!
//! Submaps and trace chunks share one framing: five bytes of LZMA
//! properties and dictionary size, a 4-byte little-endian uncompressed
//! size, then the raw LZMA stream. The standard LZMA-alone container wants
//! a 13-byte header with a 64-bit size, so the decoder rebuilds one with a
//! zero high half before handing the stream to the codec.

use byteorder::{ByteOrder, LittleEndian};
use deebot_core::{RobotError, Result};
use std::io::Cursor;

/// Properties and dictionary prefix the firmware emits on every chunk.
/// Trace blobs are split on this signature when chunks are concatenated.
pub const LZMA_PROPS_SIGNATURE: [u8; 5] = [0x5D, 0x00, 0x00, 0x04, 0x00];

const CUSTOM_HEADER_LEN: usize = 9;
const ALONE_HEADER_LEN: usize = 13;

/// Decodes one custom-framed LZMA chunk. Returns the decoded bytes and how
/// many input bytes the codec consumed (concatenated chunks leave a rest).
pub fn decode_lzma_chunk_tracked(data: &[u8]) -> Result<(Vec<u8>, usize)> {
	if data.len() < CUSTOM_HEADER_LEN {
		return Err(RobotError::DecompressionFailed(format!(
			"chunk of {} bytes is shorter than the {CUSTOM_HEADER_LEN}-byte header",
			data.len()
		)));
	}
	let declared_len = LittleEndian::read_u32(&data[5..9]) as usize;

	let mut alone = Vec::with_capacity(ALONE_HEADER_LEN + data.len() - CUSTOM_HEADER_LEN);
	alone.extend_from_slice(&data[0..5]);
	alone.extend_from_slice(&data[5..9]);
	alone.extend_from_slice(&[0u8; 4]); // size high half
	alone.extend_from_slice(&data[CUSTOM_HEADER_LEN..]);

	let mut input = Cursor::new(alone.as_slice());
	let mut output = Vec::with_capacity(declared_len);
	lzma_rs::lzma_decompress(&mut input, &mut output)
		.map_err(|e| RobotError::DecompressionFailed(format!("lzma: {e:?}")))?;

	if output.len() != declared_len {
		return Err(RobotError::DecompressionFailed(format!(
			"declared {declared_len} bytes, decoded {}",
			output.len()
		)));
	}
	let consumed = (input.position() as usize).saturating_sub(ALONE_HEADER_LEN) + CUSTOM_HEADER_LEN;
	Ok((output, consumed))
}

/// A size-bounded decode stops before the encoder's end-of-stream marker;
/// up to this many unread trailing bytes still count as a complete chunk.
/// A real second chunk is always larger (its header alone is 9 bytes plus
/// a non-empty stream).
pub const CHUNK_TRAILER_SLACK: usize = 12;

/// Decodes one custom-framed LZMA chunk, ignoring any trailing bytes.
pub fn decode_lzma_chunk(data: &[u8]) -> Result<Vec<u8>> {
	decode_lzma_chunk_tracked(data).map(|(output, _)| output)
}

/// Encodes bytes into the firmware's chunk framing. The inverse of
/// [`decode_lzma_chunk`]; used to build fixtures and verify round trips.
pub fn encode_lzma_chunk(raw: &[u8]) -> Vec<u8> {
	let mut alone = Vec::new();
	let mut input = Cursor::new(raw);
	lzma_rs::lzma_compress(&mut input, &mut alone).expect("in-memory compression cannot fail");

	let mut chunk = Vec::with_capacity(alone.len() - ALONE_HEADER_LEN + CUSTOM_HEADER_LEN);
	chunk.extend_from_slice(&LZMA_PROPS_SIGNATURE);
	let mut size = [0u8; 4];
	LittleEndian::write_u32(&mut size, raw.len() as u32);
	chunk.extend_from_slice(&size);
	chunk.extend_from_slice(&alone[ALONE_HEADER_LEN..]);
	chunk
}

/// Decodes one submap tile and checks it against the expected pixel count.
pub fn decode_submap(data: &[u8], expected_pixels: usize) -> Result<Vec<u8>> {
	let pixels = decode_lzma_chunk(data)?;
	if pixels.len() != expected_pixels {
		return Err(RobotError::DecompressionFailed(format!(
			"submap decoded to {} pixels, expected {expected_pixels}",
			pixels.len()
		)));
	}
	Ok(pixels)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn chunk_round_trip() -> Result<()> {
		let raw: Vec<u8> = (0..=255u8).cycle().take(1000).collect();
		let chunk = encode_lzma_chunk(&raw);
		assert_eq!(&chunk[0..5], &LZMA_PROPS_SIGNATURE);
		let (decoded, consumed) = decode_lzma_chunk_tracked(&chunk)?;
		assert_eq!(decoded, raw);
		// Only the end-of-stream marker may remain unread.
		assert!(chunk.len() - consumed <= CHUNK_TRAILER_SLACK);
		Ok(())
	}

	#[test]
	fn empty_payload_round_trip() -> Result<()> {
		let chunk = encode_lzma_chunk(&[]);
		assert_eq!(decode_lzma_chunk(&chunk)?, Vec::<u8>::new());
		Ok(())
	}

	#[test]
	fn short_chunk_fails() {
		let err = decode_lzma_chunk(&[0x5D, 0, 0]).unwrap_err();
		assert!(matches!(err, RobotError::DecompressionFailed(_)));
	}

	#[test]
	fn size_mismatch_fails() {
		let raw = vec![1u8; 100];
		let mut chunk = encode_lzma_chunk(&raw);
		// Lie about the size: declare one byte more than the stream holds.
		let declared = 101u32.to_le_bytes();
		chunk[5..9].copy_from_slice(&declared);
		assert!(decode_lzma_chunk(&chunk).is_err());
	}

	#[test]
	fn submap_pixel_count_is_enforced() {
		let chunk = encode_lzma_chunk(&[1u8; 100]);
		assert!(decode_submap(&chunk, 100).is_ok());
		assert!(decode_submap(&chunk, 99).is_err());
	}

	#[test]
	fn garbage_stream_fails() {
		let mut chunk = vec![];
		chunk.extend_from_slice(&LZMA_PROPS_SIGNATURE);
		chunk.extend_from_slice(&50u32.to_le_bytes());
		chunk.extend_from_slice(&[0xFF; 20]);
		assert!(decode_lzma_chunk(&chunk).is_err());
	}
}
