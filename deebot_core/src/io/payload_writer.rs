//! Builder for firmware request payloads. Little-endian, append-only.

use byteorder::{ByteOrder, LittleEndian};

/// Append-only little-endian payload builder.
#[derive(Default)]
pub struct PayloadWriter {
	buf: Vec<u8>,
}

impl PayloadWriter {
	#[must_use]
	pub fn new() -> PayloadWriter {
		PayloadWriter::default()
	}

	#[must_use]
	pub fn with_capacity(capacity: usize) -> PayloadWriter {
		PayloadWriter {
			buf: Vec::with_capacity(capacity),
		}
	}

	#[must_use]
	pub fn len(&self) -> usize {
		self.buf.len()
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.buf.is_empty()
	}

	pub fn write_u8(&mut self, value: u8) -> &mut Self {
		self.buf.push(value);
		self
	}

	pub fn write_u16(&mut self, value: u16) -> &mut Self {
		let mut bytes = [0u8; 2];
		LittleEndian::write_u16(&mut bytes, value);
		self.buf.extend_from_slice(&bytes);
		self
	}

	pub fn write_u32(&mut self, value: u32) -> &mut Self {
		let mut bytes = [0u8; 4];
		LittleEndian::write_u32(&mut bytes, value);
		self.buf.extend_from_slice(&bytes);
		self
	}

	pub fn write_i16(&mut self, value: i16) -> &mut Self {
		self.write_u16(value as u16)
	}

	pub fn write_i32(&mut self, value: i32) -> &mut Self {
		self.write_u32(value as u32)
	}

	pub fn write_f32(&mut self, value: f32) -> &mut Self {
		let mut bytes = [0u8; 4];
		LittleEndian::write_f32(&mut bytes, value);
		self.buf.extend_from_slice(&bytes);
		self
	}

	pub fn write_bytes(&mut self, bytes: &[u8]) -> &mut Self {
		self.buf.extend_from_slice(bytes);
		self
	}

	/// Appends `n` zero bytes. Firmware frames pad to fixed sizes.
	pub fn write_padding(&mut self, n: usize) -> &mut Self {
		self.buf.resize(self.buf.len() + n, 0);
		self
	}

	/// Overwrites one byte at an absolute offset. The offset must already
	/// have been written.
	pub fn set_u8_at(&mut self, pos: usize, value: u8) -> &mut Self {
		self.buf[pos] = value;
		self
	}

	#[must_use]
	pub fn into_bytes(self) -> Vec<u8> {
		self.buf
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::io::PayloadReader;

	#[test]
	fn round_trips_through_reader() -> crate::Result<()> {
		let mut w = PayloadWriter::new();
		w.write_u8(7).write_u16(513).write_i32(-3).write_padding(2);
		let bytes = w.into_bytes();
		assert_eq!(bytes.len(), 9);

		let mut r = PayloadReader::new(&bytes);
		assert_eq!(r.read_u8()?, 7);
		assert_eq!(r.read_u16()?, 513);
		assert_eq!(r.read_i32()?, -3);
		assert_eq!(r.read_bytes(2)?, &[0, 0]);
		Ok(())
	}

	#[test]
	fn set_u8_at_patches_in_place() {
		let mut w = PayloadWriter::new();
		w.write_padding(30);
		w.set_u8_at(29, 5);
		let bytes = w.into_bytes();
		assert_eq!(bytes[29], 5);
		assert_eq!(bytes[28], 0);
	}
}
