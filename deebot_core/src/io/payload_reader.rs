//! A value reader over a borrowed byte slice.
//!
//! Every firmware payload is little-endian; the reader fails with a
//! [`RobotError::Protocol`] as soon as a read would run past the end of the
//! buffer, so codecs can propagate truncation with `?` and no bounds math.

use crate::{RobotError, Result};
use byteorder::{ByteOrder, LittleEndian};

/// Cursor over a borrowed payload. All reads are little-endian.
#[derive(Debug)]
pub struct PayloadReader<'a> {
	data: &'a [u8],
	pos: usize,
}

impl<'a> PayloadReader<'a> {
	#[must_use]
	pub fn new(data: &'a [u8]) -> PayloadReader<'a> {
		PayloadReader { data, pos: 0 }
	}

	/// Current offset from the start of the payload.
	#[must_use]
	pub fn position(&self) -> usize {
		self.pos
	}

	/// Number of unread bytes.
	#[must_use]
	pub fn remaining(&self) -> usize {
		self.data.len() - self.pos
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.remaining() == 0
	}

	/// Moves the cursor to an absolute offset.
	pub fn seek(&mut self, pos: usize) -> Result<()> {
		if pos > self.data.len() {
			return Err(RobotError::protocol(format!(
				"seek to {pos} outside payload of {} bytes",
				self.data.len()
			)));
		}
		self.pos = pos;
		Ok(())
	}

	/// Skips `n` bytes.
	pub fn skip(&mut self, n: usize) -> Result<()> {
		self.take(n).map(|_| ())
	}

	fn take(&mut self, n: usize) -> Result<&'a [u8]> {
		if self.remaining() < n {
			return Err(RobotError::protocol(format!(
				"truncated payload: needed {n} bytes at offset {}, only {} left",
				self.pos,
				self.remaining()
			)));
		}
		let slice = &self.data[self.pos..self.pos + n];
		self.pos += n;
		Ok(slice)
	}

	pub fn read_u8(&mut self) -> Result<u8> {
		Ok(self.take(1)?[0])
	}

	pub fn read_u16(&mut self) -> Result<u16> {
		Ok(LittleEndian::read_u16(self.take(2)?))
	}

	pub fn read_u32(&mut self) -> Result<u32> {
		Ok(LittleEndian::read_u32(self.take(4)?))
	}

	pub fn read_i16(&mut self) -> Result<i16> {
		Ok(LittleEndian::read_i16(self.take(2)?))
	}

	pub fn read_i32(&mut self) -> Result<i32> {
		Ok(LittleEndian::read_i32(self.take(4)?))
	}

	pub fn read_f32(&mut self) -> Result<f32> {
		Ok(LittleEndian::read_f32(self.take(4)?))
	}

	/// Reads `n` raw bytes.
	pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8]> {
		self.take(n)
	}

	/// Reads all bytes up to the end of the payload.
	pub fn read_rest(&mut self) -> &'a [u8] {
		let rest = &self.data[self.pos..];
		self.pos = self.data.len();
		rest
	}

	/// Peeks a `u32` at an absolute offset without moving the cursor.
	pub fn peek_u32_at(&self, pos: usize) -> Result<u32> {
		if pos + 4 > self.data.len() {
			return Err(RobotError::protocol(format!(
				"truncated payload: cannot peek u32 at offset {pos}"
			)));
		}
		Ok(LittleEndian::read_u32(&self.data[pos..pos + 4]))
	}
}
