//! TCPROS framing: a buffered socket reading 4-byte little-endian
//! length-prefixed frames, and the connection handshake exchanged on every
//! new socket.

use byteorder::{ByteOrder, LittleEndian};
use deebot_core::{RobotError, Result};
use log::trace;
use std::time::Duration;
use tokio::{
	io::{AsyncReadExt, AsyncWriteExt, BufStream},
	net::TcpStream,
	time::timeout,
};

/// A buffered TCPROS connection.
///
/// Reads are bounded by the per-call timeout; an EOF mid-frame is
/// `TransportClosed`, an elapsed timeout is `TransportTimeout`. Writes emit
/// a whole frame in one operation.
pub struct FrameStream {
	stream: BufStream<TcpStream>,
	read_timeout: Duration,
}

impl FrameStream {
	/// Opens a TCP connection, bounded by `connect_timeout`.
	pub async fn connect(
		host: &str,
		port: u16,
		connect_timeout: Duration,
		read_timeout: Duration,
	) -> Result<FrameStream> {
		let stream = timeout(connect_timeout, TcpStream::connect((host, port)))
			.await
			.map_err(|_| RobotError::TransportTimeout(connect_timeout))?
			.map_err(|e| RobotError::ServiceUnavailable(format!("connect {host}:{port}: {e}")))?;
		stream
			.set_nodelay(true)
			.map_err(|e| RobotError::ServiceUnavailable(format!("set_nodelay: {e}")))?;
		Ok(FrameStream {
			stream: BufStream::new(stream),
			read_timeout,
		})
	}

	async fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
		match timeout(self.read_timeout, self.stream.read_exact(buf)).await {
			Err(_) => Err(RobotError::TransportTimeout(self.read_timeout)),
			Ok(Err(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => Err(RobotError::TransportClosed),
			Ok(Err(e)) => Err(RobotError::protocol(format!("socket read: {e}"))),
			Ok(Ok(_)) => Ok(()),
		}
	}

	/// Reads one length-prefixed frame.
	pub async fn read_frame(&mut self) -> Result<Vec<u8>> {
		let mut len_bytes = [0u8; 4];
		self.read_exact(&mut len_bytes).await?;
		let len = LittleEndian::read_u32(&len_bytes) as usize;
		if len > MAX_FRAME_LEN {
			return Err(RobotError::protocol(format!("frame of {len} bytes exceeds limit")));
		}
		let mut payload = vec![0u8; len];
		self.read_exact(&mut payload).await?;
		trace!("read frame of {len} bytes");
		Ok(payload)
	}

	/// Writes one length-prefixed frame and flushes it.
	pub async fn write_frame(&mut self, payload: &[u8]) -> Result<()> {
		let mut frame = Vec::with_capacity(payload.len() + 4);
		let mut len_bytes = [0u8; 4];
		LittleEndian::write_u32(&mut len_bytes, payload.len() as u32);
		frame.extend_from_slice(&len_bytes);
		frame.extend_from_slice(payload);
		self
			.stream
			.write_all(&frame)
			.await
			.map_err(map_write_error)?;
		self.stream.flush().await.map_err(map_write_error)?;
		trace!("wrote frame of {} bytes", payload.len());
		Ok(())
	}
}

fn map_write_error(e: std::io::Error) -> RobotError {
	match e.kind() {
		std::io::ErrorKind::BrokenPipe | std::io::ErrorKind::ConnectionReset => RobotError::TransportClosed,
		_ => RobotError::protocol(format!("socket write: {e}")),
	}
}

/// Frames larger than this are treated as protocol corruption. The largest
/// legitimate payload is a compressed full map, well under this.
const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// Encodes a handshake block: each field is `key=value`, length-prefixed.
#[must_use]
pub fn encode_handshake(fields: &[(&str, &str)]) -> Vec<u8> {
	let mut block = Vec::new();
	for (key, value) in fields {
		let field = format!("{key}={value}");
		let mut len_bytes = [0u8; 4];
		LittleEndian::write_u32(&mut len_bytes, field.len() as u32);
		block.extend_from_slice(&len_bytes);
		block.extend_from_slice(field.as_bytes());
	}
	block
}

/// Decodes a handshake block into its fields.
pub fn decode_handshake(payload: &[u8]) -> Result<Vec<(String, String)>> {
	let mut fields = Vec::new();
	let mut pos = 0;
	while pos < payload.len() {
		if pos + 4 > payload.len() {
			return Err(RobotError::protocol("truncated handshake field length"));
		}
		let len = LittleEndian::read_u32(&payload[pos..pos + 4]) as usize;
		pos += 4;
		if pos + len > payload.len() {
			return Err(RobotError::protocol("truncated handshake field"));
		}
		let field = String::from_utf8_lossy(&payload[pos..pos + len]);
		pos += len;
		let (key, value) = field.split_once('=').unwrap_or((field.as_ref(), ""));
		fields.push((key.to_string(), value.to_string()));
	}
	Ok(fields)
}

/// Sends our handshake, reads the peer's, and checks it for an `error`
/// field. Any other mismatch is tolerated; firmware variants answer with
/// slightly different type and md5 strings.
pub async fn exchange_handshake(
	stream: &mut FrameStream,
	fields: &[(&str, &str)],
) -> Result<Vec<(String, String)>> {
	stream.write_frame(&encode_handshake(fields)).await?;
	let response = stream.read_frame().await?;
	let response_fields = decode_handshake(&response)?;
	for (key, value) in &response_fields {
		if key == "error" {
			return Err(RobotError::protocol(format!("handshake rejected: {value}")));
		}
	}
	Ok(response_fields)
}
