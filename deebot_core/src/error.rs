//! Error taxonomy shared by every crate in the workspace.
//!
//! Transport failures (`TransportClosed`, `TransportTimeout`) are recovered
//! locally where possible; everything else surfaces to the caller unchanged.

use std::time::Duration;

/// All failure kinds the robot integration can produce.
#[derive(Debug, thiserror::Error)]
pub enum RobotError {
	/// The peer closed the socket in the middle of an exchange.
	#[error("transport closed unexpectedly")]
	TransportClosed,

	/// A read or write did not complete within its bound.
	#[error("transport timed out after {0:?}")]
	TransportTimeout(Duration),

	/// Handshake mismatch, unexpected message shape or truncated payload.
	#[error("protocol error: {0}")]
	Protocol(String),

	/// Endpoint resolution failed across all candidates, or the connection
	/// could not be re-established after a retry.
	#[error("service unavailable: {0}")]
	ServiceUnavailable(String),

	/// The firmware answered with a non-zero status code.
	#[error("command rejected with result {result}")]
	CommandRejected { result: u8 },

	/// LZMA stream malformed or decompressed size mismatch.
	#[error("decompression failed: {0}")]
	DecompressionFailed(String),

	/// The caller passed an out-of-range id, an invalid polygon or is
	/// missing required configuration.
	#[error("invalid argument: {0}")]
	InvalidArgument(String),

	/// The operation requires an active map id before one has been learned.
	#[error("no active map id has been learned yet")]
	NotInitialized,
}

impl RobotError {
	/// Shorthand for a [`RobotError::Protocol`] with a formatted message.
	pub fn protocol(msg: impl Into<String>) -> RobotError {
		RobotError::Protocol(msg.into())
	}

	/// Returns `true` for errors that warrant one transparent reconnect.
	#[must_use]
	pub fn is_transient(&self) -> bool {
		matches!(
			self,
			RobotError::TransportClosed | RobotError::TransportTimeout(_)
		)
	}
}

pub type Result<T> = std::result::Result<T, RobotError>;
