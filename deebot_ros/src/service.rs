//! TCPROS service clients.
//!
//! A persistent client keeps one socket open for the lifetime of the
//! process and serializes calls over it; an ephemeral client opens and
//! closes a socket per call. Both recover a failed exchange with exactly
//! one transparent reconnect.

use crate::{FrameStream, MasterClient, exchange_handshake, parse_rosrpc_uri};
use async_trait::async_trait;
use deebot_core::{RobotError, Result};
use log::{debug, warn};
use std::{sync::Arc, time::Duration};
use tokio::sync::Mutex;

/// Names and type metadata of one firmware service.
///
/// Candidate paths are tried in order; firmware revisions moved several
/// services between namespaces.
#[derive(Clone, Debug)]
pub struct ServiceEndpoint {
	pub candidates: Vec<String>,
	pub type_name: String,
	pub md5sum: String,
}

impl ServiceEndpoint {
	pub fn new(candidates: &[&str], type_name: &str) -> ServiceEndpoint {
		ServiceEndpoint {
			candidates: candidates.iter().map(|c| (*c).to_string()).collect(),
			type_name: type_name.to_string(),
			// The handshake validates nothing but the error field, and the
			// firmware accepts the wildcard sum, so no per-service constants
			// are carried.
			md5sum: "*".to_string(),
		}
	}
}

/// Resolves service name candidates to a TCP endpoint.
///
/// The production implementation asks the master; tests pin an address.
#[async_trait]
pub trait EndpointResolver: Send + Sync {
	async fn resolve(&self, candidates: &[String]) -> Result<(String, u16)>;
}

/// Resolver backed by `lookupService` on the master.
pub struct MasterResolver {
	master: Arc<MasterClient>,
}

impl MasterResolver {
	#[must_use]
	pub fn new(master: Arc<MasterClient>) -> MasterResolver {
		MasterResolver { master }
	}
}

#[async_trait]
impl EndpointResolver for MasterResolver {
	async fn resolve(&self, candidates: &[String]) -> Result<(String, u16)> {
		for candidate in candidates {
			match self.master.lookup_service(candidate).await {
				Ok(uri) => {
					debug!("resolved {candidate} to {uri}");
					return parse_rosrpc_uri(&uri);
				}
				Err(e) => debug!("lookupService {candidate}: {e}"),
			}
		}
		Err(RobotError::ServiceUnavailable(format!(
			"no provider for any of {candidates:?}"
		)))
	}
}

struct Connection {
	stream: FrameStream,
}

/// A TCPROS service client with call serialization and reconnect.
pub struct ServiceClient {
	endpoint: ServiceEndpoint,
	resolver: Arc<dyn EndpointResolver>,
	caller_id: String,
	connect_timeout: Duration,
	call_timeout: Duration,
	persistent: bool,
	// Guards the socket and doubles as the call mutex: holding it across
	// the whole exchange keeps at most one call in flight.
	conn: Mutex<Option<Connection>>,
}

impl ServiceClient {
	/// A client that keeps its socket open between calls.
	pub fn persistent(
		endpoint: ServiceEndpoint,
		resolver: Arc<dyn EndpointResolver>,
		caller_id: &str,
		connect_timeout: Duration,
		call_timeout: Duration,
	) -> ServiceClient {
		Self::build(endpoint, resolver, caller_id, connect_timeout, call_timeout, true)
	}

	/// A client that opens its socket on entry and closes it after each
	/// call. Used for infrequent command services to avoid holding file
	/// descriptors on the firmware side.
	pub fn ephemeral(
		endpoint: ServiceEndpoint,
		resolver: Arc<dyn EndpointResolver>,
		caller_id: &str,
		connect_timeout: Duration,
		call_timeout: Duration,
	) -> ServiceClient {
		Self::build(endpoint, resolver, caller_id, connect_timeout, call_timeout, false)
	}

	fn build(
		endpoint: ServiceEndpoint,
		resolver: Arc<dyn EndpointResolver>,
		caller_id: &str,
		connect_timeout: Duration,
		call_timeout: Duration,
		persistent: bool,
	) -> ServiceClient {
		ServiceClient {
			endpoint,
			resolver,
			caller_id: caller_id.to_string(),
			connect_timeout,
			call_timeout,
			persistent,
			conn: Mutex::new(None),
		}
	}

	#[must_use]
	pub fn service_name(&self) -> &str {
		&self.endpoint.candidates[0]
	}

	async fn open(&self) -> Result<Connection> {
		let (host, port) = self.resolver.resolve(&self.endpoint.candidates).await?;
		let mut stream =
			FrameStream::connect(&host, port, self.connect_timeout, self.call_timeout).await?;
		let persistent = if self.persistent { "1" } else { "0" };
		exchange_handshake(
			&mut stream,
			&[
				("callerid", &self.caller_id),
				("service", &self.endpoint.candidates[0]),
				("md5sum", &self.endpoint.md5sum),
				("type", &self.endpoint.type_name),
				("persistent", persistent),
			],
		)
		.await?;
		Ok(Connection { stream })
	}

	async fn exchange(conn: &mut Connection, request: &[u8]) -> Result<Vec<u8>> {
		conn.stream.write_frame(request).await?;
		conn.stream.read_frame().await
	}

	/// Issues one request and returns the raw response payload.
	///
	/// Any failure resets the socket and the call is retried once with a
	/// fresh resolution and connect; a second failure surfaces as
	/// `ServiceUnavailable` (connection), `TransportTimeout` (read) or
	/// `Protocol` (decode).
	pub async fn call(&self, request: &[u8]) -> Result<Vec<u8>> {
		let mut guard = self.conn.lock().await;
		let mut last_error = None;

		for attempt in 0..2 {
			if guard.is_none() {
				match self.open().await {
					Ok(conn) => *guard = Some(conn),
					Err(e) => {
						warn!("{}: connect attempt {attempt} failed: {e}", self.service_name());
						last_error = Some(e);
						continue;
					}
				}
			}
			let conn = guard.as_mut().expect("connection was just opened");
			match Self::exchange(conn, request).await {
				Ok(response) => {
					if !self.persistent {
						*guard = None;
					}
					return Ok(response);
				}
				Err(e) => {
					warn!("{}: call attempt {attempt} failed: {e}", self.service_name());
					*guard = None;
					last_error = Some(e);
				}
			}
		}

		Err(match last_error.expect("two attempts always record an error") {
			RobotError::TransportClosed => RobotError::ServiceUnavailable(format!(
				"{}: connection lost twice",
				self.service_name()
			)),
			other => other,
		})
	}

	/// Drops the socket, if any. The next call reconnects.
	pub async fn reset(&self) {
		*self.conn.lock().await = None;
	}
}
