//! Long-lived TCPROS topic subscribers.
//!
//! A subscriber owns a supervised task that resolves the topic endpoint,
//! connects, performs the handshake and then reads messages forever. The
//! last decoded message is kept with its arrival time; readers get it only
//! while it is younger than their staleness window.

use crate::{FrameStream, MasterClient, exchange_handshake};
use async_trait::async_trait;
use deebot_core::{RobotError, Result};
use log::{debug, info, warn};
use std::{
	sync::{Arc, Mutex as StdMutex},
	time::{Duration, Instant},
};
use tokio::{sync::watch, task::JoinHandle, time::sleep};

/// How a topic endpoint is discovered.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResolveMode {
	/// `registerSubscriber` on the master, then `requestTopic` per
	/// publisher URI.
	Normal,
	/// Enumerate publishers via `getSystemState`, then `lookupNode` +
	/// `requestTopic`. Registering a subscriber for some vendor topics
	/// makes the master issue `publisherUpdate` callbacks that crash a
	/// firmware daemon; this path never registers.
	SafeResolve,
}

/// Names and type metadata of one topic.
#[derive(Clone, Debug)]
pub struct TopicEndpoint {
	pub candidates: Vec<String>,
	pub type_name: String,
	pub md5sum: String,
}

impl TopicEndpoint {
	pub fn new(candidates: &[&str], type_name: &str) -> TopicEndpoint {
		TopicEndpoint {
			candidates: candidates.iter().map(|c| (*c).to_string()).collect(),
			type_name: type_name.to_string(),
			md5sum: "*".to_string(),
		}
	}
}

/// Resolves topic candidates to a TCPROS endpoint. The chosen candidate is
/// returned with the address so the handshake can name it.
#[async_trait]
pub trait TopicResolver: Send + Sync {
	async fn resolve(
		&self,
		endpoint: &TopicEndpoint,
		mode: ResolveMode,
	) -> Result<(String, String, u16)>;
}

/// Resolver backed by the master API.
pub struct MasterTopicResolver {
	master: Arc<MasterClient>,
}

impl MasterTopicResolver {
	#[must_use]
	pub fn new(master: Arc<MasterClient>) -> MasterTopicResolver {
		MasterTopicResolver { master }
	}

	async fn resolve_normal(&self, endpoint: &TopicEndpoint, topic: &str) -> Result<(String, u16)> {
		let node_uris = self.master.register_subscriber(topic, &endpoint.type_name).await?;
		for node_uri in &node_uris {
			match self.master.request_topic(node_uri, topic).await {
				Ok(addr) => return Ok(addr),
				Err(e) => debug!("requestTopic {topic} at {node_uri}: {e}"),
			}
		}
		Err(RobotError::ServiceUnavailable(format!("{topic}: no usable publisher")))
	}

	async fn resolve_safe(&self, topic: &str) -> Result<(String, u16)> {
		let publishers = self.master.get_publishers().await?;
		let nodes = publishers
			.iter()
			.find(|entry| entry.topic == topic)
			.map(|entry| entry.nodes.clone())
			.unwrap_or_default();
		for node in &nodes {
			let node_uri = match self.master.lookup_node(node).await {
				Ok(uri) => uri,
				Err(e) => {
					debug!("lookupNode {node}: {e}");
					continue;
				}
			};
			match self.master.request_topic(&node_uri, topic).await {
				Ok(addr) => return Ok(addr),
				Err(e) => debug!("requestTopic {topic} at {node_uri}: {e}"),
			}
		}
		Err(RobotError::ServiceUnavailable(format!("{topic}: no usable publisher")))
	}
}

#[async_trait]
impl TopicResolver for MasterTopicResolver {
	async fn resolve(
		&self,
		endpoint: &TopicEndpoint,
		mode: ResolveMode,
	) -> Result<(String, String, u16)> {
		for candidate in &endpoint.candidates {
			let resolved = match mode {
				ResolveMode::Normal => self.resolve_normal(endpoint, candidate).await,
				ResolveMode::SafeResolve => self.resolve_safe(candidate).await,
			};
			match resolved {
				Ok((host, port)) => return Ok((candidate.clone(), host, port)),
				Err(e) => debug!("topic candidate {candidate}: {e}"),
			}
		}
		Err(RobotError::ServiceUnavailable(format!(
			"no publisher for any of {:?}",
			endpoint.candidates
		)))
	}
}

struct Shared<T> {
	latest: StdMutex<Option<(T, Instant)>>,
}

/// A running subscription delivering the latest decoded value.
pub struct TopicSubscriber<T> {
	shared: Arc<Shared<T>>,
	stop_tx: watch::Sender<bool>,
	handle: StdMutex<Option<JoinHandle<()>>>,
	topic: String,
}

impl<T: Send + Clone + 'static> TopicSubscriber<T> {
	/// Spawns the subscription task.
	pub fn spawn(
		endpoint: TopicEndpoint,
		mode: ResolveMode,
		resolver: Arc<dyn TopicResolver>,
		caller_id: &str,
		connect_timeout: Duration,
		decoder: fn(&[u8]) -> Result<T>,
	) -> TopicSubscriber<T> {
		let shared = Arc::new(Shared {
			latest: StdMutex::new(None),
		});
		let (stop_tx, stop_rx) = watch::channel(false);
		let topic = endpoint.candidates[0].clone();
		let worker = SubscriberTask {
			endpoint,
			mode,
			resolver,
			caller_id: caller_id.to_string(),
			connect_timeout,
			decoder,
			shared: shared.clone(),
			stop_rx,
		};
		let handle = tokio::spawn(worker.run());
		TopicSubscriber {
			shared,
			stop_tx,
			handle: StdMutex::new(Some(handle)),
			topic,
		}
	}

	/// Returns the latest decoded value if it is younger than
	/// `stale_after`.
	#[must_use]
	pub fn latest(&self, stale_after: Duration) -> Option<T> {
		let guard = self.shared.latest.lock().expect("latest lock");
		guard.as_ref().and_then(|(value, at)| {
			if at.elapsed() <= stale_after {
				Some(value.clone())
			} else {
				None
			}
		})
	}

	/// Signals the task, closes the socket and awaits termination. The
	/// subscriber never updates its value again afterwards.
	pub async fn shutdown(&self) {
		let _ = self.stop_tx.send(true);
		let handle = self.handle.lock().expect("handle lock").take();
		if let Some(handle) = handle {
			if handle.await.is_err() {
				warn!("subscriber task for {} panicked", self.topic);
			}
		}
	}
}

struct SubscriberTask<T> {
	endpoint: TopicEndpoint,
	mode: ResolveMode,
	resolver: Arc<dyn TopicResolver>,
	caller_id: String,
	connect_timeout: Duration,
	decoder: fn(&[u8]) -> Result<T>,
	shared: Arc<Shared<T>>,
	stop_rx: watch::Receiver<bool>,
}

/// Topic sockets see long quiet stretches while the robot is docked; only
/// a very generous read timeout distinguishes idleness from a dead peer.
const TOPIC_READ_TIMEOUT: Duration = Duration::from_secs(120);

impl<T: Send + Clone + 'static> SubscriberTask<T> {
	async fn run(mut self) {
		let mut backoff = Backoff::new(self.mode);
		loop {
			if *self.stop_rx.borrow() {
				break;
			}
			match self.subscribe_once(&mut backoff).await {
				Ok(()) => break, // stop requested mid-read
				Err(e) => {
					debug!("topic {:?}: {e}", self.endpoint.candidates);
				}
			}
			let delay = backoff.next_delay();
			tokio::select! {
				() = sleep(delay) => {}
				_ = self.stop_rx.changed() => break,
			}
		}
		info!("subscriber for {:?} stopped", self.endpoint.candidates);
	}

	/// One resolve + connect + read cycle. Returns `Ok` only when a stop
	/// was requested; every failure path returns the error for logging.
	async fn subscribe_once(&mut self, backoff: &mut Backoff) -> Result<()> {
		let (topic, host, port) = self.resolver.resolve(&self.endpoint, self.mode).await?;
		let mut stream =
			FrameStream::connect(&host, port, self.connect_timeout, TOPIC_READ_TIMEOUT).await?;
		exchange_handshake(
			&mut stream,
			&[
				("callerid", &self.caller_id),
				("topic", &topic),
				("md5sum", &self.endpoint.md5sum),
				("type", &self.endpoint.type_name),
				("tcp_nodelay", "1"),
			],
		)
		.await?;
		info!("subscribed to {topic} at {host}:{port}");
		backoff.reset();

		loop {
			let frame = tokio::select! {
				frame = stream.read_frame() => frame?,
				_ = self.stop_rx.changed() => return Ok(()),
			};
			match (self.decoder)(&frame) {
				Ok(value) => {
					let mut guard = self.shared.latest.lock().expect("latest lock");
					*guard = Some((value, Instant::now()));
				}
				Err(e) => {
					// A malformed message does not warrant a reconnect.
					debug!("topic {topic}: undecodable message: {e}");
				}
			}
		}
	}
}

struct Backoff {
	mode: ResolveMode,
	current: Duration,
}

impl Backoff {
	fn new(mode: ResolveMode) -> Backoff {
		Backoff {
			mode,
			current: Duration::from_secs(1),
		}
	}

	fn reset(&mut self) {
		self.current = Duration::from_secs(1);
	}

	fn next_delay(&mut self) -> Duration {
		match self.mode {
			ResolveMode::SafeResolve => Duration::from_secs(10),
			ResolveMode::Normal => {
				let delay = self.current;
				self.current = (self.current * 2).min(Duration::from_secs(10));
				delay
			}
		}
	}
}
