//! Shared fixtures for this crate's async tests: a fake firmware that
//! speaks TCPROS for every service the orchestrator touches, resolvers
//! pinning all endpoints to it, and a mock mdsctl daemon.

use async_trait::async_trait;
use deebot_core::{Config, RobotError, Result};
use deebot_proto::{
	Alert, CleanStatistics, CompressedMapInfo, LifespanPart, PartLife, RobotPose, Room,
	RoomPreferences, TracePoint, encode_lzma_chunk, encode_trace_chunk,
	services::{alert, lifespan, map, position, spot_area, statistics, trace_log, virtual_wall},
};
use deebot_ros::{
	EndpointResolver, ResolveMode, TopicEndpoint, TopicResolver, decode_handshake,
	encode_handshake,
};
use std::{
	net::SocketAddr,
	path::Path,
	sync::{
		Arc,
		atomic::{AtomicI32, AtomicU8, AtomicUsize, Ordering},
	},
};
use tokio::{
	io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader},
	net::{TcpStream, UnixListener},
};

/// Observable and adjustable state of the fake firmware.
pub(crate) struct FirmwareState {
	/// How often the compressed raster was requested.
	pub compressed_fetches: AtomicUsize,
	/// How often the trace service was called; the first call returns the
	/// first leg, later calls the shorter post-restart trace.
	pub trace_calls: AtomicUsize,
	pub fan_mode: AtomicU8,
	pub water_level: AtomicU8,
	/// Robot x position reported by the position service.
	pub robot_x_mm: AtomicI32,
}

pub(crate) struct Firmware {
	pub addr: SocketAddr,
	pub state: Arc<FirmwareState>,
}

/// Starts the fake firmware on an ephemeral port. Every connection is
/// handled concurrently; the handshake's `service` field selects the
/// behavior.
pub(crate) fn spawn_firmware() -> Firmware {
	let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
	listener.set_nonblocking(true).unwrap();
	let addr = listener.local_addr().unwrap();
	let state = Arc::new(FirmwareState {
		compressed_fetches: AtomicUsize::new(0),
		trace_calls: AtomicUsize::new(0),
		fan_mode: AtomicU8::new(2),
		water_level: AtomicU8::new(1),
		robot_x_mm: AtomicI32::new(-250),
	});

	let accept_state = state.clone();
	tokio::spawn(async move {
		let listener = tokio::net::TcpListener::from_std(listener).unwrap();
		loop {
			let Ok((stream, _)) = listener.accept().await else {
				return;
			};
			tokio::spawn(serve_connection(stream, accept_state.clone()));
		}
	});

	Firmware { addr, state }
}

async fn serve_connection(mut stream: TcpStream, state: Arc<FirmwareState>) {
	let Ok(header) = read_frame(&mut stream).await else {
		return;
	};
	let fields = decode_handshake(&header).unwrap_or_default();
	let service = fields
		.iter()
		.find(|(key, _)| key == "service")
		.map(|(_, value)| value.clone())
		.unwrap_or_default();
	if write_frame(&mut stream, &encode_handshake(&[("callerid", "/firmware")]))
		.await
		.is_err()
	{
		return;
	}

	while let Ok(request) = read_frame(&mut stream).await {
		let response = respond(&service, &request, &state);
		if write_frame(&mut stream, &response).await.is_err() {
			return;
		}
	}
}

async fn read_frame(stream: &mut TcpStream) -> std::io::Result<Vec<u8>> {
	let mut len_bytes = [0u8; 4];
	stream.read_exact(&mut len_bytes).await?;
	let mut payload = vec![0u8; u32::from_le_bytes(len_bytes) as usize];
	stream.read_exact(&mut payload).await?;
	Ok(payload)
}

async fn write_frame(stream: &mut TcpStream, payload: &[u8]) -> std::io::Result<()> {
	let mut frame = (payload.len() as u32).to_le_bytes().to_vec();
	frame.extend_from_slice(payload);
	stream.write_all(&frame).await
}

pub(crate) const FIRMWARE_MAP_ID: u32 = 7;

fn respond(service: &str, request: &[u8], state: &FirmwareState) -> Vec<u8> {
	match service {
		"/rose_map/get_map" => match request.first().copied() {
			Some(1) => {
				let mut payload = vec![0u8];
				payload.extend_from_slice(&FIRMWARE_MAP_ID.to_le_bytes());
				payload
			}
			_ => {
				state.compressed_fetches.fetch_add(1, Ordering::SeqCst);
				compressed_map_payload()
			}
		},
		"/rose_map/spot_area" => spot_area::build_rooms_response(FIRMWARE_MAP_ID, &[fixture_room()]),
		"/rose_map/virtual_wall" => virtual_wall::build_walls_response(FIRMWARE_MAP_ID, &[]),
		"/rose_map/get_position" => {
			let robot = RobotPose {
				x_mm: state.robot_x_mm.load(Ordering::SeqCst),
				y_mm: 250,
				angle_deg: 0.0,
			};
			let charger = RobotPose {
				x_mm: 0,
				y_mm: 0,
				angle_deg: 180.0,
			};
			position::build_positions_response(&robot, Some(&charger))
		}
		"/rose_map/get_trace" => {
			let call = state.trace_calls.fetch_add(1, Ordering::SeqCst);
			if call == 0 {
				trace_log::build_trace_response(3, &encode_trace_chunk(&first_trace_leg(), 10))
			} else {
				// A restarted trace daemon holds fewer points than the
				// caller's cursor.
				trace_log::build_trace_response(2, &encode_trace_chunk(&restarted_trace_leg(), 10))
			}
		}
		"/pltf/alert_state" => alert::build_alerts_response(&[Alert {
			alert_type: 200,
			state: 0,
		}]),
		"/pltf/lifespan" => lifespan::build_lifespan_response(&[PartLife {
			part: LifespanPart::MainBrush,
			left: 150,
			total: 300,
		}]),
		"/setting_manager/setting" => match (request.first().copied(), request.get(1).copied()) {
			(Some(1), Some(1)) => vec![0, state.fan_mode.load(Ordering::SeqCst)],
			(Some(1), Some(2)) => vec![0, state.water_level.load(Ordering::SeqCst)],
			(Some(1), _) => vec![0, 0],
			(Some(2), Some(key)) => {
				let value = request.get(2).copied().unwrap_or(0);
				match key {
					1 => state.fan_mode.store(value, Ordering::SeqCst),
					2 => state.water_level.store(value, Ordering::SeqCst),
					_ => {}
				}
				vec![0]
			}
			_ => vec![3],
		},
		"/clean/statistic" => statistics::build_statistics_response(&CleanStatistics {
			area_m2: 640,
			duration_s: 7200,
			count: 12,
		}),
		"/work_manager/cmd" => vec![0],
		_ => vec![0],
	}
}

/// A 20x20 raster of 2x2 tiles: the top-left tile is floor, the bottom
/// row is wall. Raw resolution 50 normalizes to 5 cm per pixel.
fn compressed_map_payload() -> Vec<u8> {
	let info = CompressedMapInfo {
		map_width: 20,
		map_height: 20,
		columns: 2,
		rows: 2,
		submap_width: 10,
		submap_height: 10,
		resolution_cm: 5,
	};
	let tiles: Vec<Vec<u8>> = [
		vec![1u8; 100],
		vec![0u8; 100],
		vec![2u8; 100],
		vec![2u8; 100],
	]
	.iter()
	.map(|tile| encode_lzma_chunk(tile))
	.collect();
	map::build_compressed_map_response(FIRMWARE_MAP_ID, &info, 50, &tiles)
}

/// A room covering the floor tile of [`compressed_map_payload`].
pub(crate) fn fixture_room() -> Room {
	Room {
		areaid: 42,
		label_id: 5,
		polygon: vec![
			deebot_core::WorldPoint::new(-400, 0),
			deebot_core::WorldPoint::new(0, 0),
			deebot_core::WorldPoint::new(0, 400),
			deebot_core::WorldPoint::new(-400, 400),
		],
		connections: vec![],
		preferences: RoomPreferences::default(),
	}
}

fn first_trace_leg() -> Vec<TracePoint> {
	vec![
		TracePoint { x_mm: 0, y_mm: 0, flag: 0 },
		TracePoint { x_mm: 100, y_mm: 100, flag: 0 },
		TracePoint { x_mm: 200, y_mm: 0, flag: 0 },
	]
}

fn restarted_trace_leg() -> Vec<TracePoint> {
	vec![
		TracePoint { x_mm: 300, y_mm: 0, flag: 0 },
		TracePoint { x_mm: 400, y_mm: 100, flag: 0 },
	]
}

/// Resolver pinning every service candidate to the fake firmware.
pub(crate) struct PinnedResolver {
	pub addr: SocketAddr,
}

#[async_trait]
impl EndpointResolver for PinnedResolver {
	async fn resolve(&self, _candidates: &[String]) -> Result<(String, u16)> {
		Ok((self.addr.ip().to_string(), self.addr.port()))
	}
}

/// Topic resolver that never finds a publisher; subscribers just back
/// off, so `latest()` stays `None`.
pub(crate) struct NoTopics;

#[async_trait]
impl TopicResolver for NoTopics {
	async fn resolve(
		&self,
		_endpoint: &TopicEndpoint,
		_mode: ResolveMode,
	) -> Result<(String, String, u16)> {
		Err(RobotError::ServiceUnavailable("no publishers in tests".to_string()))
	}
}

/// A config whose on-disk paths live under `dir`. Trace polling is off by
/// default; tests that exercise it flip the flag.
pub(crate) fn test_config(dir: &Path) -> Config {
	let mut config = Config::default();
	config.runtime_state_cache_path = dir.join("runtime_state.json").display().to_string();
	config.mdsctl_socket_path = dir.join("mds_cmd.sock").display().to_string();
	config.trace_path_enabled = false;
	config
}

/// A mock mdsctl daemon answering every JSON line with `{"ret":"ok"}`.
pub(crate) fn spawn_mdsctl(path: &Path) {
	let listener = UnixListener::bind(path).unwrap();
	tokio::spawn(async move {
		loop {
			let Ok((stream, _)) = listener.accept().await else {
				return;
			};
			tokio::spawn(async move {
				let (read_half, mut write_half) = stream.into_split();
				let mut reader = BufReader::new(read_half);
				let mut line = String::new();
				if reader.read_line(&mut line).await.unwrap_or(0) > 0 {
					let _ = write_half.write_all(b"{\"ret\":\"ok\"}\n").await;
				}
			});
		}
	});
}
