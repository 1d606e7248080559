//! Client for the vendor's `mdsctl` daemon: a JSON line protocol over a
//! local Unix stream socket, used for audio playback and the video
//! stream / PIN machinery behind manual control.

use deebot_core::{RobotError, Result};
use log::debug;
use serde::Serialize;
use std::{path::PathBuf, time::Duration};
use tokio::{
	io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
	net::UnixStream,
	time::timeout,
};

/// Commands the daemon understands. Serialized with a `todo` tag exactly
/// as the vendor's tooling sends them.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "todo")]
pub enum MdsctlCommand {
	#[serde(rename = "audio")]
	Audio { cmd: String, file_number: u32 },
	#[serde(rename = "setPwdState")]
	SetPwdState { state: u8 },
	#[serde(rename = "onLiveLaunchPwdState")]
	LiveLaunchPwdState { state: u8, password: String },
	#[serde(rename = "start_push_stream")]
	StartPushStream { light_state: u8 },
	#[serde(rename = "stop_push_stream")]
	StopPushStream,
}

impl MdsctlCommand {
	/// Plays one of the canned voice files.
	#[must_use]
	pub fn play_audio(file_number: u32) -> MdsctlCommand {
		MdsctlCommand::Audio {
			cmd: "play".to_string(),
			file_number,
		}
	}
}

/// One-shot command client. A connection is opened per command; the
/// daemon closes its end after answering anyway.
pub struct MdsctlClient {
	socket_path: PathBuf,
	timeout: Duration,
}

impl MdsctlClient {
	#[must_use]
	pub fn new(socket_path: impl Into<PathBuf>, timeout: Duration) -> MdsctlClient {
		MdsctlClient {
			socket_path: socket_path.into(),
			timeout,
		}
	}

	/// Sends one command and returns the daemon's JSON answer.
	pub async fn send(&self, command: &MdsctlCommand) -> Result<serde_json::Value> {
		timeout(self.timeout, self.exchange(command))
			.await
			.map_err(|_| RobotError::TransportTimeout(self.timeout))?
	}

	async fn exchange(&self, command: &MdsctlCommand) -> Result<serde_json::Value> {
		let stream = UnixStream::connect(&self.socket_path).await.map_err(|e| {
			RobotError::ServiceUnavailable(format!("mdsctl at {}: {e}", self.socket_path.display()))
		})?;
		let (read_half, mut write_half) = stream.into_split();

		let mut line = serde_json::to_string(command)
			.map_err(|e| RobotError::protocol(format!("mdsctl encode: {e}")))?;
		debug!("mdsctl -> {line}");
		line.push('\n');
		write_half
			.write_all(line.as_bytes())
			.await
			.map_err(|_| RobotError::TransportClosed)?;

		let mut reader = BufReader::new(read_half);
		let mut response = String::new();
		let read = reader
			.read_line(&mut response)
			.await
			.map_err(|_| RobotError::TransportClosed)?;
		if read == 0 {
			return Err(RobotError::TransportClosed);
		}
		debug!("mdsctl <- {}", response.trim_end());
		serde_json::from_str(response.trim_end())
			.map_err(|e| RobotError::protocol(format!("mdsctl answer: {e}")))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use tokio::net::UnixListener;

	#[test]
	fn commands_serialize_with_the_todo_tag() {
		let json = serde_json::to_string(&MdsctlCommand::play_audio(30)).unwrap();
		assert_eq!(json, r#"{"todo":"audio","cmd":"play","file_number":30}"#);

		let json = serde_json::to_string(&MdsctlCommand::LiveLaunchPwdState {
			state: 1,
			password: "1234".to_string(),
		})
		.unwrap();
		assert_eq!(json, r#"{"todo":"onLiveLaunchPwdState","state":1,"password":"1234"}"#);

		let json = serde_json::to_string(&MdsctlCommand::StopPushStream).unwrap();
		assert_eq!(json, r#"{"todo":"stop_push_stream"}"#);
	}

	#[tokio::test]
	async fn sends_a_line_and_reads_the_answer() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("mds_cmd.sock");
		let listener = UnixListener::bind(&path).unwrap();

		tokio::spawn(async move {
			let (stream, _) = listener.accept().await.unwrap();
			let (read_half, mut write_half) = stream.into_split();
			let mut reader = BufReader::new(read_half);
			let mut line = String::new();
			reader.read_line(&mut line).await.unwrap();
			assert!(line.contains("\"todo\":\"setPwdState\""));
			write_half.write_all(b"{\"ret\":\"ok\"}\n").await.unwrap();
		});

		let client = MdsctlClient::new(&path, Duration::from_secs(1));
		let answer = client.send(&MdsctlCommand::SetPwdState { state: 1 }).await.unwrap();
		assert_eq!(answer["ret"], "ok");
	}

	#[tokio::test]
	async fn missing_socket_is_service_unavailable() {
		let client = MdsctlClient::new("/tmp/definitely-missing.sock", Duration::from_millis(200));
		let err = client.send(&MdsctlCommand::StopPushStream).await.unwrap_err();
		assert!(matches!(
			err,
			RobotError::ServiceUnavailable(_) | RobotError::TransportTimeout(_)
		));
	}
}
