//! XML-RPC clients for the ROS master and for publisher node APIs.

use crate::{XmlValue, encode_call, parse_response, unwrap_ros_triple};
use deebot_core::{RobotError, Result};
use log::{debug, trace};
use std::time::Duration;

/// One publisher entry of `getSystemState`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TopicPublishers {
	pub topic: String,
	pub nodes: Vec<String>,
}

/// Client for the ROS master API and the slave `requestTopic` call.
///
/// One reqwest client is shared across all posts; the firmware master lives
/// on the loopback interface, so timeouts are short.
#[derive(Debug)]
pub struct MasterClient {
	http: reqwest::Client,
	master_uri: String,
	caller_id: String,
}

impl MasterClient {
	pub fn new(master_uri: &str, caller_id: &str, timeout: Duration) -> Result<MasterClient> {
		let http = reqwest::Client::builder()
			.timeout(timeout)
			.build()
			.map_err(|e| RobotError::ServiceUnavailable(format!("http client: {e}")))?;
		Ok(MasterClient {
			http,
			master_uri: master_uri.trim_end_matches('/').to_string(),
			caller_id: caller_id.to_string(),
		})
	}

	#[must_use]
	pub fn caller_id(&self) -> &str {
		&self.caller_id
	}

	/// Posts one XML-RPC call to `uri` and unwraps the ROS result triple.
	async fn call(&self, uri: &str, method: &str, params: Vec<XmlValue>) -> Result<XmlValue> {
		let body = encode_call(method, &params);
		trace!("XML-RPC {method} -> {uri}");
		let response = self
			.http
			.post(uri)
			.header("Content-Type", "text/xml")
			.body(body)
			.send()
			.await
			.map_err(|e| RobotError::ServiceUnavailable(format!("{method} at {uri}: {e}")))?;
		let text = response
			.text()
			.await
			.map_err(|e| RobotError::ServiceUnavailable(format!("{method} at {uri}: {e}")))?;
		unwrap_ros_triple(parse_response(&text)?)
	}

	fn master_params(&self, rest: Vec<XmlValue>) -> Vec<XmlValue> {
		let mut params = vec![XmlValue::Str(self.caller_id.clone())];
		params.extend(rest);
		params
	}

	/// `lookupService` -> `rosrpc://host:port` URI of the service provider.
	pub async fn lookup_service(&self, service: &str) -> Result<String> {
		let value = self
			.call(
				&self.master_uri,
				"lookupService",
				self.master_params(vec![XmlValue::Str(service.to_string())]),
			)
			.await?;
		Ok(value.as_str()?.to_string())
	}

	/// `lookupNode` -> XML-RPC URI of a node's slave API.
	pub async fn lookup_node(&self, node: &str) -> Result<String> {
		let value = self
			.call(
				&self.master_uri,
				"lookupNode",
				self.master_params(vec![XmlValue::Str(node.to_string())]),
			)
			.await?;
		Ok(value.as_str()?.to_string())
	}

	/// `getSystemState` -> the publishers section only; subscribers and
	/// services are not needed by any caller here.
	pub async fn get_publishers(&self) -> Result<Vec<TopicPublishers>> {
		let state = self.call(&self.master_uri, "getSystemState", self.master_params(vec![])).await?;
		let publishers = state.item(0)?.as_array()?;
		let mut result = Vec::with_capacity(publishers.len());
		for entry in publishers {
			let topic = entry.item(0)?.as_str()?.to_string();
			let nodes = entry
				.item(1)?
				.as_array()?
				.iter()
				.map(|node| Ok(node.as_str()?.to_string()))
				.collect::<Result<Vec<String>>>()?;
			result.push(TopicPublishers { topic, nodes });
		}
		Ok(result)
	}

	/// `registerSubscriber` -> list of publisher node API URIs.
	///
	/// The advertised caller API is a loopback placeholder: this firmware's
	/// master never issues `publisherUpdate` callbacks to it (the topics
	/// where it would are subscribed through the safe-resolve path instead).
	pub async fn register_subscriber(&self, topic: &str, topic_type: &str) -> Result<Vec<String>> {
		let value = self
			.call(
				&self.master_uri,
				"registerSubscriber",
				self.master_params(vec![
					XmlValue::Str(topic.to_string()),
					XmlValue::Str(topic_type.to_string()),
					XmlValue::Str("http://127.0.0.1:0/".to_string()),
				]),
			)
			.await?;
		value
			.as_array()?
			.iter()
			.map(|uri| Ok(uri.as_str()?.to_string()))
			.collect()
	}

	pub async fn unregister_subscriber(&self, topic: &str) -> Result<()> {
		self
			.call(
				&self.master_uri,
				"unregisterSubscriber",
				self.master_params(vec![
					XmlValue::Str(topic.to_string()),
					XmlValue::Str("http://127.0.0.1:0/".to_string()),
				]),
			)
			.await?;
		Ok(())
	}

	/// `requestTopic` against a publisher node API; negotiates TCPROS and
	/// returns the advertised host and port.
	pub async fn request_topic(&self, node_uri: &str, topic: &str) -> Result<(String, u16)> {
		let value = self
			.call(
				node_uri,
				"requestTopic",
				self.master_params(vec![
					XmlValue::Str(topic.to_string()),
					XmlValue::Array(vec![XmlValue::Array(vec![XmlValue::Str("TCPROS".to_string())])]),
				]),
			)
			.await?;
		// [ "TCPROS", host, port ]
		let protocol = value.item(0)?.as_str()?;
		if protocol != "TCPROS" {
			return Err(RobotError::protocol(format!(
				"publisher offered unsupported protocol {protocol}"
			)));
		}
		let host = value.item(1)?.as_str()?.to_string();
		let port = value.item(2)?.as_i32()?;
		let port = u16::try_from(port)
			.map_err(|_| RobotError::protocol(format!("publisher advertised invalid port {port}")))?;
		debug!("requestTopic {topic}: TCPROS at {host}:{port}");
		Ok((host, port))
	}
}

/// Splits a `rosrpc://host:port` URI into its host and port.
pub fn parse_rosrpc_uri(uri: &str) -> Result<(String, u16)> {
	let rest = uri
		.strip_prefix("rosrpc://")
		.ok_or_else(|| RobotError::protocol(format!("not a rosrpc URI: {uri}")))?;
	let rest = rest.trim_end_matches('/');
	let (host, port) = rest
		.rsplit_once(':')
		.ok_or_else(|| RobotError::protocol(format!("rosrpc URI has no port: {uri}")))?;
	let port = port
		.parse::<u16>()
		.map_err(|_| RobotError::protocol(format!("rosrpc URI has invalid port: {uri}")))?;
	Ok((host.to_string(), port))
}
