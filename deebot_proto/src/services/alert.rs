//! Alert service: active firmware conditions, polled with the runtime
//! state.

use crate::{Alert, open_response};
use deebot_core::{Result, io::PayloadWriter};
use deebot_ros::{ServiceClient, ServiceEndpoint};

const OP_GET_ACTIVE: u8 = 1;

#[must_use]
pub fn endpoint() -> ServiceEndpoint {
	ServiceEndpoint::new(&["/pltf/alert_state", "/alert"], "pltf_msgs/AlertState")
}

pub struct AlertService {
	client: ServiceClient,
}

impl AlertService {
	#[must_use]
	pub fn new(client: ServiceClient) -> AlertService {
		AlertService { client }
	}

	pub async fn active_alerts(&self) -> Result<Vec<Alert>> {
		let response = self.client.call(&[OP_GET_ACTIVE]).await?;
		parse_alerts_response(&response)
	}
}

pub fn parse_alerts_response(payload: &[u8]) -> Result<Vec<Alert>> {
	let mut reader = open_response(payload)?;
	let count = reader.read_u8()?;
	let mut alerts = Vec::with_capacity(count as usize);
	for _ in 0..count {
		alerts.push(Alert {
			alert_type: reader.read_u16()?,
			state: reader.read_u8()?,
		});
	}
	Ok(alerts)
}

/// Builds an alert response payload. Test fixture helper.
#[must_use]
pub fn build_alerts_response(alerts: &[Alert]) -> Vec<u8> {
	let mut writer = PayloadWriter::new();
	writer.write_u8(0).write_u8(alerts.len() as u8);
	for alert in alerts {
		writer.write_u16(alert.alert_type).write_u8(alert.state);
	}
	writer.into_bytes()
}
