//! Setting service: global cleaning parameters.
//!
//! Requests carry two trailing padding bytes; the firmware's handler reads
//! a fixed-size struct and rejects shorter frames.

use crate::open_response;
use deebot_core::{Result, io::PayloadWriter};
use deebot_ros::{ServiceClient, ServiceEndpoint};

const OP_GET: u8 = 1;
const OP_SET: u8 = 2;
const REQUEST_PADDING: usize = 2;

#[must_use]
pub fn endpoint() -> ServiceEndpoint {
	ServiceEndpoint::new(&["/setting_manager/setting", "/setting"], "setting_manager/Setting")
}

/// Keys of the settings this integration touches.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SettingKey {
	FanMode,
	WaterLevel,
	SuctionBoostOnCarpet,
	RoomPreferencesEnabled,
	CleaningTimesPasses,
	AutoCollectEnabled,
}

impl SettingKey {
	#[must_use]
	pub fn to_u8(self) -> u8 {
		match self {
			SettingKey::FanMode => 1,
			SettingKey::WaterLevel => 2,
			SettingKey::SuctionBoostOnCarpet => 3,
			SettingKey::RoomPreferencesEnabled => 4,
			SettingKey::CleaningTimesPasses => 5,
			SettingKey::AutoCollectEnabled => 6,
		}
	}
}

pub struct SettingService {
	client: ServiceClient,
}

impl SettingService {
	#[must_use]
	pub fn new(client: ServiceClient) -> SettingService {
		SettingService { client }
	}

	pub async fn get(&self, key: SettingKey) -> Result<u8> {
		let response = self.client.call(&build_get_request(key)).await?;
		open_response(&response)?.read_u8()
	}

	pub async fn set(&self, key: SettingKey, value: u8) -> Result<()> {
		let response = self.client.call(&build_set_request(key, value)).await?;
		open_response(&response).map(|_| ())
	}

	pub async fn fan_mode(&self) -> Result<u8> {
		self.get(SettingKey::FanMode).await
	}

	pub async fn set_fan_mode(&self, value: u8) -> Result<()> {
		self.set(SettingKey::FanMode, value).await
	}

	pub async fn water_level(&self) -> Result<u8> {
		self.get(SettingKey::WaterLevel).await
	}

	pub async fn set_water_level(&self, value: u8) -> Result<()> {
		self.set(SettingKey::WaterLevel, value).await
	}

	pub async fn suction_boost_on_carpet(&self) -> Result<bool> {
		Ok(self.get(SettingKey::SuctionBoostOnCarpet).await? != 0)
	}

	pub async fn set_suction_boost_on_carpet(&self, enabled: bool) -> Result<()> {
		self.set(SettingKey::SuctionBoostOnCarpet, u8::from(enabled)).await
	}

	pub async fn room_preferences_enabled(&self) -> Result<bool> {
		Ok(self.get(SettingKey::RoomPreferencesEnabled).await? != 0)
	}

	pub async fn set_room_preferences_enabled(&self, enabled: bool) -> Result<()> {
		self.set(SettingKey::RoomPreferencesEnabled, u8::from(enabled)).await
	}

	pub async fn cleaning_times_passes(&self) -> Result<u8> {
		self.get(SettingKey::CleaningTimesPasses).await
	}

	pub async fn set_cleaning_times_passes(&self, passes: u8) -> Result<()> {
		self.set(SettingKey::CleaningTimesPasses, passes).await
	}

	pub async fn auto_collect_enabled(&self) -> Result<bool> {
		Ok(self.get(SettingKey::AutoCollectEnabled).await? != 0)
	}

	pub async fn set_auto_collect_enabled(&self, enabled: bool) -> Result<()> {
		self.set(SettingKey::AutoCollectEnabled, u8::from(enabled)).await
	}
}

#[must_use]
pub fn build_get_request(key: SettingKey) -> Vec<u8> {
	let mut writer = PayloadWriter::new();
	writer.write_u8(OP_GET).write_u8(key.to_u8()).write_padding(REQUEST_PADDING);
	writer.into_bytes()
}

#[must_use]
pub fn build_set_request(key: SettingKey, value: u8) -> Vec<u8> {
	let mut writer = PayloadWriter::new();
	writer
		.write_u8(OP_SET)
		.write_u8(key.to_u8())
		.write_u8(value)
		.write_padding(REQUEST_PADDING);
	writer.into_bytes()
}
