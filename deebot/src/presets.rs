//! Fan and water presets: the enumerated surface the capability layer
//! selects from, mapped to raw firmware setting values.

/// Suction power preset.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FanPreset {
	Off,
	Low,
	Medium,
	High,
	Max,
	/// A raw firmware value outside the named presets.
	Custom(u8),
}

impl FanPreset {
	#[must_use]
	pub fn to_value(self) -> u8 {
		match self {
			FanPreset::Off => 0,
			FanPreset::Low => 1,
			FanPreset::Medium => 2,
			FanPreset::High => 3,
			FanPreset::Max => 4,
			FanPreset::Custom(value) => value,
		}
	}

	#[must_use]
	pub fn from_value(value: u8) -> FanPreset {
		match value {
			0 => FanPreset::Off,
			1 => FanPreset::Low,
			2 => FanPreset::Medium,
			3 => FanPreset::High,
			4 => FanPreset::Max,
			other => FanPreset::Custom(other),
		}
	}
}

/// Water flow preset. Same raw scale as the fan presets on this firmware.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WaterPreset {
	Off,
	Low,
	Medium,
	High,
	Max,
	Custom(u8),
}

impl WaterPreset {
	#[must_use]
	pub fn to_value(self) -> u8 {
		match self {
			WaterPreset::Off => 0,
			WaterPreset::Low => 1,
			WaterPreset::Medium => 2,
			WaterPreset::High => 3,
			WaterPreset::Max => 4,
			WaterPreset::Custom(value) => value,
		}
	}

	#[must_use]
	pub fn from_value(value: u8) -> WaterPreset {
		match value {
			0 => WaterPreset::Off,
			1 => WaterPreset::Low,
			2 => WaterPreset::Medium,
			3 => WaterPreset::High,
			4 => WaterPreset::Max,
			other => WaterPreset::Custom(other),
		}
	}
}
