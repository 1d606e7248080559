//! Statistics service: lifetime totals and the last completed clean.
//! Live updates while cleaning arrive via the safe-resolve statistics
//! topic, not through this service.

use crate::{CleanStatistics, open_response};
use deebot_core::{Result, io::PayloadWriter};
use deebot_ros::{ServiceClient, ServiceEndpoint};

const OP_TOTAL: u8 = 1;
const OP_LAST_CLEAN: u8 = 2;

#[must_use]
pub fn endpoint() -> ServiceEndpoint {
	ServiceEndpoint::new(&["/clean/statistic", "/statistics"], "clean_msgs/Statistic")
}

pub struct StatisticsService {
	client: ServiceClient,
}

impl StatisticsService {
	#[must_use]
	pub fn new(client: ServiceClient) -> StatisticsService {
		StatisticsService { client }
	}

	pub async fn total_statistics(&self) -> Result<CleanStatistics> {
		let response = self.client.call(&[OP_TOTAL]).await?;
		parse_statistics(&response)
	}

	pub async fn last_clean_statistics(&self) -> Result<CleanStatistics> {
		let response = self.client.call(&[OP_LAST_CLEAN]).await?;
		parse_statistics(&response)
	}
}

pub fn parse_statistics(payload: &[u8]) -> Result<CleanStatistics> {
	let mut reader = open_response(payload)?;
	Ok(CleanStatistics {
		area_m2: reader.read_u32()?,
		duration_s: reader.read_u32()?,
		count: reader.read_u32()?,
	})
}

/// Builds a statistics response payload. Test fixture helper.
#[must_use]
pub fn build_statistics_response(stats: &CleanStatistics) -> Vec<u8> {
	let mut writer = PayloadWriter::new();
	writer
		.write_u8(0)
		.write_u32(stats.area_m2)
		.write_u32(stats.duration_s)
		.write_u32(stats.count);
	writer.into_bytes()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn statistics_round_trip() -> Result<()> {
		let stats = CleanStatistics {
			area_m2: 1240,
			duration_s: 86_000,
			count: 77,
		};
		let payload = build_statistics_response(&stats);
		assert_eq!(parse_statistics(&payload)?, stats);
		Ok(())
	}
}
