//! Status derivation.
//!
//! A pure function of the latest work state, charge state, battery level
//! and alert list. The orchestrator evaluates it on every runtime-state
//! poll and emits events only when the derived value changes.

use deebot_proto::{Alert, ChargeState, WorkPhase, WorkState, WorkType};

/// Normalized robot status exposed upward.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RobotStatus {
	Idle,
	Cleaning,
	Paused,
	Returning,
	Moving,
	ManualControl,
	Docked,
	Error,
}

/// Battery attribute while docked.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BatteryFlag {
	Charging,
	Charged,
}

/// Dock-status attribute mirroring the status.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DockStatus {
	Idle,
	Cleaning,
	Paused,
}

/// Subsystem an error alert points at.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AlertSubsystem {
	Motors,
	Sensors,
	Navigation,
	Attachments,
	Unknown,
}

/// Error detail attached to [`RobotStatus::Error`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatusError {
	pub subsystem: AlertSubsystem,
	pub message: String,
	/// The numeric alert type, stringified for the upward API.
	pub vendor_error_code: String,
}

/// Result of one status derivation.
#[derive(Clone, Debug, PartialEq)]
pub struct DerivedStatus {
	pub status: RobotStatus,
	pub error: Option<StatusError>,
	pub battery_flag: Option<BatteryFlag>,
	pub dock_status: DockStatus,
}

/// Alert types that map to error severity, with their subsystem and a
/// human-readable message. Anything not listed is a warning and never
/// drives the status to `Error`.
const ERROR_ALERTS: &[(u16, AlertSubsystem, &str)] = &[
	(3, AlertSubsystem::Motors, "main brush stalled"),
	(5, AlertSubsystem::Motors, "wheel motor overload"),
	(7, AlertSubsystem::Attachments, "dust bin missing"),
	(12, AlertSubsystem::Navigation, "robot is trapped"),
	(15, AlertSubsystem::Sensors, "laser distance sensor malfunction"),
	(18, AlertSubsystem::Sensors, "down sensor abnormal"),
	(21, AlertSubsystem::Navigation, "positioning failed"),
	(24, AlertSubsystem::Attachments, "mop pad missing"),
];

fn error_alert(alerts: &[Alert]) -> Option<StatusError> {
	for alert in alerts {
		if !alert.is_triggered() {
			continue;
		}
		if let Some((_, subsystem, message)) = ERROR_ALERTS
			.iter()
			.find(|(alert_type, _, _)| *alert_type == alert.alert_type)
		{
			return Some(StatusError {
				subsystem: *subsystem,
				message: (*message).to_string(),
				vendor_error_code: alert.alert_type.to_string(),
			});
		}
	}
	None
}

/// Derives the status from the latest observed values. Stale topics show
/// up as `None` and fall through to `Idle`.
#[must_use]
pub fn derive_status(
	work: Option<&WorkState>,
	charge: Option<&ChargeState>,
	battery: Option<u8>,
	alerts: &[Alert],
) -> DerivedStatus {
	if let Some(error) = error_alert(alerts) {
		return finish(RobotStatus::Error, Some(error), None);
	}

	if charge.is_some_and(|c| c.is_on_charger > 0) {
		let charged = charge.is_some_and(|c| c.charge_state == 2) || battery.is_some_and(|b| b >= 100);
		let flag = if charged {
			BatteryFlag::Charged
		} else {
			BatteryFlag::Charging
		};
		return finish(RobotStatus::Docked, None, Some(flag));
	}

	let status = match work {
		Some(work) if work.phase == WorkPhase::Paused => RobotStatus::Paused,
		Some(work) if work.phase == WorkPhase::Running => match work.worktype {
			WorkType::Return => RobotStatus::Returning,
			WorkType::RemoteControl => RobotStatus::ManualControl,
			WorkType::Goto => RobotStatus::Moving,
			_ => RobotStatus::Cleaning,
		},
		_ => RobotStatus::Idle,
	};
	finish(status, None, None)
}

fn finish(status: RobotStatus, error: Option<StatusError>, battery_flag: Option<BatteryFlag>) -> DerivedStatus {
	let dock_status = match status {
		RobotStatus::Cleaning => DockStatus::Cleaning,
		RobotStatus::Paused => DockStatus::Paused,
		_ => DockStatus::Idle,
	};
	DerivedStatus {
		status,
		error,
		battery_flag,
		dock_status,
	}
}
