use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::quantity::{Percentage, WattHours, Watts};

#[derive(Serialize)]
pub struct LoginRequest<'a> {
    pub username: &'static str,
    pub email: &'a str,
    pub password: &'a str,
    pub force_sm_off: bool,
}

#[derive(Deserialize)]
pub struct LoginResponse {
    pub token: String,
}

/// Single monitored circuit.
///
/// The gateway reports more fields (frequency, voltage, reactive power…), they are ignored.
#[must_use]
#[derive(Copy, Clone, Debug, Deserialize)]
pub struct MeterReading {
    /// Cumulative energy flowing into the circuit.
    pub energy_imported: WattHours,

    /// Cumulative energy flowing out of the circuit.
    pub energy_exported: WattHours,

    /// Signed instantaneous power, the sign convention depends on the circuit.
    pub instant_power: Watts,
}

#[must_use]
#[derive(Copy, Clone, Debug, Deserialize)]
pub struct MeterAggregates {
    pub battery: MeterReading,

    /// House consumption, its sign is reversed compared to the other meters.
    pub load: MeterReading,

    /// Grid connection.
    pub site: MeterReading,

    pub solar: MeterReading,
}

#[derive(Deserialize)]
pub struct Operation {
    pub real_mode: OperationMode,

    #[serde(rename = "backup_reserve_percent")]
    pub backup_reserve: Percentage,
}

#[derive(Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(from = "String")]
pub enum OperationMode {
    Backup,
    SelfConsumption,
    Autonomous,
    Scheduler,
    SiteControl,
    Other(String),
}

impl From<String> for OperationMode {
    fn from(mode: String) -> Self {
        match mode.as_str() {
            "backup" => Self::Backup,
            "self_consumption" => Self::SelfConsumption,
            "autonomous" => Self::Autonomous,
            "scheduler" => Self::Scheduler,
            "site_control" => Self::SiteControl,
            _ => Self::Other(mode),
        }
    }
}

impl Display for OperationMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Backup => write!(f, "Backup"),
            Self::SelfConsumption => write!(f, "Self_Consumption"),
            Self::Autonomous => write!(f, "Autonomous"),
            Self::Scheduler => write!(f, "Scheduler"),
            Self::SiteControl => write!(f, "Site_Control"),
            Self::Other(mode) => write!(f, "{mode}"),
        }
    }
}

#[derive(Deserialize)]
pub struct GridStatusResponse {
    pub grid_status: GridStatus,
}

#[derive(Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(from = "String")]
pub enum GridStatus {
    Connected,
    IslandedReady,
    Islanded,
    TransitionToGrid,
    TransitionToIsland,
    Unknown(String),
}

impl GridStatus {
    /// Numeric code for the `solar.grid_status` gauge, `0` is reserved for unknown statuses.
    pub const fn code(&self) -> u8 {
        match self {
            Self::Unknown(_) => 0,
            Self::Connected => 1,
            Self::IslandedReady => 2,
            Self::Islanded => 3,
            Self::TransitionToGrid => 4,
            Self::TransitionToIsland => 5,
        }
    }
}

impl From<String> for GridStatus {
    fn from(status: String) -> Self {
        match status.as_str() {
            "SystemGridConnected" => Self::Connected,
            "SystemIslandedReady" => Self::IslandedReady,
            "SystemIslandedActive" => Self::Islanded,
            "SystemTransitionToGrid" => Self::TransitionToGrid,
            "SystemTransitionToIsland" => Self::TransitionToIsland,
            _ => Self::Unknown(status),
        }
    }
}

impl Display for GridStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Connected => write!(f, "Connected"),
            Self::IslandedReady => write!(f, "Islanded_Ready"),
            Self::Islanded => write!(f, "Islanded"),
            Self::TransitionToGrid => write!(f, "Transition_To_Grid"),
            Self::TransitionToIsland => write!(f, "Transition_To_Island"),
            Self::Unknown(_) => write!(f, "Unknown"),
        }
    }
}

#[derive(Deserialize)]
pub struct StateOfEnergy {
    pub percentage: Percentage,
}

#[derive(Deserialize)]
pub struct SystemStatus {
    pub battery_blocks: Vec<BatteryPack>,
}

#[must_use]
#[derive(Copy, Clone, Debug, Deserialize)]
pub struct BatteryPack {
    #[serde(rename = "nominal_energy_remaining")]
    pub energy_remaining: WattHours,

    #[serde(rename = "nominal_full_pack_energy")]
    pub capacity: WattHours,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prelude::Result;

    #[test]
    fn meter_aggregates_ok() -> Result {
        // language=json
        let body = r#"{
            "site": {
                "last_communication_time": "2024-05-03T14:12:31.180927626-07:00",
                "instant_power": -2187.5,
                "instant_reactive_power": -96,
                "instant_apparent_power": 2189.6,
                "frequency": 0,
                "energy_exported": 5102553.9,
                "energy_imported": 7361101.2,
                "instant_average_voltage": 209.9,
                "instant_total_current": 0,
                "i_a_current": 0,
                "timeout": 1500000000
            },
            "battery": {
                "instant_power": 10,
                "energy_exported": 3407530,
                "energy_imported": 3951190
            },
            "load": {
                "instant_power": 912.25,
                "energy_exported": 0,
                "energy_imported": 9816470.5
            },
            "solar": {
                "instant_power": 3089.75,
                "energy_exported": 8127530.8,
                "energy_imported": 2103.4
            }
        }"#;
        let aggregates = serde_json::from_str::<MeterAggregates>(body)?;
        assert_eq!(aggregates.site.instant_power, Watts(-2187.5));
        assert_eq!(aggregates.load.energy_imported, WattHours(9_816_470.5));
        assert_eq!(aggregates.solar.energy_exported, WattHours(8_127_530.8));
        assert_eq!(aggregates.battery.instant_power, Watts(10.0));
        Ok(())
    }

    #[test]
    fn operation_ok() -> Result {
        let operation = serde_json::from_str::<Operation>(
            r#"{"real_mode": "self_consumption", "backup_reserve_percent": 24.6}"#,
        )?;
        assert_eq!(operation.real_mode, OperationMode::SelfConsumption);
        assert_eq!(operation.real_mode.to_string(), "Self_Consumption");
        assert_eq!(operation.backup_reserve, Percentage(24.6));
        Ok(())
    }

    #[test]
    fn unknown_operation_mode_is_kept() -> Result {
        let mode = serde_json::from_str::<OperationMode>(r#""time_of_use""#)?;
        assert_eq!(mode.to_string(), "time_of_use");
        Ok(())
    }

    #[test]
    fn grid_status_ok() -> Result {
        let response = serde_json::from_str::<GridStatusResponse>(
            r#"{"grid_status": "SystemIslandedActive", "grid_services_active": false}"#,
        )?;
        assert_eq!(response.grid_status, GridStatus::Islanded);
        assert_eq!(response.grid_status.to_string(), "Islanded");
        assert_eq!(response.grid_status.code(), 3);
        Ok(())
    }

    #[test]
    fn unknown_grid_status_ok() {
        let status = GridStatus::from("SystemMicroGrid".to_owned());
        assert_eq!(status.to_string(), "Unknown");
        assert_eq!(status.code(), 0);
    }

    #[test]
    fn system_status_ok() -> Result {
        // language=json
        let body = r#"{
            "nominal_full_pack_energy": 27000,
            "nominal_energy_remaining": 20250,
            "battery_blocks": [
                {"PackageSerialNumber": "TG1", "nominal_energy_remaining": 10125, "nominal_full_pack_energy": 13500},
                {"PackageSerialNumber": "TG2", "nominal_energy_remaining": 10125.5, "nominal_full_pack_energy": 13500}
            ]
        }"#;
        let status = serde_json::from_str::<SystemStatus>(body)?;
        assert_eq!(status.battery_blocks.len(), 2);
        assert_eq!(status.battery_blocks[1].energy_remaining, WattHours(10_125.5));
        assert_eq!(status.battery_blocks[0].capacity, WattHours(13_500.0));
        Ok(())
    }
}
