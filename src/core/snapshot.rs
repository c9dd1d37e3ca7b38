//! One poll cycle: read the gateway and the weather, and turn them into a metric batch.

use std::time::Duration;

use bon::Builder;
use chrono::{DateTime, Utc};
use enumset::EnumSet;

use crate::{
    api::{
        powerwall::{self, Extras, Readings},
        weather::{self, Location, WeatherSnapshot},
    },
    core::{
        batch::{APP_NAME, Attributes, Common, MetricBatch},
        gauge::{MetricRecord, directional_pair, gauge},
    },
    error::Error,
    prelude::*,
    quantity::WattHours,
};

/// Metric groups emitted only on request.
#[derive(Debug, clap::ValueEnum, enumset::EnumSetType)]
pub enum OptionalMetric {
    /// Backup reserve percentage.
    Reserve,

    /// Charge percentage left above the backup reserve.
    Headroom,

    /// Energy remaining in all the battery packs.
    BatteryCharge,

    /// Full capacity of all the battery packs.
    BatteryCapacity,

    /// Numeric grid status code.
    GridStatus,
}

#[derive(Builder)]
pub struct Assembler {
    powerwall: powerwall::Client,
    weather: weather::Api,
    location: Location,
    interval: Duration,

    #[builder(default)]
    optional_metrics: EnumSet<OptionalMetric>,
}

impl Assembler {
    /// Assemble the batch for the given poll time; there is no partial batch on failure.
    #[instrument(skip_all, fields(now = %now))]
    pub async fn assemble(&self, now: DateTime<Utc>) -> Result<MetricBatch, Error> {
        self.try_assemble(now).await.map_err(|error| Error::Assembly(Box::new(error)))
    }

    async fn try_assemble(&self, now: DateTime<Utc>) -> Result<MetricBatch, Error> {
        let extras = Extras {
            reserve: self.optional_metrics.contains(OptionalMetric::Reserve)
                || self.optional_metrics.contains(OptionalMetric::Headroom),
            batteries: self.optional_metrics.contains(OptionalMetric::BatteryCharge)
                || self.optional_metrics.contains(OptionalMetric::BatteryCapacity),
        };

        let readings = self.powerwall.read(extras).await?;
        let weather = self.weather.fetch(&self.location).await?;

        let batch = Snapshot { now, readings, weather }
            .into_batch(self.interval, self.optional_metrics)?;
        info!(n_metrics = batch.metrics.len(), "assembled");
        Ok(batch)
    }
}

/// Raw inputs of a batch.
pub struct Snapshot {
    pub now: DateTime<Utc>,
    pub readings: Readings,
    pub weather: WeatherSnapshot,
}

impl Snapshot {
    pub fn into_batch(
        self,
        interval: Duration,
        optional_metrics: EnumSet<OptionalMetric>,
    ) -> Result<MetricBatch, Error> {
        let Self { now, readings, weather } = self;
        let meters = readings.meters;
        let state_of_charge = readings.state_of_charge.round_to_tenth();

        let mut metrics = vec![
            gauge("solar.battery_charge_pct", state_of_charge),
            gauge("solar.battery.imported", meters.battery.energy_imported),
            gauge("solar.battery.exported", meters.battery.energy_exported),
            gauge("solar.house.imported", meters.load.energy_imported),
            gauge("solar.house.exported", meters.load.energy_exported),
            gauge("solar.grid.imported", meters.site.energy_imported),
            gauge("solar.grid.exported", meters.site.energy_exported),
            gauge("solar.solar.imported", meters.solar.energy_imported),
            gauge("solar.solar.exported", meters.solar.energy_exported),
            gauge("weather.cloud_coverage_pct", weather.cloud_coverage_percent),
            gauge("weather.visibility", weather.visibility),
            gauge("weather.temperature", weather.temperature),
            gauge("weather.is_daytime", u8::from(weather.is_daytime(now))),
        ];

        metrics.extend(directional_pair("solar", meters.solar.instant_power, false));
        metrics.extend(directional_pair("grid", meters.site.instant_power, false));
        metrics.extend(directional_pair("house", meters.load.instant_power, true));
        metrics.extend(directional_pair("battery", meters.battery.instant_power, false));

        metrics.extend(Self::optional_gauges(&readings, optional_metrics));

        MetricBatch::builder()
            .common(Common {
                timestamp: now,
                interval_millis: u64::try_from(interval.as_millis()).unwrap_or(u64::MAX),
                attributes: Attributes {
                    app_name: APP_NAME,
                    mode: readings.operation_mode.to_string(),
                    status: readings.grid_status.to_string(),
                    poll_timestamp: now,
                },
            })
            .metrics(metrics)
            .build()
            .ensure_finite()
    }

    fn optional_gauges(
        readings: &Readings,
        optional_metrics: EnumSet<OptionalMetric>,
    ) -> Vec<MetricRecord> {
        let mut metrics = Vec::new();
        if let Some(reserve) = readings.reserve {
            if optional_metrics.contains(OptionalMetric::Reserve) {
                metrics.push(gauge("solar.reserve_pct", reserve));
            }
            if optional_metrics.contains(OptionalMetric::Headroom) {
                let headroom = (readings.state_of_charge.round_to_tenth() - reserve).0.trunc();
                metrics.push(gauge("solar.pct_left_above_reserve", headroom));
            }
        }
        if let Some(batteries) = &readings.batteries {
            if optional_metrics.contains(OptionalMetric::BatteryCharge) {
                let charge: WattHours = batteries.iter().map(|pack| pack.energy_remaining).sum();
                metrics.push(gauge("solar.battery_charge_wh", charge));
            }
            if optional_metrics.contains(OptionalMetric::BatteryCapacity) {
                let capacity: WattHours = batteries.iter().map(|pack| pack.capacity).sum();
                metrics.push(gauge("solar.battery_capacity_wh", capacity));
            }
        }
        if optional_metrics.contains(OptionalMetric::GridStatus) {
            metrics.push(gauge("solar.grid_status", readings.grid_status.code()));
        }
        metrics
    }
}
