mod new_relic;
mod powerwall;
mod weather;

use std::time::Duration;

use clap::{Parser, builder::FalseyValueParser};
use enumset::EnumSet;
use reqwest::Url;

pub use self::{new_relic::NewRelicArgs, powerwall::PowerwallArgs, weather::WeatherArgs};
use crate::{
    api::heartbeat,
    core::snapshot::{Assembler, OptionalMetric},
    prelude::*,
};

#[derive(Parser)]
#[command(author, version, about, propagate_version = true)]
#[must_use]
pub struct Args {
    #[clap(flatten)]
    pub powerwall: PowerwallArgs,

    #[clap(flatten)]
    pub weather: WeatherArgs,

    #[clap(flatten)]
    pub new_relic: NewRelicArgs,

    /// Polling interval, for example `5min`. Bare numbers are seconds.
    #[clap(
        long = "polling-interval",
        env = "POLL_INTERVAL",
        default_value = "60s",
        value_parser = parse_interval
    )]
    pub polling_interval: Duration,

    /// Keep polling forever instead of printing a single batch and exiting.
    #[clap(long = "service", env = "AS_SERVICE", value_parser = FalseyValueParser::new())]
    pub is_service: bool,

    /// Print the single batch without publishing it.
    #[clap(long, env = "SCOUT", value_parser = FalseyValueParser::new())]
    pub scout: bool,

    /// Optional metric groups to emit.
    #[clap(
        long = "optional-metrics",
        env = "OPTIONAL_METRICS",
        value_delimiter = ',',
        num_args = 0..,
        default_value = "reserve,headroom"
    )]
    pub optional_metrics: Vec<OptionalMetric>,

    #[clap(long = "heartbeat-url", env = "HEARTBEAT_URL")]
    pub heartbeat_url: Option<Url>,
}

impl Args {
    #[must_use]
    pub fn optional_metrics(&self) -> EnumSet<OptionalMetric> {
        self.optional_metrics.iter().copied().collect()
    }

    pub fn new_assembler(&self) -> Result<Assembler> {
        Ok(Assembler::builder()
            .powerwall(self.powerwall.new_client()?)
            .weather(self.weather.new_api()?)
            .location(self.weather.location()?)
            .interval(self.polling_interval)
            .optional_metrics(self.optional_metrics())
            .build())
    }

    pub fn new_heartbeat(&self) -> Result<heartbeat::Client> {
        heartbeat::Client::new(self.heartbeat_url.clone())
    }
}

fn parse_interval(value: &str) -> Result<Duration, String> {
    let interval = match value.parse::<u64>() {
        Ok(seconds) => Duration::from_secs(seconds),
        Err(_) => humantime::parse_duration(value).map_err(|error| error.to_string())?,
    };
    if interval.is_zero() {
        return Err("the interval must be positive".to_owned());
    }
    Ok(interval)
}
