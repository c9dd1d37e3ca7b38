//! OpenWeatherMap current weather.

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use serde_with::serde_as;

use crate::{error::Error, prelude::*, retry::Retry};

const SERVICE: &str = "weather";

#[derive(Clone, Debug, PartialEq)]
pub enum Location {
    Coordinates { latitude: f64, longitude: f64 },
    PostalCode { zip: String, country: String },
}

impl Location {
    fn query(&self) -> Vec<(&'static str, String)> {
        match self {
            Self::Coordinates { latitude, longitude } => {
                vec![("lat", latitude.to_string()), ("lon", longitude.to_string())]
            }
            Self::PostalCode { zip, country } => vec![("zip", format!("{zip},{country}"))],
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, clap::ValueEnum)]
pub enum Units {
    /// Kelvin.
    Standard,

    /// Celsius.
    Metric,

    /// Fahrenheit.
    Imperial,
}

impl Units {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Metric => "metric",
            Self::Imperial => "imperial",
        }
    }
}

pub struct Api {
    client: Client,
    url: Url,
    api_key: String,
    units: Units,
    retry: Retry,
}

impl Api {
    pub fn new(api_key: String, units: Units) -> Result<Self> {
        let url = Url::parse("https://api.openweathermap.org/data/2.5/weather")?;
        Self::with_url(url, api_key, units, Retry::patient())
    }

    pub fn with_url(url: Url, api_key: String, units: Units, retry: Retry) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(10)).build()?;
        Ok(Self { client, url, api_key, units, retry })
    }

    #[instrument(skip_all, name = "fetching the local weather…")]
    pub async fn fetch(&self, location: &Location) -> Result<WeatherSnapshot, Error> {
        let mut query = location.query();
        query.push(("appid", self.api_key.clone()));
        query.push(("units", self.units.as_str().to_owned()));
        let weather = self.retry.run(|| self.fetch_once(&query)).await?;
        debug!(?weather, "fetched");
        Ok(weather)
    }

    async fn fetch_once(&self, query: &[(&str, String)]) -> Result<WeatherSnapshot, Error> {
        let response = self
            .client
            .get(self.url.clone())
            .query(query)
            .send()
            .await
            .map_err(|source| Error::Unreachable { service: SERVICE, source })?;
        match response.status() {
            StatusCode::TOO_MANY_REQUESTS => Err(Error::RateLimited { service: SERVICE }),
            status if !status.is_success() => {
                Err(Error::WeatherUnavailable(format!("the API responded with {status}")))
            }
            _ => response
                .json::<CurrentWeather>()
                .await
                .map(WeatherSnapshot::from)
                .map_err(|error| Error::WeatherUnavailable(format!("malformed response: {error}"))),
        }
    }
}

#[must_use]
#[derive(Clone, Debug, PartialEq)]
pub struct WeatherSnapshot {
    pub cloud_coverage_percent: u8,

    /// Meters, regardless of the unit system.
    pub visibility: f64,

    pub temperature: f64,
    pub sunrise: DateTime<Utc>,
    pub sunset: DateTime<Utc>,
}

impl WeatherSnapshot {
    /// Whether the sun is up, sunrise and sunset themselves do not count.
    pub fn is_daytime(&self, now: DateTime<Utc>) -> bool {
        self.sunrise < now && now < self.sunset
    }
}

impl From<CurrentWeather> for WeatherSnapshot {
    fn from(weather: CurrentWeather) -> Self {
        Self {
            cloud_coverage_percent: weather.clouds.all,
            visibility: weather.visibility,
            temperature: weather.main.temperature,
            sunrise: weather.sys.sunrise,
            sunset: weather.sys.sunset,
        }
    }
}

#[derive(Deserialize)]
struct CurrentWeather {
    clouds: Clouds,
    visibility: f64,
    main: Main,
    sys: Sys,
}

#[derive(Deserialize)]
struct Clouds {
    all: u8,
}

#[derive(Deserialize)]
struct Main {
    #[serde(rename = "temp")]
    temperature: f64,
}

#[serde_as]
#[derive(Deserialize)]
struct Sys {
    #[serde_as(as = "serde_with::TimestampSeconds<i64>")]
    sunrise: DateTime<Utc>,

    #[serde_as(as = "serde_with::TimestampSeconds<i64>")]
    sunset: DateTime<Utc>,
}
