use clap::Parser;

use crate::{
    api::weather::{self, Location, Units},
    prelude::*,
};

#[derive(Parser)]
pub struct WeatherArgs {
    /// OpenWeatherMap API key.
    #[clap(
        id = "weather_api_key",
        long = "weather-api-key",
        env = "WEATHER_KEY",
        hide_env_values = true
    )]
    pub api_key: String,

    #[clap(long = "weather-latitude", env = "WEATHER_LAT", allow_negative_numbers = true)]
    pub latitude: Option<f64>,

    #[clap(long = "weather-longitude", env = "WEATHER_LON", allow_negative_numbers = true)]
    pub longitude: Option<f64>,

    /// Postal code, takes precedence over the coordinates.
    #[clap(long = "weather-zip", env = "WEATHER_ZIP")]
    pub zip: Option<String>,

    /// ISO 3166 country code of the postal code.
    #[clap(long = "weather-country", env = "WEATHER_COUNTRY", default_value = "us")]
    pub country: String,

    #[clap(long = "weather-units", env = "WEATHER_UNITS", default_value = "imperial")]
    pub units: Units,
}

impl WeatherArgs {
    pub fn location(&self) -> Result<Location> {
        if let Some(zip) = &self.zip {
            return Ok(Location::PostalCode { zip: zip.clone(), country: self.country.clone() });
        }
        match (self.latitude, self.longitude) {
            (Some(latitude), Some(longitude)) => Ok(Location::Coordinates { latitude, longitude }),
            _ => bail!("either the postal code or both the latitude and longitude must be set"),
        }
    }

    pub fn new_api(&self) -> Result<weather::Api> {
        weather::Api::new(self.api_key.clone(), self.units)
    }
}
