use clap::Parser;
use reqwest::Url;

use crate::{api::new_relic, prelude::*};

#[derive(Parser)]
pub struct NewRelicArgs {
    /// Metric API license key.
    #[clap(
        id = "insights_api_key",
        long = "insights-api-key",
        env = "INSIGHTS_API_KEY",
        hide_env_values = true
    )]
    pub api_key: String,

    #[clap(long = "metric-api-url", env = "METRIC_API_URL", default_value = new_relic::DEFAULT_URL)]
    pub url: Url,
}

impl NewRelicArgs {
    pub fn new_api(&self) -> Result<new_relic::Api> {
        new_relic::Api::new(self.url.clone(), &self.api_key)
    }
}
