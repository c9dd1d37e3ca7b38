use clap::Parser;

use crate::{api::powerwall, prelude::*};

#[derive(Parser)]
pub struct PowerwallArgs {
    /// Gateway host name or IP address.
    ///
    /// The self-signed certificate is only valid for `powerwall`, `teg`, or `powerpack`,
    /// and it is not verified anyway.
    #[clap(long = "powerwall-address", env = "PW_ADDR")]
    pub address: String,

    /// Customer login e-mail.
    #[clap(long = "powerwall-email", env = "PW_USER")]
    pub email: String,

    /// Customer login password.
    #[clap(long = "powerwall-password", env = "PW_PASS", hide_env_values = true)]
    pub password: String,
}

impl PowerwallArgs {
    pub fn new_client(&self) -> Result<powerwall::Client> {
        let credentials =
            powerwall::Credentials { email: self.email.clone(), password: self.password.clone() };
        powerwall::Client::with_address(&self.address, credentials)
    }
}
