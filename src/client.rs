use crate::config::Config;
use crate::error::Result;
use reqwest::Client;

const USER_AGENT: &str = concat!("plantbuddy/", env!("CARGO_PKG_VERSION"));

/// Build the HTTP client shared by every upstream adapter.
pub fn build_client(config: &Config) -> Result<Client> {
    let client = Client::builder()
        .timeout(config.http_timeout())
        .user_agent(USER_AGENT)
        .build()?;
    Ok(client)
}
