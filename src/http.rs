use crate::config::AnsConfig;
use crate::error::Result;
use std::time::Duration;

/// Client used for directory listings and the one-shot registry fetch.
pub fn listing_client(cfg: &AnsConfig) -> Result<reqwest::Client> {
    build_client(&cfg.user_agent, cfg.listing_timeout_seconds)
}

/// Client used for streamed file downloads. The timeout bounds the whole
/// request, body included.
pub fn download_client(cfg: &AnsConfig) -> Result<reqwest::Client> {
    build_client(&cfg.user_agent, cfg.download_timeout_seconds)
}

fn build_client(user_agent: &str, timeout_seconds: u64) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent(user_agent.to_string())
        .timeout(Duration::from_secs(timeout_seconds))
        .build()?;
    Ok(client)
}
