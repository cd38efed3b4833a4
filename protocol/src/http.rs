//! Shared `reqwest` plumbing: one client builder so every outbound call
//! carries the same timeout and user agent, and a URL helper that
//! percent-encodes path segments (addresses come from user input).

use std::time::Duration;

use reqwest::{Client, Url};

/// User agent sent with every request.
pub const USER_AGENT: &str = concat!("zeref/", env!("CARGO_PKG_VERSION"));

/// Builds a client whose every request is bounded by `timeout`.
pub fn build_client(timeout: Duration) -> reqwest::Result<Client> {
    Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
}

/// Appends `segments` to `base`, encoding each one.
pub fn endpoint(base: &str, segments: &[&str]) -> Result<Url, String> {
    let mut url = Url::parse(base).map_err(|e| format!("invalid base url '{}': {}", base, e))?;
    url.path_segments_mut()
        .map_err(|_| format!("base url '{}' cannot carry a path", base))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}
