use std::time::Duration;

use anyhow::{Context, Result};
use rand::seq::IndexedRandom;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};

/// Chrome `(major, build, patch)` versions used for browser identities
pub const CHROME_VERSIONS: &[(u16, u16, u16)] = &[(122, 6267, 70), (121, 6167, 131), (120, 6099, 109)];

/// Supplies the `User-Agent` presented to hosts that fingerprint clients
pub trait BrowserIdentity: Send + Sync {
    fn user_agent(&self) -> String;
}

/// Picks uniformly from [`CHROME_VERSIONS`] on every call
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomChrome;

impl BrowserIdentity for RandomChrome {
    fn user_agent(&self) -> String {
        let (major, build, patch) = CHROME_VERSIONS
            .choose(&mut rand::rng())
            .copied()
            .unwrap_or(CHROME_VERSIONS[0]);
        chrome_user_agent(major, build, patch)
    }
}

#[must_use]
pub fn chrome_user_agent(major: u16, build: u16, patch: u16) -> String {
    format!(
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/{major}.0.{build}.{patch} Safari/537.36"
    )
}

/// Builds the shared HTTP client
///
/// Providers that need a browser `User-Agent` override it per request.
///
/// # Errors
/// Errors when the TLS backend cannot be initialized
pub fn init_http_client() -> Result<reqwest::Client> {
    let mut headers = HeaderMap::new();
    headers.insert(
        USER_AGENT,
        HeaderValue::from_str(&format!(
            "{}/{} (+{})",
            env!("CARGO_PKG_NAME"),
            env!("CARGO_PKG_VERSION"),
            env!("CARGO_PKG_REPOSITORY")
        ))
        .context("Building default User-Agent")?,
    );

    reqwest::Client::builder()
        .default_headers(headers)
        .connect_timeout(Duration::from_secs(10))
        .build()
        .context("Unable to build HTTP client")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_identity_comes_from_version_table() {
        let known = CHROME_VERSIONS
            .iter()
            .map(|&(a, b, c)| chrome_user_agent(a, b, c))
            .collect::<Vec<_>>();

        for _ in 0..32 {
            assert!(known.contains(&RandomChrome.user_agent()));
        }
    }

    #[test]
    fn user_agent_format() {
        assert_eq!(
            chrome_user_agent(122, 6267, 70),
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0.6267.70 Safari/537.36"
        );
    }
}
