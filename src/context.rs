use std::{path::PathBuf, time::Duration};

use crate::util::{BrowserIdentity, RandomChrome};

/// Timeout applied to remote metadata fetches
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
/// Retry budget handed to `yt-dlp` for requests and fragments
pub const DEFAULT_RETRIES: u32 = 10;
/// Looked up in `PATH` unless a path is given
pub const DEFAULT_YTDLP: &str = "yt-dlp";

/// Read-only settings shared by every resolver call of a run
pub struct RunContext {
    pub client: reqwest::Client,
    pub request_timeout: Duration,
    pub retries: u32,
    /// Netscape cookie jar for the live-video host
    pub cookies: Option<PathBuf>,
    pub ytdlp: PathBuf,
    /// Bearer token for the checkout API
    pub api_token: Option<String>,
    pub identity: Box<dyn BrowserIdentity>,
}

impl RunContext {
    #[must_use]
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            retries: DEFAULT_RETRIES,
            cookies: None,
            ytdlp: PathBuf::from(DEFAULT_YTDLP),
            api_token: None,
            identity: Box::new(RandomChrome),
        }
    }
}
