use anyhow::{Context, Result, anyhow, ensure};
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, AUTHORIZATION, ORIGIN, REFERER, USER_AGENT};
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::{
    channel::{ChannelDescriptor, ChannelOutcome, StreamEntry},
    context::RunContext,
    pipeline::Resolver,
    source::{ChannelTable, LookupError, TableDefaults},
};

pub const BUILTIN_CHANNELS: &str = include_str!("../channels/mytvsuper.toml");
pub const DEFAULT_OUTPUT: &str = "mytvsuper.m3u";
pub const TOKEN_ENV: &str = "MYTVSUPER_API_TOKEN";
pub const EPG_URL: &str = "https://mytvsuperepg.860775.xyz/epg.xml";
/// Catch-up window in seconds and catch-up type advertised in the header
pub const CATCHUP: (u32, &str) = (10800, "timeshift");
/// A Hong Kong address; the checkout API is geo-restricted
pub const DEFAULT_FORWARDED_FOR: &str = "210.6.4.148";

const CHECKOUT_URL: &str = "https://user-api.mytvsuper.com/v1/channel/checkout";
const PLATFORM: &str = "android_tv";
const WANTED_QUALITY: &str = "high";
const SAFARI_UA: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/16.5.2 Safari/605.1.15";

const DEFAULTS: TableDefaults = TableDefaults {
    name: "Unknown",
    group: "Others",
    epg_ids: true,
};

#[derive(Debug, Default, Deserialize)]
pub struct CheckoutResponse {
    #[serde(default)]
    pub profiles: Vec<Profile>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Profile {
    pub quality: Option<String>,
    pub streaming_path: Option<String>,
}

impl CheckoutResponse {
    /// Streaming path of the first `high` quality profile, truncated before `&p=`
    #[must_use]
    pub fn playback_url(&self) -> Option<&str> {
        self.profiles
            .iter()
            .find(|p| p.quality.as_deref() == Some(WANTED_QUALITY))
            .and_then(|p| p.streaming_path.as_deref())
            .map(truncate_playback_path)
            .filter(|url| !url.is_empty())
    }
}

/// Drops the trailing `&p=...` segment the checkout API appends
#[must_use]
pub fn truncate_playback_path(url: &str) -> &str {
    url.split_once("&p=").map_or(url, |(head, _)| head)
}

/// Resolves channels through the subscription checkout API
pub struct Checkout {
    table: ChannelTable,
    forwarded_for: String,
}

impl Checkout {
    #[must_use]
    pub const fn new(table: ChannelTable, forwarded_for: String) -> Self {
        Self {
            table,
            forwarded_for,
        }
    }

    #[instrument(skip(self, ctx, token))]
    async fn checkout(&self, ctx: &RunContext, token: &str, code: &str) -> Result<CheckoutResponse> {
        let res = ctx
            .client
            .get(CHECKOUT_URL)
            .query(&[("platform", PLATFORM), ("network_code", code)])
            .header(ACCEPT, "application/json")
            .header(AUTHORIZATION, format!("Bearer {token}"))
            .header(ACCEPT_LANGUAGE, "zh-CN,zh-Hans;q=0.9")
            .header(ORIGIN, "https://www.mytvsuper.com")
            .header(REFERER, "https://www.mytvsuper.com/")
            .header(USER_AGENT, SAFARI_UA)
            .header("X-Forwarded-For", &self.forwarded_for)
            .send()
            .await
            .context("Requesting channel checkout")?;

        ensure!(
            res.status().is_success(),
            "Checkout API returned status {}",
            res.status()
        );

        res.json::<CheckoutResponse>()
            .await
            .context("Parsing channel checkout")
    }
}

impl Resolver for Checkout {
    type Source = String;

    fn describe(&self, code: &String) -> Result<ChannelDescriptor, LookupError> {
        self.table.get(code)?.to_descriptor(&DEFAULTS)
    }

    async fn resolve(
        &self,
        ctx: &RunContext,
        _code: &String,
        channel: &ChannelDescriptor,
    ) -> ChannelOutcome {
        let Some(token) = ctx.api_token.as_deref() else {
            return ChannelOutcome::Fatal(anyhow!("{TOKEN_ENV} is not set"));
        };

        let response = match self.checkout(ctx, token, &channel.id).await {
            Ok(r) => r,
            Err(e) => return ChannelOutcome::Fatal(e),
        };

        match response.playback_url() {
            Some(url) => {
                debug!("Playback URL for {}: {url}", channel.id);
                ChannelOutcome::Resolved(StreamEntry::for_channel(channel, url.to_string()))
            }
            None => ChannelOutcome::Skipped("no playback URL found".to_string()),
        }
    }
}
