use anyhow::{Context, Result, ensure};
use reqwest::header::USER_AGENT;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{info, instrument};

use crate::{
    channel::{ChannelDescriptor, ChannelOutcome, StreamEntry},
    context::RunContext,
    pipeline::Resolver,
    source::{LookupError, descriptor_from_record, first_present, or_default_label},
};

pub const API_URL: &str = "https://api.ppv.st/api/streams";
pub const DEFAULT_OUTPUT: &str = "PPV_IFRAME.m3u8";

const DEFAULT_GROUP: &str = "PPV";
const DEFAULT_NAME: &str = "Unnamed";
const STREAM_URL_KEY: &str = "iframe";

#[derive(Debug, Default, Deserialize)]
pub struct StreamsResponse {
    #[serde(default)]
    pub streams: Vec<Category>,
}

#[derive(Debug, Deserialize)]
pub struct Category {
    pub category: Option<String>,
    #[serde(default)]
    pub streams: Vec<Map<String, Value>>,
}

/// One stream record together with the group it was listed under
#[derive(Debug, Clone)]
pub struct Listing {
    pub group_title: String,
    /// Position in the flattened listing, unique within one response
    pub position: usize,
    pub record: Map<String, Value>,
}

impl Listing {
    /// Identifier for records that carry no `id`
    #[must_use]
    pub fn fallback_id(&self) -> String {
        format!("{}#{}", self.group_title, self.position)
    }
}

impl StreamsResponse {
    /// Flattens category groups into listings, keeping API order
    #[must_use]
    pub fn into_listings(self) -> Vec<Listing> {
        self.streams
            .into_iter()
            .flat_map(|cat| {
                let group_title = or_default_label(cat.category.as_deref(), DEFAULT_GROUP);
                cat.streams
                    .into_iter()
                    .map(move |record| (group_title.clone(), record))
            })
            .enumerate()
            .map(|(position, (group_title, record))| Listing {
                group_title,
                position,
                record,
            })
            .collect()
    }
}

/// Fetches every category group from the streams API
///
/// # Errors
/// Errors on network failure, a non-200 status or an unparsable body
#[instrument(skip(ctx))]
pub async fn fetch_streams(ctx: &RunContext, url: &str) -> Result<StreamsResponse> {
    let res = ctx
        .client
        .get(url)
        .header(USER_AGENT, "Mozilla/5.0")
        .timeout(ctx.request_timeout)
        .send()
        .await
        .context("Fetching stream listing")?;

    ensure!(
        res.status() == reqwest::StatusCode::OK,
        "Stream listing API returned status {}",
        res.status()
    );

    let streams = res
        .json::<StreamsResponse>()
        .await
        .context("Parsing stream listing")?;
    info!("Stream listing has {} categories", streams.streams.len());

    Ok(streams)
}

/// The listing already carries a playable URL in its `iframe` field
#[derive(Debug, Default, Clone, Copy)]
pub struct DirectField;

impl Resolver for DirectField {
    type Source = Listing;

    fn describe(&self, source: &Listing) -> Result<ChannelDescriptor, LookupError> {
        Ok(descriptor_from_record(
            &source.record,
            &source.group_title,
            DEFAULT_NAME,
            &source.fallback_id(),
        ))
    }

    async fn resolve(
        &self,
        _ctx: &RunContext,
        source: &Listing,
        channel: &ChannelDescriptor,
    ) -> ChannelOutcome {
        first_present(&source.record, &[STREAM_URL_KEY]).map_or_else(
            || ChannelOutcome::Skipped(format!("no `{STREAM_URL_KEY}` field")),
            |url| ChannelOutcome::Resolved(StreamEntry::for_channel(channel, url.to_string())),
        )
    }
}
