use std::path::Path;

use anyhow::{Result, anyhow, bail, ensure};
use tracing::{debug, instrument};

use crate::{
    channel::{ChannelDescriptor, ChannelOutcome, StreamEntry},
    context::RunContext,
    pipeline::Resolver,
    source::{ChannelTable, LookupError, TableDefaults},
    ytdlp::{self, ProbeError, Request},
};

pub const BUILTIN_CHANNELS: &str = include_str!("../channels/youtube.toml");
pub const DEFAULT_OUTPUT: &str = "ytplaylist.m3u";
pub const DEFAULT_COOKIES: &str = "cookies.txt";

const DEFAULTS: TableDefaults = TableDefaults {
    name: "Unknown",
    group: "Others",
    epg_ids: false,
};

/// Verifies everything the live probe needs before any network activity
///
/// # Errors
/// Errors when the cookie file is missing or `yt-dlp` cannot be run
pub async fn preflight(cookies: &Path, program: &Path) -> Result<()> {
    if !tokio::fs::try_exists(cookies).await.unwrap_or(false) {
        bail!("Missing cookies file: {}", cookies.display());
    }
    ensure!(
        ytdlp::is_installed(program).await,
        "`{}` is not installed or available in PATH!",
        program.display()
    );
    Ok(())
}

/// Canonical "live" page of a channel handle (`@name`) or path (`channel/UC...`)
#[must_use]
pub fn live_page_url(code: &str) -> String {
    format!("https://www.youtube.com/{}/live", code.trim_matches('/'))
}

/// Checks channels for a running livestream and extracts its HLS manifest
pub struct LiveProbe {
    table: ChannelTable,
}

impl LiveProbe {
    #[must_use]
    pub const fn new(table: ChannelTable) -> Self {
        Self { table }
    }

    #[instrument(skip(self, ctx, cookies))]
    async fn probe(&self, ctx: &RunContext, cookies: &Path, code: &str) -> Result<Option<String>> {
        let live_page = live_page_url(code);
        let user_agent = ctx.identity.user_agent();

        let info = ytdlp::extract_info(&Request {
            program: &ctx.ytdlp,
            url: &live_page,
            cookies,
            user_agent: &user_agent,
            retries: None,
        })
        .await;

        let watch_url = match info {
            Ok(info) => info.live_watch_url(),
            Err(ProbeError::NotLive(msg)) => {
                debug!("{msg}");
                None
            }
            Err(e) => return Err(anyhow!(e).context("Checking live status")),
        };
        let Some(watch_url) = watch_url else {
            return Ok(None);
        };
        debug!("Live video at {watch_url}");

        let user_agent = ctx.identity.user_agent();
        let info = ytdlp::extract_info(&Request {
            program: &ctx.ytdlp,
            url: &watch_url,
            cookies,
            user_agent: &user_agent,
            retries: Some(ctx.retries),
        })
        .await
        .map_err(|e| anyhow!(e).context(format!("Extracting formats of {watch_url}")))?;

        info.hls_manifest_url()
            .map(|url| Some(url.to_string()))
            .ok_or_else(|| anyhow!("No HLS format found for {watch_url}"))
    }
}

impl Resolver for LiveProbe {
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
        let Some(cookies) = ctx.cookies.as_deref() else {
            return ChannelOutcome::Fatal(anyhow!("No cookies file configured"));
        };

        match self.probe(ctx, cookies, &channel.id).await {
            Ok(Some(url)) => ChannelOutcome::Resolved(StreamEntry::for_channel(channel, url)),
            Ok(None) => ChannelOutcome::Skipped("no live video found".to_string()),
            Err(e) => ChannelOutcome::Fatal(e),
        }
    }
}
