#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(clippy::cargo)]
#![warn(clippy::perf)]
#![warn(clippy::complexity)]
#![warn(clippy::style)]
#![allow(clippy::multiple_crate_versions)]

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};
use context::{DEFAULT_RETRIES, DEFAULT_YTDLP, RunContext};
use pipeline::{Resolver, RunSummary};
use playlist::{Playlist, PlaylistHeader};
use source::ChannelTable;
use tracing::{info, warn};
use util::init_http_client;

pub mod channel;
pub mod clearkey;
pub mod context;
pub mod mytvsuper;
pub mod pipeline;
pub mod playlist;
pub mod ppv;
pub mod source;
pub mod util;
pub mod youtube;
pub mod ytdlp;

/// Generates M3U playlists for live TV channels
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    provider: Provider,

    /// Playlist file to write (overwritten) [default: depends on the provider]
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Provider {
    /// Lists PPV events from the public streams API
    Ppv {
        /// Streams API endpoint
        #[arg(long, default_value = ppv::API_URL)]
        api_url: String,
    },

    /// Checks YouTube channels for a running livestream
    Youtube {
        /// Netscape cookie jar passed to yt-dlp
        #[arg(long, default_value = youtube::DEFAULT_COOKIES)]
        cookies: PathBuf,

        /// Retry budget for requests and fragments
        #[arg(long, default_value_t = DEFAULT_RETRIES)]
        retries: u32,

        /// `yt-dlp` executable
        #[arg(long = "yt-dlp", value_name = "PROGRAM", default_value = DEFAULT_YTDLP)]
        ytdlp: PathBuf,

        /// Leave out the `# Updated on` line
        #[arg(long)]
        no_timestamp: bool,

        #[command(flatten)]
        table: TableArgs,
    },

    /// Resolves myTV SUPER channels through the checkout API
    Mytvsuper {
        /// EPG advertised in the playlist header
        #[arg(long, default_value = mytvsuper::EPG_URL)]
        epg_url: String,

        /// Address sent as `X-Forwarded-For`
        #[arg(long, default_value = mytvsuper::DEFAULT_FORWARDED_FOR)]
        forwarded_for: String,

        #[command(flatten)]
        table: TableArgs,
    },
}

#[derive(clap::Args, Debug)]
struct TableArgs {
    /// Channel table (TOML) replacing the built-in one
    #[arg(long)]
    channels: Option<PathBuf>,

    /// Only process these channel codes (repeatable)
    #[arg(long, value_name = "CODE")]
    only: Vec<String>,
}

impl TableArgs {
    async fn load(&self, builtin: &str) -> Result<(ChannelTable, Vec<String>)> {
        let table = ChannelTable::load(self.channels.as_deref(), builtin).await?;
        let codes = table.select(&self.only);
        Ok((table, codes))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    dotenvy::dotenv().ok();

    let args = Args::parse();
    let mut ctx = RunContext::new(init_http_client()?);

    match args.provider {
        Provider::Ppv { api_url } => {
            let output = args.output.unwrap_or_else(|| ppv::DEFAULT_OUTPUT.into());
            info!("Generating PPV playlist from {api_url}");

            let listings = ppv::fetch_streams(&ctx, &api_url).await?.into_listings();
            generate(
                &ppv::DirectField,
                &ctx,
                listings,
                PlaylistHeader::default(),
                &output,
            )
            .await?;
        }

        Provider::Youtube {
            cookies,
            retries,
            ytdlp,
            no_timestamp,
            table,
        } => {
            let output = args.output.unwrap_or_else(|| youtube::DEFAULT_OUTPUT.into());
            let (table, codes) = table.load(youtube::BUILTIN_CHANNELS).await?;
            youtube::preflight(&cookies, &ytdlp).await?;

            ctx.cookies = Some(cookies);
            ctx.retries = retries;
            ctx.ytdlp = ytdlp;

            let header = PlaylistHeader {
                generated_at: (!no_timestamp).then(|| chrono::Local::now().naive_local()),
                ..PlaylistHeader::default()
            };
            generate(&youtube::LiveProbe::new(table), &ctx, codes, header, &output).await?;
        }

        Provider::Mytvsuper {
            epg_url,
            forwarded_for,
            table,
        } => {
            let output = args.output.unwrap_or_else(|| mytvsuper::DEFAULT_OUTPUT.into());
            let (table, codes) = table.load(mytvsuper::BUILTIN_CHANNELS).await?;

            ctx.api_token = std::env::var(mytvsuper::TOKEN_ENV).ok();
            if ctx.api_token.is_none() {
                warn!("env {} not provided", mytvsuper::TOKEN_ENV);
            }

            let header = PlaylistHeader {
                epg_url: Some(epg_url),
                catchup: Some((mytvsuper::CATCHUP.0, mytvsuper::CATCHUP.1.to_string())),
                generated_at: None,
            };
            let checkout = mytvsuper::Checkout::new(table, forwarded_for);
            generate(&checkout, &ctx, codes, header, &output).await?;
        }
    }

    Ok(())
}

/// Resolves every source and writes whatever was found to `output`
async fn generate<R: Resolver>(
    resolver: &R,
    ctx: &RunContext,
    sources: impl IntoIterator<Item = R::Source>,
    header: PlaylistHeader,
    output: &Path,
) -> Result<RunSummary> {
    let mut playlist = Playlist::new(header);
    let summary = pipeline::run(resolver, ctx, sources, &mut playlist).await;

    if playlist.is_empty() {
        warn!("No playable channels found");
    }
    playlist.write(output).await?;

    info!("Saved playlist to {} ({summary})", output.display());
    Ok(summary)
}
