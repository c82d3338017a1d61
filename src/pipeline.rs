use std::fmt;

use tracing::{error, info, warn};

use crate::{
    channel::{ChannelDescriptor, ChannelOutcome},
    context::RunContext,
    playlist::Playlist,
    source::LookupError,
};

/// A provider's strategy for turning its inputs into playable entries
#[allow(async_fn_in_trait)]
pub trait Resolver {
    /// Per-channel input, e.g. a channel code or a raw API record
    type Source;

    /// Resolves presentation metadata for `source`
    ///
    /// # Errors
    /// Errors when the channel is unknown or its static data is malformed
    fn describe(&self, source: &Self::Source) -> Result<ChannelDescriptor, LookupError>;

    /// Finds the playable stream for an already described channel
    async fn resolve(
        &self,
        ctx: &RunContext,
        source: &Self::Source,
        channel: &ChannelDescriptor,
    ) -> ChannelOutcome;
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub emitted: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} emitted, {} skipped, {} failed",
            self.emitted, self.skipped, self.failed
        )
    }
}

/// Resolves every source in order, appending resolved channels to `playlist`
///
/// Failures never escape a single channel; they are logged and counted.
pub async fn run<R: Resolver>(
    resolver: &R,
    ctx: &RunContext,
    sources: impl IntoIterator<Item = R::Source>,
    playlist: &mut Playlist,
) -> RunSummary {
    let mut summary = RunSummary::default();

    for source in sources {
        let channel = match resolver.describe(&source) {
            Ok(c) => c,
            Err(e @ LookupError::UnknownChannel(_)) => {
                warn!("Skipping channel: {e}");
                summary.skipped += 1;
                continue;
            }
            Err(e) => {
                error!("Skipping channel: {e}");
                summary.failed += 1;
                continue;
            }
        };

        info!("Checking channel: {} ({})", channel.display_name, channel.id);
        match resolver.resolve(ctx, &source, &channel).await {
            ChannelOutcome::Resolved(entry) => {
                if playlist.push(&channel, &entry) {
                    summary.emitted += 1;
                } else {
                    warn!("Skipping {}: unusable playback URL", channel.display_name);
                    summary.skipped += 1;
                }
            }
            ChannelOutcome::Skipped(reason) => {
                warn!("Skipping {}: {reason}", channel.display_name);
                summary.skipped += 1;
            }
            ChannelOutcome::Fatal(e) => {
                error!("Skipping {} ({}): {e:#}", channel.display_name, channel.id);
                summary.failed += 1;
            }
        }
    }

    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        channel::StreamEntry,
        playlist::PlaylistHeader,
        source::{ChannelTable, TableDefaults},
    };
    use anyhow::anyhow;
    use indoc::indoc;

    /// Resolves channels from a canned table of outcomes
    struct Canned(ChannelTable);

    impl Resolver for Canned {
        type Source = &'static str;

        fn describe(&self, source: &Self::Source) -> Result<ChannelDescriptor, LookupError> {
            self.0.get(source)?.to_descriptor(&TableDefaults {
                name: "Unknown",
                group: "Others",
                epg_ids: false,
            })
        }

        async fn resolve(
            &self,
            _ctx: &RunContext,
            source: &Self::Source,
            channel: &ChannelDescriptor,
        ) -> ChannelOutcome {
            match *source {
                "live" => ChannelOutcome::Resolved(StreamEntry::for_channel(
                    channel,
                    "https://x/live.m3u8".into(),
                )),
                "empty" => ChannelOutcome::Resolved(StreamEntry::for_channel(channel, String::new())),
                "offline" => ChannelOutcome::Skipped("not live".into()),
                _ => ChannelOutcome::Fatal(anyhow!("connection reset")),
            }
        }
    }

    fn resolver() -> Canned {
        Canned(
            ChannelTable::parse(indoc! {r#"
                [[channel]]
                code = "live"
                name = "Live"

                [[channel]]
                code = "empty"

                [[channel]]
                code = "offline"

                [[channel]]
                code = "broken"

                [[channel]]
                code = "bad-key"
                license = "00:ff"
            "#})
            .unwrap(),
        )
    }

    fn ctx() -> RunContext {
        RunContext::new(reqwest::Client::new())
    }

    #[tokio::test]
    async fn failures_stay_within_their_channel() {
        let mut playlist = Playlist::new(PlaylistHeader::default());
        let summary = run(
            &resolver(),
            &ctx(),
            ["broken", "bad-key", "missing", "offline", "empty", "live"],
            &mut playlist,
        )
        .await;

        assert_eq!(
            summary,
            RunSummary {
                emitted: 1,
                skipped: 3,
                failed: 2
            }
        );
        assert_eq!(
            playlist.render(),
            "#EXTM3U\n#EXTINF:-1 group-title=\"Others\",Live\nhttps://x/live.m3u8\n"
        );
    }

    #[tokio::test]
    async fn output_is_deterministic() {
        let mut first = Playlist::new(PlaylistHeader::default());
        let mut second = Playlist::new(PlaylistHeader::default());
        run(&resolver(), &ctx(), ["live", "offline", "live"], &mut first).await;
        run(&resolver(), &ctx(), ["live", "offline", "live"], &mut second).await;

        assert_eq!(first.render(), second.render());
        assert_eq!(first.len(), 2);
    }
}
