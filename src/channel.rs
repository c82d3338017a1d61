use crate::clearkey::LicenseKeyPair;

/// Presentation metadata of one channel, after defaults are applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelDescriptor {
    /// Provider-specific channel code
    pub id: String,
    pub display_name: String,
    /// Empty when the source has no logo
    pub logo_url: String,
    pub group_title: String,
    pub license: Option<LicenseKeyPair>,
    /// Emitted as `tvg-id` / `tvg-name` when the provider publishes an EPG keyed by it
    pub epg_id: Option<String>,
}

/// A playable stream for a [`ChannelDescriptor`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamEntry {
    pub playback_url: String,
    pub license_blob: Option<String>,
}

impl StreamEntry {
    /// Builds an entry, deriving the license blob from the channel's key pair
    #[must_use]
    pub fn for_channel(channel: &ChannelDescriptor, playback_url: String) -> Self {
        Self {
            playback_url,
            license_blob: channel.license.as_ref().map(LicenseKeyPair::to_license_json),
        }
    }
}

/// What happened to a single channel during a run
#[derive(Debug)]
pub enum ChannelOutcome {
    Resolved(StreamEntry),
    /// Expected outcome such as "not live"; logged as a warning
    Skipped(String),
    /// Failure scoped to this channel; logged as an error
    Fatal(anyhow::Error),
}
