use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use tracing::{debug, instrument};

use crate::channel::{ChannelDescriptor, StreamEntry};

/// Global attributes and comment lines written above the first entry
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaylistHeader {
    /// `url-tvg` attribute
    pub epg_url: Option<String>,
    /// `catchup-time` (seconds) and `catchup-type` attributes
    pub catchup: Option<(u32, String)>,
    /// Rendered as an `# Updated on` comment line
    pub generated_at: Option<NaiveDateTime>,
}

impl PlaylistHeader {
    fn render(&self) -> String {
        let epg = self
            .epg_url
            .as_deref()
            .map(|url| format!(" url-tvg=\"{}\"", attr(url)))
            .unwrap_or_default();
        let catchup = self
            .catchup
            .as_ref()
            .map(|(time, kind)| format!(" catchup-time=\"{time}\" catchup-type=\"{}\"", attr(kind)))
            .unwrap_or_default();

        let mut out = format!("#EXTM3U{epg}{catchup}\n");
        if let Some(at) = &self.generated_at {
            out.push_str(&format!("# Updated on {}\n", at.format("%Y-%m-%d %H:%M:%S")));
        }
        out
    }
}

/// Keeps a value on a single line
fn single_line(value: &str) -> String {
    value.replace(['\r', '\n'], " ")
}

/// Single-line value that cannot close the surrounding `"..."` attribute
fn attr(value: &str) -> String {
    single_line(value).replace('"', "'")
}

/// Renders one `#EXTINF` block, ending with the playback URL
///
/// Metadata is flattened onto the `#EXTINF` line; the URL is written as is and
/// must already be a single line (see [`Playlist::push`]).
#[must_use]
pub fn render_entry(channel: &ChannelDescriptor, entry: &StreamEntry) -> String {
    let epg = channel
        .epg_id
        .as_deref()
        .map(|id| format!(" tvg-id=\"{}\" tvg-name=\"{}\"", attr(id), attr(&channel.display_name)))
        .unwrap_or_default();
    let logo = if channel.logo_url.is_empty() {
        String::new()
    } else {
        format!(" tvg-logo=\"{}\"", attr(&channel.logo_url))
    };

    let mut out = format!(
        "#EXTINF:-1{epg}{logo} group-title=\"{group}\",{name}\n",
        group = attr(&channel.group_title),
        name = single_line(&channel.display_name),
    );

    if let Some(license) = &entry.license_blob {
        out.push_str("#KODIPROP:inputstream.adaptive.manifest_type=mpd\n");
        out.push_str("#KODIPROP:inputstream.adaptive.license_type=clearkey\n");
        out.push_str(&format!(
            "#KODIPROP:inputstream.adaptive.license_key={}\n",
            single_line(license)
        ));
    }

    out.push_str(&format!("{}\n", entry.playback_url));
    out
}

/// An in-memory extended M3U document
#[derive(Debug, Clone)]
pub struct Playlist {
    header: PlaylistHeader,
    blocks: Vec<String>,
}

impl Playlist {
    #[must_use]
    pub const fn new(header: PlaylistHeader) -> Self {
        Self {
            header,
            blocks: Vec::new(),
        }
    }

    /// Appends a channel; entries whose playback URL is empty or spans
    /// several lines are ignored
    ///
    /// Returns whether the entry was added.
    pub fn push(&mut self, channel: &ChannelDescriptor, entry: &StreamEntry) -> bool {
        let url = &entry.playback_url;
        if url.trim().is_empty() || url.contains(['\r', '\n']) {
            debug!("Not adding {} without a usable playback URL", channel.id);
            return false;
        }
        self.blocks.push(render_entry(channel, entry));
        true
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    #[must_use]
    pub fn render(&self) -> String {
        let mut out = self.header.render();
        for block in &self.blocks {
            out.push_str(block);
        }
        out
    }

    /// Overwrites `path` with the rendered playlist
    ///
    /// # Errors
    /// Errors when the file cannot be written
    #[instrument(skip(self), fields(entries = self.len()))]
    pub async fn write(&self, path: &Path) -> Result<()> {
        tokio::fs::write(path, self.render())
            .await
            .with_context(|| format!("Writing playlist to {}", path.display()))
    }
}
