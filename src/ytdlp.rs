use std::{
    io::ErrorKind,
    path::Path,
    process::{ExitStatus, Stdio},
    sync::LazyLock,
};

use regex::Regex;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, instrument};

/// `yt-dlp` error lines that mean "nothing is streaming right now"
static NOT_LIVE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(not currently live|is not live|this live event will begin|premieres in|is offline|no live stream|live stream recording is not available)",
    )
    .expect("static regex is valid")
});

/// Protocols of the HLS family as reported by `yt-dlp`
const HLS_PROTOCOLS: &[&str] = &["m3u8", "m3u8_native"];

#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("`yt-dlp` is not installed or available in PATH")]
    NotInstalled,
    #[error("unable to run `yt-dlp`: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("channel is not live: {0}")]
    NotLive(String),
    #[error("`yt-dlp` exited with {status}: {stderr}")]
    Failed { status: ExitStatus, stderr: String },
    #[error("unable to parse `yt-dlp` output: {0}")]
    Parse(#[from] serde_json::Error),
}

/// The subset of `yt-dlp`'s info dict used for live detection and format selection
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VideoInfo {
    pub id: Option<String>,
    pub webpage_url: Option<String>,
    #[serde(default)]
    pub is_live: Option<bool>,
    #[serde(default)]
    pub entries: Option<Vec<Option<VideoInfo>>>,
    #[serde(default)]
    pub formats: Vec<Format>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Format {
    pub protocol: Option<String>,
    pub manifest_url: Option<String>,
}

impl VideoInfo {
    fn watch_url(&self) -> Option<String> {
        self.webpage_url
            .clone()
            .filter(|u| !u.is_empty())
            .or_else(|| {
                self.id
                    .as_ref()
                    .map(|id| format!("https://www.youtube.com/watch?v={id}"))
            })
    }

    /// Watch URL of the live video, looking into playlist entries when the
    /// top-level result is not live itself
    #[must_use]
    pub fn live_watch_url(&self) -> Option<String> {
        if self.is_live == Some(true) {
            return self.watch_url();
        }

        self.entries
            .iter()
            .flatten()
            .flatten()
            .find(|e| e.is_live == Some(true))
            .and_then(Self::watch_url)
    }

    /// Manifest URL of the first HLS format
    #[must_use]
    pub fn hls_manifest_url(&self) -> Option<&str> {
        self.formats
            .iter()
            .filter(|f| f.protocol.as_deref().is_some_and(|p| HLS_PROTOCOLS.contains(&p)))
            .find_map(|f| f.manifest_url.as_deref())
    }
}

/// Request shaping shared by every `yt-dlp` call
#[derive(Debug, Clone)]
pub struct Request<'a> {
    /// `yt-dlp` executable
    pub program: &'a Path,
    pub url: &'a str,
    pub cookies: &'a Path,
    pub user_agent: &'a str,
    /// Retry budget for requests and fragments, also selects the `best` format
    pub retries: Option<u32>,
}

impl Request<'_> {
    #[must_use]
    pub fn args(&self) -> Vec<String> {
        let mut args = vec![
            "--dump-single-json".to_string(),
            "--quiet".to_string(),
            "--no-warnings".to_string(),
            "--force-ipv4".to_string(),
            "--cookies".to_string(),
            self.cookies.display().to_string(),
        ];

        for header in [
            format!("User-Agent:{}", self.user_agent),
            "Accept-Language:en-US,en;q=0.9".to_string(),
            "Referer:https://www.youtube.com/".to_string(),
            "Sec-Fetch-Mode:navigate".to_string(),
        ] {
            args.push("--add-headers".to_string());
            args.push(header);
        }

        if let Some(retries) = self.retries {
            args.extend([
                "--format".to_string(),
                "best".to_string(),
                "--retries".to_string(),
                retries.to_string(),
                "--fragment-retries".to_string(),
                retries.to_string(),
                "--skip-unavailable-fragments".to_string(),
                "--extractor-args".to_string(),
                "youtube:skip=translated_subs".to_string(),
            ]);
        }

        args.push("--".to_string());
        args.push(self.url.to_string());
        args
    }
}

/// Checks if yt-dlp is installed / available in PATH
pub async fn is_installed(program: &Path) -> bool {
    debug!("Checking for yt-dlp installation");
    tokio::process::Command::new(program)
        .arg("--version")
        .stderr(Stdio::null())
        .stdout(Stdio::null())
        .status()
        .await
        .is_ok_and(|s| s.success())
}

/// Runs `yt-dlp` without downloading and parses its info dict
///
/// # Errors
/// [`ProbeError::NotLive`] when the error output says nothing is streaming,
/// other variants for spawn, exit status or parse failures
#[instrument(skip(request), fields(url = request.url))]
pub async fn extract_info(request: &Request<'_>) -> Result<VideoInfo, ProbeError> {
    let output = match tokio::process::Command::new(request.program)
        .args(request.args())
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output()
        .await
    {
        Ok(o) => o,
        Err(e) if e.kind() == ErrorKind::NotFound => return Err(ProbeError::NotInstalled),
        Err(e) => return Err(e.into()),
    };

    if !output.status.success() {
        return Err(classify_failure(
            output.status,
            String::from_utf8_lossy(&output.stderr).trim(),
        ));
    }

    Ok(serde_json::from_slice(&output.stdout)?)
}

fn classify_failure(status: ExitStatus, stderr: &str) -> ProbeError {
    if NOT_LIVE_REGEX.is_match(stderr) {
        ProbeError::NotLive(stderr.to_string())
    } else {
        ProbeError::Failed {
            status,
            stderr: stderr.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    fn info(json: &str) -> VideoInfo {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn live_top_level_result() {
        let i = info(r#"{"id":"abc","is_live":true,"webpage_url":"https://www.youtube.com/watch?v=abc"}"#);
        assert_eq!(
            i.live_watch_url().as_deref(),
            Some("https://www.youtube.com/watch?v=abc")
        );

        let i = info(r#"{"id":"xyz","is_live":true}"#);
        assert_eq!(
            i.live_watch_url().as_deref(),
            Some("https://www.youtube.com/watch?v=xyz")
        );
    }

    #[test]
    fn first_live_entry_is_picked() {
        let i = info(indoc! {r#"
            {
              "id": "UC123",
              "is_live": false,
              "entries": [
                null,
                { "id": "old", "is_live": false },
                { "id": "now", "is_live": true },
                { "id": "also", "is_live": true, "webpage_url": "https://www.youtube.com/watch?v=also" }
              ]
            }
        "#});
        assert_eq!(
            i.live_watch_url().as_deref(),
            Some("https://www.youtube.com/watch?v=now")
        );
    }

    #[test]
    fn nothing_live() {
        assert_eq!(info(r#"{"id":"abc"}"#).live_watch_url(), None);
        assert_eq!(
            info(r#"{"id":"abc","entries":[{"id":"x","is_live":false}]}"#).live_watch_url(),
            None
        );
    }

    #[test]
    fn hls_manifest_selection() {
        let i = info(indoc! {r#"
            {
              "formats": [
                { "protocol": "https", "manifest_url": "https://x/dash.mpd" },
                { "protocol": "m3u8_native" },
                { "protocol": "m3u8_native", "manifest_url": "https://x/master.m3u8" },
                { "protocol": "m3u8", "manifest_url": "https://x/other.m3u8" }
              ]
            }
        "#});
        assert_eq!(i.hls_manifest_url(), Some("https://x/master.m3u8"));

        let i = info(r#"{"formats":[{"protocol":"http_dash_segments","manifest_url":"https://x/a.mpd"}]}"#);
        assert_eq!(i.hls_manifest_url(), None);
    }

    #[test]
    fn request_args() {
        let request = Request {
            program: Path::new("yt-dlp"),
            url: "https://www.youtube.com/@chan/live",
            cookies: Path::new("cookies.txt"),
            user_agent: "UA",
            retries: None,
        };
        let args = request.args();
        assert!(args.contains(&"--force-ipv4".to_string()));
        assert!(args.contains(&"User-Agent:UA".to_string()));
        assert!(!args.contains(&"--fragment-retries".to_string()));
        assert_eq!(args.last().map(String::as_str), Some(request.url));

        let args = Request {
            retries: Some(10),
            ..request
        }
        .args();
        let pos = args.iter().position(|a| a == "--fragment-retries").unwrap();
        assert_eq!(args[pos + 1], "10");
        assert!(args.contains(&"youtube:skip=translated_subs".to_string()));
    }

    #[cfg(unix)]
    #[test]
    fn failure_classification() {
        use std::os::unix::process::ExitStatusExt;

        let status = ExitStatus::from_raw(1 << 8);
        assert!(matches!(
            classify_failure(status, "ERROR: [youtube:tab] @chan: The channel is not currently live"),
            ProbeError::NotLive(_)
        ));
        assert!(matches!(
            classify_failure(status, "ERROR: [youtube] abc: This live event will begin in 3 hours."),
            ProbeError::NotLive(_)
        ));
        assert!(matches!(
            classify_failure(status, "ERROR: Unable to download webpage: HTTP Error 429"),
            ProbeError::Failed { .. }
        ));
    }
}
