use std::{collections::HashSet, path::Path};

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::{
    channel::ChannelDescriptor,
    clearkey::{KeyError, LicenseKeyPair},
};

/// Logo field names seen in remote API records, highest priority first
pub const LOGO_KEYS: &[&str] = &["logo", "poster", "image", "thumbnail"];

#[derive(Error, Debug)]
pub enum LookupError {
    #[error("unknown channel code `{0}`")]
    UnknownChannel(String),
    #[error("channel `{code}` has an invalid license: {source}")]
    InvalidLicense {
        code: String,
        #[source]
        source: KeyError,
    },
}

/// Returns the first key in `keys` holding a non-empty string value
#[must_use]
pub fn first_present<'a>(record: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .filter_map(|key| record.get(*key)?.as_str())
        .find(|value| !value.is_empty())
}

/// Uses `value` verbatim unless it is missing or empty
#[must_use]
pub fn or_default_label(value: Option<&str>, default: &str) -> String {
    value
        .filter(|v| !v.is_empty())
        .unwrap_or(default)
        .to_string()
}

/// Builds a descriptor out of a loosely-typed remote API record
///
/// `fallback_id` is used when the record has no `id` of its own.
#[must_use]
pub fn descriptor_from_record(
    record: &Map<String, Value>,
    group_title: &str,
    default_name: &str,
    fallback_id: &str,
) -> ChannelDescriptor {
    let display_name = or_default_label(first_present(record, &["name"]), default_name);
    let id = match record.get("id") {
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => fallback_id.to_string(),
    };

    ChannelDescriptor {
        id,
        display_name,
        logo_url: first_present(record, LOGO_KEYS).unwrap_or_default().to_string(),
        group_title: group_title.to_string(),
        license: None,
        epg_id: None,
    }
}

/// Defaults applied when turning a [`ChannelTable`] entry into a descriptor
#[derive(Debug, Clone)]
pub struct TableDefaults {
    pub name: &'static str,
    pub group: &'static str,
    /// Emit the channel code as `tvg-id`
    pub epg_ids: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TableEntry {
    pub code: String,
    pub name: Option<String>,
    pub logo: Option<String>,
    pub group: Option<String>,
    pub license: Option<String>,
}

impl TableEntry {
    /// # Errors
    /// Errors when the license is present but malformed
    pub fn to_descriptor(&self, defaults: &TableDefaults) -> Result<ChannelDescriptor, LookupError> {
        let license = self
            .license
            .as_deref()
            .map(str::parse::<LicenseKeyPair>)
            .transpose()
            .map_err(|source| LookupError::InvalidLicense {
                code: self.code.clone(),
                source,
            })?;

        Ok(ChannelDescriptor {
            id: self.code.clone(),
            display_name: or_default_label(self.name.as_deref(), defaults.name),
            logo_url: self.logo.clone().unwrap_or_default(),
            group_title: or_default_label(self.group.as_deref(), defaults.group),
            license,
            epg_id: defaults.epg_ids.then(|| self.code.clone()),
        })
    }
}

/// Static, ordered lookup table of channel codes
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChannelTable {
    #[serde(rename = "channel", default)]
    channels: Vec<TableEntry>,
}

impl ChannelTable {
    /// Parses a TOML table made of `[[channel]]` entries
    ///
    /// # Errors
    /// Errors on invalid TOML or duplicated channel codes
    pub fn parse(source: &str) -> Result<Self> {
        let table: Self = toml::from_str(source).context("Parsing channel table")?;

        let mut seen = HashSet::new();
        for entry in &table.channels {
            if !seen.insert(entry.code.as_str()) {
                bail!("Channel code `{}` is listed more than once", entry.code);
            }
        }

        Ok(table)
    }

    /// Reads the table from `path`, falling back to `builtin` when no path is given
    ///
    /// # Errors
    /// Errors when the file cannot be read or parsed
    pub async fn load(path: Option<&Path>, builtin: &str) -> Result<Self> {
        match path {
            Some(path) => {
                let source = tokio::fs::read_to_string(path)
                    .await
                    .with_context(|| format!("Reading channel table {}", path.display()))?;
                Self::parse(&source)
            }
            None => Self::parse(builtin),
        }
    }

    /// # Errors
    /// Errors when `code` is not part of the table
    pub fn get(&self, code: &str) -> Result<&TableEntry, LookupError> {
        self.channels
            .iter()
            .find(|c| c.code == code)
            .ok_or_else(|| LookupError::UnknownChannel(code.to_string()))
    }

    /// Channel codes in table order
    pub fn codes(&self) -> impl Iterator<Item = &str> {
        self.channels.iter().map(|c| c.code.as_str())
    }

    /// Codes to process in one run: `only` without repeats, in first-seen
    /// order, or the whole table when `only` is empty
    #[must_use]
    pub fn select(&self, only: &[String]) -> Vec<String> {
        if only.is_empty() {
            return self.codes().map(String::from).collect();
        }

        let mut seen = HashSet::new();
        only.iter()
            .filter(|code| seen.insert(code.as_str()))
            .cloned()
            .collect()
    }
}
