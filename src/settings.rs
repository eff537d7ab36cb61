use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::datetime::TimezoneHint;
use crate::error::{IngestError, Result};
use crate::fields::AliasTable;
use crate::models::CanonicalField;
use crate::pipeline::{ParseOptions, TradeCsvParser};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_timezone")]
    pub default_timezone: String,
    /// Extra header spellings per canonical field, on top of the built-in ones.
    #[serde(default)]
    pub extra_aliases: BTreeMap<CanonicalField, Vec<String>>,
    #[serde(default = "default_fuzzy_matching")]
    pub fuzzy_matching: bool,
}

fn default_timezone() -> String {
    "utc".to_string()
}

fn default_fuzzy_matching() -> bool {
    true
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            default_timezone: default_timezone(),
            extra_aliases: BTreeMap::new(),
            fuzzy_matching: default_fuzzy_matching(),
        }
    }
}

impl Settings {
    pub fn alias_table(&self) -> AliasTable {
        AliasTable::default()
            .with_extra_aliases(&self.extra_aliases)
            .with_fuzzy(self.fuzzy_matching)
    }

    pub fn parse_options(&self) -> Result<ParseOptions> {
        Ok(ParseOptions {
            default_timezone: TimezoneHint::parse(&self.default_timezone)?,
        })
    }

    pub fn parser(&self) -> Result<TradeCsvParser> {
        Ok(TradeCsvParser::new(self.alias_table(), self.parse_options()?))
    }
}

fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("trade-ingest")
}

pub fn default_settings_path() -> PathBuf {
    config_dir().join("settings.json")
}

/// Missing or unreadable files fall back to defaults.
pub fn load_settings(path: &Path) -> Settings {
    match std::fs::read_to_string(path) {
        Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
            tracing::warn!(path = %path.display(), "ignoring malformed settings: {e}");
            Settings::default()
        }),
        Err(_) => Settings::default(),
    }
}

pub fn save_settings(path: &Path, settings: &Settings) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let json = serde_json::to_string_pretty(settings)
        .map_err(|e| IngestError::Settings(e.to_string()))?;
    std::fs::write(path, format!("{json}\n"))?;
    Ok(())
}
