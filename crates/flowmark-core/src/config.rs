use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::markov::SizeThresholds;
use crate::window::SegmentParams;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractConfig {
    /// Span of one window, measured from the window's first packet.
    pub window_minutes: f64,
    /// Flows at least this long are kept whole (or dropped whole if they carry TLS).
    pub long_flow_minutes: f64,
    /// File extensions treated as captures when scanning a directory.
    pub capture_extensions: Vec<String>,
    pub size_thresholds: SizeThresholds,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            window_minutes: 30.0,
            long_flow_minutes: 30.0,
            capture_extensions: vec!["pcap".to_string()],
            size_thresholds: SizeThresholds::default(),
        }
    }
}

impl ExtractConfig {
    pub fn config_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".flowmark")
            .join("config.toml")
    }

    /// Reads `path`, or the default config path when `None`. A missing
    /// default file yields the defaults; a missing explicit file is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, explicit) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (Self::config_path(), false),
        };

        let mut config = if path.exists() || explicit {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("cannot read {}", path.display()))?;
            Self::from_toml(&contents)
                .with_context(|| format!("invalid config {}", path.display()))?
        } else {
            Self::default()
        };

        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("cannot create {}", parent.display()))?;
        }
        std::fs::write(path, self.to_toml()?)
            .with_context(|| format!("cannot write {}", path.display()))?;
        Ok(())
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(v) = std::env::var("FLOWMARK_WINDOW_MINUTES") {
            self.window_minutes = v
                .trim()
                .parse()
                .with_context(|| format!("FLOWMARK_WINDOW_MINUTES: not a number: '{}'", v))?;
        }
        if let Ok(v) = std::env::var("FLOWMARK_LONG_FLOW_MINUTES") {
            self.long_flow_minutes = v
                .trim()
                .parse()
                .with_context(|| format!("FLOWMARK_LONG_FLOW_MINUTES: not a number: '{}'", v))?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.window_minutes.is_finite() && self.window_minutes > 0.0) {
            anyhow::bail!("window_minutes must be a positive number, got {}", self.window_minutes);
        }
        if !(self.long_flow_minutes.is_finite() && self.long_flow_minutes > 0.0) {
            anyhow::bail!(
                "long_flow_minutes must be a positive number, got {}",
                self.long_flow_minutes
            );
        }
        let t = self.size_thresholds;
        if t.small >= t.large {
            anyhow::bail!(
                "size_thresholds.small ({}) must be below size_thresholds.large ({})",
                t.small,
                t.large
            );
        }
        if self.capture_extensions.iter().all(|e| e.trim_start_matches('.').is_empty()) {
            anyhow::bail!("capture_extensions must name at least one extension");
        }
        Ok(())
    }

    pub fn segment_params(&self) -> SegmentParams {
        SegmentParams {
            window_minutes: self.window_minutes,
            long_flow_minutes: self.long_flow_minutes,
        }
    }

    /// Case-insensitive match on the file extension; a leading dot in the
    /// configured extension is ignored.
    pub fn is_capture(&self, path: &Path) -> bool {
        let ext = match path.extension() {
            Some(ext) => ext.to_string_lossy().to_lowercase(),
            None => return false,
        };
        self.capture_extensions
            .iter()
            .any(|e| e.trim_start_matches('.').eq_ignore_ascii_case(&ext))
    }
}
