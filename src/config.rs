use std::path::Path;

use anyhow::Context;

use crate::foundation::error::{StageError, StageResult};

/// Studio-wide settings. Every field has a default, so a partial JSON file is valid.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct StudioConfig {
    /// Aspect ratios accepted by background generation, as `W:H`.
    pub aspect_ratios: Vec<String>,
    /// Straight RGBA8 color used when flattening for formats without alpha.
    pub export_backdrop: [u8; 4],
    /// JPEG quality, 1..=100.
    pub jpeg_quality: u8,
    /// Worker threads for the compositor. `None` uses the global rayon pool.
    pub render_threads: Option<usize>,
}

impl Default for StudioConfig {
    fn default() -> Self {
        Self {
            aspect_ratios: ["1:1", "4:3", "3:2", "16:9", "9:16"]
                .into_iter()
                .map(String::from)
                .collect(),
            export_backdrop: [255, 255, 255, 255],
            jpeg_quality: 90,
            render_threads: None,
        }
    }
}

impl StudioConfig {
    /// Parse and validate a JSON document.
    pub fn from_json_str(json: &str) -> StageResult<Self> {
        let cfg: Self = serde_json::from_str(json)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Read, parse and validate a JSON file.
    pub fn from_json_file(path: &Path) -> StageResult<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read config '{}'", path.display()))?;
        Self::from_json_str(&text)
    }

    /// Check internal consistency.
    pub fn validate(&self) -> StageResult<()> {
        if self.aspect_ratios.is_empty() {
            return Err(StageError::validation(
                "config must list at least one aspect ratio",
            ));
        }
        for ratio in &self.aspect_ratios {
            parse_aspect_ratio(ratio)?;
        }
        if self.export_backdrop[3] != 255 {
            return Err(StageError::validation(
                "export_backdrop must be opaque (alpha 255)",
            ));
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(StageError::validation("jpeg_quality must be in 1..=100"));
        }
        if self.render_threads == Some(0) {
            return Err(StageError::validation(
                "render_threads must be >= 1 when set",
            ));
        }
        Ok(())
    }

    /// Fail unless `ratio` is one of the configured aspect ratios.
    pub fn check_aspect_ratio(&self, ratio: &str) -> StageResult<()> {
        if self.aspect_ratios.iter().any(|r| r == ratio.trim()) {
            Ok(())
        } else {
            Err(StageError::validation(format!(
                "unsupported aspect ratio '{ratio}'. Must be one of: {}",
                self.aspect_ratios.join(", ")
            )))
        }
    }
}

/// Split `W:H` into its positive integer parts.
pub fn parse_aspect_ratio(ratio: &str) -> StageResult<(u32, u32)> {
    let bad = || StageError::validation(format!("aspect ratio '{ratio}' must look like W:H"));
    let (w, h) = ratio.trim().split_once(':').ok_or_else(bad)?;
    let w: u32 = w.trim().parse().map_err(|_| bad())?;
    let h: u32 = h.trim().parse().map_err(|_| bad())?;
    if w == 0 || h == 0 {
        return Err(bad());
    }
    Ok((w, h))
}
