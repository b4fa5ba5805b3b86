//! Runtime settings.
//!
//! The page can embed a JSON block with the id [`CONFIG_ELEMENT_ID`]; every
//! field is optional and falls back to the built-in default.

use anyhow::{Context, anyhow, ensure};
use serde::Deserialize;

use crate::render::DEFAULT_ENDPOINT;

pub const CONFIG_ELEMENT_ID: &str = "ature-studio-config";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StudioConfig {
    /// Where the render request is posted.
    pub endpoint: String,
    /// `off`, `error`, `warn`, `info`, `debug` or `trace`.
    pub log_level: String,
    /// Element id of the external 3D/AR viewer that receives the model preview.
    pub model_viewer_id: String,
}

impl Default for StudioConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_owned(),
            log_level: "debug".to_owned(),
            model_viewer_id: "ature-model-viewer".to_owned(),
        }
    }
}

impl StudioConfig {
    pub fn from_json(text: &str) -> anyhow::Result<Self> {
        let config: Self = serde_json::from_str(text).context("studio config is not valid JSON")?;
        ensure!(!config.endpoint.trim().is_empty(), "studio config: `endpoint` must not be empty");
        config.level_filter()?;
        Ok(config)
    }

    pub fn level_filter(&self) -> anyhow::Result<log::LevelFilter> {
        self.log_level
            .parse()
            .map_err(|_| anyhow!("studio config: unknown log level `{}`", self.log_level))
    }

    /// Reads the config block from the page, if there is one.
    pub fn load() -> anyhow::Result<Self> {
        match crate::web::read_element_text(CONFIG_ELEMENT_ID) {
            Some(text) => {
                Self::from_json(&text).with_context(|| format!("reading #{CONFIG_ELEMENT_ID}"))
            }
            None => Ok(Self::default()),
        }
    }
}
