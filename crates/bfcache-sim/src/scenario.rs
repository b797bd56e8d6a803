//! Scenario files: a history configuration and a list of steps.
//!
//! ```toml
//! [config]
//! page_cache = { capacity = 2 }
//!
//! [[step]]
//! action = "navigate"
//! url = "https://a.test/"
//!
//! [[step]]
//! action = "back"
//! ```

use std::path::Path;

use anyhow::{Context, Result};
use bfcache_core::HistoryConfig;
use serde::Deserialize;

/// One scripted user or script action. Frames are named by the `name`
/// given to `subframe`; an absent frame means the main frame.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case", deny_unknown_fields)]
pub enum Step {
    Navigate {
        url: String,
        #[serde(default)]
        frame: Option<String>,
    },
    Subframe {
        name: String,
        url: String,
        #[serde(default)]
        parent: Option<String>,
    },
    Back,
    Forward,
    Go {
        delta: i32,
    },
    Reload {
        #[serde(default)]
        from_origin: bool,
    },
    Fragment {
        fragment: String,
        #[serde(default)]
        frame: Option<String>,
    },
    PushState {
        url: String,
        #[serde(default)]
        state: Option<serde_json::Value>,
        #[serde(default)]
        frame: Option<String>,
    },
    ReplaceState {
        url: String,
        #[serde(default)]
        state: Option<serde_json::Value>,
        #[serde(default)]
        frame: Option<String>,
    },
    AdvanceClock {
        secs: u64,
    },
}

#[derive(Debug, Clone)]
pub struct Scenario {
    pub config: HistoryConfig,
    pub steps: Vec<Step>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawScenario {
    #[serde(default)]
    config: Option<toml::Table>,
    #[serde(default, rename = "step")]
    steps: Vec<Step>,
}

impl Scenario {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let raw: RawScenario = toml::from_str(text).context("invalid scenario")?;
        let config = match raw.config {
            Some(table) => HistoryConfig::from_toml_str(&toml::to_string(&table)?)
                .context("invalid [config] table")?,
            None => HistoryConfig::default(),
        };
        Ok(Self {
            config,
            steps: raw.steps,
        })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        log::debug!("loaded scenario {}", path.display());
        Self::from_toml_str(&text)
    }
}

/// Scenario run when no file is given.
pub const DEMO: &str = include_str!("../scenarios/demo.toml");
