//! The JSON configuration file.

use anyhow::{anyhow, bail, Context, Result};
use core::fmt;
use serde::{Deserialize, Serialize};
use spacemon_driver::DEFAULT_FILTER_RANGE;
use std::path::{Path, PathBuf};

/// A Filecoin network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    /// Filecoin mainnet.
    Mainnet,
    /// The calibration testnet.
    Calibnet,
}

impl Network {
    /// Returns the network name.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Mainnet => "mainnet",
            Self::Calibnet => "calibnet",
        }
    }

    /// Returns the unix timestamp of epoch 0.
    pub const fn genesis_timestamp(&self) -> i64 {
        match self {
            // 2020-08-24T22:00:00Z
            Self::Mainnet => 1598306400,
            // 2022-11-01T18:13:00Z
            Self::Calibnet => 1667326380,
        }
    }

    /// Returns the network version 22 activation epoch, the first epoch with complete builtin
    /// actor events.
    pub const fn activation_epoch(&self) -> u64 {
        match self {
            Self::Mainnet => 3855360,
            Self::Calibnet => 1427974,
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The spacemon configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Config {
    /// The network the node follows.
    pub network: Network,
    /// The Lotus JSON-RPC HTTP endpoint.
    pub lotus_http_rpc: String,
    /// A Lotus websocket endpoint. Unused.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lotus_websocket_rpc: Option<String>,
    /// The root directory of the event store.
    pub store_path: PathBuf,
    /// The root directory of the RPC response cache.
    pub api_cache_path: PathBuf,
    /// The first epoch to ingest. Defaults to the network's activation epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_epoch: Option<u64>,
    /// The initial event query width in epochs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter_range: Option<u64>,
}

impl Config {
    /// Reads and validates the configuration file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        Self::from_json(&data).with_context(|| format!("invalid config file {}", path.display()))
    }

    /// Parses and validates a JSON configuration.
    pub fn from_json(data: &[u8]) -> Result<Self> {
        let config: Self = serde_json::from_slice(data).map_err(|e| anyhow!(e))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the values the JSON schema cannot.
    pub fn validate(&self) -> Result<()> {
        let url = self.lotus_http_rpc.as_str();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            bail!("lotusHttpRpc must be an http(s) URL, got {url:?}");
        }
        if self.filter_range == Some(0) {
            bail!("filterRange must be at least 1");
        }
        Ok(())
    }

    /// The first epoch to ingest on a fresh store.
    pub fn first_epoch(&self) -> u64 {
        self.start_epoch.unwrap_or_else(|| self.network.activation_epoch())
    }

    /// The initial event query width.
    pub fn filter_range(&self) -> u64 {
        self.filter_range.unwrap_or(DEFAULT_FILTER_RANGE)
    }

    /// The RPC response cache directory of the configured network.
    pub fn api_cache_dir(&self) -> PathBuf {
        self.api_cache_path.join(self.network.as_str())
    }
}
