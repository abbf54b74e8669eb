//! Node configuration loading and management.

use crossloc_core::{Address, ChainFamily, ChainSpec, HashSpec, PartyAddresses, SwapConfig};
use crossloc_swap::{SecretCustody, SwapParams};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Full configuration for the CrossLoc node.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CrosslocConfig {
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Orchestrator tuning and timelock preset.
    #[serde(default)]
    pub swap: SwapConfig,

    /// Where swap records are kept.
    #[serde(default)]
    pub storage: StorageConfig,

    /// The two chains swaps run between.
    #[serde(default)]
    pub chains: ChainsConfig,

    /// Parties, tokens and amounts for the swaps this node runs.
    #[serde(default)]
    pub demo: DemoConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format (text, json).
    #[serde(default = "default_log_format")]
    pub format: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory for JSON swap records. Records stay in memory when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
    /// Remove finished swaps from the store once they are reported.
    #[serde(default = "default_true")]
    pub prune_finished: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            prune_finished: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainsConfig {
    #[serde(default = "default_src_chain")]
    pub src: ChainConfig,
    #[serde(default = "default_dst_chain")]
    pub dst: ChainConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    pub id: u64,
    pub name: String,
    pub family: ChainFamily,
    pub escrow_contract: String,
    /// Overrides the family's default hash-lock requirements.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<HashSpec>,
    /// Chain time (UNIX seconds) the simulated chain starts at.
    #[serde(default = "default_genesis")]
    pub genesis: u64,
    /// Simulated delay before a receipt is available (milliseconds).
    #[serde(default = "default_confirmation_delay_ms")]
    pub confirmation_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DemoConfig {
    pub maker_src: String,
    pub maker_dst: String,
    pub resolver_src: String,
    pub resolver_dst: String,
    pub src_token: String,
    pub dst_token: String,
    pub making_amount: u64,
    pub taking_amount: u64,
    /// Number of concurrent swaps to run.
    #[serde(default = "default_swaps")]
    pub swaps: usize,
    #[serde(default)]
    pub custody: SecretCustody,
    /// Chain seconds that pass per wall-clock second on the simulated chains.
    #[serde(default = "default_clock_speed")]
    pub clock_speed: u64,
    /// Hex-encoded Ed25519 seed for order signing. A fresh key is used when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signer_seed: Option<String>,
}

// Default value functions
fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".into()
}
fn default_log_format() -> String {
    "text".into()
}
fn default_genesis() -> u64 {
    1_700_000_000
}
fn default_confirmation_delay_ms() -> u64 {
    500
}
fn default_swaps() -> usize {
    1
}
fn default_clock_speed() -> u64 {
    10
}
fn default_src_chain() -> ChainConfig {
    ChainConfig {
        id: 1,
        name: "evm-source".into(),
        family: ChainFamily::Evm,
        escrow_contract: "0x00000000000000000000000000000000000e5c01".into(),
        hash: None,
        genesis: default_genesis(),
        confirmation_delay_ms: default_confirmation_delay_ms(),
    }
}
fn default_dst_chain() -> ChainConfig {
    ChainConfig {
        id: 2,
        name: "evm-destination".into(),
        family: ChainFamily::Evm,
        escrow_contract: "0x00000000000000000000000000000000000e5c02".into(),
        hash: None,
        genesis: default_genesis(),
        confirmation_delay_ms: default_confirmation_delay_ms(),
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Default for ChainsConfig {
    fn default() -> Self {
        Self {
            src: default_src_chain(),
            dst: default_dst_chain(),
        }
    }
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            maker_src: "0x1111111111111111111111111111111111111111".into(),
            maker_dst: "0x1111111111111111111111111111111111111111".into(),
            resolver_src: "0x2222222222222222222222222222222222222222".into(),
            resolver_dst: "0x2222222222222222222222222222222222222222".into(),
            src_token: "0x3333333333333333333333333333333333333333".into(),
            dst_token: "0x4444444444444444444444444444444444444444".into(),
            making_amount: 100,
            taking_amount: 95,
            swaps: default_swaps(),
            custody: SecretCustody::default(),
            clock_speed: default_clock_speed(),
            signer_seed: None,
        }
    }
}

impl ChainConfig {
    pub fn to_spec(&self) -> ChainSpec {
        let spec = ChainSpec::new(self.id, &self.name, self.family, &self.escrow_contract);
        match self.hash {
            Some(hash) => spec.with_hash(hash),
            None => spec,
        }
    }
}

impl DemoConfig {
    pub fn swap_params(&self) -> SwapParams {
        SwapParams {
            maker: PartyAddresses::new(&self.maker_src, &self.maker_dst),
            resolver: PartyAddresses::new(&self.resolver_src, &self.resolver_dst),
            src_token: Address::new(&self.src_token),
            dst_token: Address::new(&self.dst_token),
            making_amount: self.making_amount.into(),
            taking_amount: self.taking_amount.into(),
            timelocks: None,
            custody: self.custody,
        }
    }
}

impl CrosslocConfig {
    /// Load config from a TOML file, falling back to defaults for missing fields.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            let config: CrosslocConfig = toml::from_str(&contents)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save the current config to a TOML file.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let contents = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, contents)?;
        Ok(())
    }
}
