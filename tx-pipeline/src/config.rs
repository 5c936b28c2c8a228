use ethers::types::Address;
use std::env;
use std::str::FromStr;

use crate::domain_types::FixedDecimal;
use crate::math::DEFAULT_MAINTENANCE_RATIO;

/// Environment variable names
pub mod env_vars {
    pub const WALLET_PRIVATE_KEY: &str = "TX_PIPELINE_PRIVATE_KEY";
    pub const RPC_URL: &str = "RPC_URL";
    pub const CHAIN_ID: &str = "CHAIN_ID";
    pub const MAINTENANCE_RATIO: &str = "MAINTENANCE_RATIO";
    pub const STABILITY_POOL_ADDRESS: &str = "STABILITY_POOL_ADDRESS";
    pub const STAKING_ADDRESS: &str = "STAKING_ADDRESS";
    pub const DLLR_ADDRESS: &str = "DLLR_ADDRESS";
    pub const ZUSD_ADDRESS: &str = "ZUSD_ADDRESS";
    pub const SOV_ADDRESS: &str = "SOV_ADDRESS";
    pub const DLLR_PERMIT_NAME: &str = "DLLR_PERMIT_NAME";
    pub const DLLR_PERMIT_VERSION: &str = "DLLR_PERMIT_VERSION";
}

/// RSK mainnet
pub const DEFAULT_CHAIN_ID: u64 = 30;
pub const DEFAULT_RPC_URL: &str = "https://public-node.rsk.co";

/// Contract and token addresses the builder targets
#[derive(Debug, Clone, Default)]
pub struct ContractAddresses {
    pub stability_pool: Address,
    pub staking: Address,
    pub dllr: Address,
    pub zusd: Address,
    pub sov: Address,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub rpc_url: String,
    pub chain_id: u64,
    pub private_key: Option<String>,
    pub maintenance_ratio: FixedDecimal,
    pub contracts: ContractAddresses,
    pub dllr_permit_name: String,
    pub dllr_permit_version: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rpc_url: DEFAULT_RPC_URL.to_string(),
            chain_id: DEFAULT_CHAIN_ID,
            private_key: None,
            maintenance_ratio: FixedDecimal::from_integer(DEFAULT_MAINTENANCE_RATIO),
            contracts: ContractAddresses::default(),
            dllr_permit_name: "Sovryn Dollar".to_string(),
            dllr_permit_version: "1".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup (env, tests, files)
    pub fn from_lookup<F>(lookup: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let chain_id = match lookup(env_vars::CHAIN_ID) {
            Some(v) => v
                .trim()
                .parse()
                .map_err(|e| format!("{} must be a valid number: {}", env_vars::CHAIN_ID, e))?,
            None => defaults.chain_id,
        };

        let maintenance_ratio = match lookup(env_vars::MAINTENANCE_RATIO) {
            Some(v) => FixedDecimal::from_str(&v).map_err(|e| {
                format!("{} must be a decimal number: {}", env_vars::MAINTENANCE_RATIO, e)
            })?,
            None => defaults.maintenance_ratio,
        };
        if maintenance_ratio.is_zero() {
            return Err(format!("{} must be positive", env_vars::MAINTENANCE_RATIO));
        }

        let contracts = ContractAddresses {
            stability_pool: parse_address(&lookup, env_vars::STABILITY_POOL_ADDRESS)?,
            staking: parse_address(&lookup, env_vars::STAKING_ADDRESS)?,
            dllr: parse_address(&lookup, env_vars::DLLR_ADDRESS)?,
            zusd: parse_address(&lookup, env_vars::ZUSD_ADDRESS)?,
            sov: parse_address(&lookup, env_vars::SOV_ADDRESS)?,
        };

        Ok(Self {
            rpc_url: lookup(env_vars::RPC_URL).unwrap_or(defaults.rpc_url),
            chain_id,
            private_key: lookup(env_vars::WALLET_PRIVATE_KEY).filter(|k| !k.trim().is_empty()),
            maintenance_ratio,
            contracts,
            dllr_permit_name: lookup(env_vars::DLLR_PERMIT_NAME).unwrap_or(defaults.dllr_permit_name),
            dllr_permit_version: lookup(env_vars::DLLR_PERMIT_VERSION)
                .unwrap_or(defaults.dllr_permit_version),
        })
    }
}

/// Unset addresses stay zero; the builder refuses to target them.
fn parse_address<F>(lookup: &F, key: &str) -> Result<Address, String>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(v) => Address::from_str(v.trim()).map_err(|e| format!("{} is not a valid address: {}", key, e)),
        None => Ok(Address::zero()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config.chain_id, DEFAULT_CHAIN_ID);
        assert_eq!(config.maintenance_ratio, FixedDecimal::from_integer(115));
        assert!(config.private_key.is_none());
        assert!(config.contracts.stability_pool.is_zero());
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup_from(&[
            (env_vars::CHAIN_ID, "31"),
            (env_vars::MAINTENANCE_RATIO, "120"),
            (env_vars::DLLR_ADDRESS, "0xc1411567d2670e24d9C4DaAa7CdA95686e1250AA"),
        ]))
        .unwrap();
        assert_eq!(config.chain_id, 31);
        assert_eq!(config.maintenance_ratio, FixedDecimal::from_integer(120));
        assert!(!config.contracts.dllr.is_zero());
    }

    #[test]
    fn test_invalid_values() {
        assert!(Config::from_lookup(lookup_from(&[(env_vars::CHAIN_ID, "rsk")])).is_err());
        assert!(Config::from_lookup(lookup_from(&[(env_vars::MAINTENANCE_RATIO, "0")])).is_err());
        assert!(Config::from_lookup(lookup_from(&[(env_vars::SOV_ADDRESS, "0xinvalid")])).is_err());
    }
}
