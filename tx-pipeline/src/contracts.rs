//! Supported tokens, contract addresses and the ABI functions the builder calls.
//!
//! Function definitions are built by hand instead of loading ABI files: the
//! pipeline only ever needs a handful of entry points.

use ethers::abi::{Function, Param, ParamType, StateMutability};
use ethers::types::Address;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::config::Config;
use crate::domain_types::WEI_DECIMALS;
use crate::permit::{PermitDomain, PermitSignature};

/// Tokens the pipeline knows how to move
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SupportedToken {
    Dllr,
    Zusd,
    Sov,
}

impl SupportedToken {
    pub fn symbol(&self) -> &'static str {
        match self {
            SupportedToken::Dllr => "DLLR",
            SupportedToken::Zusd => "ZUSD",
            SupportedToken::Sov => "SOV",
        }
    }
}

impl fmt::Display for SupportedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

impl FromStr for SupportedToken {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "dllr" => Ok(SupportedToken::Dllr),
            "zusd" => Ok(SupportedToken::Zusd),
            "sov" => Ok(SupportedToken::Sov),
            other => Err(format!("Unsupported token '{}'. Use dllr, zusd or sov", other)),
        }
    }
}

/// Whether a token can authorize spending with an off-chain permit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenClass {
    Permit,
    Standard,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenInfo {
    pub token: SupportedToken,
    pub address: Address,
    pub decimals: u32,
    /// Set for tokens implementing EIP-2612
    pub permit: Option<PermitDomain>,
}

impl TokenInfo {
    pub fn class(&self) -> TokenClass {
        if self.permit.is_some() {
            TokenClass::Permit
        } else {
            TokenClass::Standard
        }
    }

    pub fn symbol(&self) -> &'static str {
        self.token.symbol()
    }
}

/// Addresses and token metadata for one deployment
#[derive(Debug, Clone)]
pub struct ContractRegistry {
    pub stability_pool: Address,
    pub staking: Address,
    dllr: TokenInfo,
    zusd: TokenInfo,
    sov: TokenInfo,
}

impl ContractRegistry {
    pub fn from_config(config: &Config) -> Self {
        Self {
            stability_pool: config.contracts.stability_pool,
            staking: config.contracts.staking,
            dllr: TokenInfo {
                token: SupportedToken::Dllr,
                address: config.contracts.dllr,
                decimals: WEI_DECIMALS,
                permit: Some(PermitDomain {
                    name: config.dllr_permit_name.clone(),
                    version: config.dllr_permit_version.clone(),
                }),
            },
            zusd: TokenInfo {
                token: SupportedToken::Zusd,
                address: config.contracts.zusd,
                decimals: WEI_DECIMALS,
                permit: None,
            },
            sov: TokenInfo {
                token: SupportedToken::Sov,
                address: config.contracts.sov,
                decimals: WEI_DECIMALS,
                permit: None,
            },
        }
    }

    pub fn token(&self, token: SupportedToken) -> &TokenInfo {
        match token {
            SupportedToken::Dllr => &self.dllr,
            SupportedToken::Zusd => &self.zusd,
            SupportedToken::Sov => &self.sov,
        }
    }
}

#[allow(deprecated)]
fn function(name: &str, inputs: &[(&str, ParamType)]) -> Function {
    Function {
        name: name.to_string(),
        inputs: inputs
            .iter()
            .map(|(param, kind)| Param {
                name: param.to_string(),
                kind: kind.clone(),
                internal_type: None,
            })
            .collect(),
        outputs: vec![],
        constant: None,
        state_mutability: StateMutability::NonPayable,
    }
}

/// StabilityPool.provideToSP(uint256 _amount, address _frontEndTag)
pub static PROVIDE_TO_SP: Lazy<Function> = Lazy::new(|| {
    function(
        "provideToSP",
        &[("_amount", ParamType::Uint(256)), ("_frontEndTag", ParamType::Address)],
    )
});

/// StabilityPool.provideToSpFromDLLR(uint256 _dllrAmount, Permit _permitParams)
pub static PROVIDE_TO_SP_FROM_DLLR: Lazy<Function> = Lazy::new(|| {
    function(
        "provideToSpFromDLLR",
        &[
            ("_dllrAmount", ParamType::Uint(256)),
            ("_permitParams", PermitSignature::param_type()),
        ],
    )
});

/// StabilityPool.withdrawFromSP(uint256 _amount)
pub static WITHDRAW_FROM_SP: Lazy<Function> =
    Lazy::new(|| function("withdrawFromSP", &[("_amount", ParamType::Uint(256))]));

/// StabilityPool.withdrawFromSpAndConvertToDLLR(uint256 _zusdAmount)
pub static WITHDRAW_FROM_SP_AND_CONVERT_TO_DLLR: Lazy<Function> = Lazy::new(|| {
    function(
        "withdrawFromSpAndConvertToDLLR",
        &[("_zusdAmount", ParamType::Uint(256))],
    )
});

/// SOV.approveAndCall(address _spender, uint256 _amount, bytes _data)
pub static APPROVE_AND_CALL: Lazy<Function> = Lazy::new(|| {
    function(
        "approveAndCall",
        &[
            ("_spender", ParamType::Address),
            ("_amount", ParamType::Uint(256)),
            ("_data", ParamType::Bytes),
        ],
    )
});

/// Staking.stakeWithApproval(address sender, uint96 amount, uint256 until, address stakeFor, address delegatee)
pub static STAKE_WITH_APPROVAL: Lazy<Function> = Lazy::new(|| {
    function(
        "stakeWithApproval",
        &[
            ("sender", ParamType::Address),
            ("amount", ParamType::Uint(96)),
            ("until", ParamType::Uint(256)),
            ("stakeFor", ParamType::Address),
            ("delegatee", ParamType::Address),
        ],
    )
});

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::utils::keccak256;

    #[test]
    fn test_selectors_match_signatures() {
        assert_eq!(
            PROVIDE_TO_SP.short_signature(),
            keccak256(b"provideToSP(uint256,address)")[0..4]
        );
        assert_eq!(
            PROVIDE_TO_SP_FROM_DLLR.short_signature(),
            keccak256(b"provideToSpFromDLLR(uint256,(uint256,uint8,bytes32,bytes32))")[0..4]
        );
        assert_eq!(
            WITHDRAW_FROM_SP.short_signature(),
            keccak256(b"withdrawFromSP(uint256)")[0..4]
        );
        assert_eq!(
            APPROVE_AND_CALL.short_signature(),
            keccak256(b"approveAndCall(address,uint256,bytes)")[0..4]
        );
    }

    #[test]
    fn test_token_parsing() {
        assert_eq!(SupportedToken::from_str("DLLR").unwrap(), SupportedToken::Dllr);
        assert_eq!(SupportedToken::from_str(" zusd ").unwrap(), SupportedToken::Zusd);
        assert!(SupportedToken::from_str("btc").is_err());
    }

    #[test]
    fn test_registry_token_classes() {
        let registry = ContractRegistry::from_config(&Config::default());
        assert_eq!(registry.token(SupportedToken::Dllr).class(), TokenClass::Permit);
        assert_eq!(registry.token(SupportedToken::Zusd).class(), TokenClass::Standard);
        assert_eq!(registry.token(SupportedToken::Sov).symbol(), "SOV");
    }
}
