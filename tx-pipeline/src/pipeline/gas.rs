//! Gas-limit hints per financial action

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tx_pipeline_types::PipelineError;

use crate::contracts::TokenClass;

pub const STABILITY_POOL: u64 = 500_000;
pub const STABILITY_POOL_INC_WITHDRAW: u64 = 650_000;
pub const STABILITY_POOL_DLLR: u64 = 650_000;
pub const STABILITY_POOL_DLLR_INC_WITHDRAW: u64 = 800_000;
pub const STAKING: u64 = 1_500_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    StabilityDeposit,
    StabilityWithdraw,
    Stake,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionKind::StabilityDeposit => write!(f, "stability_deposit"),
            ActionKind::StabilityWithdraw => write!(f, "stability_withdraw"),
            ActionKind::Stake => write!(f, "stake"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GasKey {
    pub action: ActionKind,
    pub token_class: TokenClass,
    pub has_rewards_to_claim: bool,
}

impl GasKey {
    pub fn new(action: ActionKind, token_class: TokenClass, has_rewards_to_claim: bool) -> Self {
        Self {
            action,
            token_class,
            has_rewards_to_claim,
        }
    }
}

/// Lookup table of gas limits; a missing key is a builder bug, never defaulted
#[derive(Debug, Clone)]
pub struct GasLimitTable {
    limits: HashMap<GasKey, u64>,
}

impl GasLimitTable {
    pub fn empty() -> Self {
        Self {
            limits: HashMap::new(),
        }
    }

    pub fn with_limit(mut self, key: GasKey, limit: u64) -> Self {
        self.limits.insert(key, limit);
        self
    }

    pub fn lookup(&self, key: GasKey) -> Result<u64, PipelineError> {
        self.limits.get(&key).copied().ok_or_else(|| {
            PipelineError::BuilderMisconfiguration {
                reason: format!(
                    "no gas limit for {} / {:?} / rewards={}",
                    key.action, key.token_class, key.has_rewards_to_claim
                ),
            }
        })
    }

    pub fn len(&self) -> usize {
        self.limits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.limits.is_empty()
    }
}

impl Default for GasLimitTable {
    fn default() -> Self {
        use ActionKind::*;
        use TokenClass::*;

        let mut table = Self::empty();
        // Deposits pay the same limit regardless of pending rewards
        for rewards in [false, true] {
            table = table
                .with_limit(GasKey::new(StabilityDeposit, Permit, rewards), STABILITY_POOL_DLLR)
                .with_limit(GasKey::new(StabilityDeposit, Standard, rewards), STABILITY_POOL)
                .with_limit(GasKey::new(Stake, Standard, rewards), STAKING);
        }
        table
            .with_limit(GasKey::new(StabilityWithdraw, Permit, false), STABILITY_POOL_DLLR)
            .with_limit(
                GasKey::new(StabilityWithdraw, Permit, true),
                STABILITY_POOL_DLLR_INC_WITHDRAW,
            )
            .with_limit(GasKey::new(StabilityWithdraw, Standard, false), STABILITY_POOL)
            .with_limit(
                GasKey::new(StabilityWithdraw, Standard, true),
                STABILITY_POOL_INC_WITHDRAW,
            )
    }
}
