//! Builds pre-populated `sign-permit` operations

use async_trait::async_trait;
use chrono::Utc;
use ethers::types::{Address, U256};
use std::sync::Arc;

use super::types::{Eip712Domain, PermitRequest};
use crate::contracts::TokenInfo;
use crate::pipeline::Operation;

/// Permits are valid for 1 hour
pub const PERMIT_VALIDITY_SECS: i64 = 3600;

/// Where permit nonces come from (normally an `eth_call` to the token)
#[async_trait]
pub trait PermitNonceSource: Send + Sync {
    async fn permit_nonce(&self, token: Address, owner: Address) -> Result<U256, String>;
}

pub struct PermitPreparer {
    nonce_source: Arc<dyn PermitNonceSource>,
    chain_id: u64,
    validity_secs: i64,
}

impl PermitPreparer {
    pub fn new(nonce_source: Arc<dyn PermitNonceSource>, chain_id: u64) -> Self {
        Self {
            nonce_source,
            chain_id,
            validity_secs: PERMIT_VALIDITY_SECS,
        }
    }

    pub fn with_validity_secs(mut self, secs: i64) -> Self {
        self.validity_secs = secs;
        self
    }

    /// Fetch the owner's nonce and build the permit signing step
    pub async fn prepare(
        &self,
        token: &TokenInfo,
        signer: Address,
        spender: Address,
        value: U256,
    ) -> Result<Operation, String> {
        let domain = token
            .permit
            .as_ref()
            .ok_or_else(|| format!("{} does not support permits", token.symbol()))?;

        let nonce = self.nonce_source.permit_nonce(token.address, signer).await?;
        let deadline = Utc::now().timestamp() + self.validity_secs;

        log::debug!(
            "[Permit] Prepared {} permit for spender {:?}, nonce {}, deadline {}",
            token.symbol(),
            spender,
            nonce,
            deadline
        );

        let request = PermitRequest {
            token_symbol: token.symbol().to_string(),
            domain: Eip712Domain {
                name: domain.name.clone(),
                version: domain.version.clone(),
                chain_id: self.chain_id,
                verifying_contract: token.address,
            },
            owner: signer,
            spender,
            value,
            nonce,
            deadline: U256::from(deadline.max(0) as u64),
        };

        Ok(Operation::sign_permit(
            format!("Sign {} permit", token.symbol()),
            request,
        ))
    }
}
