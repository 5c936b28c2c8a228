//! EIP-2612 permits
//!
//! A permit lets the stability pool pull DLLR from the user without a
//! separate on-chain approval:
//! 1. Read the owner's permit nonce from the token
//! 2. Build the EIP-712 `Permit` digest
//! 3. Have the wallet sign it (a `sign-permit` pipeline step)
//! 4. Pass `(deadline, v, r, s)` to the contract call that spends the tokens

pub mod erc20;
mod preparer;
mod types;

pub use preparer::{PERMIT_VALIDITY_SECS, PermitNonceSource, PermitPreparer};
pub use types::{Eip712Domain, PermitDomain, PermitRequest, PermitSignature};
