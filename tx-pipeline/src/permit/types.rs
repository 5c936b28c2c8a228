//! EIP-2612 permit data types and EIP-712 hashing

use ethers::abi::{self, ParamType, Token};
use ethers::types::{Address, H256, Signature, U256};
use ethers::utils::keccak256;
use serde::{Deserialize, Serialize};

const EIP712_DOMAIN_TYPE: &[u8] =
    b"EIP712Domain(string name,string version,uint256 chainId,address verifyingContract)";

const PERMIT_TYPE: &[u8] =
    b"Permit(address owner,address spender,uint256 value,uint256 nonce,uint256 deadline)";

/// Name/version pair a permit-capable token signs its domain with
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermitDomain {
    pub name: String,
    pub version: String,
}

/// EIP-712 domain of a specific token deployment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Eip712Domain {
    pub name: String,
    pub version: String,
    pub chain_id: u64,
    pub verifying_contract: Address,
}

impl Eip712Domain {
    pub fn separator(&self) -> H256 {
        let encoded = abi::encode(&[
            Token::FixedBytes(keccak256(EIP712_DOMAIN_TYPE).to_vec()),
            Token::FixedBytes(keccak256(self.name.as_bytes()).to_vec()),
            Token::FixedBytes(keccak256(self.version.as_bytes()).to_vec()),
            Token::Uint(U256::from(self.chain_id)),
            Token::Address(self.verifying_contract),
        ]);
        H256::from(keccak256(&encoded))
    }
}

/// Everything needed to produce a permit signature
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermitRequest {
    /// Token symbol, for logs and titles
    pub token_symbol: String,
    pub domain: Eip712Domain,
    pub owner: Address,
    pub spender: Address,
    pub value: U256,
    pub nonce: U256,
    /// Unix timestamp after which the permit is invalid
    pub deadline: U256,
}

impl PermitRequest {
    pub fn struct_hash(&self) -> H256 {
        let encoded = abi::encode(&[
            Token::FixedBytes(keccak256(PERMIT_TYPE).to_vec()),
            Token::Address(self.owner),
            Token::Address(self.spender),
            Token::Uint(self.value),
            Token::Uint(self.nonce),
            Token::Uint(self.deadline),
        ]);
        H256::from(keccak256(&encoded))
    }

    /// keccak256("\x19\x01" ++ domainSeparator ++ structHash)
    pub fn digest(&self) -> H256 {
        let mut to_sign = Vec::with_capacity(66);
        to_sign.push(0x19);
        to_sign.push(0x01);
        to_sign.extend_from_slice(self.domain.separator().as_bytes());
        to_sign.extend_from_slice(self.struct_hash().as_bytes());
        H256::from(keccak256(&to_sign))
    }

    /// Attach a wallet signature over `digest()`
    pub fn into_signature(&self, signature: &Signature) -> PermitSignature {
        PermitSignature::from_parts(self.deadline, signature)
    }
}

/// Signed permit in the shape contracts take it: `(deadline, v, r, s)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermitSignature {
    pub deadline: U256,
    pub v: u8,
    pub r: H256,
    pub s: H256,
}

impl PermitSignature {
    /// Placeholder passed to a call before the real permit is injected
    pub fn unsigned() -> Self {
        Self {
            deadline: U256::zero(),
            v: 0,
            r: H256::zero(),
            s: H256::zero(),
        }
    }

    pub fn from_parts(deadline: U256, signature: &Signature) -> Self {
        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        signature.r.to_big_endian(&mut r);
        signature.s.to_big_endian(&mut s);
        Self {
            deadline,
            v: signature.v as u8,
            r: H256::from(r),
            s: H256::from(s),
        }
    }

    pub fn is_unsigned(&self) -> bool {
        *self == Self::unsigned()
    }

    /// ABI tuple `(uint256 deadline, uint8 v, bytes32 r, bytes32 s)`
    pub fn to_token(&self) -> Token {
        Token::Tuple(vec![
            Token::Uint(self.deadline),
            Token::Uint(U256::from(self.v)),
            Token::FixedBytes(self.r.as_bytes().to_vec()),
            Token::FixedBytes(self.s.as_bytes().to_vec()),
        ])
    }

    pub fn param_type() -> ParamType {
        ParamType::Tuple(vec![
            ParamType::Uint(256),
            ParamType::Uint(8),
            ParamType::FixedBytes(32),
            ParamType::FixedBytes(32),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wallet::wallet_from_private_key;
    use ethers::signers::Signer;
    use std::str::FromStr;

    const TEST_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
    const TOKEN: &str = "0xc1411567d2670e24d9C4DaAa7CdA95686e1250AA";
    const SPENDER: &str = "0xd46C0225D1331B46700d64fF8c906709D15C9202";

    fn request() -> PermitRequest {
        let wallet = wallet_from_private_key(TEST_KEY, 30).unwrap();
        PermitRequest {
            token_symbol: "DLLR".to_string(),
            domain: Eip712Domain {
                name: "Sovryn Dollar".to_string(),
                version: "1".to_string(),
                chain_id: 30,
                verifying_contract: Address::from_str(TOKEN).unwrap(),
            },
            owner: wallet.address(),
            spender: Address::from_str(SPENDER).unwrap(),
            value: U256::exp10(18),
            nonce: U256::zero(),
            deadline: U256::from(1_700_000_000u64),
        }
    }

    #[test]
    fn test_struct_hash_layout() {
        let req = request();
        let mut manual = Vec::new();
        manual.extend_from_slice(&keccak256(PERMIT_TYPE));
        manual.extend_from_slice(&[0u8; 12]);
        manual.extend_from_slice(req.owner.as_bytes());
        manual.extend_from_slice(&[0u8; 12]);
        manual.extend_from_slice(req.spender.as_bytes());
        let mut word = [0u8; 32];
        req.value.to_big_endian(&mut word);
        manual.extend_from_slice(&word);
        req.nonce.to_big_endian(&mut word);
        manual.extend_from_slice(&word);
        req.deadline.to_big_endian(&mut word);
        manual.extend_from_slice(&word);

        assert_eq!(req.struct_hash(), H256::from(keccak256(&manual)));
    }

    #[test]
    fn test_domain_separator_depends_on_chain() {
        let req = request();
        let mut other = req.domain.clone();
        other.chain_id = 31;
        assert_ne!(req.domain.separator(), other.separator());
    }

    #[test]
    fn test_signature_recovers_owner() {
        let req = request();
        let wallet = wallet_from_private_key(TEST_KEY, 30).unwrap();
        let signature = wallet.sign_hash(req.digest()).unwrap();
        assert_eq!(signature.recover(req.digest()).unwrap(), req.owner);

        let permit = req.into_signature(&signature);
        assert_eq!(permit.deadline, req.deadline);
        assert!(!permit.is_unsigned());
    }

    #[test]
    fn test_unsigned_token_matches_param_type() {
        let token = PermitSignature::unsigned().to_token();
        assert!(token.type_check(&PermitSignature::param_type()));
        assert!(PermitSignature::unsigned().is_unsigned());
    }
}
