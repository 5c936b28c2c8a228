//! ERC20 permit ABI helpers
//!
//! Manual ABI encoding for the read calls the permit preparer needs.

use ethers::abi::{AbiDecode, Token};
use ethers::types::{Address, U256};

/// Function selector for nonces(address) - EIP-2612
const NONCES_SELECTOR: [u8; 4] = [0x7e, 0xce, 0xbe, 0x00];

/// Encode a nonces(address) call - EIP-2612 permit nonce
pub fn encode_nonces(owner: Address) -> Vec<u8> {
    let mut data = NONCES_SELECTOR.to_vec();
    data.extend_from_slice(&ethers::abi::encode(&[Token::Address(owner)]));
    data
}

/// Decode a nonces response (uint256)
pub fn decode_nonces(data: &[u8]) -> Result<U256, String> {
    if data.len() < 32 {
        return Err(format!("Nonces response too short: {} bytes", data.len()));
    }
    U256::decode(&data[..32])
        .map_err(|e| format!("Failed to decode nonces: {}", e))
}
