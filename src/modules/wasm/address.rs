//! Contract address derivation
//!
//! Contract addresses are a fixed function of the code id and the
//! registry-wide instance sequence, so replaying the same operations from an
//! empty registry reproduces the same addresses. The scheme is part of the
//! persisted state format and must never change:
//!
//! 1. Hash `"contract" || code_id (big-endian) || instance_seq (big-endian)`
//!    with SHA-256
//! 2. Take the first 20 bytes (standard Cosmos address length)
//! 3. Encode as bech32 with the `proxima` prefix

use sha2::{Digest, Sha256};

use super::types::{CodeID, ContractAddress};

/// Bech32 prefix for contract addresses
pub const BECH32_PREFIX: &str = "proxima";

/// Derive the address of the `instance_seq`-th contract instantiated in the
/// registry, from code `code_id`.
pub fn derive_contract_address(code_id: CodeID, instance_seq: u64) -> ContractAddress {
    let mut hasher = Sha256::new();
    hasher.update(b"contract");
    hasher.update(code_id.to_be_bytes());
    hasher.update(instance_seq.to_be_bytes());
    let hash = hasher.finalize();

    bech32_encode(BECH32_PREFIX, &hash[..20])
}

/// Encode bytes as a bech32 address with the given prefix
fn bech32_encode(hrp: &str, data: &[u8]) -> String {
    use bech32::{ToBase32, Variant};

    bech32::encode(hrp, data.to_base32(), Variant::Bech32)
        .unwrap_or_else(|_| format!("{}1invalid", hrp))
}

/// Decode a bech32 address to its prefix and raw bytes
pub fn bech32_decode(addr: &str) -> Result<(String, Vec<u8>), String> {
    use bech32::{FromBase32, Variant};

    let (hrp, data, variant) =
        bech32::decode(addr).map_err(|e| format!("Invalid bech32 address: {}", e))?;

    if variant != Variant::Bech32 {
        return Err("Invalid bech32 variant".to_string());
    }

    let bytes =
        Vec::<u8>::from_base32(&data).map_err(|e| format!("Invalid base32 data: {}", e))?;

    Ok((hrp, bytes))
}

/// Check whether an address is a well-formed contract address
pub fn is_valid_contract_address(addr: &str) -> bool {
    match bech32_decode(addr) {
        Ok((hrp, bytes)) => hrp == BECH32_PREFIX && bytes.len() == 20,
        Err(_) => false,
    }
}
