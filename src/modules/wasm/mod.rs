//! Wasm registry module
//!
//! Permissioned, content-addressed store of WASM code and contract
//! instances with an append-only per-contract code history, managed through
//! governance proposals.

pub mod address;
pub mod module;
pub mod params;
pub mod types;


pub use address::{derive_contract_address, is_valid_contract_address, BECH32_PREFIX};
pub use module::WasmModule;
pub use params::{ParamKey, Params};
pub use types::*;
