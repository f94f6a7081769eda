//! Wasm registry types
//!
//! Following the Cosmos SDK x/wasm module architecture for code upload,
//! contract instantiation and the per-contract code history.

use near_sdk::borsh::{self, BorshDeserialize, BorshSerialize};
use near_sdk::AccountId;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// CodeID uniquely identifies stored WASM code
pub type CodeID = u64;

/// ContractAddress is the unique bech32 address of an instantiated contract
pub type ContractAddress = String;

/// Chain position of an operation: block height plus the running index of
/// the operation within that block. Used to order history entries.
#[derive(
    BorshDeserialize, BorshSerialize, Serialize, Deserialize, JsonSchema, Clone, Copy, Debug, PartialEq, Eq,
)]
pub struct AbsolutePosition {
    pub block_height: u64,
    pub tx_index: u64,
}

/// CodeInfo stores metadata about uploaded WASM code
#[derive(BorshDeserialize, BorshSerialize, Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct CodeInfo {
    pub code_id: CodeID,
    pub creator: String,
    /// SHA-256 digest of the stored byte code
    pub code_hash: Vec<u8>,
    pub source: String,
    pub builder: String,
    pub instantiate_config: AccessConfig,
}

/// ContractInfo stores metadata about an instantiated contract
#[derive(BorshDeserialize, BorshSerialize, Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ContractInfo {
    pub address: ContractAddress,
    pub code_id: CodeID,
    pub creator: String,
    pub admin: Option<String>,
    pub label: String,
    pub created: AbsolutePosition,
}

/// The kind of code change recorded in a contract's history
#[derive(
    BorshDeserialize, BorshSerialize, Serialize, Deserialize, JsonSchema, Clone, Copy, Debug, PartialEq, Eq,
)]
pub enum ContractCodeHistoryOperation {
    GenesisImport,
    Init,
    Migrate,
}

/// One entry of a contract's append-only code history. The first entry of a
/// contract is always `GenesisImport` or `Init`; every later entry is
/// `Migrate`.
#[derive(BorshDeserialize, BorshSerialize, Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ContractCodeHistoryEntry {
    pub operation: ContractCodeHistoryOperation,
    pub code_id: CodeID,
    pub updated: AbsolutePosition,
    pub msg: Option<Vec<u8>>,
}

/// Raw key/value pair of private contract state, used by the genesis import
/// path.
#[derive(BorshDeserialize, BorshSerialize, Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Model {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

/// AccessType names who may perform a gated action
#[derive(
    BorshDeserialize, BorshSerialize, Serialize, Deserialize, JsonSchema, Clone, Copy, Debug, PartialEq, Eq,
)]
pub enum AccessType {
    Undefined,
    Nobody,
    Everybody,
    OnlyAddress,
}

impl AccessType {
    /// Build a concrete config from this permission type, binding
    /// `OnlyAddress` to the given account.
    pub fn to_config(self, actor: &AccountId) -> AccessConfig {
        match self {
            AccessType::OnlyAddress => AccessConfig::only(actor),
            AccessType::Everybody => AccessConfig::everybody(),
            AccessType::Nobody => AccessConfig::nobody(),
            AccessType::Undefined => AccessConfig {
                permission: AccessType::Undefined,
                address: None,
            },
        }
    }
}

impl std::fmt::Display for AccessType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            AccessType::Undefined => "Undefined",
            AccessType::Nobody => "Nobody",
            AccessType::Everybody => "Everybody",
            AccessType::OnlyAddress => "OnlyAddress",
        };
        write!(f, "{}", name)
    }
}

/// AccessConfig gates an action to a set of identities. The address is
/// present exactly when the permission is `OnlyAddress`.
#[derive(
    BorshDeserialize, BorshSerialize, Serialize, Deserialize, JsonSchema, Clone, Debug, PartialEq, Eq,
)]
pub struct AccessConfig {
    pub permission: AccessType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

impl AccessConfig {
    pub fn everybody() -> Self {
        Self {
            permission: AccessType::Everybody,
            address: None,
        }
    }

    pub fn nobody() -> Self {
        Self {
            permission: AccessType::Nobody,
            address: None,
        }
    }

    pub fn only(actor: &AccountId) -> Self {
        Self {
            permission: AccessType::OnlyAddress,
            address: Some(actor.to_string()),
        }
    }

    /// Whether the given account satisfies this config. `Undefined` and
    /// `Nobody` fail closed.
    pub fn allows(&self, actor: &AccountId) -> bool {
        match self.permission {
            AccessType::Undefined | AccessType::Nobody => false,
            AccessType::Everybody => true,
            AccessType::OnlyAddress => self.address.as_deref() == Some(actor.as_str()),
        }
    }

    /// Check the permission/address consistency rule.
    pub fn validate(&self) -> WasmResult<()> {
        match self.permission {
            AccessType::Undefined => Err(WasmError::InvalidAccessConfig(
                "permission must be set".to_string(),
            )),
            AccessType::OnlyAddress => match self.address.as_deref() {
                None | Some("") => Err(WasmError::InvalidAccessConfig(
                    "OnlyAddress requires an address".to_string(),
                )),
                Some(_) => Ok(()),
            },
            AccessType::Everybody | AccessType::Nobody => {
                if self.address.is_some() {
                    Err(WasmError::InvalidAccessConfig(format!(
                        "{} must not carry an address",
                        self.permission
                    )))
                } else {
                    Ok(())
                }
            }
        }
    }
}

/// Wasm registry errors
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum WasmError {
    /// Caller does not satisfy the relevant access config or admin check
    Unauthorized,
    /// No code stored under the given id
    CodeNotFound(CodeID),
    /// No contract stored under the given address
    ContractNotFound(String),
    /// Byte code exceeds the configured size limit
    CodeTooLarge { size: u64, max: u64 },
    /// Byte code is empty
    EmptyCode,
    /// Contract label is empty
    EmptyLabel,
    /// Access config breaks the permission/address consistency rule
    InvalidAccessConfig(String),
    /// Params failed whole-struct validation
    InvalidParams(String),
    /// Unknown parameter change key
    UnknownParamKey(String),
    /// Import target code id is already occupied
    DuplicateCodeId(CodeID),
    /// Import or derived address is already occupied
    DuplicateContractAddress(String),
    /// Supplied code hash does not match the byte code
    CodeHashMismatch,
    /// Admin-gated operation on a contract with no admin set
    NoAdminConfigured,
    /// Paired storage records are inconsistent; not recoverable in place
    StateCorruption(String),
    /// Malformed request payload
    InvalidRequest(String),
}

impl std::fmt::Display for WasmError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WasmError::Unauthorized => write!(f, "Unauthorized"),
            WasmError::CodeNotFound(code_id) => write!(f, "Code ID {} not found", code_id),
            WasmError::ContractNotFound(addr) => write!(f, "Contract {} not found", addr),
            WasmError::CodeTooLarge { size, max } => {
                write!(f, "Code size {} exceeds maximum allowed {}", size, max)
            }
            WasmError::EmptyCode => write!(f, "Code cannot be empty"),
            WasmError::EmptyLabel => write!(f, "Label cannot be empty"),
            WasmError::InvalidAccessConfig(msg) => write!(f, "Invalid access config: {}", msg),
            WasmError::InvalidParams(msg) => write!(f, "Invalid params: {}", msg),
            WasmError::UnknownParamKey(key) => write!(f, "Unknown param key: {}", key),
            WasmError::DuplicateCodeId(code_id) => {
                write!(f, "Code ID {} already exists", code_id)
            }
            WasmError::DuplicateContractAddress(addr) => {
                write!(f, "Contract {} already exists", addr)
            }
            WasmError::CodeHashMismatch => write!(f, "Code hash does not match byte code"),
            WasmError::NoAdminConfigured => write!(f, "Contract has no admin configured"),
            WasmError::StateCorruption(msg) => write!(f, "State corruption: {}", msg),
            WasmError::InvalidRequest(msg) => write!(f, "Invalid request: {}", msg),
        }
    }
}

impl std::error::Error for WasmError {}

/// Result type for wasm registry operations
pub type WasmResult<T> = Result<T, WasmError>;
