//! Tunable registry parameters
//!
//! The parameter set is read and replaced as one unit: every change path,
//! including the single-key governance change, validates the whole struct
//! before committing so an invalid composite is never observable.

use near_sdk::borsh::{self, BorshDeserialize, BorshSerialize};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::types::{AccessConfig, AccessType, WasmError, WasmResult};

pub const DEFAULT_MAX_WASM_CODE_SIZE: u64 = 614_400;
pub const DEFAULT_GAS_MULTIPLIER: u64 = 100;
pub const DEFAULT_MAX_GAS: u64 = 10_000_000_000;
pub const DEFAULT_INSTANCE_COST: u64 = 40_000;
pub const DEFAULT_COMPILE_COST: u64 = 2;
pub const DEFAULT_HUMANIZE_COST: u64 = 500;
pub const DEFAULT_CANONICALIZE_COST: u64 = 400;

/// Registry parameters, changed via governance only
#[derive(
    BorshDeserialize, BorshSerialize, Serialize, Deserialize, JsonSchema, Clone, Debug, PartialEq, Eq,
)]
pub struct Params {
    /// Who may upload code
    pub code_upload_access: AccessConfig,
    /// Permission applied to new code when the uploader supplies none
    pub instantiate_default_permission: AccessType,
    pub max_wasm_code_size: u64,
    pub gas_multiplier: u64,
    pub max_gas: u64,
    pub instance_cost: u64,
    pub compile_cost: u64,
    pub humanize_cost: u64,
    pub canonicalize_cost: u64,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            code_upload_access: AccessConfig::everybody(),
            instantiate_default_permission: AccessType::Everybody,
            max_wasm_code_size: DEFAULT_MAX_WASM_CODE_SIZE,
            gas_multiplier: DEFAULT_GAS_MULTIPLIER,
            max_gas: DEFAULT_MAX_GAS,
            instance_cost: DEFAULT_INSTANCE_COST,
            compile_cost: DEFAULT_COMPILE_COST,
            humanize_cost: DEFAULT_HUMANIZE_COST,
            canonicalize_cost: DEFAULT_CANONICALIZE_COST,
        }
    }
}

impl Params {
    /// Validate the struct as a whole. Callers must not commit a params
    /// value that fails here.
    pub fn validate(&self) -> WasmResult<()> {
        self.code_upload_access
            .validate()
            .map_err(|err| WasmError::InvalidParams(format!("upload access: {}", err)))?;
        if self.instantiate_default_permission == AccessType::Undefined {
            return Err(WasmError::InvalidParams(
                "instantiate default permission must be set".to_string(),
            ));
        }
        ensure_positive(self.max_wasm_code_size, "max wasm code size")?;
        ensure_positive(self.gas_multiplier, "gas multiplier")?;
        ensure_positive(self.max_gas, "max gas")?;
        ensure_positive(self.instance_cost, "instance cost")?;
        ensure_positive(self.compile_cost, "compile cost")?;
        ensure_positive(self.humanize_cost, "humanize cost")?;
        ensure_positive(self.canonicalize_cost, "canonicalize cost")?;
        Ok(())
    }
}

fn ensure_positive(value: u64, name: &str) -> WasmResult<()> {
    if value == 0 {
        return Err(WasmError::InvalidParams(format!("{} must be > 0", name)));
    }
    Ok(())
}

/// Keys accepted by the single-field governance change path
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParamKey {
    UploadAccess,
    InstantiateAccess,
    MaxWasmCodeSize,
    GasMultiplier,
    MaxGas,
    InstanceCost,
    CompileCost,
    HumanizeCost,
    CanonicalizeCost,
}

impl ParamKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParamKey::UploadAccess => "uploadAccess",
            ParamKey::InstantiateAccess => "instantiateAccess",
            ParamKey::MaxWasmCodeSize => "maxWasmCodeSize",
            ParamKey::GasMultiplier => "gasMultiplier",
            ParamKey::MaxGas => "maxGas",
            ParamKey::InstanceCost => "instanceCost",
            ParamKey::CompileCost => "compileCost",
            ParamKey::HumanizeCost => "humanizeCost",
            ParamKey::CanonicalizeCost => "canonicalizeCost",
        }
    }

    /// Decode `value` as JSON for this key and write it into `params`. The
    /// caller validates the resulting struct before committing it.
    pub fn apply(&self, params: &mut Params, value: &str) -> WasmResult<()> {
        match self {
            ParamKey::UploadAccess => params.code_upload_access = decode_value(self, value)?,
            ParamKey::InstantiateAccess => {
                params.instantiate_default_permission = decode_value(self, value)?
            }
            ParamKey::MaxWasmCodeSize => params.max_wasm_code_size = decode_value(self, value)?,
            ParamKey::GasMultiplier => params.gas_multiplier = decode_value(self, value)?,
            ParamKey::MaxGas => params.max_gas = decode_value(self, value)?,
            ParamKey::InstanceCost => params.instance_cost = decode_value(self, value)?,
            ParamKey::CompileCost => params.compile_cost = decode_value(self, value)?,
            ParamKey::HumanizeCost => params.humanize_cost = decode_value(self, value)?,
            ParamKey::CanonicalizeCost => params.canonicalize_cost = decode_value(self, value)?,
        }
        Ok(())
    }
}

impl std::str::FromStr for ParamKey {
    type Err = WasmError;

    fn from_str(key: &str) -> Result<Self, Self::Err> {
        match key {
            "uploadAccess" => Ok(ParamKey::UploadAccess),
            "instantiateAccess" => Ok(ParamKey::InstantiateAccess),
            "maxWasmCodeSize" => Ok(ParamKey::MaxWasmCodeSize),
            "gasMultiplier" => Ok(ParamKey::GasMultiplier),
            "maxGas" => Ok(ParamKey::MaxGas),
            "instanceCost" => Ok(ParamKey::InstanceCost),
            "compileCost" => Ok(ParamKey::CompileCost),
            "humanizeCost" => Ok(ParamKey::HumanizeCost),
            "canonicalizeCost" => Ok(ParamKey::CanonicalizeCost),
            other => Err(WasmError::UnknownParamKey(other.to_string())),
        }
    }
}

fn decode_value<T>(key: &ParamKey, value: &str) -> WasmResult<T>
where
    T: for<'de> Deserialize<'de>,
{
    serde_json::from_str(value).map_err(|err| {
        WasmError::InvalidRequest(format!("value for {}: {}", key.as_str(), err))
    })
}
