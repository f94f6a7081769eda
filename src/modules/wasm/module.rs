//! Wasm registry module implementation
//!
//! Stores uploaded byte code, contract instances and the per-contract code
//! history, and enforces the upload/instantiate access configs and the
//! governance parameters on every mutation.

use near_sdk::borsh::{self, BorshDeserialize, BorshSerialize};
use near_sdk::collections::{UnorderedMap, Vector};
use near_sdk::{env, AccountId};

use super::address::{derive_contract_address, is_valid_contract_address};
use super::params::{ParamKey, Params};
use super::types::*;

/// The wasm registry state
#[derive(BorshDeserialize, BorshSerialize)]
pub struct WasmModule {
    /// Stored WASM code by CodeID
    codes: UnorderedMap<CodeID, Vec<u8>>,
    /// Code metadata by CodeID
    code_infos: UnorderedMap<CodeID, CodeInfo>,
    /// Contract instances by address
    contracts: UnorderedMap<ContractAddress, ContractInfo>,
    /// Append-only code history per contract address
    contract_histories: UnorderedMap<ContractAddress, Vector<ContractCodeHistoryEntry>>,
    /// Contract addresses by CodeID for efficient querying
    contracts_by_code: UnorderedMap<CodeID, Vector<ContractAddress>>,
    /// Private contract state (address -> key -> value)
    contract_states: UnorderedMap<ContractAddress, UnorderedMap<Vec<u8>, Vec<u8>>>,
    /// Next available CodeID
    next_code_id: CodeID,
    /// Registry-wide instantiation sequence, feeds address derivation
    next_instance_seq: u64,
    /// Governance parameters
    params: Params,
    /// Block height the position tracker last observed
    position_height: u64,
    /// Running operation index within that block
    position_index: u64,
}

impl WasmModule {
    pub fn new() -> Self {
        Self {
            codes: UnorderedMap::new(b"wasm_codes".to_vec()),
            code_infos: UnorderedMap::new(b"wasm_code_infos".to_vec()),
            contracts: UnorderedMap::new(b"wasm_contracts".to_vec()),
            contract_histories: UnorderedMap::new(b"wasm_contract_history".to_vec()),
            contracts_by_code: UnorderedMap::new(b"wasm_contracts_by_code".to_vec()),
            contract_states: UnorderedMap::new(b"wasm_contract_states".to_vec()),
            next_code_id: 1,
            next_instance_seq: 1,
            params: Params::default(),
            position_height: 0,
            position_index: 0,
        }
    }

    // Code store

    /// Store WASM code on chain and return its CodeID
    pub fn store_code(
        &mut self,
        sender: &AccountId,
        wasm_byte_code: Vec<u8>,
        source: Option<String>,
        builder: Option<String>,
        instantiate_permission: Option<AccessConfig>,
    ) -> WasmResult<CodeID> {
        if wasm_byte_code.is_empty() {
            return Err(WasmError::EmptyCode);
        }
        if wasm_byte_code.len() as u64 > self.params.max_wasm_code_size {
            return Err(WasmError::CodeTooLarge {
                size: wasm_byte_code.len() as u64,
                max: self.params.max_wasm_code_size,
            });
        }
        if !self.params.code_upload_access.allows(sender) {
            return Err(WasmError::Unauthorized);
        }

        let instantiate_config = match instantiate_permission {
            Some(config) => {
                config.validate()?;
                config
            }
            None => self
                .params
                .instantiate_default_permission
                .to_config(sender),
        };

        let code_id = self.next_code_id;
        self.next_code_id += 1;

        let code_info = CodeInfo {
            code_id,
            creator: sender.to_string(),
            code_hash: env::sha256(&wasm_byte_code),
            source: source.unwrap_or_default(),
            builder: builder.unwrap_or_default(),
            instantiate_config,
        };

        // Byte code and metadata are written together; one without the other
        // never becomes visible.
        self.codes.insert(&code_id, &wasm_byte_code);
        self.code_infos.insert(&code_id, &code_info);

        env::log_str(&format!("wasm: stored code with ID {}", code_id));
        Ok(code_id)
    }

    /// Write code under a fixed id, bypassing the upload gate. Genesis and
    /// state-migration tooling only.
    pub fn import_code(
        &mut self,
        code_id: CodeID,
        code_info: CodeInfo,
        wasm_byte_code: Vec<u8>,
    ) -> WasmResult<()> {
        if self.code_infos.get(&code_id).is_some() {
            return Err(WasmError::DuplicateCodeId(code_id));
        }
        if code_info.code_id != code_id {
            return Err(WasmError::InvalidRequest(format!(
                "code info carries id {}, expected {}",
                code_info.code_id, code_id
            )));
        }
        if code_info.code_hash != env::sha256(&wasm_byte_code) {
            return Err(WasmError::CodeHashMismatch);
        }
        code_info.instantiate_config.validate()?;

        self.codes.insert(&code_id, &wasm_byte_code);
        self.code_infos.insert(&code_id, &code_info);
        if code_id >= self.next_code_id {
            self.next_code_id = code_id + 1;
        }

        env::log_str(&format!("wasm: imported code with ID {}", code_id));
        Ok(())
    }

    /// Get code metadata by id
    pub fn get_code_info(&self, code_id: CodeID) -> Option<CodeInfo> {
        self.code_infos.get(&code_id)
    }

    /// Get the raw byte code stored under `code_id`. Metadata without a
    /// matching blob means the paired-write invariant is broken, which is
    /// fatal rather than a lookup miss.
    pub fn get_byte_code(&self, code_id: CodeID) -> WasmResult<Vec<u8>> {
        if self.code_infos.get(&code_id).is_none() {
            return Err(WasmError::CodeNotFound(code_id));
        }
        self.codes.get(&code_id).ok_or_else(|| {
            WasmError::StateCorruption(format!("code info {} has no byte code", code_id))
        })
    }

    /// List stored code metadata, paginated
    pub fn list_codes(&self, start_after: Option<CodeID>, limit: Option<u32>) -> Vec<CodeInfo> {
        let limit = limit.unwrap_or(30).min(100) as usize;
        let start = start_after.unwrap_or(0);

        let mut codes = Vec::new();
        for code_id in (start + 1)..self.next_code_id {
            if codes.len() >= limit {
                break;
            }
            if let Some(code_info) = self.code_infos.get(&code_id) {
                codes.push(code_info);
            }
        }
        codes
    }

    // Contract store

    /// Instantiate a contract from stored code and return its address
    pub fn instantiate(
        &mut self,
        run_as: &AccountId,
        code_id: CodeID,
        admin: Option<AccountId>,
        label: String,
        init_msg: Vec<u8>,
    ) -> WasmResult<ContractAddress> {
        if label.trim().is_empty() {
            return Err(WasmError::EmptyLabel);
        }
        let code_info = self
            .code_infos
            .get(&code_id)
            .ok_or(WasmError::CodeNotFound(code_id))?;
        if !code_info.instantiate_config.allows(run_as) {
            return Err(WasmError::Unauthorized);
        }

        let instance_seq = self.next_instance_seq;
        let address = derive_contract_address(code_id, instance_seq);
        if self.contracts.get(&address).is_some() {
            return Err(WasmError::DuplicateContractAddress(address));
        }
        self.next_instance_seq += 1;

        let created = self.next_position();
        let contract_info = ContractInfo {
            address: address.clone(),
            code_id,
            creator: run_as.to_string(),
            admin: admin.map(|a| a.to_string()),
            label,
            created,
        };

        self.contracts.insert(&address, &contract_info);
        self.append_history(
            &address,
            ContractCodeHistoryEntry {
                operation: ContractCodeHistoryOperation::Init,
                code_id,
                updated: created,
                msg: Some(init_msg),
            },
        );
        self.index_contract_by_code(code_id, &address);
        self.init_contract_state(&address);

        env::log_str(&format!(
            "wasm: instantiated contract {} from code {}",
            address, code_id
        ));
        Ok(address)
    }

    /// Write a contract plus its private state under a fixed address,
    /// bypassing the instantiate gate. Genesis restoration only.
    pub fn import_contract(
        &mut self,
        address: ContractAddress,
        contract_info: ContractInfo,
        state: Vec<Model>,
    ) -> WasmResult<()> {
        if !is_valid_contract_address(&address) {
            return Err(WasmError::InvalidRequest(format!(
                "malformed contract address {}",
                address
            )));
        }
        if self.contracts.get(&address).is_some() {
            return Err(WasmError::DuplicateContractAddress(address));
        }
        if contract_info.address != address {
            return Err(WasmError::InvalidRequest(format!(
                "contract info carries address {}, expected {}",
                contract_info.address, address
            )));
        }
        if self.code_infos.get(&contract_info.code_id).is_none() {
            return Err(WasmError::CodeNotFound(contract_info.code_id));
        }

        let code_id = contract_info.code_id;
        let updated = self.next_position();

        self.contracts.insert(&address, &contract_info);
        self.append_history(
            &address,
            ContractCodeHistoryEntry {
                operation: ContractCodeHistoryOperation::GenesisImport,
                code_id,
                updated,
                msg: None,
            },
        );
        self.index_contract_by_code(code_id, &address);

        let mut contract_state = self.init_contract_state(&address);
        for model in &state {
            contract_state.insert(&model.key, &model.value);
        }
        self.contract_states.insert(&address, &contract_state);

        env::log_str(&format!("wasm: imported contract {}", address));
        Ok(())
    }

    /// Point an existing contract at new code. Only the contract's admin may
    /// migrate; the change is recorded in the contract's history.
    pub fn migrate(
        &mut self,
        address: &ContractAddress,
        new_code_id: CodeID,
        migrate_msg: Vec<u8>,
        run_as: &AccountId,
    ) -> WasmResult<()> {
        let mut contract_info = self
            .contracts
            .get(address)
            .ok_or_else(|| WasmError::ContractNotFound(address.clone()))?;
        let admin = contract_info
            .admin
            .as_deref()
            .ok_or(WasmError::NoAdminConfigured)?;
        if admin != run_as.as_str() {
            return Err(WasmError::Unauthorized);
        }
        if self.code_infos.get(&new_code_id).is_none() {
            return Err(WasmError::CodeNotFound(new_code_id));
        }

        contract_info.code_id = new_code_id;
        let updated = self.next_position();
        self.contracts.insert(address, &contract_info);
        self.append_history(
            address,
            ContractCodeHistoryEntry {
                operation: ContractCodeHistoryOperation::Migrate,
                code_id: new_code_id,
                updated,
                msg: Some(migrate_msg),
            },
        );

        env::log_str(&format!(
            "wasm: migrated contract {} to code {}",
            address, new_code_id
        ));
        Ok(())
    }

    /// Hand a contract's admin role to a new account
    pub fn update_admin(
        &mut self,
        address: &ContractAddress,
        new_admin: &AccountId,
        run_as: &AccountId,
    ) -> WasmResult<()> {
        let mut contract_info = self.authorized_admin_change(address, run_as)?;
        contract_info.admin = Some(new_admin.to_string());
        self.contracts.insert(address, &contract_info);

        env::log_str(&format!(
            "wasm: contract {} admin set to {}",
            address, new_admin
        ));
        Ok(())
    }

    /// Clear a contract's admin. This is terminal: migrate and further admin
    /// changes are rejected from then on.
    pub fn clear_admin(&mut self, address: &ContractAddress, run_as: &AccountId) -> WasmResult<()> {
        let mut contract_info = self.authorized_admin_change(address, run_as)?;
        contract_info.admin = None;
        self.contracts.insert(address, &contract_info);

        env::log_str(&format!("wasm: contract {} admin cleared", address));
        Ok(())
    }

    fn authorized_admin_change(
        &self,
        address: &ContractAddress,
        run_as: &AccountId,
    ) -> WasmResult<ContractInfo> {
        let contract_info = self
            .contracts
            .get(address)
            .ok_or_else(|| WasmError::ContractNotFound(address.clone()))?;
        match contract_info.admin.as_deref() {
            Some(admin) if admin == run_as.as_str() => Ok(contract_info),
            _ => Err(WasmError::Unauthorized),
        }
    }

    /// Get contract metadata by address
    pub fn get_contract_info(&self, address: &ContractAddress) -> Option<ContractInfo> {
        self.contracts.get(address)
    }

    /// Full code history of a contract, oldest first. Empty for unknown
    /// addresses.
    pub fn get_contract_history(
        &self,
        address: &ContractAddress,
    ) -> Vec<ContractCodeHistoryEntry> {
        self.contract_histories
            .get(address)
            .map(|history| history.to_vec())
            .unwrap_or_default()
    }

    /// List contracts instantiated from `code_id`, paginated by address
    pub fn list_contracts_by_code(
        &self,
        code_id: CodeID,
        start_after: Option<ContractAddress>,
        limit: Option<u32>,
    ) -> Vec<ContractInfo> {
        let limit = limit.unwrap_or(30).min(100) as usize;
        let mut contracts = Vec::new();

        if let Some(addresses) = self.contracts_by_code.get(&code_id) {
            let mut found_start = start_after.is_none();
            for address in addresses.iter() {
                if contracts.len() >= limit {
                    break;
                }
                if !found_start {
                    if Some(&address) == start_after.as_ref() {
                        found_start = true;
                    }
                    continue;
                }
                if let Some(contract_info) = self.contracts.get(&address) {
                    contracts.push(contract_info);
                }
            }
        }
        contracts
    }

    /// Read one raw key of a contract's private state
    pub fn get_raw_contract_state(
        &self,
        address: &ContractAddress,
        key: &[u8],
    ) -> Option<Vec<u8>> {
        self.contract_states
            .get(address)
            .and_then(|state| state.get(&key.to_vec()))
    }

    // Params

    pub fn get_params(&self) -> Params {
        self.params.clone()
    }

    /// Replace the whole parameter set. Validation failure leaves the
    /// previous value untouched.
    pub fn set_params(&mut self, params: Params) -> WasmResult<()> {
        params.validate()?;
        self.params = params;
        env::log_str("wasm: params updated");
        Ok(())
    }

    /// Apply a single-key governance parameter change: decode the value for
    /// `key`, splice it into the current params and commit only if the
    /// resulting struct validates.
    pub fn set_param(&mut self, key: &str, value: &str) -> WasmResult<()> {
        let key: ParamKey = key.parse()?;
        let mut params = self.params.clone();
        key.apply(&mut params, value)?;
        params.validate()?;
        self.params = params;
        env::log_str(&format!("wasm: param {} updated", key.as_str()));
        Ok(())
    }

    pub fn get_upload_access(&self) -> AccessConfig {
        self.params.code_upload_access.clone()
    }

    pub fn get_instantiate_default_permission(&self) -> AccessType {
        self.params.instantiate_default_permission
    }

    pub fn get_max_wasm_code_size(&self) -> u64 {
        self.params.max_wasm_code_size
    }

    pub fn get_gas_multiplier(&self) -> u64 {
        self.params.gas_multiplier
    }

    pub fn get_max_gas(&self) -> u64 {
        self.params.max_gas
    }

    pub fn get_instance_cost(&self) -> u64 {
        self.params.instance_cost
    }

    pub fn get_compile_cost(&self) -> u64 {
        self.params.compile_cost
    }

    pub fn get_humanize_cost(&self) -> u64 {
        self.params.humanize_cost
    }

    pub fn get_canonicalize_cost(&self) -> u64 {
        self.params.canonicalize_cost
    }

    // Helpers

    pub fn get_next_code_id(&self) -> CodeID {
        self.next_code_id
    }

    pub fn get_next_instance_seq(&self) -> u64 {
        self.next_instance_seq
    }

    /// Position of the current operation: block height plus a running
    /// intra-block index that resets whenever the height advances.
    fn next_position(&mut self) -> AbsolutePosition {
        let height = env::block_height();
        if height != self.position_height {
            self.position_height = height;
            self.position_index = 0;
        }
        let position = AbsolutePosition {
            block_height: height,
            tx_index: self.position_index,
        };
        self.position_index += 1;
        position
    }

    fn append_history(&mut self, address: &ContractAddress, entry: ContractCodeHistoryEntry) {
        let mut history = self.contract_histories.get(address).unwrap_or_else(|| {
            Vector::new(format!("hist_{}", address).into_bytes())
        });
        history.push(&entry);
        self.contract_histories.insert(address, &history);
    }

    fn index_contract_by_code(&mut self, code_id: CodeID, address: &ContractAddress) {
        let mut contracts_for_code = self.contracts_by_code.get(&code_id).unwrap_or_else(|| {
            Vector::new(format!("cbc_{}", code_id).into_bytes())
        });
        contracts_for_code.push(address);
        self.contracts_by_code.insert(&code_id, &contracts_for_code);
    }

    fn init_contract_state(&mut self, address: &ContractAddress) -> UnorderedMap<Vec<u8>, Vec<u8>> {
        let contract_state = UnorderedMap::new(format!("state_{}", address).into_bytes());
        self.contract_states.insert(address, &contract_state);
        contract_state
    }

    #[cfg(test)]
    pub(crate) fn remove_byte_code(&mut self, code_id: CodeID) {
        self.codes.remove(&code_id);
    }
}
