// Wasm registry contract - governance-driven code and contract registry
use near_sdk::borsh::{self, BorshDeserialize, BorshSerialize};
use near_sdk::json_types::Base64VecU8;
use near_sdk::{env, near_bindgen, AccountId, PanicOnDefault};

pub mod handler;
pub mod modules;

use handler::{route_proposal, ProposalOutcome, WasmProposal};
use modules::wasm::{
    AccessConfig, CodeID, CodeInfo, ContractAddress, ContractCodeHistoryEntry, ContractInfo,
    Model, Params, WasmModule, WasmResult,
};

/// Registry contract: holds the wasm module state and exposes the proposal
/// entry points to the governance account.
#[near_bindgen]
#[derive(BorshDeserialize, BorshSerialize, PanicOnDefault)]
pub struct WasmRegistryContract {
    /// Governance account allowed to execute accepted proposals
    gov_account: AccountId,
    /// The registry state
    wasm: WasmModule,
}

#[near_bindgen]
impl WasmRegistryContract {
    #[init]
    pub fn new(gov_account: AccountId) -> Self {
        Self {
            gov_account,
            wasm: WasmModule::new(),
        }
    }

    // Proposal execution (governance only)

    /// Execute one accepted governance proposal
    pub fn handle_proposal(&mut self, proposal: WasmProposal) -> ProposalOutcome {
        self.require_gov();
        unwrap_or_abort(route_proposal(&mut self.wasm, proposal))
    }

    /// Store WASM code and return the assigned CodeID
    pub fn store_code(
        &mut self,
        run_as: AccountId,
        wasm_byte_code: Base64VecU8,
        source: Option<String>,
        builder: Option<String>,
        instantiate_permission: Option<AccessConfig>,
    ) -> CodeID {
        self.require_gov();
        unwrap_or_abort(self.wasm.store_code(
            &run_as,
            wasm_byte_code.into(),
            source,
            builder,
            instantiate_permission,
        ))
    }

    /// Instantiate a contract from stored code and return its address
    pub fn instantiate_contract(
        &mut self,
        run_as: AccountId,
        code_id: CodeID,
        admin: Option<AccountId>,
        label: String,
        init_msg: Base64VecU8,
    ) -> ContractAddress {
        self.require_gov();
        unwrap_or_abort(
            self.wasm
                .instantiate(&run_as, code_id, admin, label, init_msg.into()),
        )
    }

    /// Point a contract at new code; admin only
    pub fn migrate_contract(
        &mut self,
        contract: ContractAddress,
        code_id: CodeID,
        migrate_msg: Base64VecU8,
        run_as: AccountId,
    ) {
        self.require_gov();
        unwrap_or_abort(
            self.wasm
                .migrate(&contract, code_id, migrate_msg.into(), &run_as),
        )
    }

    /// Hand a contract's admin role to a new account; admin only
    pub fn update_admin(
        &mut self,
        contract: ContractAddress,
        new_admin: AccountId,
        run_as: AccountId,
    ) {
        self.require_gov();
        unwrap_or_abort(self.wasm.update_admin(&contract, &new_admin, &run_as))
    }

    /// Clear a contract's admin permanently; admin only
    pub fn clear_admin(&mut self, contract: ContractAddress, run_as: AccountId) {
        self.require_gov();
        unwrap_or_abort(self.wasm.clear_admin(&contract, &run_as))
    }

    /// Replace the whole parameter set
    pub fn set_params(&mut self, params: Params) {
        self.require_gov();
        unwrap_or_abort(self.wasm.set_params(params))
    }

    /// Change a single parameter key
    pub fn set_param(&mut self, key: String, value: String) {
        self.require_gov();
        unwrap_or_abort(self.wasm.set_param(&key, &value))
    }

    // Genesis import (governance only)

    /// Import code under a fixed id, bypassing the upload gate
    pub fn import_code(
        &mut self,
        code_id: CodeID,
        code_info: CodeInfo,
        wasm_byte_code: Base64VecU8,
    ) {
        self.require_gov();
        unwrap_or_abort(
            self.wasm
                .import_code(code_id, code_info, wasm_byte_code.into()),
        )
    }

    /// Import a contract plus its private state under a fixed address
    pub fn import_contract(
        &mut self,
        address: ContractAddress,
        contract_info: ContractInfo,
        state: Vec<Model>,
    ) {
        self.require_gov();
        unwrap_or_abort(self.wasm.import_contract(address, contract_info, state))
    }

    // Queries

    pub fn get_code_info(&self, code_id: CodeID) -> Option<CodeInfo> {
        self.wasm.get_code_info(code_id)
    }

    pub fn get_byte_code(&self, code_id: CodeID) -> Base64VecU8 {
        Base64VecU8(unwrap_or_abort(self.wasm.get_byte_code(code_id)))
    }

    /// Hex-encoded SHA-256 of the stored byte code
    pub fn get_code_hash(&self, code_id: CodeID) -> Option<String> {
        self.wasm
            .get_code_info(code_id)
            .map(|code_info| hex::encode(code_info.code_hash))
    }

    pub fn list_codes(&self, start_after: Option<CodeID>, limit: Option<u32>) -> Vec<CodeInfo> {
        self.wasm.list_codes(start_after, limit)
    }

    pub fn get_contract_info(&self, address: ContractAddress) -> Option<ContractInfo> {
        self.wasm.get_contract_info(&address)
    }

    pub fn get_contract_history(&self, address: ContractAddress) -> Vec<ContractCodeHistoryEntry> {
        self.wasm.get_contract_history(&address)
    }

    pub fn list_contracts_by_code(
        &self,
        code_id: CodeID,
        start_after: Option<ContractAddress>,
        limit: Option<u32>,
    ) -> Vec<ContractInfo> {
        self.wasm.list_contracts_by_code(code_id, start_after, limit)
    }

    pub fn raw_contract_state(
        &self,
        address: ContractAddress,
        key: Base64VecU8,
    ) -> Option<Base64VecU8> {
        self.wasm
            .get_raw_contract_state(&address, &key.0)
            .map(Base64VecU8)
    }

    pub fn get_params(&self) -> Params {
        self.wasm.get_params()
    }

    pub fn get_next_code_id(&self) -> CodeID {
        self.wasm.get_next_code_id()
    }

    fn require_gov(&self) {
        if env::predecessor_account_id() != self.gov_account {
            env::panic_str("Only governance can call");
        }
    }
}

fn unwrap_or_abort<T>(result: WasmResult<T>) -> T {
    match result {
        Ok(value) => value,
        Err(err) => env::panic_str(&err.to_string()),
    }
}
