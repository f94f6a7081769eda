//! Proposal routing
//!
//! Governance accepts typed proposals and, once a proposal passes, executes
//! it against the registry. The full set of proposal kinds is a closed enum
//! dispatched through a single match, so adding a kind forces every route to
//! be handled.

use near_sdk::json_types::Base64VecU8;
use near_sdk::serde::{Deserialize, Serialize};
use near_sdk::AccountId;

use crate::modules::wasm::{
    AccessConfig, CodeID, ContractAddress, Params, WasmError, WasmModule, WasmResult,
};

/// An accepted governance proposal targeting the wasm registry
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "snake_case")]
pub enum WasmProposal {
    /// Upload WASM byte code
    StoreCode {
        run_as: AccountId,
        wasm_byte_code: Base64VecU8,
        source: Option<String>,
        builder: Option<String>,
        instantiate_permission: Option<AccessConfig>,
    },
    /// Create a contract instance from stored code
    InstantiateContract {
        run_as: AccountId,
        admin: Option<AccountId>,
        code_id: CodeID,
        label: String,
        init_msg: Base64VecU8,
    },
    /// Point a contract at new code
    MigrateContract {
        contract: ContractAddress,
        code_id: CodeID,
        migrate_msg: Base64VecU8,
        run_as: AccountId,
    },
    /// Hand a contract's admin role to a new account
    UpdateAdmin {
        contract: ContractAddress,
        new_admin: AccountId,
        run_as: AccountId,
    },
    /// Remove a contract's admin permanently
    ClearAdmin {
        contract: ContractAddress,
        run_as: AccountId,
    },
    /// Replace the whole parameter set
    UpdateParams { params: Params },
    /// Change a single parameter key
    ParamChange { key: String, value: String },
}

/// Result of executing a proposal
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ProposalOutcome {
    /// CodeID assigned by a store-code proposal
    pub code_id: Option<CodeID>,
    /// Address derived by an instantiate proposal
    pub contract_address: Option<ContractAddress>,
    pub log: String,
}

impl ProposalOutcome {
    fn log(log: String) -> Self {
        Self {
            code_id: None,
            contract_address: None,
            log,
        }
    }
}

/// Decode a JSON-encoded proposal payload
pub fn decode_proposal(data: &[u8]) -> WasmResult<WasmProposal> {
    serde_json::from_slice(data)
        .map_err(|err| WasmError::InvalidRequest(format!("proposal decode: {}", err)))
}

/// Execute one accepted proposal against the registry
pub fn route_proposal(module: &mut WasmModule, proposal: WasmProposal) -> WasmResult<ProposalOutcome> {
    match proposal {
        WasmProposal::StoreCode {
            run_as,
            wasm_byte_code,
            source,
            builder,
            instantiate_permission,
        } => {
            let code_id = module.store_code(
                &run_as,
                wasm_byte_code.into(),
                source,
                builder,
                instantiate_permission,
            )?;
            Ok(ProposalOutcome {
                code_id: Some(code_id),
                contract_address: None,
                log: format!("stored code {}", code_id),
            })
        }
        WasmProposal::InstantiateContract {
            run_as,
            admin,
            code_id,
            label,
            init_msg,
        } => {
            let address = module.instantiate(&run_as, code_id, admin, label, init_msg.into())?;
            Ok(ProposalOutcome {
                code_id: None,
                contract_address: Some(address.clone()),
                log: format!("instantiated contract {} from code {}", address, code_id),
            })
        }
        WasmProposal::MigrateContract {
            contract,
            code_id,
            migrate_msg,
            run_as,
        } => {
            module.migrate(&contract, code_id, migrate_msg.into(), &run_as)?;
            Ok(ProposalOutcome::log(format!(
                "migrated contract {} to code {}",
                contract, code_id
            )))
        }
        WasmProposal::UpdateAdmin {
            contract,
            new_admin,
            run_as,
        } => {
            module.update_admin(&contract, &new_admin, &run_as)?;
            Ok(ProposalOutcome::log(format!(
                "contract {} admin set to {}",
                contract, new_admin
            )))
        }
        WasmProposal::ClearAdmin { contract, run_as } => {
            module.clear_admin(&contract, &run_as)?;
            Ok(ProposalOutcome::log(format!(
                "contract {} admin cleared",
                contract
            )))
        }
        WasmProposal::UpdateParams { params } => {
            module.set_params(params)?;
            Ok(ProposalOutcome::log("params updated".to_string()))
        }
        WasmProposal::ParamChange { key, value } => {
            module.set_param(&key, &value)?;
            Ok(ProposalOutcome::log(format!("param {} updated", key)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::wasm::{AccessType, ContractCodeHistoryOperation};
    use near_sdk::test_utils::VMContextBuilder;
    use near_sdk::testing_env;

    fn setup_test_env() {
        let context = VMContextBuilder::new()
            .current_account_id("registry.testnet".parse().unwrap())
            .predecessor_account_id("gov.testnet".parse().unwrap())
            .block_height(1000)
            .build();
        testing_env!(context);
    }

    fn test_account(name: &str) -> AccountId {
        format!("{}.testnet", name).parse().unwrap()
    }

    fn store_code_proposal(run_as: &AccountId) -> WasmProposal {
        WasmProposal::StoreCode {
            run_as: run_as.clone(),
            wasm_byte_code: Base64VecU8(b"mock_wasm_bytecode".to_vec()),
            source: Some("https://example.com/mysource".to_string()),
            builder: Some("foo/bar:v0.0.0".to_string()),
            instantiate_permission: None,
        }
    }

    #[test]
    fn test_store_code_proposal() {
        setup_test_env();
        let mut module = WasmModule::new();
        let creator = test_account("creator");

        let outcome = route_proposal(&mut module, store_code_proposal(&creator)).unwrap();
        assert_eq!(outcome.code_id, Some(1));
        assert!(outcome.contract_address.is_none());

        let code_info = module.get_code_info(1).unwrap();
        assert_eq!(code_info.creator, creator.to_string());
        assert_eq!(code_info.source, "https://example.com/mysource");
        assert_eq!(code_info.builder, "foo/bar:v0.0.0");
    }

    #[test]
    fn test_store_code_proposal_rejected_by_upload_gate() {
        setup_test_env();
        let mut module = WasmModule::new();
        let mut params = module.get_params();
        params.code_upload_access = AccessConfig::nobody();
        params.instantiate_default_permission = AccessType::Nobody;
        module.set_params(params).unwrap();

        let result = route_proposal(&mut module, store_code_proposal(&test_account("creator")));
        assert_eq!(result.unwrap_err(), WasmError::Unauthorized);
    }

    #[test]
    fn test_instantiate_and_migrate_proposals() {
        setup_test_env();
        let mut module = WasmModule::new();
        let creator = test_account("creator");
        let admin = test_account("admin");

        route_proposal(&mut module, store_code_proposal(&creator)).unwrap();
        route_proposal(&mut module, store_code_proposal(&creator)).unwrap();

        let outcome = route_proposal(
            &mut module,
            WasmProposal::InstantiateContract {
                run_as: creator.clone(),
                admin: Some(admin.clone()),
                code_id: 1,
                label: "testing".to_string(),
                init_msg: Base64VecU8(b"{}".to_vec()),
            },
        )
        .unwrap();
        let address = outcome.contract_address.unwrap();

        route_proposal(
            &mut module,
            WasmProposal::MigrateContract {
                contract: address.clone(),
                code_id: 2,
                migrate_msg: Base64VecU8(b"{}".to_vec()),
                run_as: admin,
            },
        )
        .unwrap();

        let contract_info = module.get_contract_info(&address).unwrap();
        assert_eq!(contract_info.code_id, 2);
        let history = module.get_contract_history(&address);
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].operation, ContractCodeHistoryOperation::Init);
        assert_eq!(history[1].operation, ContractCodeHistoryOperation::Migrate);
    }

    #[test]
    fn test_admin_proposals() {
        setup_test_env();
        let mut module = WasmModule::new();
        let creator = test_account("creator");
        let admin = test_account("admin");
        let next_admin = test_account("next-admin");

        route_proposal(&mut module, store_code_proposal(&creator)).unwrap();
        let address = route_proposal(
            &mut module,
            WasmProposal::InstantiateContract {
                run_as: creator,
                admin: Some(admin.clone()),
                code_id: 1,
                label: "admin test".to_string(),
                init_msg: Base64VecU8(vec![]),
            },
        )
        .unwrap()
        .contract_address
        .unwrap();

        route_proposal(
            &mut module,
            WasmProposal::UpdateAdmin {
                contract: address.clone(),
                new_admin: next_admin.clone(),
                run_as: admin.clone(),
            },
        )
        .unwrap();
        assert_eq!(
            module.get_contract_info(&address).unwrap().admin,
            Some(next_admin.to_string())
        );

        // The former admin lost its authority with the handover
        let result = route_proposal(
            &mut module,
            WasmProposal::ClearAdmin {
                contract: address.clone(),
                run_as: admin,
            },
        );
        assert_eq!(result.unwrap_err(), WasmError::Unauthorized);

        route_proposal(
            &mut module,
            WasmProposal::ClearAdmin {
                contract: address.clone(),
                run_as: next_admin,
            },
        )
        .unwrap();
        assert_eq!(module.get_contract_info(&address).unwrap().admin, None);
    }

    #[test]
    fn test_param_change_proposal() {
        setup_test_env();
        let mut module = WasmModule::new();

        route_proposal(
            &mut module,
            WasmProposal::ParamChange {
                key: "maxGas".to_string(),
                value: "15000000000".to_string(),
            },
        )
        .unwrap();
        assert_eq!(module.get_max_gas(), 15_000_000_000);
    }

    #[test]
    fn test_decode_proposal() {
        let payload = br#"{"param_change": {"key": "maxGas", "value": "42"}}"#;
        let proposal = decode_proposal(payload).unwrap();
        assert!(matches!(proposal, WasmProposal::ParamChange { .. }));

        let err = decode_proposal(b"not json").unwrap_err();
        assert!(matches!(err, WasmError::InvalidRequest(_)));
    }
}
