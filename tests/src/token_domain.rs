//! A minimal fungible-token domain plugin used only by the integration
//! tests: mint, transfer, and burn over UTXO-style coin states. Mirrors
//! `ptm_node::fakes::MintDomain`'s scriptable-domain shape but adds its
//! own state queries and a side-channel operation registry, since
//! neither `PrivateTransaction` nor `assemble_transaction`'s signature
//! carries a "this is a transfer of 50 from Bob to Carol" payload —
//! that correlation has to live in the domain itself, keyed by tx id.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use ptm_ports::{
    DomainError, DomainPlugin, QueryFlags, StateQuery, StateStore,
};
use ptm_types::{
    AssemblyResult, AttestationOutcome, AttestationRequest, AttestationResult, AttestationType,
    BaseLedgerTx, ContractAddress, FullState, PostAssembly, PreAssembly, PrivateTransaction,
    SchemaId, StateId, StateRef, TxId, Verifier,
};

/// One token operation, registered against a tx id before that
/// transaction is handed to `Facade::handle_new_tx`.
#[derive(Debug, Clone)]
pub enum Operation {
    Mint { to: Verifier, amount: u64 },
    Transfer { from: Verifier, to: Verifier, amount: u64 },
    Burn { from: Verifier, amount: u64 },
}

fn coin_amount(state: &FullState) -> u64 {
    state.data.get("amount").and_then(|v| v.as_u64()).unwrap_or(0)
}

/// A fungible token over UTXO coin states. Only `authorized_minter` may
/// mint; transfers and burns spend every coin the sender owns and mint
/// a change coin back, rejecting the operation if the sender's balance
/// is short. The notary step on transfers/burns is named by
/// `notary_party` — a bare name for a local notary, or `"name@node"`
/// for a remote one — and always approves, since the balance check
/// already happened in `assemble_transaction`.
pub struct TestTokenDomain {
    store: Arc<dyn StateStore>,
    contract: ContractAddress,
    schema_id: SchemaId,
    authorized_minter: Verifier,
    notary_party: String,
    next_state_id: AtomicU64,
    operations: Mutex<HashMap<TxId, Operation>>,
    assemble_calls: AtomicU64,
}

impl TestTokenDomain {
    pub fn new(
        store: Arc<dyn StateStore>,
        contract: ContractAddress,
        authorized_minter: Verifier,
        notary_party: impl Into<String>,
    ) -> Self {
        Self {
            store,
            contract,
            schema_id: SchemaId::zero(),
            authorized_minter,
            notary_party: notary_party.into(),
            next_state_id: AtomicU64::new(1),
            operations: Mutex::new(HashMap::new()),
            assemble_calls: AtomicU64::new(0),
        }
    }

    /// Number of times `assemble_transaction` has run. Used by the
    /// crash/resume test to confirm a resumed transaction picks up from
    /// endorsement without calling back into the domain to re-assemble.
    pub fn assemble_call_count(&self) -> u64 {
        self.assemble_calls.load(Ordering::SeqCst)
    }

    pub fn register_mint(&self, tx_id: TxId, to: impl Into<Verifier>, amount: u64) {
        self.operations.lock().insert(tx_id, Operation::Mint { to: to.into(), amount });
    }

    pub fn register_transfer(
        &self,
        tx_id: TxId,
        from: impl Into<Verifier>,
        to: impl Into<Verifier>,
        amount: u64,
    ) {
        self.operations
            .lock()
            .insert(tx_id, Operation::Transfer { from: from.into(), to: to.into(), amount });
    }

    pub fn register_burn(&self, tx_id: TxId, from: impl Into<Verifier>, amount: u64) {
        self.operations.lock().insert(tx_id, Operation::Burn { from: from.into(), amount });
    }

    /// Sums a party's available coins under this contract, outside the
    /// Domain Context's exclusivity window — the caller
    /// (`spawn_assemble`) already holds that window for the whole of
    /// this call, so what this sees is exactly what the subsequent
    /// `lock_states`/`flush` will commit.
    async fn available_coins(&self, owner: &str) -> Result<Vec<FullState>, DomainError> {
        let states = self
            .store
            .find_available(self.contract, self.schema_id, &StateQuery::default(), QueryFlags::default())
            .await
            .map_err(|e| DomainError::CallFailed(e.to_string()))?;
        Ok(states.into_iter().filter(|s| s.owner == owner).collect())
    }

    fn new_coin(&self, owner: &str, amount: u64) -> FullState {
        let id = self.next_state_id.fetch_add(1, Ordering::SeqCst);
        FullState {
            state_ref: StateRef::new(self.schema_id, StateId::from_low_u64_be(id)),
            data: serde_json::json!({ "owner": owner, "amount": amount }),
            owner: owner.to_string(),
            created_at: 0,
        }
    }

    fn notary_plan(&self) -> AttestationRequest {
        AttestationRequest {
            name: "notary".to_string(),
            attestation_type: AttestationType::Endorse,
            algorithm: "ed25519".to_string(),
            payload: Vec::new(),
            parties: vec![self.notary_party.clone()],
        }
    }

    fn revert(reason: impl Into<String>) -> PostAssembly {
        PostAssembly {
            assembly_result: Some(AssemblyResult::Revert),
            revert_reason: Some(reason.into()),
            ..Default::default()
        }
    }
}

#[async_trait]
impl DomainPlugin for TestTokenDomain {
    async fn init_transaction(&self, _tx: &PrivateTransaction) -> Result<PreAssembly, DomainError> {
        Ok(PreAssembly::default())
    }

    async fn assemble_transaction(
        &self,
        tx: &PrivateTransaction,
        _resolved_verifiers: &[Verifier],
    ) -> Result<PostAssembly, DomainError> {
        self.assemble_calls.fetch_add(1, Ordering::SeqCst);
        let operation = self
            .operations
            .lock()
            .get(&tx.id)
            .cloned()
            .ok_or_else(|| DomainError::CallFailed(format!("no operation registered for {}", tx.id)))?;

        match operation {
            Operation::Mint { to, amount } => {
                if tx.submitter != self.authorized_minter {
                    return Ok(Self::revert(format!("{} is not the authorized minter", tx.submitter)));
                }
                Ok(PostAssembly {
                    assembly_result: Some(AssemblyResult::Ok),
                    input_states: Vec::new(),
                    output_states: vec![self.new_coin(&to, amount)],
                    info_states: Vec::new(),
                    attestation_plan: vec![self.notary_plan()],
                    revert_reason: None,
                })
            }
            Operation::Transfer { from, to, amount } => {
                let available = self.available_coins(&from).await?;
                let balance: u64 = available.iter().map(coin_amount).sum();
                if balance < amount {
                    return Ok(Self::revert(format!(
                        "{from} holds {balance}, cannot transfer {amount}"
                    )));
                }
                let mut outputs = vec![self.new_coin(&to, amount)];
                let change = balance - amount;
                if change > 0 {
                    outputs.push(self.new_coin(&from, change));
                }
                Ok(PostAssembly {
                    assembly_result: Some(AssemblyResult::Ok),
                    input_states: available.iter().map(|s| s.state_ref).collect(),
                    output_states: outputs,
                    info_states: Vec::new(),
                    attestation_plan: vec![self.notary_plan()],
                    revert_reason: None,
                })
            }
            Operation::Burn { from, amount } => {
                let available = self.available_coins(&from).await?;
                let balance: u64 = available.iter().map(coin_amount).sum();
                if balance < amount {
                    return Ok(Self::revert(format!("{from} holds {balance}, cannot burn {amount}")));
                }
                let mut outputs = Vec::new();
                let change = balance - amount;
                if change > 0 {
                    outputs.push(self.new_coin(&from, change));
                }
                Ok(PostAssembly {
                    assembly_result: Some(AssemblyResult::Ok),
                    input_states: available.iter().map(|s| s.state_ref).collect(),
                    output_states: outputs,
                    info_states: Vec::new(),
                    attestation_plan: vec![self.notary_plan()],
                    revert_reason: None,
                })
            }
        }
    }

    async fn endorse_transaction(
        &self,
        _tx: &PrivateTransaction,
        plan_entry: &AttestationRequest,
        _resolved_verifiers: &[Verifier],
        _inputs: &[FullState],
        _outputs: &[FullState],
        _info: &[FullState],
    ) -> Result<AttestationResult, DomainError> {
        Ok(AttestationResult {
            name: plan_entry.name.clone(),
            party: plan_entry.parties.first().cloned().unwrap_or_default(),
            verifier: plan_entry.parties.first().cloned().unwrap_or_default(),
            signature_payload: None,
            outcome: AttestationOutcome::EndorserSubmit,
        })
    }

    async fn prepare_transaction(
        &self,
        _tx: &PrivateTransaction,
        _attestation_results: &[AttestationResult],
    ) -> Result<Vec<BaseLedgerTx>, DomainError> {
        Ok(vec![BaseLedgerTx { payload: b"token".to_vec(), nonce: None }])
    }

    async fn call(
        &self,
        _tx: &PrivateTransaction,
        function: &str,
        args: serde_json::Value,
    ) -> Result<serde_json::Value, DomainError> {
        Ok(serde_json::json!({ "function": function, "echo": args }))
    }
}
