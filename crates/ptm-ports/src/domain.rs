//! Domain plugin protocol (one domain, many instances per contract).
//!
//! Reference: §6 "Domain plugin protocol". A closed capability set of
//! four calls; production domains (Noto, Zeto) live outside this
//! workspace, `ptm-node` carries a scriptable fake for tests.

use async_trait::async_trait;
use ptm_types::{
    AttestationRequest, AttestationResult, BaseLedgerTx, FullState, PostAssembly, PreAssembly,
    PrivateTransaction, Verifier,
};

/// Errors a domain plugin call can fail with. Distinct from `PtmError`
/// because the stage controller interprets these before they become a
/// taxonomy-level error (e.g. `Revert`/`Park` become `PtmError::
/// AssembleRevert`/`AssemblePark`, not domain errors in their own
/// right).
#[derive(Debug, Clone, thiserror::Error)]
pub enum DomainError {
    #[error("domain call failed: {0}")]
    CallFailed(String),
}

/// The capability set every domain (Noto, Zeto, ...) implements.
#[async_trait]
pub trait DomainPlugin: Send + Sync {
    /// `init_transaction(tx) -> {required_verifiers[]}`
    async fn init_transaction(&self, tx: &PrivateTransaction) -> Result<PreAssembly, DomainError>;

    /// `assemble_transaction(tx, resolved_verifiers) -> {assembly_result,
    /// input_states[], output_states[], info_states[], attestation_plan[]}`
    async fn assemble_transaction(
        &self,
        tx: &PrivateTransaction,
        resolved_verifiers: &[Verifier],
    ) -> Result<PostAssembly, DomainError>;

    /// `endorse_transaction(tx, plan_entry, resolved_verifiers, inputs,
    /// outputs, info) -> {outcome, signature_payload?}`
    async fn endorse_transaction(
        &self,
        tx: &PrivateTransaction,
        plan_entry: &AttestationRequest,
        resolved_verifiers: &[Verifier],
        inputs: &[FullState],
        outputs: &[FullState],
        info: &[FullState],
    ) -> Result<AttestationResult, DomainError>;

    /// `prepare_transaction(tx, attestation_results) -> base_ledger_tx[]`
    async fn prepare_transaction(
        &self,
        tx: &PrivateTransaction,
        attestation_results: &[AttestationResult],
    ) -> Result<Vec<BaseLedgerTx>, DomainError>;

    /// Dry-run query path used by `CallPrivateSmartContract`. Does not
    /// go through the orchestrator.
    async fn call(
        &self,
        tx: &PrivateTransaction,
        function: &str,
        args: serde_json::Value,
    ) -> Result<serde_json::Value, DomainError>;
}
