//! Dispatches an attestation plan to local signers, local endorsers, and
//! remote parties, and assembles the resulting `AttestationResult` set.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use ptm_ports::{DomainPlugin, KeyManager, ReliableMessage, TransportManager};
use ptm_telemetry::ENDORSEMENT_ROUND_TRIPS;
use ptm_types::{
    AttestationOutcome, AttestationRequest, AttestationResult, AttestationType, FullState,
    PrivateTransaction, Verifier,
};
use tracing::{instrument, warn};
use uuid::Uuid;

use crate::errors::EndorsementError;
use crate::pending::{AttestationKey, PendingGather};

const DEFAULT_GATHER_TIMEOUT: Duration = Duration::from_secs(30);

/// Splits a party lookup into `(name, node)` if it names a remote party
/// (`"notary@node2"`), or returns `None` for a local lookup.
fn remote_node(party: &str) -> Option<&str> {
    party.split_once('@').map(|(_, node)| node)
}

/// Gathers attestations for one contract's in-flight transactions. Shared
/// across an orchestrator's lifetime; `gather` is called once per
/// transaction entering the `endorsement` stage.
pub struct EndorsementGatherer<K, T, D> {
    key_manager: Arc<K>,
    transport: Arc<T>,
    domain: Arc<D>,
    pending: PendingGather,
    timeout: Duration,
}

impl<K, T, D> EndorsementGatherer<K, T, D>
where
    K: KeyManager,
    T: TransportManager,
    D: DomainPlugin,
{
    pub fn new(key_manager: Arc<K>, transport: Arc<T>, domain: Arc<D>) -> Self {
        Self {
            key_manager,
            transport,
            domain,
            pending: PendingGather::new(),
            timeout: DEFAULT_GATHER_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Converts `plan` into concrete SIGN/ENDORSE dispatches and returns
    /// once every request has a matching result from every named party,
    /// or the gather times out.
    #[instrument(skip(self, tx, plan, resolved_verifiers, inputs, outputs, info), fields(tx_id = ?tx.id))]
    pub async fn gather(
        &self,
        tx: &PrivateTransaction,
        plan: &[AttestationRequest],
        resolved_verifiers: &[Verifier],
        inputs: &[FullState],
        outputs: &[FullState],
        info: &[FullState],
    ) -> Result<Vec<AttestationResult>, EndorsementError> {
        if plan.is_empty() {
            return Ok(Vec::new());
        }

        let expected: HashSet<AttestationKey> = plan
            .iter()
            .flat_map(|req| req.parties.iter().map(move |party| (req.name.clone(), party.clone())))
            .collect();

        let rx = self.pending.register(tx.id, expected);

        for request in plan {
            for party in &request.parties {
                self.dispatch_one(tx, request, party, resolved_verifiers, inputs, outputs, info)
                    .await?;
            }
        }

        match tokio::time::timeout(self.timeout, rx).await {
            Ok(Ok(results)) => Ok(results),
            Ok(Err(_)) => Err(EndorsementError::Timeout { party: "unknown".into() }),
            Err(_) => {
                self.pending.cancel(tx.id);
                let party = plan
                    .first()
                    .and_then(|r| r.parties.first())
                    .cloned()
                    .unwrap_or_default();
                warn!(tx_id = ?tx.id, "endorsement gather timed out");
                Err(EndorsementError::Timeout { party })
            }
        }
    }

    async fn dispatch_one(
        &self,
        tx: &PrivateTransaction,
        request: &AttestationRequest,
        party: &str,
        resolved_verifiers: &[Verifier],
        inputs: &[FullState],
        outputs: &[FullState],
        info: &[FullState],
    ) -> Result<(), EndorsementError> {
        match request.attestation_type {
            AttestationType::Sign => {
                let (key_handle, verifier) = self
                    .key_manager
                    .resolve_key(party, &request.algorithm, "sign")
                    .await
                    .map_err(|_| EndorsementError::PlanPartyUnresolvable { lookup: party.into() })?;
                let signature = self
                    .key_manager
                    .sign(&key_handle, &request.algorithm, &request.payload)
                    .await
                    .map_err(|_| EndorsementError::PlanPartyUnresolvable { lookup: party.into() })?;

                self.pending.complete_one(
                    tx.id,
                    AttestationResult {
                        name: request.name.clone(),
                        party: party.to_string(),
                        verifier,
                        signature_payload: Some(signature),
                        outcome: AttestationOutcome::Sign,
                    },
                );
                ENDORSEMENT_ROUND_TRIPS.with_label_values(&["local", "sign"]).inc();
                Ok(())
            }
            AttestationType::Endorse => {
                if let Some(node) = remote_node(party) {
                    self.dispatch_remote(tx, request, party, node, resolved_verifiers, inputs, outputs, info)
                        .await
                } else {
                    self.dispatch_local_endorse(
                        tx,
                        request,
                        party,
                        resolved_verifiers,
                        inputs,
                        outputs,
                        info,
                    )
                    .await
                }
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn dispatch_remote(
        &self,
        tx: &PrivateTransaction,
        request: &AttestationRequest,
        party: &str,
        node: &str,
        resolved_verifiers: &[Verifier],
        inputs: &[FullState],
        outputs: &[FullState],
        info: &[FullState],
    ) -> Result<(), EndorsementError> {
        let payload = serde_json::to_vec(&RemoteEndorseRequest {
            tx: tx.clone(),
            request: request.clone(),
            party: party.to_string(),
            resolved_verifiers: resolved_verifiers.to_vec(),
            inputs: inputs.to_vec(),
            outputs: outputs.to_vec(),
            info: info.to_vec(),
        })
        .map_err(|_| EndorsementError::PlanPartyUnresolvable { lookup: party.into() })?;

        let message = ReliableMessage {
            node: node.to_string(),
            message_type: "endorsement_request".to_string(),
            payload,
            correlation_id: tx.id,
        };

        self.transport.send(message).await.map_err(|_| EndorsementError::Timeout { party: party.into() })?;
        ENDORSEMENT_ROUND_TRIPS.with_label_values(&["remote", "endorser_submit"]).inc();
        Ok(())
    }

    async fn dispatch_local_endorse(
        &self,
        tx: &PrivateTransaction,
        request: &AttestationRequest,
        party: &str,
        resolved_verifiers: &[Verifier],
        inputs: &[FullState],
        outputs: &[FullState],
        info: &[FullState],
    ) -> Result<(), EndorsementError> {
        let result = self
            .domain
            .endorse_transaction(tx, request, resolved_verifiers, inputs, outputs, info)
            .await
            .map_err(|_| EndorsementError::RemoteRejected { party: party.into() })?;

        if matches!(result.outcome, AttestationOutcome::Revert) {
            ENDORSEMENT_ROUND_TRIPS.with_label_values(&["local", "revert"]).inc();
            return Err(EndorsementError::RemoteRejected { party: party.into() });
        }

        ENDORSEMENT_ROUND_TRIPS.with_label_values(&["local", "endorser_submit"]).inc();
        self.pending.complete_one(tx.id, result);
        Ok(())
    }

    /// Routes a remote `endorsement_response` message back into the
    /// pending gather for its correlated transaction. Called by the PTM
    /// Facade's `receive_transport_message`.
    pub fn receive(&self, message: &ReliableMessage) -> bool {
        if message.message_type != "endorsement_response" {
            return false;
        }
        let Ok(response) = serde_json::from_slice::<RemoteEndorseResponse>(&message.payload) else {
            warn!("unparseable endorsement_response payload");
            return false;
        };
        self.pending.complete_one(response.tx_id, response.result)
    }
}

/// Wire shape of an `endorsement_request` payload. Carries everything
/// the receiving node's domain plugin needs to answer without having
/// the transaction tracked by an orchestrator of its own.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RemoteEndorseRequest {
    pub tx: PrivateTransaction,
    pub request: AttestationRequest,
    pub party: String,
    pub resolved_verifiers: Vec<Verifier>,
    pub inputs: Vec<FullState>,
    pub outputs: Vec<FullState>,
    pub info: Vec<FullState>,
}

/// Wire shape of an `endorsement_response` payload, correlated by
/// `tx_id` + the embedded result's attestation name and party.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RemoteEndorseResponse {
    pub tx_id: Uuid,
    pub result: AttestationResult,
}

/// Services an inbound `endorsement_request`: runs the local domain
/// plugin's `endorse_transaction` and packages the outcome as the
/// `endorsement_response` message to send back. Called by the PTM
/// Facade's `receive_transport_message` on the serving side of a
/// remote endorsement (the counterpart to `EndorsementGatherer::gather`'s
/// `dispatch_remote` on the requesting side).
pub async fn respond_to_remote_request<D>(
    domain: &D,
    message: &ReliableMessage,
) -> Option<ReliableMessage>
where
    D: DomainPlugin,
{
    if message.message_type != "endorsement_request" {
        return None;
    }
    let request: RemoteEndorseRequest = match serde_json::from_slice(&message.payload) {
        Ok(request) => request,
        Err(_) => {
            warn!("unparseable endorsement_request payload");
            return None;
        }
    };

    let result = domain
        .endorse_transaction(
            &request.tx,
            &request.request,
            &request.resolved_verifiers,
            &request.inputs,
            &request.outputs,
            &request.info,
        )
        .await
        .unwrap_or_else(|_| AttestationResult {
            name: request.request.name.clone(),
            party: request.party.clone(),
            verifier: String::new(),
            signature_payload: None,
            outcome: AttestationOutcome::Revert,
        });

    let payload = match serde_json::to_vec(&RemoteEndorseResponse { tx_id: request.tx.id, result }) {
        Ok(payload) => payload,
        Err(_) => return None,
    };

    Some(ReliableMessage {
        node: message.node.clone(),
        message_type: "endorsement_response".to_string(),
        payload,
        correlation_id: request.tx.id,
    })
}
