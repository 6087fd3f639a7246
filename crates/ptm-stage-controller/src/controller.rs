//! Stateless stage-transition checks. Each function validates one edge of
//! the stage graph and is pure: the orchestrator owns persisting the
//! result and feeding back the next external interaction.

use std::collections::HashMap;

use ptm_types::{
    AttestationOutcome, AttestationRequest, AttestationResult, AssemblyResult, PartyLookup,
    PostAssembly, PreAssembly, PtmError, Stage, Verifier,
};

pub struct StageController;

impl StageController {
    /// `pre_init -> init`: unconditional, run once a transaction is
    /// accepted into an orchestrator.
    pub fn accept() -> Stage {
        Stage::Init
    }

    /// `init -> verifier_resolution`: unconditional once the domain has
    /// populated `PreAssembly.required_verifiers`.
    pub fn init_complete(_pre_assembly: &PreAssembly) -> Stage {
        Stage::VerifierResolution
    }

    /// `verifier_resolution -> assemble`: resolves every required
    /// verifier lookup against `resolved`, in request order. Fails with
    /// `verifier_unresolvable` on the first lookup with no entry.
    pub fn resolve_verifiers(
        pre_assembly: &PreAssembly,
        resolved: &HashMap<PartyLookup, Verifier>,
    ) -> Result<Vec<Verifier>, PtmError> {
        pre_assembly
            .required_verifiers
            .iter()
            .map(|rv| {
                resolved
                    .get(&rv.lookup)
                    .cloned()
                    .ok_or_else(|| PtmError::VerifierUnresolvable { lookup: rv.lookup.clone() })
            })
            .collect()
    }

    /// `assemble -> attestation_plan | reverted | parked`, keyed off the
    /// domain's `AssemblyResult`. `Revert`/`Park` surface as errors so the
    /// orchestrator's existing error-handling path drives the terminal
    /// transition, matching §7's taxonomy.
    pub fn after_assemble(post_assembly: &PostAssembly) -> Result<Stage, PtmError> {
        match post_assembly.assembly_result {
            Some(AssemblyResult::Ok) => Ok(Stage::AttestationPlan),
            Some(AssemblyResult::Revert) => Err(PtmError::AssembleRevert {
                reason: post_assembly
                    .revert_reason
                    .clone()
                    .unwrap_or_else(|| "no reason given".into()),
            }),
            Some(AssemblyResult::Park) => Err(PtmError::AssemblePark {
                reason: post_assembly
                    .revert_reason
                    .clone()
                    .unwrap_or_else(|| "no reason given".into()),
            }),
            None => Err(PtmError::AssemblePark { reason: "assemble has not run".into() }),
        }
    }

    /// `attestation_plan -> endorsement`: unconditional once the plan is
    /// attached to `PostAssembly`.
    pub fn plan_complete(_post_assembly: &PostAssembly) -> Stage {
        Stage::Endorsement
    }

    /// `endorsement -> dispatch_resolve`: satisfied once every request in
    /// `plan` has a matching result. "Matching" means same attestation
    /// name and a party in the request's allowed set; the first such
    /// result wins and later duplicates for the same name are ignored,
    /// per the tie-break rule. Returns `Ok(None)` while some request is
    /// still unanswered (stage stays `endorsement`); an explicit REVERT
    /// outcome is terminal.
    pub fn select_attestations(
        plan: &[AttestationRequest],
        gathered: &[AttestationResult],
    ) -> Result<Option<Vec<AttestationResult>>, PtmError> {
        let mut selected = Vec::with_capacity(plan.len());

        for request in plan {
            let winner = gathered
                .iter()
                .find(|r| r.name == request.name && request.parties.contains(&r.party));

            match winner {
                Some(result) if result.outcome == AttestationOutcome::Revert => {
                    return Err(PtmError::EndorseRejected { name: request.name.clone() });
                }
                Some(result) => selected.push(result.clone()),
                None => return Ok(None),
            }
        }

        Ok(Some(selected))
    }

    /// `dispatch_resolve -> dispatch`: the domain has picked a signer and
    /// the sequencer confirms every ancestor already dispatched.
    pub fn resolve_dispatch(signer: Option<&Verifier>, ancestors_dispatched: bool) -> Option<Stage> {
        if signer.is_some() && ancestors_dispatched {
            Some(Stage::Dispatch)
        } else {
            None
        }
    }

    /// `dispatch -> complete`: the submitter has accepted and durably
    /// numbered the transaction.
    pub fn dispatch_complete(submitted_sequence: Option<u64>) -> Option<Stage> {
        submitted_sequence.map(|_| Stage::Complete)
    }
}
