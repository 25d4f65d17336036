use super::outcome::{ClaimOutcome, FailureReason};
use crate::credential::CredentialClaims;
use crate::keypair::{Keypair, SecretKey};
use crate::service::User;
use std::fmt;

/// Workflow state, owned and replaced on every transition
#[derive(Debug, Clone)]
pub enum ClaimState {
    Init,
    Decoding,
    CheckingStatus {
        claims: CredentialClaims,
    },
    AlreadyClaimed {
        claims: CredentialClaims,
        user: User,
    },
    Unclaimed {
        claims: CredentialClaims,
        user: User,
    },
    Submitting {
        claims: CredentialClaims,
        user: User,
        keypair: Keypair,
    },
    Accepted {
        claims: CredentialClaims,
        secret_key: SecretKey,
    },
    Rejected {
        claims: CredentialClaims,
        server_claimed: bool,
        message: Option<String>,
    },
    Reconciling(Reconciliation),
    Done(ClaimOutcome),
    Failed(FailureReason),
}

/// What the run learned before comparing server truth against the cache
#[derive(Debug, Clone)]
pub struct Reconciliation {
    pub subject_id: String,
    pub server_claimed: bool,
    /// This run's own submission was accepted
    pub submitted: bool,
    /// `None` when the server reports a claim but no secret was found for it
    pub proposed: Option<ClaimOutcome>,
}

impl Reconciliation {
    /// Final transition: a server-side claim without a local secret is surfaced, never swallowed
    pub fn resolve(self, cached: Option<&SecretKey>) -> ClaimState {
        if self.server_claimed && !self.submitted {
            match (cached, &self.proposed) {
                (None, _) => return ClaimState::Failed(FailureReason::OrphanedClaim),
                // Lost a race to a concurrent run that already stored its secret
                (Some(secret_key), Some(ClaimOutcome::Failed { .. })) => {
                    return ClaimState::Done(ClaimOutcome::ClaimedBefore {
                        secret_key: secret_key.clone(),
                    });
                }
                _ => {}
            }
        }

        match self.proposed {
            Some(ClaimOutcome::Failed { reason }) => ClaimState::Failed(reason),
            Some(outcome) => ClaimState::Done(outcome),
            None => ClaimState::Failed(FailureReason::OrphanedClaim),
        }
    }
}

impl ClaimState {
    pub fn stage(&self) -> ClaimStage {
        match self {
            ClaimState::Init => ClaimStage::Init,
            ClaimState::Decoding => ClaimStage::Decoding,
            ClaimState::CheckingStatus { .. } => ClaimStage::CheckingStatus,
            ClaimState::AlreadyClaimed { .. } => ClaimStage::AlreadyClaimed,
            ClaimState::Unclaimed { .. } => ClaimStage::Unclaimed,
            ClaimState::Submitting { .. } => ClaimStage::Submitting,
            ClaimState::Accepted { .. } => ClaimStage::Accepted,
            ClaimState::Rejected { .. } => ClaimStage::Rejected,
            ClaimState::Reconciling(_) => ClaimStage::Reconciling,
            ClaimState::Done(_) => ClaimStage::Done,
            ClaimState::Failed(_) => ClaimStage::Failed,
        }
    }
}

/// Field-less label of a `ClaimState`, kept as the run's trail
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum ClaimStage {
    Init,
    Decoding,
    CheckingStatus,
    AlreadyClaimed,
    Unclaimed,
    Submitting,
    Accepted,
    Rejected,
    Reconciling,
    Done,
    Failed,
}

impl fmt::Display for ClaimStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ClaimStage::Init => "init",
            ClaimStage::Decoding => "decoding",
            ClaimStage::CheckingStatus => "checking_status",
            ClaimStage::AlreadyClaimed => "already_claimed",
            ClaimStage::Unclaimed => "unclaimed",
            ClaimStage::Submitting => "submitting",
            ClaimStage::Accepted => "accepted",
            ClaimStage::Rejected => "rejected",
            ClaimStage::Reconciling => "reconciling",
            ClaimStage::Done => "done",
            ClaimStage::Failed => "failed",
        };
        f.write_str(name)
    }
}
