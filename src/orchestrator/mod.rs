pub mod outcome;
pub mod state;

pub use outcome::{ClaimOutcome, FailureReason};
pub use state::{ClaimStage, ClaimState, Reconciliation};

use crate::cache::{ClaimCache, PutOutcome};
use crate::credential::{Credential, CredentialClaims};
use crate::keypair::{KeyScheme, Keypair};
use crate::service::ClaimService;
use tracing::{debug, error, info, warn};

/// Result of one claim run
#[derive(Debug, Clone)]
pub struct ClaimRun {
    pub outcome: ClaimOutcome,
    /// Decoded identity, absent when the credential could not be decoded
    pub claims: Option<CredentialClaims>,
    /// Every state the run passed through, terminal state included
    pub trail: Vec<ClaimStage>,
}

impl ClaimRun {
    pub fn public_address(&self) -> Option<&str> {
        self.claims.as_ref().map(|claims| claims.public_address.as_str())
    }
}

/// Sequences decode, status check, keypair generation, submission and reconciliation so that
/// a subject ends up with at most one issued secret.
#[derive(Debug)]
pub struct ClaimOrchestrator<S> {
    service: S,
    cache: ClaimCache,
    scheme: KeyScheme,
}

impl<S: ClaimService> ClaimOrchestrator<S> {
    pub fn new(service: S, cache: ClaimCache) -> Self {
        Self {
            service,
            cache,
            scheme: KeyScheme::default(),
        }
    }

    pub fn cache(&self) -> &ClaimCache {
        &self.cache
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    /// Drive one workflow to a terminal state.
    ///
    /// Dropping the returned future before the submission resolves leaves the cache untouched;
    /// the next run re-reads the claim status from the service.
    pub async fn run(&self, credential: &Credential) -> ClaimRun {
        let mut trail = Vec::new();
        let mut claims = None;
        let mut state = ClaimState::Init;

        let outcome = loop {
            let stage = state.stage();
            debug!(state = %stage, "Claim state");
            trail.push(stage);
            state = match state {
                ClaimState::Done(outcome) => break outcome,
                ClaimState::Failed(reason) => break ClaimOutcome::Failed { reason },
                state => {
                    if let ClaimState::CheckingStatus { claims: decoded } = &state {
                        claims = Some(decoded.clone());
                    }
                    self.advance(state, credential).await
                }
            };
        };

        let subject_id = claims
            .as_ref()
            .map(|claims: &CredentialClaims| claims.subject_id.as_str())
            .unwrap_or("<unknown>");
        match &outcome {
            ClaimOutcome::Failed { reason } => warn!(
                subject_id,
                %reason,
                retryable = reason.is_retryable(),
                trail = ?trail,
                "Claim run failed"
            ),
            _ => info!(
                subject_id,
                outcome = %outcome.message(),
                trail = ?trail,
                "Claim run finished"
            ),
        }

        ClaimRun {
            outcome,
            claims,
            trail,
        }
    }

    /// Perform exactly one transition
    async fn advance(&self, state: ClaimState, credential: &Credential) -> ClaimState {
        match state {
            ClaimState::Init => ClaimState::Decoding,

            ClaimState::Decoding => match credential.decode() {
                Ok(claims) => ClaimState::CheckingStatus { claims },
                Err(error) => {
                    warn!(%error, "Failed to decode credential");
                    ClaimState::Failed(error.into())
                }
            },

            ClaimState::CheckingStatus { claims } => {
                debug!(subject_id = %claims.subject_id, "Checking claim status");
                match self.service.fetch_user(&claims.subject_id, credential).await {
                    Ok(user) if user.claimed => ClaimState::AlreadyClaimed { claims, user },
                    Ok(user) => ClaimState::Unclaimed { claims, user },
                    Err(error) => {
                        warn!(subject_id = %claims.subject_id, %error, "Failed to fetch user");
                        ClaimState::Failed(error.into())
                    }
                }
            }

            ClaimState::AlreadyClaimed { claims, user } => {
                let cached = self.cache.get(&claims.subject_id).await;
                debug!(
                    subject_id = %claims.subject_id,
                    user_id = user.id,
                    recoverable = cached.is_some(),
                    "User claimed before"
                );

                ClaimState::Reconciling(Reconciliation {
                    subject_id: claims.subject_id,
                    server_claimed: true,
                    submitted: false,
                    proposed: cached.map(|secret_key| ClaimOutcome::ClaimedBefore { secret_key }),
                })
            }

            ClaimState::Unclaimed { claims, user } => {
                let keypair = Keypair::generate(self.scheme);
                ClaimState::Submitting {
                    claims,
                    user,
                    keypair,
                }
            }

            ClaimState::Submitting {
                claims,
                user,
                keypair,
            } => {
                info!(
                    subject_id = %claims.subject_id,
                    user_id = user.id,
                    public_key = %keypair.public_key,
                    "Submitting claim"
                );
                match self
                    .service
                    .submit_claim(user.id, &keypair.public_key, credential)
                    .await
                {
                    Ok(result) if result.accepted => ClaimState::Accepted {
                        claims,
                        secret_key: keypair.secret_key,
                    },
                    Ok(result) => ClaimState::Rejected {
                        claims,
                        server_claimed: result.user.is_some_and(|user| user.claimed),
                        message: result.message,
                    },
                    Err(error) => {
                        warn!(subject_id = %claims.subject_id, %error, "Failed to submit claim");
                        ClaimState::Failed(error.into())
                    }
                }
            }

            ClaimState::Accepted { claims, secret_key } => {
                let proposed = match self.cache.put(&claims.subject_id, secret_key.clone()).await {
                    Ok(PutOutcome::Inserted) => ClaimOutcome::ClaimedNow { secret_key },
                    Ok(PutOutcome::Existing(prior)) => {
                        warn!(
                            subject_id = %claims.subject_id,
                            "Duplicate accepted claim, keeping the previously issued key"
                        );
                        ClaimOutcome::ClaimedBefore { secret_key: prior }
                    }
                    Err(error) => {
                        // The secret is still shown once; only durability is lost
                        error!(subject_id = %claims.subject_id, %error, "Failed to persist claim");
                        ClaimOutcome::ClaimedNow { secret_key }
                    }
                };

                ClaimState::Reconciling(Reconciliation {
                    subject_id: claims.subject_id,
                    server_claimed: true,
                    submitted: true,
                    proposed: Some(proposed),
                })
            }

            ClaimState::Rejected {
                claims,
                server_claimed,
                message,
            } => {
                warn!(
                    subject_id = %claims.subject_id,
                    reason = message.as_deref().unwrap_or_default(),
                    "Claim rejected by faucet service"
                );
                ClaimState::Reconciling(Reconciliation {
                    subject_id: claims.subject_id,
                    server_claimed,
                    submitted: false,
                    proposed: Some(ClaimOutcome::failed(FailureReason::ClaimRejected {
                        message,
                    })),
                })
            }

            ClaimState::Reconciling(reconciliation) => {
                let cached = self.cache.get(&reconciliation.subject_id).await;
                reconciliation.resolve(cached.as_ref())
            }

            terminal @ (ClaimState::Done(_) | ClaimState::Failed(_)) => terminal,
        }
    }
}
