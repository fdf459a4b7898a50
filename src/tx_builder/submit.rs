//! Transaction submission and confirmation
//!
//! Plans are signed against a fresh blockhash, sent with preflight, and
//! polled until the requested commitment is observed. Nothing is retried or
//! rolled back: a failure part way through a multi-plan submission leaves the
//! earlier plans confirmed on the ledger and is reported as
//! `PartialSubmission`.

use futures::future::join_all;
use solana_sdk::{commitment_config::CommitmentConfig, signature::Signature};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::metrics::metrics;
use crate::rpc_manager::Ledger;
use crate::tx_builder::context::BootstrapContext;
use crate::tx_builder::errors::BootstrapError;
use crate::tx_builder::plan::TransactionPlan;

/// Signs, sends and confirms transaction plans
pub struct TransactionSubmitter<L: Ledger + ?Sized> {
    ledger: Arc<L>,
    commitment: CommitmentConfig,
    confirmation_timeout: Duration,
    poll_interval: Duration,
}

impl<L: Ledger + ?Sized> TransactionSubmitter<L> {
    pub fn new(ledger: Arc<L>, ctx: &BootstrapContext) -> Self {
        Self {
            ledger,
            commitment: ctx.commitment,
            confirmation_timeout: ctx.confirmation_timeout,
            poll_interval: ctx.poll_interval,
        }
    }

    /// Submit one plan and wait for `commitment`
    pub async fn submit(
        &self,
        plan: &TransactionPlan,
        commitment: CommitmentConfig,
    ) -> Result<Signature, BootstrapError> {
        let signature = self.send(plan).await?;
        self.confirm(plan.index(), signature, commitment).await?;
        Ok(signature)
    }

    /// Submit plans in order
    ///
    /// With `sequential` each plan is confirmed before the next is sent.
    /// Otherwise every plan is sent first and confirmations are awaited
    /// together; this is refused when a plan depends on an earlier one.
    ///
    /// # Errors
    ///
    /// `Configuration` for a refused non-sequential submission, otherwise
    /// `PartialSubmission` carrying the confirmed signatures and the index
    /// of the first failed plan.
    pub async fn submit_all(
        &self,
        plans: &[TransactionPlan],
        sequential: bool,
    ) -> Result<Vec<Signature>, BootstrapError> {
        if sequential {
            return self.submit_sequential(plans).await;
        }

        if let Some(plan) = plans.iter().find(|p| p.depends_on_previous()) {
            return Err(BootstrapError::config(format!(
                "plan {} depends on an earlier plan; non-sequential submission refused",
                plan.index()
            )));
        }
        self.submit_concurrent(plans).await
    }

    async fn submit_sequential(
        &self,
        plans: &[TransactionPlan],
    ) -> Result<Vec<Signature>, BootstrapError> {
        let mut completed = Vec::with_capacity(plans.len());
        for (idx, plan) in plans.iter().enumerate() {
            match self.submit(plan, self.commitment).await {
                Ok(signature) => {
                    info!(plan = idx, signature = %signature, "Plan confirmed");
                    completed.push(signature);
                }
                Err(e) => {
                    warn!(
                        plan = idx,
                        confirmed = completed.len(),
                        error = %e,
                        "Submission stopped; confirmed plans are left in place"
                    );
                    return Err(BootstrapError::PartialSubmission {
                        completed,
                        failed_index: idx,
                        source: Box::new(e),
                    });
                }
            }
        }
        Ok(completed)
    }

    async fn submit_concurrent(
        &self,
        plans: &[TransactionPlan],
    ) -> Result<Vec<Signature>, BootstrapError> {
        let mut sent = Vec::with_capacity(plans.len());
        let mut send_failure = None;
        for (idx, plan) in plans.iter().enumerate() {
            match self.send(plan).await {
                Ok(signature) => sent.push((idx, signature)),
                Err(e) => {
                    send_failure = Some((idx, e));
                    break;
                }
            }
        }

        let outcomes = join_all(
            sent.iter()
                .map(|(idx, signature)| self.confirm(*idx, *signature, self.commitment)),
        )
        .await;

        let mut completed = Vec::with_capacity(sent.len());
        let mut first_failure = send_failure;
        for ((idx, signature), outcome) in sent.iter().zip(outcomes) {
            match outcome {
                Ok(()) => completed.push(*signature),
                Err(e) => {
                    let earlier = first_failure
                        .as_ref()
                        .map_or(true, |(failed, _)| *idx < *failed);
                    if earlier {
                        first_failure = Some((*idx, e));
                    }
                }
            }
        }

        match first_failure {
            None => Ok(completed),
            Some((failed_index, source)) => Err(BootstrapError::PartialSubmission {
                completed,
                failed_index,
                source: Box::new(source),
            }),
        }
    }

    async fn send(&self, plan: &TransactionPlan) -> Result<Signature, BootstrapError> {
        let blockhash = self.ledger.latest_blockhash().await.map_err(|e| {
            BootstrapError::SubmissionRejected(format!("could not fetch blockhash: {}", e))
        })?;
        let tx = plan.sign(blockhash)?;

        metrics().transactions_submitted.inc();
        match self.ledger.send_transaction(&tx).await {
            Ok(signature) => {
                debug!(plan = plan.index(), signature = %signature, "Transaction sent");
                Ok(signature)
            }
            Err(e) => {
                let err = e.into_submission_error();
                metrics().record_failure(err.category());
                Err(err)
            }
        }
    }

    async fn confirm(
        &self,
        plan_index: usize,
        signature: Signature,
        commitment: CommitmentConfig,
    ) -> Result<(), BootstrapError> {
        let started = Instant::now();
        let deadline = started + self.confirmation_timeout;

        loop {
            match self.ledger.signature_status(&signature, commitment).await {
                Ok(Some(Ok(()))) => {
                    metrics().transactions_confirmed.inc();
                    metrics()
                        .confirmation_latency
                        .observe(started.elapsed().as_secs_f64());
                    return Ok(());
                }
                Ok(Some(Err(tx_err))) => {
                    let err = BootstrapError::SimulationFailed(format!(
                        "{} landed with error: {}",
                        signature, tx_err
                    ));
                    metrics().record_failure(err.category());
                    return Err(err);
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(plan = plan_index, signature = %signature, error = %e, "Status poll failed");
                }
            }

            if Instant::now() >= deadline {
                let err = BootstrapError::ConfirmationTimeout {
                    signature,
                    commitment: format!("{:?}", commitment.commitment),
                    waited_ms: started.elapsed().as_millis() as u64,
                };
                metrics().record_failure(err.category());
                return Err(err);
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}
