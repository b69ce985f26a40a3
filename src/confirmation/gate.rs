//! ConfirmationGate: policy check, provider delegation, decision ledger

use futures::FutureExt;
use parking_lot::Mutex;
use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use super::decision::{ConfirmationDecision, ConfirmationRequest, ConfirmationStatus};
use super::providers::{BatchDecision, DecisionProvider, ProviderDecision};
use crate::config::ConfirmationConfig;
use crate::diff_engine::ChangeComplexity;

pub struct ConfirmationGate {
    config: ConfirmationConfig,
    provider: Arc<dyn DecisionProvider>,
    decisions: Mutex<HashMap<String, ConfirmationDecision>>,
}

impl ConfirmationGate {
    pub fn new(config: ConfirmationConfig, provider: Arc<dyn DecisionProvider>) -> Self {
        Self {
            config,
            provider,
            decisions: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &ConfirmationConfig {
        &self.config
    }

    /// Policy check: safe-mode on, complexity not high, every suggestion
    /// at or above the confidence threshold
    ///
    /// A result without suggestions is never auto-approved.
    pub fn is_auto_approvable(&self, request: &ConfirmationRequest) -> bool {
        if !self.config.auto_approve_safe {
            return false;
        }
        if request.diff.complexity.complexity == ChangeComplexity::High {
            return false;
        }
        match request.fix_result.min_confidence() {
            Some(min) => min >= self.config.min_auto_approve_confidence,
            None => false,
        }
    }

    /// Previously resolved decision for a fix
    pub fn get_decision(&self, fix_id: &str) -> Option<ConfirmationDecision> {
        self.decisions.lock().get(fix_id).cloned()
    }

    /// Resolve one fix; never fails
    ///
    /// A fix that already has a decision gets that decision back unchanged.
    pub async fn decide(&self, request: &ConfirmationRequest) -> ConfirmationDecision {
        if let Some(existing) = self.get_decision(&request.fix_id) {
            debug!(fix_id = %request.fix_id, status = %existing.status, "decision already resolved");
            return existing;
        }

        let started = Instant::now();

        if self.is_auto_approvable(request) {
            let mut decision = ConfirmationDecision::approved(&request.fix_id);
            decision.auto_approved = true;
            decision.message = Some(format!(
                "auto-approved: {} complexity, minimum confidence {:.2}",
                request.diff.complexity.complexity,
                request.fix_result.min_confidence().unwrap_or_default()
            ));
            decision.elapsed = started.elapsed();
            return self.record(decision);
        }

        let outcome = AssertUnwindSafe(self.provider.decide(request))
            .catch_unwind()
            .await;
        let mut decision = match outcome {
            Ok(Ok(answer)) => normalize(request, answer),
            Ok(Err(e)) => {
                warn!(fix_id = %request.fix_id, "decision provider failed: {:#}", e);
                ConfirmationDecision::cancelled(
                    &request.fix_id,
                    &format!("decision provider failed: {:#}", e),
                )
            }
            Err(panic) => {
                let msg = panic_message(panic.as_ref());
                warn!(fix_id = %request.fix_id, "decision provider panicked: {}", msg);
                ConfirmationDecision::cancelled(
                    &request.fix_id,
                    &format!("decision provider panicked: {}", msg),
                )
            }
        };
        decision.elapsed = started.elapsed();
        self.record(decision)
    }

    /// Resolve several fixes, possibly with one replicated answer
    ///
    /// Fixes that are already decided or auto-approvable are resolved on
    /// their own; the rest go to the provider's batch decision. Results keep
    /// the order of `requests`.
    pub async fn decide_batch(&self, requests: &[ConfirmationRequest]) -> Vec<ConfirmationDecision> {
        let needs_provider: Vec<ConfirmationRequest> = requests
            .iter()
            .filter(|r| self.get_decision(&r.fix_id).is_none() && !self.is_auto_approvable(r))
            .cloned()
            .collect();

        let started = Instant::now();
        let batch = if needs_provider.is_empty() {
            Ok(BatchDecision::Individually)
        } else {
            match AssertUnwindSafe(self.provider.decide_batch(&needs_provider))
                .catch_unwind()
                .await
            {
                Ok(Ok(batch)) => Ok(batch),
                Ok(Err(e)) => Err(format!("batch decision provider failed: {:#}", e)),
                Err(panic) => Err(format!(
                    "batch decision provider panicked: {}",
                    panic_message(panic.as_ref())
                )),
            }
        };
        debug!(pending = needs_provider.len(), ?batch, "batch decision");

        let mut decisions = Vec::with_capacity(requests.len());
        for request in requests {
            let replicated = needs_provider.iter().any(|r| r.fix_id == request.fix_id);
            let decision = match (&batch, replicated) {
                (Ok(BatchDecision::ApproveAll), true) => {
                    Some(ConfirmationDecision::approved(&request.fix_id))
                }
                (Ok(BatchDecision::RejectAll), true) => Some(ConfirmationDecision::rejected(
                    &request.fix_id,
                    "rejected for whole batch",
                )),
                (Ok(BatchDecision::Cancel), true) => Some(ConfirmationDecision::cancelled(
                    &request.fix_id,
                    "batch cancelled",
                )),
                (Err(msg), true) => Some(ConfirmationDecision::cancelled(&request.fix_id, msg)),
                _ => None,
            };

            match decision {
                Some(mut decision) => {
                    decision.elapsed = started.elapsed();
                    decisions.push(self.record(decision));
                }
                None => decisions.push(self.decide(request).await),
            }
        }
        decisions
    }

    fn record(&self, decision: ConfirmationDecision) -> ConfirmationDecision {
        let mut ledger = self.decisions.lock();
        // First resolution wins (a concurrent decide for the same fix)
        let stored = ledger
            .entry(decision.fix_id.clone())
            .or_insert(decision)
            .clone();
        info!(
            fix_id = %stored.fix_id,
            status = %stored.status,
            auto = stored.auto_approved,
            "confirmation resolved"
        );
        stored
    }
}

/// Turn a provider answer into a valid terminal decision
fn normalize(request: &ConfirmationRequest, answer: ProviderDecision) -> ConfirmationDecision {
    let fix_id = &request.fix_id;
    let mut decision = ConfirmationDecision::pending(fix_id);

    let (status, selected, message) = match answer.status {
        ConfirmationStatus::Pending => (
            ConfirmationStatus::Cancelled,
            Vec::new(),
            Some("decision provider returned no decision".to_string()),
        ),
        ConfirmationStatus::Partial => {
            let count = request.suggestion_count();
            let valid: Vec<usize> = answer
                .selected_indices
                .iter()
                .copied()
                .filter(|&i| i < count)
                .collect();
            if valid.len() < answer.selected_indices.len() {
                warn!(fix_id = %fix_id, "dropping out-of-range partial selections");
            }
            if valid.is_empty() {
                (
                    ConfirmationStatus::Rejected,
                    Vec::new(),
                    Some("partial selection was empty".to_string()),
                )
            } else {
                (ConfirmationStatus::Partial, valid, answer.message)
            }
        }
        status => (status, answer.selected_indices, answer.message),
    };

    // Fresh pending decision, resolve cannot fail
    let _ = decision.resolve(status, selected, message);
    decision
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
