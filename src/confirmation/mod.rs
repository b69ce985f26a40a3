//! Confirmation gate: approve/reject/partial decisions before mutation
//!
//! Provides:
//! - ConfirmationGate: auto-approval policy, provider delegation, one
//!   terminal decision per fix_id
//! - DecisionProvider: pluggable source of decisions (interactive,
//!   callback, scripted, fixed)
//! - Answer tokens for the interactive surface

mod decision;
mod gate;
mod providers;
mod tokens;

pub use decision::{
    ConfirmationDecision, ConfirmationRequest, ConfirmationStatus, DecisionError,
};
pub use gate::ConfirmationGate;
pub use providers::{
    AutoDecision, BatchDecision, CallbackProvider, DecisionProvider, InteractiveProvider,
    ProviderDecision, ScriptedProvider,
};
pub use tokens::{
    format_prompt, format_suggestions, parse_batch_token, parse_selection, parse_token,
    BatchToken, ConfirmationToken, SelectionError,
};
