//! Decision providers
//!
//! A provider is asked only when the gate's auto-approval policy does not
//! apply. Errors and panics from a provider become `Cancelled` in the gate.
//! Blocking providers (callbacks, terminal prompts) run on tokio's blocking
//! pool so files of a parallel batch are confirmed concurrently.

use anyhow::{anyhow, bail};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::io::{BufRead, Write};
use std::sync::Arc;

use super::decision::{ConfirmationRequest, ConfirmationStatus};
use super::tokens::{
    format_prompt, format_suggestions, parse_batch_token, parse_selection, parse_token,
    BatchToken, ConfirmationToken,
};
use crate::diff_engine::unified_diff;

/// A provider's answer for one fix
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderDecision {
    pub status: ConfirmationStatus,
    pub selected_indices: Vec<usize>,
    pub message: Option<String>,
}

impl ProviderDecision {
    pub fn approve() -> Self {
        Self::with_status(ConfirmationStatus::Approved)
    }

    pub fn reject() -> Self {
        Self::with_status(ConfirmationStatus::Rejected)
    }

    pub fn cancel() -> Self {
        Self::with_status(ConfirmationStatus::Cancelled)
    }

    pub fn partial(selected_indices: Vec<usize>) -> Self {
        Self {
            status: ConfirmationStatus::Partial,
            selected_indices,
            message: None,
        }
    }

    pub fn with_message(mut self, message: &str) -> Self {
        self.message = Some(message.to_string());
        self
    }

    fn with_status(status: ConfirmationStatus) -> Self {
        Self {
            status,
            selected_indices: Vec::new(),
            message: None,
        }
    }
}

/// One answer replicated across a whole batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchDecision {
    ApproveAll,
    RejectAll,
    /// Ask per fix
    Individually,
    Cancel,
}

/// Run blocking decision work off the async worker
///
/// A panic inside `f` is resumed here so the gate still sees it.
async fn run_blocking<T, F>(f: F) -> anyhow::Result<T>
where
    F: FnOnce() -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(outcome) => outcome,
        Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
        Err(e) => Err(anyhow!("decision task failed: {}", e)),
    }
}

/// Source of confirmation decisions (human, callback, script)
#[async_trait]
pub trait DecisionProvider: Send + Sync {
    async fn decide(&self, request: &ConfirmationRequest) -> anyhow::Result<ProviderDecision>;

    /// Decide for several fixes at once; defaults to asking per fix
    async fn decide_batch(
        &self,
        _requests: &[ConfirmationRequest],
    ) -> anyhow::Result<BatchDecision> {
        Ok(BatchDecision::Individually)
    }
}

/// Fixed answer (tests and `--yes`)
#[derive(Debug, Clone)]
pub struct AutoDecision {
    pub decision: ProviderDecision,
    pub batch: BatchDecision,
}

impl AutoDecision {
    pub fn approve() -> Self {
        Self {
            decision: ProviderDecision::approve(),
            batch: BatchDecision::ApproveAll,
        }
    }

    pub fn reject() -> Self {
        Self {
            decision: ProviderDecision::reject(),
            batch: BatchDecision::RejectAll,
        }
    }
}

#[async_trait]
impl DecisionProvider for AutoDecision {
    async fn decide(&self, _request: &ConfirmationRequest) -> anyhow::Result<ProviderDecision> {
        Ok(self.decision.clone())
    }

    async fn decide_batch(
        &self,
        _requests: &[ConfirmationRequest],
    ) -> anyhow::Result<BatchDecision> {
        Ok(self.batch)
    }
}

/// Programmatic callback, run on the blocking pool
pub struct CallbackProvider<F>
where
    F: Fn(&ConfirmationRequest) -> anyhow::Result<ProviderDecision> + Send + Sync + 'static,
{
    callback: Arc<F>,
}

impl<F> CallbackProvider<F>
where
    F: Fn(&ConfirmationRequest) -> anyhow::Result<ProviderDecision> + Send + Sync + 'static,
{
    pub fn new(callback: F) -> Self {
        Self {
            callback: Arc::new(callback),
        }
    }
}

#[async_trait]
impl<F> DecisionProvider for CallbackProvider<F>
where
    F: Fn(&ConfirmationRequest) -> anyhow::Result<ProviderDecision> + Send + Sync + 'static,
{
    async fn decide(&self, request: &ConfirmationRequest) -> anyhow::Result<ProviderDecision> {
        let callback = Arc::clone(&self.callback);
        let request = request.clone();
        run_blocking(move || callback(&request)).await
    }
}

/// Queue of canned answers; records which fixes it was asked about
#[derive(Debug, Default)]
pub struct ScriptedProvider {
    decisions: Mutex<VecDeque<ProviderDecision>>,
    batch_decisions: Mutex<VecDeque<BatchDecision>>,
    asked: Mutex<Vec<String>>,
    asked_batches: Mutex<Vec<Vec<String>>>,
}

impl ScriptedProvider {
    pub fn new(decisions: Vec<ProviderDecision>) -> Self {
        Self {
            decisions: Mutex::new(decisions.into()),
            ..Default::default()
        }
    }

    pub fn with_batch(self, batch: Vec<BatchDecision>) -> Self {
        *self.batch_decisions.lock() = batch.into();
        self
    }

    /// fix_ids passed to `decide`, in call order
    pub fn asked(&self) -> Vec<String> {
        self.asked.lock().clone()
    }

    /// fix_ids of each `decide_batch` call, in call order
    pub fn asked_batches(&self) -> Vec<Vec<String>> {
        self.asked_batches.lock().clone()
    }
}

#[async_trait]
impl DecisionProvider for ScriptedProvider {
    async fn decide(&self, request: &ConfirmationRequest) -> anyhow::Result<ProviderDecision> {
        self.asked.lock().push(request.fix_id.clone());
        self.decisions
            .lock()
            .pop_front()
            .ok_or_else(|| anyhow!("no scripted decision left for {}", request.fix_id))
    }

    async fn decide_batch(
        &self,
        requests: &[ConfirmationRequest],
    ) -> anyhow::Result<BatchDecision> {
        self.asked_batches
            .lock()
            .push(requests.iter().map(|r| r.fix_id.clone()).collect());
        Ok(self
            .batch_decisions
            .lock()
            .pop_front()
            .unwrap_or(BatchDecision::Individually))
    }
}

/// Line-oriented prompt over any reader/writer pair (stdin/stdout in the CLI)
///
/// Prompts are serialized on the shared reader/writer.
pub struct InteractiveProvider<R, W> {
    io: Arc<Mutex<(R, W)>>,
}

impl<R, W> InteractiveProvider<R, W>
where
    R: BufRead + Send + 'static,
    W: Write + Send + 'static,
{
    pub fn new(input: R, output: W) -> Self {
        Self {
            io: Arc::new(Mutex::new((input, output))),
        }
    }

    /// Recover the reader/writer (tests inspect the output)
    ///
    /// `None` while a prompt is still in flight.
    pub fn into_inner(self) -> Option<(R, W)> {
        Arc::try_unwrap(self.io).ok().map(Mutex::into_inner)
    }
}

fn ask<R: BufRead, W: Write>(
    io: &Mutex<(R, W)>,
    request: &ConfirmationRequest,
) -> anyhow::Result<ProviderDecision> {
    let mut io = io.lock();
    let (input, output) = &mut *io;

    loop {
        write!(output, "{}", format_prompt(request))?;
        output.flush()?;
        let answer = read_answer(input)?;

        match parse_token(&answer) {
            Some(ConfirmationToken::Approve) => return Ok(ProviderDecision::approve()),
            Some(ConfirmationToken::Reject) => {
                return Ok(ProviderDecision::reject().with_message("rejected by user"))
            }
            Some(ConfirmationToken::Quit) => {
                return Ok(ProviderDecision::cancel().with_message("quit by user"))
            }
            Some(ConfirmationToken::Details) => {
                write_details(output, request)?;
            }
            Some(ConfirmationToken::Partial) => {
                write!(output, "{}", format_suggestions(request))?;
                write!(output, "Select fixes (e.g. 1,3-4): ")?;
                output.flush()?;
                let selection = read_answer(input)?;
                match parse_selection(&selection, request.suggestion_count()) {
                    Ok(indices) => return Ok(ProviderDecision::partial(indices)),
                    Err(e) => writeln!(output, "Invalid selection: {}", e)?,
                }
            }
            None => writeln!(output, "Unrecognised answer: {}", answer.trim())?,
        }
    }
}

fn ask_batch<R: BufRead, W: Write>(
    io: &Mutex<(R, W)>,
    requests: &[ConfirmationRequest],
) -> anyhow::Result<BatchDecision> {
    let mut io = io.lock();
    let (input, output) = &mut *io;

    loop {
        writeln!(output, "{} files have fixes ready:", requests.len())?;
        for request in requests {
            writeln!(
                output,
                "  {} - {}",
                request.file_path.display(),
                request.diff.summary
            )?;
        }
        write!(
            output,
            "  [a=approve all, r=reject all, i=individually, d=details, q=quit] "
        )?;
        output.flush()?;
        let answer = read_answer(input)?;

        match parse_batch_token(&answer) {
            Some(BatchToken::ApproveAll) => return Ok(BatchDecision::ApproveAll),
            Some(BatchToken::RejectAll) => return Ok(BatchDecision::RejectAll),
            Some(BatchToken::Individually) => return Ok(BatchDecision::Individually),
            Some(BatchToken::Quit) => return Ok(BatchDecision::Cancel),
            Some(BatchToken::Details) => {
                for request in requests {
                    write_details(output, request)?;
                }
            }
            None => writeln!(output, "Unrecognised answer: {}", answer.trim())?,
        }
    }
}

fn read_answer<R: BufRead>(input: &mut R) -> anyhow::Result<String> {
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        bail!("input closed before a decision was made");
    }
    Ok(line)
}

fn write_details<W: Write>(output: &mut W, request: &ConfirmationRequest) -> anyhow::Result<()> {
    writeln!(output)?;
    write!(output, "{}", unified_diff(&request.diff, 3))?;
    write!(output, "{}", format_suggestions(request))?;
    writeln!(output)?;
    Ok(())
}

#[async_trait]
impl<R, W> DecisionProvider for InteractiveProvider<R, W>
where
    R: BufRead + Send + 'static,
    W: Write + Send + 'static,
{
    async fn decide(&self, request: &ConfirmationRequest) -> anyhow::Result<ProviderDecision> {
        let io = Arc::clone(&self.io);
        let request = request.clone();
        run_blocking(move || ask(&io, &request)).await
    }

    async fn decide_batch(
        &self,
        requests: &[ConfirmationRequest],
    ) -> anyhow::Result<BatchDecision> {
        let io = Arc::clone(&self.io);
        let requests = requests.to_vec();
        run_blocking(move || ask_batch(&io, &requests)).await
    }
}
