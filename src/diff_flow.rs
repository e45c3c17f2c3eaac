//! Selection of the activations to compare when diffing a function across
//! two trials.
//!
//! The flow is a small state machine:
//!
//! ```text
//! Idle ──modified click──▶ SelectionPending ──confirm──▶ RequestInFlight ──response──▶ Idle
//!   └──────────── (one activation per trial) ───────────────▲
//! ```
//!
//! It performs no I/O itself. Operations return [`DiffEvent`]s describing the
//! requests to send and the results to display; responses are fed back with
//! [`DiffFlow::on_response`] using the sequence number of the request, in any
//! order. Responses for requests that are no longer tracked (cancelled modal,
//! finished flow) are ignored.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{DiffError, FetchError};
use crate::model::{ActivationId, TrialId, TrialNodeData};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiffConfig {
    /// How long a comparison request may stay in flight.
    #[serde(with = "millis")]
    pub timeout: Duration,
    /// Base URL relative request paths are resolved against.
    pub base_url: Option<String>,
}

impl Default for DiffConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            base_url: None,
        }
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

/// The two activations being compared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompareRequest {
    pub pairs: Vec<(TrialId, ActivationId)>,
}

impl CompareRequest {
    pub fn path(&self) -> String {
        let mut path = String::from("commands/diff");
        for (trial, aid) in &self.pairs {
            path.push('/');
            path.push_str(trial);
            path.push('/');
            path.push_str(aid);
        }
        path
    }

    /// Window title for the comparison result.
    pub fn label(&self) -> String {
        let mut label = String::from("Diff");
        for (trial, aid) in &self.pairs {
            label.push_str(&format!(" trial {} activation_id {}", trial, aid));
        }
        label
    }
}

/// Request sent to the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendRequest {
    /// Parameter list of one candidate activation, used to label choices.
    FunctionArguments { trial: TrialId, activation: ActivationId },
    Compare(CompareRequest),
}

impl BackendRequest {
    pub fn path(&self) -> String {
        match self {
            BackendRequest::FunctionArguments { trial, activation } => {
                format!("/diff/getFunctionActivationArguments/{}/{}", trial, activation)
            }
            BackendRequest::Compare(c) => c.path(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DiffEvent {
    Send { seq: u64, request: BackendRequest },
    /// Comparison finished; hand the payload to the host.
    Display { payload: Value, label: String },
}

/// A selectable activation in the modal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivationOption {
    pub activation: ActivationId,
    pub label: String,
}

/// Choices for one of the two compared trials.
#[derive(Debug, Clone, PartialEq)]
pub struct TrialChoice {
    pub trial: TrialId,
    pub candidates: Vec<ActivationId>,
    /// Options whose argument lookup succeeded, in candidate order.
    pub options: Vec<ActivationOption>,
    pub selected: Option<ActivationId>,
    /// Candidates whose argument lookup failed.
    pub failed: Vec<(ActivationId, FetchError)>,
}

impl TrialChoice {
    fn new(trial: TrialId, candidates: Vec<ActivationId>) -> Self {
        Self {
            trial,
            candidates,
            options: Vec::new(),
            selected: None,
            failed: Vec::new(),
        }
    }

    fn add_option(&mut self, option: ActivationOption) {
        let rank = |a: &ActivationId| self.candidates.iter().position(|c| c == a);
        let my_rank = rank(&option.activation);
        let at = self
            .options
            .iter()
            .position(|o| rank(&o.activation) > my_rank)
            .unwrap_or(self.options.len());
        self.options.insert(at, option);
        // Like a native select: the first option is selected by default.
        if self.selected.is_none() {
            self.selected = self.options.first().map(|o| o.activation.clone());
        }
    }

    /// Whether every candidate has either an option or a failure.
    pub fn is_complete(&self) -> bool {
        self.options.len() + self.failed.len() >= self.candidates.len()
    }
}

/// Content of the "select a function activation" modal.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionModal {
    pub choices: Vec<TrialChoice>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InFlight {
    pub seq: u64,
    pub request: CompareRequest,
    pub label: String,
    pub issued_at: Instant,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum DiffState {
    #[default]
    Idle,
    SelectionPending(SelectionModal),
    RequestInFlight(InFlight),
}

#[derive(Debug, Clone, PartialEq)]
enum Pending {
    Arguments { slot: usize, activation: ActivationId },
    Compare,
}

#[derive(Debug, Default)]
pub struct DiffFlow {
    config: DiffConfig,
    state: DiffState,
    next_seq: u64,
    pending: HashMap<u64, Pending>,
    notice: Option<DiffError>,
}

/// JavaScript-style `Array.prototype.toString` of the parameter list.
fn join_params(params: &[Value]) -> String {
    params
        .iter()
        .map(|v| match v {
            Value::String(s) => s.clone(),
            Value::Null => String::new(),
            Value::Array(a) => join_params(a),
            other => other.to_string(),
        })
        .collect::<Vec<_>>()
        .join(",")
}

impl DiffFlow {
    pub fn new(config: DiffConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    pub fn state(&self) -> &DiffState {
        &self.state
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.state, DiffState::Idle)
    }

    pub fn modal(&self) -> Option<&SelectionModal> {
        match &self.state {
            DiffState::SelectionPending(m) => Some(m),
            _ => None,
        }
    }

    /// Last failure, if any, for the host to surface.
    pub fn notice(&self) -> Option<&DiffError> {
        self.notice.as_ref()
    }

    pub fn take_notice(&mut self) -> Option<DiffError> {
        self.notice.take()
    }

    /// Number of requests still awaiting a response.
    pub fn outstanding(&self) -> usize {
        self.pending.len()
    }

    fn issue(&mut self, pending: Pending, request: BackendRequest) -> (u64, DiffEvent) {
        self.next_seq += 1;
        let seq = self.next_seq;
        debug!(seq, path = %request.path(), "diff request issued");
        self.pending.insert(seq, pending);
        (seq, DiffEvent::Send { seq, request })
    }

    /// Whether a modified click on `node` can start a comparison.
    pub fn is_comparable(node: &TrialNodeData) -> bool {
        node.trial_ids.len() >= 2
            && node.trial_ids[..2]
                .iter()
                .all(|t| node.activations.get(t).is_some_and(|a| !a.is_empty()))
    }

    /// Begin a comparison for `node`. Opens the modal when either trial has
    /// several activations, otherwise issues the comparison right away.
    pub fn start(&mut self, node: &TrialNodeData, now: Instant) -> Result<Vec<DiffEvent>, DiffError> {
        if !self.is_idle() {
            return Err(DiffError::Busy);
        }
        if !Self::is_comparable(node) {
            return Err(DiffError::NotComparable);
        }
        self.notice = None;
        let trials: Vec<(TrialId, Vec<ActivationId>)> = node.trial_ids[..2]
            .iter()
            .map(|t| (t.clone(), node.activations.get(t).cloned().unwrap_or_default()))
            .collect();

        if trials.iter().all(|(_, a)| a.len() == 1) {
            let request = CompareRequest {
                pairs: trials.into_iter().map(|(t, a)| (t, a[0].clone())).collect(),
            };
            return Ok(vec![self.begin_compare(request, now)]);
        }

        info!(node = node.index, "opening activation selection");
        let mut events = Vec::new();
        let mut choices = Vec::new();
        for (slot, (trial, candidates)) in trials.into_iter().enumerate() {
            for activation in &candidates {
                let (_, event) = self.issue(
                    Pending::Arguments {
                        slot,
                        activation: activation.clone(),
                    },
                    BackendRequest::FunctionArguments {
                        trial: trial.clone(),
                        activation: activation.clone(),
                    },
                );
                events.push(event);
            }
            choices.push(TrialChoice::new(trial, candidates));
        }
        self.state = DiffState::SelectionPending(SelectionModal { choices });
        Ok(events)
    }

    fn begin_compare(&mut self, request: CompareRequest, now: Instant) -> DiffEvent {
        let label = request.label();
        info!(%label, "comparison requested");
        let (seq, event) = self.issue(Pending::Compare, BackendRequest::Compare(request.clone()));
        self.state = DiffState::RequestInFlight(InFlight {
            seq,
            request,
            label,
            issued_at: now,
        });
        event
    }

    /// Change the selected activation of the trial in `slot`.
    pub fn select(&mut self, slot: usize, activation: &str) -> Result<(), DiffError> {
        let DiffState::SelectionPending(modal) = &mut self.state else {
            return Err(DiffError::NotComparable);
        };
        let choice = modal.choices.get_mut(slot).ok_or(DiffError::NotComparable)?;
        if !choice.candidates.iter().any(|c| c == activation) {
            return Err(DiffError::UnknownActivation {
                trial: choice.trial.clone(),
                activation: activation.to_string(),
            });
        }
        choice.selected = Some(activation.to_string());
        Ok(())
    }

    /// Close the modal and issue the comparison of the selected activations.
    pub fn confirm(&mut self, now: Instant) -> Result<Vec<DiffEvent>, DiffError> {
        let DiffState::SelectionPending(modal) = &self.state else {
            return Err(DiffError::NotComparable);
        };
        let mut pairs = Vec::with_capacity(modal.choices.len());
        for choice in &modal.choices {
            let aid = choice
                .selected
                .clone()
                .ok_or_else(|| DiffError::NoSelection(choice.trial.clone()))?;
            pairs.push((choice.trial.clone(), aid));
        }
        // Argument lookups still outstanding are of no further use.
        self.pending.clear();
        Ok(vec![self.begin_compare(CompareRequest { pairs }, now)])
    }

    /// Dismiss the modal (or abandon an in-flight comparison).
    pub fn cancel(&mut self) {
        if !self.is_idle() {
            debug!(outstanding = self.pending.len(), "diff flow cancelled");
        }
        self.pending.clear();
        self.state = DiffState::Idle;
    }

    /// Feed the outcome of request `seq`.
    pub fn on_response(&mut self, seq: u64, result: Result<Value, FetchError>) -> Vec<DiffEvent> {
        let Some(pending) = self.pending.remove(&seq) else {
            debug!(seq, "ignoring response for untracked request");
            return Vec::new();
        };
        match pending {
            Pending::Arguments { slot, activation } => {
                let DiffState::SelectionPending(modal) = &mut self.state else {
                    return Vec::new();
                };
                let Some(choice) = modal.choices.get_mut(slot) else {
                    return Vec::new();
                };
                let params = result.and_then(|json| match json.get("function_params") {
                    Some(Value::Array(p)) => Ok(p.clone()),
                    _ => Err(FetchError::Body("missing function_params".into())),
                });
                match params {
                    Ok(params) => {
                        let label = format!("{} params: {}", activation, join_params(&params));
                        choice.add_option(ActivationOption { activation, label });
                    }
                    Err(err) => {
                        warn!(%activation, trial = %choice.trial, error = %err, "argument lookup failed");
                        self.notice = Some(DiffError::Fetch(err.clone()));
                        choice.failed.push((activation, err));
                    }
                }
                Vec::new()
            }
            Pending::Compare => {
                let state = std::mem::take(&mut self.state);
                let DiffState::RequestInFlight(flight) = state else {
                    self.state = state;
                    return Vec::new();
                };
                match result {
                    Ok(payload) => {
                        info!(label = %flight.label, "comparison received");
                        vec![DiffEvent::Display {
                            payload,
                            label: flight.label,
                        }]
                    }
                    Err(err) => {
                        warn!(label = %flight.label, error = %err, "comparison failed");
                        self.notice = Some(DiffError::Fetch(err));
                        Vec::new()
                    }
                }
            }
        }
    }

    /// Abandon a comparison that has been in flight longer than the timeout.
    /// Returns `true` when the flow timed out.
    pub fn tick(&mut self, now: Instant) -> bool {
        let DiffState::RequestInFlight(flight) = &self.state else {
            return false;
        };
        if now.saturating_duration_since(flight.issued_at) < self.config.timeout {
            return false;
        }
        warn!(label = %flight.label, "comparison timed out");
        self.pending.remove(&flight.seq);
        self.state = DiffState::Idle;
        self.notice = Some(DiffError::Timeout);
        true
    }
}
