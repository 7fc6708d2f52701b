//! Collaborator seams for the model backend and the directive store.
//!
//! The council core never talks to a provider directly. It issues
//! [`ModelRequest`]s through the [`ModelCall`] trait and resolves agent
//! styles to prompt directives through [`DirectiveSource`]. Both seams are
//! synchronous and may fail with any error; the core catches failures at the
//! smallest enclosing boundary and degrades instead of propagating.
//!
//! [`ScriptedModel`] is the deterministic in-crate implementation of both
//! seams, used by the test suite and for offline development.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, bail};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Which prompt family a model call belongs to.
///
/// The implementation behind [`ModelCall`] owns the actual prompt text for
/// each kind; the core only names the family it needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptKind {
    /// Assess one content slice: claim, evidence, confidence, severity.
    Assessment,
    /// Decompose a content slice into sub-topic strings.
    Decomposition,
    /// Review all agents' trees and propose adjustments plus a score.
    Arbitration,
}

impl std::fmt::Display for PromptKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Assessment => write!(f, "assessment"),
            Self::Decomposition => write!(f, "decomposition"),
            Self::Arbitration => write!(f, "arbitration"),
        }
    }
}

/// A single request to the model backend.
#[derive(Debug, Clone, Serialize)]
pub struct ModelRequest<'a> {
    /// Prompt family to run.
    pub kind: PromptKind,
    /// Context object the prompt is rendered against.
    pub context: &'a Value,
    /// Whether the reply must be schema-shaped JSON.
    pub structured: bool,
}

impl<'a> ModelRequest<'a> {
    /// A request expecting schema-shaped JSON back.
    pub fn structured(kind: PromptKind, context: &'a Value) -> Self {
        Self {
            kind,
            context,
            structured: true,
        }
    }

    /// A request with no output-shape requirement.
    pub fn freeform(kind: PromptKind, context: &'a Value) -> Self {
        Self {
            kind,
            context,
            structured: false,
        }
    }
}

/// Reply from the model backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelReply {
    /// Parsed payload. Shape depends on the prompt kind.
    pub payload: Value,
    /// Identifier of the model that produced the reply.
    pub model: String,
}

/// Synchronous model backend seam.
///
/// Provider configuration (endpoints, credentials, retries, timeouts) is
/// constructor-injected into implementations, never passed per call.
pub trait ModelCall {
    /// Run one model call. Blocks until the reply is available or the call
    /// fails.
    fn call(&self, request: ModelRequest<'_>) -> anyhow::Result<ModelReply>;
}

/// Resolves an agent style to its style directives.
///
/// Directive text ownership stays outside the core; a resolution failure is
/// surfaced as that agent's error, not a run failure.
pub trait DirectiveSource {
    /// Directive text for the given agent style.
    fn directives_for(&self, style: &str) -> anyhow::Result<String>;
}

enum ScriptedReply {
    Payload(Value),
    Failure(String),
}

/// Deterministic scripted backend implementing both collaborator seams.
///
/// Replies are FIFO queues per [`PromptKind`] with an optional fall-through
/// default per kind; failures can be injected per call and per directive
/// style. Clones share state, so a test can keep a handle for assertions
/// while the orchestrator owns its own.
#[derive(Clone, Default)]
pub struct ScriptedModel {
    queues: Arc<Mutex<HashMap<PromptKind, VecDeque<ScriptedReply>>>>,
    defaults: Arc<Mutex<HashMap<PromptKind, Value>>>,
    calls: Arc<Mutex<HashMap<PromptKind, usize>>>,
    contexts: Arc<Mutex<HashMap<PromptKind, Vec<Value>>>>,
    directives: Arc<Mutex<HashMap<String, String>>>,
    failing_styles: Arc<Mutex<HashSet<String>>>,
}

impl ScriptedModel {
    /// An empty script: every call fails until replies or defaults are set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue one reply payload for the given prompt kind.
    pub fn push_reply(&self, kind: PromptKind, payload: Value) {
        self.queues
            .lock()
            .unwrap()
            .entry(kind)
            .or_default()
            .push_back(ScriptedReply::Payload(payload));
    }

    /// Queue one failing call for the given prompt kind.
    pub fn push_failure(&self, kind: PromptKind, message: &str) {
        self.queues
            .lock()
            .unwrap()
            .entry(kind)
            .or_default()
            .push_back(ScriptedReply::Failure(message.to_string()));
    }

    /// Set the fall-through payload returned once the queue for `kind` is
    /// exhausted.
    pub fn set_default(&self, kind: PromptKind, payload: Value) {
        self.defaults.lock().unwrap().insert(kind, payload);
    }

    /// Number of calls made for the given prompt kind.
    pub fn calls(&self, kind: PromptKind) -> usize {
        *self.calls.lock().unwrap().get(&kind).unwrap_or(&0)
    }

    /// Context objects received for the given prompt kind, in call order.
    pub fn recorded_contexts(&self, kind: PromptKind) -> Vec<Value> {
        self.contexts
            .lock()
            .unwrap()
            .get(&kind)
            .cloned()
            .unwrap_or_default()
    }

    /// Set the directive text for an agent style.
    pub fn set_directive(&self, style: &str, text: &str) {
        self.directives
            .lock()
            .unwrap()
            .insert(style.to_string(), text.to_string());
    }

    /// Make directive resolution fail for the given style.
    pub fn fail_directives_for(&self, style: &str) {
        self.failing_styles
            .lock()
            .unwrap()
            .insert(style.to_string());
    }
}

impl ModelCall for ScriptedModel {
    fn call(&self, request: ModelRequest<'_>) -> anyhow::Result<ModelReply> {
        *self
            .calls
            .lock()
            .unwrap()
            .entry(request.kind)
            .or_insert(0) += 1;
        self.contexts
            .lock()
            .unwrap()
            .entry(request.kind)
            .or_default()
            .push(request.context.clone());

        let next = self
            .queues
            .lock()
            .unwrap()
            .get_mut(&request.kind)
            .and_then(|queue| queue.pop_front());

        let payload = match next {
            Some(ScriptedReply::Payload(payload)) => payload,
            Some(ScriptedReply::Failure(message)) => return Err(anyhow!(message)),
            None => match self.defaults.lock().unwrap().get(&request.kind) {
                Some(payload) => payload.clone(),
                None => bail!("no scripted reply queued for {} call", request.kind),
            },
        };

        Ok(ModelReply {
            payload,
            model: "scripted".to_string(),
        })
    }
}

impl DirectiveSource for ScriptedModel {
    fn directives_for(&self, style: &str) -> anyhow::Result<String> {
        if self.failing_styles.lock().unwrap().contains(style) {
            bail!("no directives available for style '{}'", style);
        }
        if let Some(text) = self.directives.lock().unwrap().get(style) {
            return Ok(text.clone());
        }
        Ok(format!("Critique the content in the manner of a {}.", style))
    }
}
