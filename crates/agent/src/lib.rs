//! Chat orchestration for the Soberly recovery companion.
//!
//! One request flows through:
//! 1. **Sanitizer** (`sanitize`) - strips prompt-injection markers and bounds length
//! 2. **Gate** (`gate`) - decides from the raw message whether write tools are offered
//! 3. **Loop** (`runtime`) - calls the model, runs requested tools, repeats up to a cap
//! 4. **Observability** (`observability`) - one append-only record per request
//!
//! The model never touches the store directly. Every tool call is validated
//! against the active tool set and scoped to the authenticated user before a
//! handler runs.

pub mod gate;
pub mod llm;
pub mod observability;
pub mod prompt;
pub mod runtime;
pub mod sanitize;
pub mod tools;

pub use gate::{GateClassifier, GateDecision, HeuristicGate, ReadOnlyGate};
pub use llm::{CompletionClient, LlmError, OpenAiCompatibleClient};
pub use runtime::{
    ChatError, ChatOutcome, ChatRequest, ChatRuntime, ChatSettings, HistoryTurn, Termination,
};
pub use sanitize::Sanitizer;
