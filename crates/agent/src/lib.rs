//! Conversational runtime for fieldrep - turns free-text utterances into
//! structured record updates.
//!
//! The per-turn loop is deliberately constrained:
//! 1. **Intent routing** (`router`) - a deterministic classifier picks one of
//!    five tool intents; ambiguity falls back to log/edit, never to an error.
//! 2. **Tool execution** (`tools`) - the selected tool calls the extraction
//!    oracle and proposes a sparse [`fieldrep_core::RecordPatch`] plus an
//!    acknowledgment.
//! 3. **Merge** - `fieldrep-core`'s merge engine folds the patch in under the
//!    tool's declared field authority.
//! 4. **Composition** (`compose`) - the acknowledgment and changeset become
//!    the chat reply.
//!
//! The LLM is strictly an extraction oracle. It never decides which fields a
//! tool may write; authority enforcement is deterministic and lives in the
//! merge engine.

pub mod compose;
pub mod llm;
pub mod router;
pub mod runtime;
pub mod session;
pub mod tools;

pub use llm::{GroqClient, LlmClient, LlmError, ScriptedLlm, UnconfiguredLlm};
pub use router::{Intent, IntentRouter};
pub use runtime::{AgentRuntime, TurnError, TurnOutcome};
pub use session::{Role, Session, SessionStore, Turn, HISTORY_WINDOW};
