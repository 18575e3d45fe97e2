//! The NestChat conversation pipeline.
//!
//! Four pieces, composed by the [`Orchestrator`]:
//! - [`prompt::compose`] — builds the system instruction from
//!   response mode and child age (pure, total).
//! - [`window::window`] — bounds the history forwarded upstream.
//! - [`safety`] — appends a safety reminder when a generated answer
//!   touches corporal-punishment / verbal-violence vocabulary.
//! - [`Orchestrator::converse`] — one LLM round trip per call, the
//!   reusable core operation behind both `/chat` and the context
//!   façade.

pub mod orchestrator;
pub mod prompt;
pub mod safety;
pub mod window;

pub use orchestrator::{AdvisorSettings, Orchestrator};
