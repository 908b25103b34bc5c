//! Virtual interviewer: turn orchestration, feedback and their HTTP handlers.

pub mod feedback;
pub mod handlers;
pub mod orchestrator;
pub mod prompts;
