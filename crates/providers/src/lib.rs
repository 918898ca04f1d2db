//! Text generator implementations for weekforge.
//!
//! All generators implement the `weekforge_core::TextGenerator` trait.
//! [`build_generator`] selects the backend from configuration and wraps it
//! in bounded retries.

pub mod openai_compat;
pub mod retry;
pub mod router;

pub use openai_compat::OpenAiCompatGenerator;
pub use retry::RetryingGenerator;
pub use router::build_generator;
