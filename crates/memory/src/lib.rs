//! Persistence store implementations for weekforge.
//!
//! Both stores implement `weekforge_core::PersistenceStore`: [`FileStore`]
//! writes Markdown to disk, [`InMemoryStore`] keeps everything in process.

pub mod file_backend;
pub mod in_memory;

pub use file_backend::FileStore;
pub use in_memory::InMemoryStore;
