// Server-hosted editing sessions with debounced autosave.

pub mod autosave;
pub mod handlers;
pub mod session;
