//! Cache state for remotely fetched key sets.

pub mod entry;
pub mod state;
