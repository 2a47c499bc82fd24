pub mod backend;
pub mod commands;
pub mod completion;
pub mod config;
pub mod error;
pub mod favorites;
pub mod output;
pub mod player;
pub mod queue;
pub mod registry;
pub mod state;
pub mod track;
pub mod traits;
pub mod util;

#[cfg(test)]
pub(crate) mod testing;
