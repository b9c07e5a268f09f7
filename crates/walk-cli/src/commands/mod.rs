//! CLI subcommand implementations.

pub mod history;
pub mod replay;
pub mod status;
pub mod track;
