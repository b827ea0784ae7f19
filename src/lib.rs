pub mod alignment;
pub mod census;
pub mod config;
pub mod error;
pub mod family;
pub mod fusion;
pub mod genome;
pub mod parser;
pub mod record;
pub mod registry;
pub mod taxonomy;
pub mod terminal;
pub mod utils;
pub mod workspace;
