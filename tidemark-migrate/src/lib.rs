//! Tidemark Migration Library
//!
//! Helpers behind the `tidemark-migrate` CLI. The binary (main.rs) only parses
//! arguments and prints.

pub mod generate;
pub mod settings;
