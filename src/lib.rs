//! svg-relay — prompt-to-SVG HTTP relay over a generative-language API.

pub mod config;
pub mod error;
pub mod llm;
pub mod logger;
pub mod relay;
pub mod server;
