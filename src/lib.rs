#![forbid(unsafe_code)]

pub mod autosave;
pub mod cli;
pub mod codex;
pub mod config;
pub mod document;
pub mod edit;
pub mod export;
pub mod filter;
pub mod formats;
pub mod ipc;
pub mod llm;
pub mod logging;
pub mod migrate;
pub mod openai;
pub mod outline;
pub mod prompts;
pub mod reorder;
pub mod sse;
pub mod store;
pub mod storygen;
