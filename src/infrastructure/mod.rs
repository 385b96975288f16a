#[path = "config/mod.rs"]
pub mod config_mod;
pub use config_mod as config;
pub mod bootstrap;
pub mod export;
pub mod llm_clients;
pub mod response;
pub mod security;
pub mod seed;
pub mod session_store;
pub mod storage;
