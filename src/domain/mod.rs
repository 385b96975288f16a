pub mod error;
pub mod generation_session;
pub mod llm_config;
pub mod requirement;
pub mod test_case;
