pub mod completion;
pub mod embedding_service;
pub mod example_library;
pub mod generate_testcases;
pub mod generation_pipeline;
pub mod normalizer;
pub mod output_parser;
pub mod prompt_builder;
pub mod retrieval_store;
pub mod review_stage;
pub mod text_extraction;
