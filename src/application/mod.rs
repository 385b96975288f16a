pub mod use_cases;

pub use use_cases::generate_testcases::{GenerateOutcome, GenerateTestCasesUseCase};
pub use use_cases::generation_pipeline::{GenerationPipeline, PipelineSettings};
