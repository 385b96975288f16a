mod app;
pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod interfaces;
pub mod shared;

pub use app::run;
pub use application::{GenerationPipeline, PipelineSettings};
pub use domain::error::{AppError, Result};
pub use domain::requirement::PipelineRequest;
pub use domain::test_case::PipelineResult;
