pub mod backend;
pub mod client;
pub mod normalize;
pub mod pipeline;
pub mod prompt;
pub mod validate;

pub use backend::{BackendError, GenerationParams, TextGenerator};
pub use client::GeminiClient;
pub use normalize::NormalizationPolicy;
pub use pipeline::{ErrorKind, ErrorResult, NormalizedResponse, PipelineError, QueryPipeline};
pub use prompt::{ExemplarTurn, PromptEnvelope, PromptTemplate};
pub use validate::{Question, QuestionValidator, ValidationError};
