//! facecmp-core: Face comparison request pipeline.
//!
//! Validates two uploaded images, hands them to a remote face-comparison
//! provider, and normalizes the provider's answer into a stable response
//! shape. The provider itself is abstracted behind [`FaceComparisonProvider`].

pub mod error;
pub mod normalizer;
pub mod orchestrator;
pub mod pipeline;
pub mod provider;
pub mod types;
pub mod validator;

pub use error::{ErrorClass, PipelineError};
pub use normalizer::normalize;
pub use orchestrator::Comparer;
pub use pipeline::ComparisonPipeline;
pub use provider::{FaceComparisonProvider, ProviderError};
pub use types::{
    ComparisonRequest, ComparisonResult, FaceMatch, ImagePayload, RawProviderResult,
    ResponseMetadata, DEFAULT_SIMILARITY_THRESHOLD,
};
pub use validator::{parse_threshold, validate, UploadedFile, ValidationLimits};
