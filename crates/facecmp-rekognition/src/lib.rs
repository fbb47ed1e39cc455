//! facecmp-rekognition: AWS Rekognition as a face-comparison provider.
//!
//! Talks to the `CompareFaces` action over its JSON protocol, signing each
//! attempt with SigV4. Retrying throttled or failed calls happens here, so
//! the orchestrator above never retries.

pub mod client;
pub mod config;
pub mod sigv4;

pub use client::{RekognitionClient, RekognitionError};
pub use config::{Credentials, RekognitionConfig};
