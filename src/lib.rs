//! Plant disease recognition service.
//!
//! Accepts leaf photos over HTTP, classifies them with a frozen TensorFlow
//! model and answers with the disease label and confidence.

pub mod api;
pub mod config;
pub mod labels;
pub mod metadata;
pub mod model;
pub mod pipeline;
pub mod utils;
