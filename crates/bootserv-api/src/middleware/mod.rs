//! # Middleware

pub mod tracing_layer;
