//! HTTP helpers for JWKS retrieval.

pub mod client;
