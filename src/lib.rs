//! Image Attribute Extraction Service
//!
//! This library provides the core of the attribute-extractor system: an
//! in-process extraction queue that sends product images to a vision model,
//! validates the answers against per-category controlled vocabularies, and
//! aggregates attributes the schema did not anticipate into promotable
//! discoveries.

pub mod app_state;
pub mod config;
pub mod models;
pub mod routes;
pub mod services;
