pub mod analytics;
pub mod discovery;
pub mod extractor;
pub mod pricing;
pub mod prompt;
pub mod scheduler;
pub mod validation;
pub mod vision;
