pub mod api;
pub mod discovery;
pub mod extraction;
pub mod job;
pub mod schema;
