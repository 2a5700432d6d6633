pub mod config;
pub mod env;
pub mod error;
pub mod executor;
pub mod importer;
pub mod model;
pub mod store;
