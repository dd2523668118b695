//! Database connectors and utilities.
//!
//! Only MongoDB is supported: the events service keeps its records in a single
//! MongoDB collection and relies on the server's text index for search.
//!
//! # Features
//!
//! - `mongodb` (default) - MongoDB connector, configuration and health check
//! - `config` - `core_config::FromEnv` support for [`mongodb::MongoConfig`]
//!
//! # Example
//!
//! ```ignore
//! use database::mongodb::{MongoConfig, connect_from_config_with_retry};
//!
//! let config = MongoConfig::with_database("mongodb://localhost:27017", "college_events");
//! let client = connect_from_config_with_retry(&config, None).await?;
//! let db = client.database(config.database());
//! ```

pub mod common;

#[cfg(feature = "mongodb")]
pub mod mongodb;

pub use common::{RetryConfig, retry, retry_with_backoff};
