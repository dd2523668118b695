//! Shared application state passed to route builders.

use domain_events::LocalBlobStore;
use mongodb::{Client, Database};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: crate::config::Config,
    /// Shares its connection pool across clones
    pub mongo_client: Client,
    pub db: Database,
    pub blobs: Arc<LocalBlobStore>,
}

#[cfg(test)]
impl AppState {
    /// State whose MongoDB client points at `mongo_url` without connecting yet.
    pub async fn for_tests(mongo_url: &str, upload_dir: &std::path::Path) -> Self {
        use crate::config::{Config, Environment};
        use core_config::{app_info, server::ServerConfig};
        use database::mongodb::MongoConfig;
        use domain_events::BlobStoreConfig;

        let config = Config {
            app: app_info!(),
            mongodb: MongoConfig::with_database(mongo_url, "college_events_test"),
            server: ServerConfig::default(),
            environment: Environment::Development,
            uploads: BlobStoreConfig {
                dir: upload_dir.to_path_buf(),
                ..Default::default()
            },
        };

        let mongo_client = Client::with_uri_str(mongo_url).await.unwrap();
        let db = mongo_client.database(config.mongodb.database());
        let blobs = Arc::new(LocalBlobStore::open(&config.uploads).await.unwrap());

        Self {
            config,
            mongo_client,
            db,
            blobs,
        }
    }
}
