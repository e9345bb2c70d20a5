use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::blob::{AwsCredentials, BlobStore, LocalBlobStore, S3BlobStore, SummaryTableBlobStore};
use crate::dbs::sqlite::SqliteStore;
use crate::error::{PersistError, Result};
use crate::retry::RetryPolicy;
use crate::store::ConversationStore;

/// Conversation store backend, chosen once at startup
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StoreConfig {
    Sqlite {
        #[serde(default = "default_sqlite_path")]
        path: PathBuf,
        #[serde(default = "default_read_connections")]
        max_read_connections: u32,
    },
    Mongodb {
        /// Usually supplied through `MONGODB_URI`
        #[serde(default)]
        uri: String,
        #[serde(default = "default_database")]
        database: String,
        #[serde(default)]
        retry: RetryPolicy,
    },
}

fn default_sqlite_path() -> PathBuf {
    PathBuf::from("data/threadline.db")
}

fn default_read_connections() -> u32 {
    4
}

fn default_database() -> String {
    "threadline".to_string()
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig::Sqlite {
            path: default_sqlite_path(),
            max_read_connections: default_read_connections(),
        }
    }
}

/// Where memory summaries live
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum BlobConfig {
    Local {
        #[serde(default = "default_blob_root")]
        root: PathBuf,
    },
    S3 {
        bucket: String,
        #[serde(default)]
        prefix: String,
        #[serde(default = "default_region")]
        region: String,
        #[serde(default)]
        endpoint_url: Option<String>,
    },
    /// The conversation store's own `thread_memory` table
    Database,
}

fn default_blob_root() -> PathBuf {
    PathBuf::from("data/blobs")
}

fn default_region() -> String {
    "us-east-1".to_string()
}

impl Default for BlobConfig {
    fn default() -> Self {
        BlobConfig::Local {
            root: default_blob_root(),
        }
    }
}

/// Build the configured conversation store
pub async fn connect_store(config: &StoreConfig) -> Result<Arc<dyn ConversationStore>> {
    match config {
        StoreConfig::Sqlite {
            path,
            max_read_connections,
        } => Ok(Arc::new(SqliteStore::connect(path, *max_read_connections).await?)),

        #[cfg(feature = "mongodb")]
        StoreConfig::Mongodb {
            uri,
            database,
            retry,
        } => {
            if uri.is_empty() {
                return Err(PersistError::Config("mongodb uri is required".into()));
            }
            Ok(Arc::new(
                crate::dbs::mongo::MongoStore::connect(uri, database, retry.clone()).await?,
            ))
        }

        #[cfg(not(feature = "mongodb"))]
        StoreConfig::Mongodb { .. } => Err(PersistError::Config(
            "mongodb backend requires the `mongodb` feature".into(),
        )),
    }
}

/// Build the configured blob store. `Database` reuses `store`.
pub fn build_blob_store(
    config: &BlobConfig,
    store: Arc<dyn ConversationStore>,
) -> Result<Arc<dyn BlobStore>> {
    match config {
        BlobConfig::Local { root } => Ok(Arc::new(LocalBlobStore::new(root.clone()))),
        BlobConfig::S3 {
            bucket,
            prefix,
            region,
            endpoint_url,
        } => Ok(Arc::new(S3BlobStore::new(
            bucket.clone(),
            prefix.clone(),
            region.clone(),
            endpoint_url.clone(),
            AwsCredentials::from_env()?,
        ))),
        BlobConfig::Database => Ok(Arc::new(SummaryTableBlobStore::new(store))),
    }
}
