pub mod blob;
pub mod config;
pub mod dbs;
pub mod error;
pub mod retry;
pub mod store;

pub use blob::{
    memory_key, thread_id_from_key, AwsCredentials, BlobStore, LocalBlobStore, S3BlobStore,
    SummaryTableBlobStore, GLOBAL_MEMORY_KEY,
};
pub use config::{build_blob_store, connect_store, BlobConfig, StoreConfig};
pub use dbs::sqlite::SqliteStore;
#[cfg(feature = "mongodb")]
pub use dbs::mongo::MongoStore;
pub use error::{PersistError, Result};
pub use retry::RetryPolicy;
pub use store::{ConversationStore, DEFAULT_HISTORY_LIMIT};
