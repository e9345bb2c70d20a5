mod local;
mod s3;
mod table;

pub use local::LocalBlobStore;
pub use s3::{AwsCredentials, S3BlobStore};
pub use table::SummaryTableBlobStore;

use async_trait::async_trait;

use crate::error::Result;

/// Key of the summary used before a thread exists
pub const GLOBAL_MEMORY_KEY: &str = "memory/global.txt";

/// Row id the database backend stores the global summary under
pub const GLOBAL_MEMORY_ROW: &str = "__global__";

const THREAD_MEMORY_PREFIX: &str = "memory/threads/";
const THREAD_MEMORY_SUFFIX: &str = ".txt";

/// Whole-object key/value storage. Writes replace the object; a missing
/// object reads as `None`.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<()>;
}

/// Memory key for a thread, or the global key when there is no thread yet
pub fn memory_key(thread_id: Option<&str>) -> String {
    match thread_id {
        Some(id) => format!("{}{}{}", THREAD_MEMORY_PREFIX, id, THREAD_MEMORY_SUFFIX),
        None => GLOBAL_MEMORY_KEY.to_string(),
    }
}

/// Inverse of [`memory_key`]: the thread id, or [`GLOBAL_MEMORY_ROW`]
pub fn thread_id_from_key(key: &str) -> Option<&str> {
    if key == GLOBAL_MEMORY_KEY {
        return Some(GLOBAL_MEMORY_ROW);
    }
    key.strip_prefix(THREAD_MEMORY_PREFIX)
        .and_then(|rest| rest.strip_suffix(THREAD_MEMORY_SUFFIX))
        .filter(|id| !id.is_empty() && !id.contains('/'))
}
