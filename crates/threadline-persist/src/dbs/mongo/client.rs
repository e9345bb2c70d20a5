use async_trait::async_trait;
use bson::doc;
use chrono::Utc;
use futures::TryStreamExt;
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::{Client, Collection, IndexModel};

use threadline_types::{Message, ThreadMemorySummary, ThreadMeta};

use crate::dbs::mongo::models::{MongoMessage, MongoThread, MongoThreadMemory};
use crate::dbs::to_micros;
use crate::error::{PersistError, Result};
use crate::retry::RetryPolicy;
use crate::store::ConversationStore;

const BACKEND: &str = "mongodb";
const DUPLICATE_KEY: i32 = 11000;

/// Managed-service backend. Every operation runs under the retry policy and
/// only surfaces [`PersistError::Unavailable`] once attempts are exhausted.
pub struct MongoStore {
    messages: Collection<MongoMessage>,
    threads: Collection<MongoThread>,
    memory: Collection<MongoThreadMemory>,
    retry: RetryPolicy,
}

impl MongoStore {
    /// Connect to MongoDB and ensure indexes
    pub async fn connect(uri: &str, database: &str, retry: RetryPolicy) -> Result<Self> {
        let client = Client::with_uri_str(uri).await?;
        let db = client.database(database);

        let store = Self {
            messages: db.collection("messages"),
            threads: db.collection("threads"),
            memory: db.collection("thread_memory"),
            retry,
        };

        store
            .retry
            .run(BACKEND, "create_indexes", || async {
                store
                    .messages
                    .create_index(
                        IndexModel::builder()
                            .keys(doc! { "thread_id": 1, "created_at_micros": -1, "insert_id": -1 })
                            .build(),
                    )
                    .await?;
                store
                    .threads
                    .create_index(
                        IndexModel::builder()
                            .keys(doc! { "user_id": 1, "created_at_micros": -1 })
                            .build(),
                    )
                    .await?;
                Ok(())
            })
            .await?;

        tracing::info!(database, "mongodb store ready");
        Ok(store)
    }
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(write_error)) => {
            write_error.code == DUPLICATE_KEY
        }
        _ => false,
    }
}

#[async_trait]
impl ConversationStore for MongoStore {
    fn backend_name(&self) -> &'static str {
        BACKEND
    }

    async fn append_message(&self, message: &Message) -> Result<bool> {
        let document = MongoMessage::from(message);

        self.retry
            .run(BACKEND, "append_message", || async {
                match self.messages.insert_one(&document).await {
                    Ok(_) => Ok(true),
                    Err(e) if is_duplicate_key(&e) => {
                        tracing::debug!(message_id = %document.message_id, "duplicate append ignored");
                        Ok(false)
                    }
                    Err(e) => Err(e.into()),
                }
            })
            .await
    }

    async fn get_message(&self, message_id: &str) -> Result<Option<Message>> {
        let document = self
            .retry
            .run(BACKEND, "get_message", || async {
                Ok(self.messages.find_one(doc! { "_id": message_id }).await?)
            })
            .await?;

        document.map(MongoMessage::into_message).transpose()
    }

    async fn load_recent_messages(&self, thread_id: &str, limit: usize) -> Result<Vec<Message>> {
        let mut documents: Vec<MongoMessage> = self
            .retry
            .run(BACKEND, "load_recent_messages", || async {
                let docs = self
                    .messages
                    .find(doc! { "thread_id": thread_id })
                    .sort(doc! { "created_at_micros": -1, "insert_id": -1 })
                    .limit(limit as i64)
                    .await?
                    .try_collect()
                    .await?;
                Ok(docs)
            })
            .await?;

        documents.reverse();
        documents.into_iter().map(MongoMessage::into_message).collect()
    }

    async fn get_or_create_thread(&self, thread_id: &str, user_id: &str) -> Result<ThreadMeta> {
        let created_at = to_micros(Utc::now());

        let thread = self
            .retry
            .run(BACKEND, "get_or_create_thread", || async {
                self.threads
                    .update_one(
                        doc! { "_id": thread_id },
                        doc! { "$setOnInsert": { "user_id": user_id, "created_at_micros": created_at } },
                    )
                    .upsert(true)
                    .await?;

                self.threads
                    .find_one(doc! { "_id": thread_id })
                    .await?
                    .ok_or_else(|| {
                        PersistError::InvalidRecord(format!("thread {} missing after upsert", thread_id))
                    })
            })
            .await?;

        thread.into_meta()
    }

    async fn set_feedback(&self, message_id: &str, positive: bool) -> Result<()> {
        self.retry
            .run(BACKEND, "set_feedback", || async {
                let result = self
                    .messages
                    .update_one(
                        doc! { "_id": message_id },
                        doc! { "$set": { "positive_feedback": positive } },
                    )
                    .await?;

                if result.matched_count == 0 {
                    return Err(PersistError::MessageNotFound(message_id.to_string()));
                }
                Ok(())
            })
            .await
    }

    async fn list_threads(&self, user_id: &str, limit: usize) -> Result<Vec<ThreadMeta>> {
        let documents: Vec<MongoThread> = self
            .retry
            .run(BACKEND, "list_threads", || async {
                let docs = self
                    .threads
                    .find(doc! { "user_id": user_id })
                    .sort(doc! { "created_at_micros": -1 })
                    .limit(limit as i64)
                    .await?
                    .try_collect()
                    .await?;
                Ok(docs)
            })
            .await?;

        documents.into_iter().map(MongoThread::into_meta).collect()
    }

    async fn upsert_thread_memory(&self, summary: &ThreadMemorySummary) -> Result<()> {
        let updated_at = to_micros(summary.updated_at);
        let word_count = summary.word_count as i64;

        self.retry
            .run(BACKEND, "upsert_thread_memory", || async {
                self.memory
                    .update_one(
                        doc! { "_id": summary.thread_id.as_str() },
                        doc! {
                            "$set": {
                                "content": summary.content.as_str(),
                                "word_count": word_count,
                                "updated_at_micros": updated_at,
                            }
                        },
                    )
                    .upsert(true)
                    .await?;
                Ok(())
            })
            .await
    }

    async fn get_thread_memory(&self, thread_id: &str) -> Result<Option<ThreadMemorySummary>> {
        let document = self
            .retry
            .run(BACKEND, "get_thread_memory", || async {
                Ok(self.memory.find_one(doc! { "_id": thread_id }).await?)
            })
            .await?;

        document.map(MongoThreadMemory::into_summary).transpose()
    }
}
