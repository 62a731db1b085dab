//! Document persistence used by the reminder and personalization layers.
//!
//! Collections are MongoDB-backed when a server is reachable and fall back to
//! process-local memory otherwise, so a missing database degrades the service
//! instead of failing requests.

mod memory;
mod mongo;

use std::sync::Arc;

use mongodb::bson::{oid::ObjectId, Bson, Document};
use tracing::{info, warn};

use crate::config::ServiceConfig;

pub use memory::MemoryCollection;
pub use mongo::{connect_database, MongoCollection};

pub const TASKS_COLLECTION: &str = "tasks";
pub const USERS_COLLECTION: &str = "users";
pub const REMINDERS_COLLECTION: &str = "reminders";
pub const NOTIFICATIONS_COLLECTION: &str = "notifications";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("mongodb error: {0}")]
    Mongo(#[from] mongodb::error::Error),
    #[error("bson serialization error: {0}")]
    BsonSer(#[from] mongodb::bson::ser::Error),
    #[error("bson deserialization error: {0}")]
    BsonDe(#[from] mongodb::bson::de::Error),
    #[error("duplicate document id: {0}")]
    DuplicateKey(String),
    #[error("unsupported update operator: {0}")]
    UnsupportedUpdate(String),
    #[error("store lock poisoned")]
    LockPoisoned,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateOutcome {
    pub matched: u64,
    pub modified: u64,
    pub upserted_id: Option<Bson>,
}

/// The subset of collection operations the scheduler and scoring layers need.
pub trait DocumentStore: Send + Sync {
    fn find_one(&self, filter: Document) -> Result<Option<Document>, StoreError>;
    fn find(&self, filter: Document) -> Result<Vec<Document>, StoreError>;
    /// Returns the `_id` of the inserted document.
    fn insert_one(&self, doc: Document) -> Result<Bson, StoreError>;
    fn update_one(
        &self,
        filter: Document,
        update: Document,
        upsert: bool,
    ) -> Result<UpdateOutcome, StoreError>;
    /// Returns the number of deleted documents (0 or 1).
    fn delete_one(&self, filter: Document) -> Result<u64, StoreError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Mongo,
    Memory,
}

#[derive(Clone)]
pub struct Collections {
    pub tasks: Arc<dyn DocumentStore>,
    pub users: Arc<dyn DocumentStore>,
    pub reminders: Arc<dyn DocumentStore>,
    pub notifications: Arc<dyn DocumentStore>,
    backend: StoreBackend,
}

impl Collections {
    pub fn in_memory() -> Self {
        Self {
            tasks: Arc::new(MemoryCollection::new()),
            users: Arc::new(MemoryCollection::new()),
            reminders: Arc::new(MemoryCollection::new()),
            notifications: Arc::new(MemoryCollection::new()),
            backend: StoreBackend::Memory,
        }
    }

    /// Connects to MongoDB, or falls back to in-memory collections when the
    /// server is disabled or unreachable.
    pub fn connect(config: &ServiceConfig) -> Self {
        if config.mongo_disabled {
            info!("MONGO_DISABLED set; using in-memory collections");
            return Self::in_memory();
        }
        match connect_database(&config.mongo_uri, &config.mongo_db) {
            Ok(db) => {
                info!("connected to MongoDB database {}", config.mongo_db);
                Self {
                    tasks: Arc::new(MongoCollection::new(&db, TASKS_COLLECTION)),
                    users: Arc::new(MongoCollection::new(&db, USERS_COLLECTION)),
                    reminders: Arc::new(MongoCollection::new(&db, REMINDERS_COLLECTION)),
                    notifications: Arc::new(MongoCollection::new(&db, NOTIFICATIONS_COLLECTION)),
                    backend: StoreBackend::Mongo,
                }
            }
            Err(err) => {
                warn!(
                    "failed to connect to MongoDB ({}); using in-memory collections",
                    err
                );
                Self::in_memory()
            }
        }
    }

    pub fn backend(&self) -> StoreBackend {
        self.backend
    }
}

/// Task ids arrive as hex strings; stored tasks are keyed by `ObjectId` when
/// the id parses as one and by the raw string otherwise.
pub fn id_filter(id: &str) -> Document {
    let mut filter = Document::new();
    match ObjectId::parse_str(id) {
        Ok(oid) => filter.insert("_id", oid),
        Err(_) => filter.insert("_id", id),
    };
    filter
}
