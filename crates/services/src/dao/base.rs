use bson::{doc, oid::ObjectId, Document};
use futures::TryStreamExt;
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::{Collection, Database};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::query::QueryError;

#[derive(Debug, Error)]
pub enum DaoError {
    #[error("MongoDB error: {0}")]
    Mongo(#[from] mongodb::error::Error),
    #[error("BSON serialization error: {0}")]
    BsonSer(#[from] bson::ser::Error),
    #[error("BSON deserialization error: {0}")]
    BsonDe(#[from] bson::de::Error),
    #[error("Entity not found")]
    NotFound,
    #[error("Duplicate key: {0}")]
    DuplicateKey(String),
    #[error("Validation: {0}")]
    Validation(String),
    #[error(transparent)]
    Query(#[from] QueryError),
    #[error("Query execution failed: {0}")]
    QueryExecutionFailed(String),
}

pub type DaoResult<T> = Result<T, DaoError>;

/// Matched/modified counts of a single update call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteOutcome {
    pub matched: u64,
    pub modified: u64,
}

pub struct BaseDao<T: Send + Sync> {
    collection: Collection<T>,
}

impl<T> BaseDao<T>
where
    T: Serialize + for<'de> Deserialize<'de> + Unpin + Send + Sync,
{
    pub fn new(db: &Database, collection_name: &str) -> Self {
        Self {
            collection: db.collection::<T>(collection_name),
        }
    }

    pub fn collection(&self) -> &Collection<T> {
        &self.collection
    }

    pub async fn find_by_id(&self, id: ObjectId) -> DaoResult<T> {
        self.collection
            .find_one(doc! { "_id": id })
            .await?
            .ok_or(DaoError::NotFound)
    }

    pub async fn find_by_id_projected(
        &self,
        id: ObjectId,
        projection: Document,
    ) -> DaoResult<T> {
        self.collection
            .find_one(doc! { "_id": id })
            .projection(projection)
            .await?
            .ok_or(DaoError::NotFound)
    }

    pub async fn find_one(&self, filter: Document) -> DaoResult<Option<T>> {
        Ok(self.collection.find_one(filter).await?)
    }

    pub async fn exists(&self, id: ObjectId) -> DaoResult<bool> {
        Ok(self.count(doc! { "_id": id }).await? > 0)
    }

    pub async fn insert_one(&self, doc: &T) -> DaoResult<ObjectId> {
        let result = self
            .collection
            .insert_one(doc)
            .await
            .map_err(map_write_error)?;

        let id = result.inserted_id.as_object_id().ok_or_else(|| {
            DaoError::Validation("inserted _id is not an ObjectId".to_string())
        })?;
        debug!(?id, "Inserted document");
        Ok(id)
    }

    pub async fn insert_many(&self, docs: &[T]) -> DaoResult<usize> {
        if docs.is_empty() {
            return Ok(0);
        }
        let result = self
            .collection
            .insert_many(docs)
            .await
            .map_err(map_write_error)?;
        debug!(count = result.inserted_ids.len(), "Inserted documents");
        Ok(result.inserted_ids.len())
    }

    pub async fn update_one(
        &self,
        filter: Document,
        update: Document,
    ) -> DaoResult<WriteOutcome> {
        let result = self
            .collection
            .update_one(filter, with_updated_at(update))
            .await
            .map_err(map_write_error)?;
        Ok(WriteOutcome {
            matched: result.matched_count,
            modified: result.modified_count,
        })
    }

    pub async fn update_by_id(&self, id: ObjectId, update: Document) -> DaoResult<WriteOutcome> {
        self.update_one(doc! { "_id": id }, update).await
    }

    pub async fn update_many(
        &self,
        filter: Document,
        update: Document,
    ) -> DaoResult<WriteOutcome> {
        let result = self
            .collection
            .update_many(filter, with_updated_at(update))
            .await
            .map_err(map_write_error)?;
        Ok(WriteOutcome {
            matched: result.matched_count,
            modified: result.modified_count,
        })
    }

    pub async fn delete_one(&self, filter: Document) -> DaoResult<u64> {
        let result = self.collection.delete_one(filter).await?;
        Ok(result.deleted_count)
    }

    pub async fn hard_delete(&self, filter: Document) -> DaoResult<u64> {
        let result = self.collection.delete_many(filter).await?;
        Ok(result.deleted_count)
    }

    pub async fn count(&self, filter: Document) -> DaoResult<u64> {
        Ok(self.collection.count_documents(filter).await?)
    }

    /// Runs an aggregation pipeline and drains the cursor in one round trip.
    pub async fn aggregate(&self, pipeline: Vec<Document>) -> Result<Vec<Document>, mongodb::error::Error> {
        let mut cursor = self.collection.aggregate(pipeline).await?;
        let mut results = Vec::new();
        while let Some(doc) = cursor.try_next().await? {
            results.push(doc);
        }
        Ok(results)
    }
}

/// Folds an `updatedAt` stamp into the update's `$set`, creating it if absent.
fn with_updated_at(mut update: Document) -> Document {
    let now = bson::DateTime::now();
    match update.get_document_mut("$set") {
        Ok(set_doc) => {
            set_doc.insert("updatedAt", now);
        }
        Err(_) => {
            update.insert("$set", doc! { "updatedAt": now });
        }
    }
    update
}

fn map_write_error(e: mongodb::error::Error) -> DaoError {
    if let ErrorKind::Write(WriteFailure::WriteError(ref write_error)) = *e.kind {
        if write_error.code == 11000 {
            return DaoError::DuplicateKey(write_error.message.clone());
        }
    }
    if let ErrorKind::InsertMany(ref insert_error) = *e.kind {
        if let Some(write_error) = insert_error
            .write_errors
            .as_ref()
            .and_then(|errors| errors.iter().find(|w| w.code == 11000))
        {
            return DaoError::DuplicateKey(write_error.message.clone());
        }
    }
    DaoError::Mongo(e)
}
