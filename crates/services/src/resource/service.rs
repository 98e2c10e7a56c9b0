use std::sync::Arc;
use std::time::Duration;

use bson::{Bson, DateTime, Document, doc, oid::ObjectId};
use mongodb::Database;
use serde_json::{Map, Value};
use tracing::info;

use super::ResourceKind;
use super::coerce::coerce_for_write;
use crate::cache::ListCache;
use crate::dao::{DaoError, DaoResult};
use crate::query::{ListQuery, ListQueryEngine, ListResult, QueryPlanBuilder};

/// Keys a caller may never write directly.
const PROTECTED_KEYS: [&str; 2] = ["_id", "createdAt"];

/// CRUD over one resource collection. Every mutation drops the resource's
/// cached lists, whether or not it could have changed them.
pub struct ResourceService {
    kind: ResourceKind,
    engine: ListQueryEngine,
}

impl ResourceService {
    pub fn new(db: &Database, kind: ResourceKind, cache: Arc<dyn ListCache>, ttl: Duration) -> Self {
        Self {
            kind,
            engine: ListQueryEngine::new(db, kind.schema(), cache, ttl),
        }
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn engine(&self) -> &ListQueryEngine {
        &self.engine
    }

    pub async fn list(&self, query: &ListQuery, search_term: Option<&str>) -> DaoResult<ListResult> {
        self.engine.list(query, search_term).await
    }

    pub async fn get_by_id(
        &self,
        id: ObjectId,
        select: Option<&Map<String, Value>>,
    ) -> DaoResult<Document> {
        let projection = QueryPlanBuilder::new(self.kind.schema()).record_projection(select)?;
        self.engine.dao().find_by_id_projected(id, projection).await
    }

    pub async fn add(&self, document: Document) -> DaoResult<ObjectId> {
        let document = stamp_new(coerce_for_write(self.kind.schema(), document)?);
        let result = self.engine.dao().insert_one(&document).await;
        self.engine.invalidate().await;
        let id = result?;
        info!(resource = %self.kind, %id, "Resource added");
        Ok(id)
    }

    /// Bulk insert, optionally wiping the collection first.
    pub async fn insert_many(&self, documents: Vec<Document>, replace_existing: bool) -> DaoResult<usize> {
        let result = async {
            if replace_existing {
                let removed = self.engine.dao().hard_delete(doc! {}).await?;
                info!(resource = %self.kind, removed, "Collection cleared before bulk insert");
            }
            let documents = documents
                .into_iter()
                .map(|document| coerce_for_write(self.kind.schema(), document).map(stamp_new))
                .collect::<Result<Vec<_>, _>>()?;
            self.engine.dao().insert_many(&documents).await
        }
        .await;
        self.engine.invalidate().await;
        result
    }

    pub async fn update_by_id(&self, id: ObjectId, set: Document) -> DaoResult<()> {
        let set = writable(self.kind, set)?;
        let result = self.engine.dao().update_by_id(id, doc! { "$set": set }).await;
        self.engine.invalidate().await;
        if result?.matched == 0 {
            return Err(DaoError::NotFound);
        }
        Ok(())
    }

    pub async fn update_many(&self, ids: &[ObjectId], set: Document) -> DaoResult<u64> {
        let set = writable(self.kind, set)?;
        let result = self
            .engine
            .dao()
            .update_many(doc! { "_id": { "$in": id_set(ids) } }, doc! { "$set": set })
            .await;
        self.engine.invalidate().await;
        Ok(result?.modified)
    }

    pub async fn delete_by_id(&self, id: ObjectId) -> DaoResult<()> {
        let result = self.engine.dao().delete_one(doc! { "_id": id }).await;
        self.engine.invalidate().await;
        if result? == 0 {
            return Err(DaoError::NotFound);
        }
        Ok(())
    }

    pub async fn delete_many(&self, ids: &[ObjectId]) -> DaoResult<u64> {
        let result = self
            .engine
            .dao()
            .hard_delete(doc! { "_id": { "$in": id_set(ids) } })
            .await;
        self.engine.invalidate().await;
        result
    }
}

fn stamp_new(mut document: Document) -> Document {
    // Client-supplied ids are never trusted.
    document.remove("_id");
    let now = DateTime::now();
    document.insert("createdAt", now);
    document.insert("updatedAt", now);
    document
}

fn writable(kind: ResourceKind, mut set: Document) -> DaoResult<Document> {
    for key in PROTECTED_KEYS {
        set.remove(key);
    }
    if set.is_empty() {
        return Err(DaoError::Validation("Nothing to update".to_string()));
    }
    Ok(coerce_for_write(kind.schema(), set)?)
}

/// Array operand for an `$in` over ids.
fn id_set(ids: &[ObjectId]) -> Bson {
    Bson::Array(ids.iter().copied().map(Bson::ObjectId).collect())
}
