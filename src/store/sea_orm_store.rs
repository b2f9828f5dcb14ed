use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Select, Set,
};
use serde_json::Value;

use super::{Document, DocumentStore, ID_FIELD, Query, apply_queries, merge_data};
use crate::config::DEFAULT_PAGE_SIZE;
use crate::entities::document;

/// Document store backed by the `documents` table.
///
/// `$id` filters, `$id` ordering and paging run in SQL. Filters and ordering
/// on fields inside `data` are evaluated after loading the collection, so the
/// same JSON semantics hold on Postgres and SQLite.
#[derive(Clone)]
pub struct SeaOrmDocumentStore {
    db: DatabaseConnection,
}

impl SeaOrmDocumentStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub fn get_connection(&self) -> &DatabaseConnection {
        &self.db
    }

    async fn find_model(&self, collection: &str, id: &str) -> Result<Option<document::Model>> {
        let model = document::Entity::find_by_id((collection.to_string(), id.to_string()))
            .one(&self.db)
            .await
            .with_context(|| format!("Failed to read document {} from {}", id, collection))?;
        Ok(model)
    }
}

/// Splits queries into what SQL can answer and what needs the JSON `data`.
struct ListPlan {
    select: Select<document::Entity>,
    data_queries: Vec<Query>,
    limit: u64,
    offset: u64,
}

impl ListPlan {
    fn new(collection: &str, queries: &[Query]) -> Self {
        let mut select =
            document::Entity::find().filter(document::Column::CollectionId.eq(collection));
        let mut limit = DEFAULT_PAGE_SIZE;
        let mut offset = 0;
        let mut data_queries = Vec::new();

        for query in queries {
            match query {
                Query::Equal(field, Value::String(id)) if field == ID_FIELD => {
                    select = select.filter(document::Column::DocumentId.eq(id.as_str()));
                }
                Query::Equal(..) => data_queries.push(query.clone()),
                Query::Limit(n) => limit = *n,
                Query::Offset(n) => offset = *n,
                Query::OrderAsc(_) | Query::OrderDesc(_) => {}
            }
        }

        // Sorts compose in query order, so they only move to SQL when every
        // one of them is on `$id`.
        let orders: Vec<&Query> = queries
            .iter()
            .filter(|q| matches!(q, Query::OrderAsc(_) | Query::OrderDesc(_)))
            .collect();
        let sql_orders = data_queries.is_empty()
            && orders.iter().all(|q| match q {
                Query::OrderAsc(field) | Query::OrderDesc(field) => field == ID_FIELD,
                _ => false,
            });

        let last_order = orders.last().map(|q| (*q).clone());
        match last_order {
            Some(Query::OrderAsc(_)) if sql_orders => {
                select = select.order_by_asc(document::Column::DocumentId);
            }
            Some(Query::OrderDesc(_)) if sql_orders => {
                select = select.order_by_desc(document::Column::DocumentId);
            }
            _ => {
                select = select
                    .order_by_asc(document::Column::CreatedAt)
                    .order_by_asc(document::Column::DocumentId);
                if !sql_orders {
                    data_queries.extend(orders.into_iter().cloned());
                }
            }
        }

        Self {
            select,
            data_queries,
            limit,
            offset,
        }
    }
}

fn to_document(model: document::Model) -> Document {
    Document::new(model.document_id, model.data)
}

#[async_trait]
impl DocumentStore for SeaOrmDocumentStore {
    async fn list(&self, collection: &str, queries: &[Query]) -> Result<Vec<Document>> {
        let plan = ListPlan::new(collection, queries);

        if plan.data_queries.is_empty() {
            let models = plan
                .select
                .limit(plan.limit)
                .offset(plan.offset)
                .all(&self.db)
                .await
                .with_context(|| format!("Failed to list collection {}", collection))?;
            return Ok(models.into_iter().map(to_document).collect());
        }

        let models = plan
            .select
            .all(&self.db)
            .await
            .with_context(|| format!("Failed to list collection {}", collection))?;
        let mut remaining = plan.data_queries;
        remaining.push(Query::Limit(plan.limit));
        remaining.push(Query::Offset(plan.offset));
        Ok(apply_queries(
            models.into_iter().map(to_document).collect(),
            &remaining,
        ))
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        Ok(self.find_model(collection, id).await?.map(to_document))
    }

    async fn create(&self, collection: &str, id: &str, data: Value) -> Result<Document> {
        if self.find_model(collection, id).await?.is_some() {
            return Err(anyhow!("Document {} already exists in {}", id, collection));
        }

        let mut stored = Value::Object(Default::default());
        merge_data(&mut stored, data);

        let now = Utc::now().naive_utc();
        let model = document::ActiveModel {
            collection_id: Set(collection.to_string()),
            document_id: Set(id.to_string()),
            data: Set(stored),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let result = model
            .insert(&self.db)
            .await
            .with_context(|| format!("Failed to create document {} in {}", id, collection))?;
        Ok(to_document(result))
    }

    async fn update(&self, collection: &str, id: &str, data: Value) -> Result<Document> {
        let existing = self
            .find_model(collection, id)
            .await?
            .ok_or_else(|| anyhow!("Document {} not found in {}", id, collection))?;

        let mut merged = existing.data.clone();
        merge_data(&mut merged, data);

        let mut active_model: document::ActiveModel = existing.into();
        active_model.data = Set(merged);
        active_model.updated_at = Set(Utc::now().naive_utc());

        let result = active_model
            .update(&self.db)
            .await
            .with_context(|| format!("Failed to update document {} in {}", id, collection))?;
        Ok(to_document(result))
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<()> {
        let result = document::Entity::delete_by_id((collection.to_string(), id.to_string()))
            .exec(&self.db)
            .await
            .with_context(|| format!("Failed to delete document {} from {}", id, collection))?;
        if result.rows_affected == 0 {
            return Err(anyhow!("Document {} not found in {}", id, collection));
        }
        Ok(())
    }
}
