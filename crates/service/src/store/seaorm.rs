//! Postgres-backed document store (SeaORM).
//!
//! Case-insensitive matching uses `~*` on `code` and on every value of the
//! `name` jsonb map.

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, DatabaseTransaction, DbErr, EntityTrait, Order,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, SqlErr, TransactionTrait,
};
use tracing::debug;
use uuid::Uuid;

use models::document::{self, Column, Entity as DocumentEntity};

use super::{
    Document, DocumentStore, Filter, FindOptions, SortDirection, SortField, StoreError, StoreResult,
    StoreTransaction,
};
use crate::descriptor::EntityType;

/// SeaORM-backed store implementation.
pub struct SeaOrmDocumentStore {
    pub db: DatabaseConnection,
}

impl SeaOrmDocumentStore {
    pub fn new(db: DatabaseConnection) -> Self { Self { db } }
}

fn map_db_err(e: DbErr) -> StoreError {
    match e.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(msg)) => StoreError::Conflict(msg),
        _ => StoreError::Backend(e.to_string()),
    }
}

fn condition(collection: EntityType, filter: &Filter) -> Condition {
    let mut cond = Condition::all().add(Column::Collection.eq(collection.as_str()));
    if let Some(parent_id) = filter.parent_id {
        cond = cond.add(Column::ParentId.eq(parent_id));
    }
    if let Some(active) = filter.is_active {
        cond = cond.add(Column::IsActive.eq(active));
    }
    if let Some(text) = &filter.text {
        cond = cond.add(
            Condition::any()
                .add(Expr::cust_with_values(r#""code" ~* ?"#, [text.pattern.clone()]))
                .add(Expr::cust_with_values(
                    r#"EXISTS (SELECT 1 FROM jsonb_each_text("name") AS n(lang, txt) WHERE n.txt ~* ?)"#,
                    [text.pattern.clone()],
                )),
        );
    }
    cond
}

fn sort_column(field: SortField) -> Column {
    match field {
        SortField::Code => Column::Code,
        SortField::CreatedAt => Column::CreatedAt,
        SortField::UpdatedAt => Column::UpdatedAt,
    }
}

#[async_trait]
impl DocumentStore for SeaOrmDocumentStore {
    async fn get(&self, collection: EntityType, id: Uuid) -> StoreResult<Option<Document>> {
        DocumentEntity::find_by_id(id)
            .filter(Column::Collection.eq(collection.as_str()))
            .one(&self.db)
            .await
            .map_err(map_db_err)
    }

    async fn find(&self, collection: EntityType, filter: &Filter, opts: FindOptions) -> StoreResult<Vec<Document>> {
        let mut select = DocumentEntity::find().filter(condition(collection, filter));
        select = match opts.sort {
            Some(spec) => {
                let order = match spec.direction {
                    SortDirection::Asc => Order::Asc,
                    SortDirection::Desc => Order::Desc,
                };
                select.order_by(sort_column(spec.field), order).order_by(Column::Id, Order::Asc)
            }
            None => select.order_by(Column::Id, Order::Asc),
        };
        if opts.offset > 0 {
            select = select.offset(opts.offset);
        }
        if let Some(limit) = opts.limit {
            select = select.limit(limit);
        }
        select.all(&self.db).await.map_err(map_db_err)
    }

    async fn count(&self, collection: EntityType, filter: &Filter) -> StoreResult<u64> {
        DocumentEntity::find()
            .filter(condition(collection, filter))
            .count(&self.db)
            .await
            .map_err(map_db_err)
    }

    async fn insert(&self, doc: Document) -> StoreResult<Document> {
        document::to_active(doc).insert(&self.db).await.map_err(map_db_err)
    }

    async fn replace(&self, mut doc: Document) -> StoreResult<Document> {
        doc.version += 1;
        doc.updated_at = Utc::now().into();
        document::to_active(doc).update(&self.db).await.map_err(map_db_err)
    }

    async fn begin(&self) -> StoreResult<Box<dyn StoreTransaction>> {
        let txn = self.db.begin().await.map_err(map_db_err)?;
        Ok(Box::new(SeaOrmTransaction { txn }))
    }
}

struct SeaOrmTransaction {
    txn: DatabaseTransaction,
}

#[async_trait]
impl StoreTransaction for SeaOrmTransaction {
    async fn child_ids(&mut self, collection: EntityType, parent_id: Uuid) -> StoreResult<Vec<Uuid>> {
        DocumentEntity::find()
            .select_only()
            .column(Column::Id)
            .filter(Column::Collection.eq(collection.as_str()))
            .filter(Column::ParentId.eq(parent_id))
            .order_by(Column::Id, Order::Asc)
            .into_tuple::<Uuid>()
            .all(&self.txn)
            .await
            .map_err(map_db_err)
    }

    async fn delete(&mut self, collection: EntityType, id: Uuid) -> StoreResult<bool> {
        let res = DocumentEntity::delete_many()
            .filter(Column::Id.eq(id))
            .filter(Column::Collection.eq(collection.as_str()))
            .exec(&self.txn)
            .await
            .map_err(map_db_err)?;
        Ok(res.rows_affected > 0)
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        self.txn.commit().await.map_err(map_db_err)
    }

    async fn rollback(self: Box<Self>) -> StoreResult<()> {
        debug!("rolling back document transaction");
        self.txn.rollback().await.map_err(map_db_err)
    }
}
