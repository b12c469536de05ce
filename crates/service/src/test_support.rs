#![cfg(test)]
use std::sync::Arc;

use migration::MigratorTrait;
use sea_orm::DatabaseConnection;
use serde_json::{json, Value as Json};
use tokio::sync::OnceCell;
use uuid::Uuid;

use models::db::connect_with_config;

use crate::descriptor::EntityType;
use crate::entity::{EntityInput, EntityView};
use crate::registry::EntityServiceRegistry;
use crate::store::MemoryDocumentStore;

// Ensure migrations run only once across the entire test process
static MIGRATED: OnceCell<()> = OnceCell::const_new();

fn db_config() -> configs::DatabaseConfig {
    let mut cfg = configs::load_default().map(|c| c.database).unwrap_or_default();
    cfg.normalize_from_env();
    cfg.max_connections = cfg.max_connections.max(10);
    cfg.min_connections = cfg.min_connections.clamp(1, cfg.max_connections);
    cfg.connect_timeout_secs = cfg.connect_timeout_secs.max(5);
    cfg.acquire_timeout_secs = cfg.acquire_timeout_secs.max(10);
    cfg.idle_timeout_secs = cfg.idle_timeout_secs.max(60);
    cfg.max_lifetime_secs = cfg.max_lifetime_secs.max(600);
    cfg
}

pub async fn get_db() -> Result<DatabaseConnection, anyhow::Error> {
    let db = connect_with_config(&db_config()).await?;
    // Run migrations exactly once per test process
    MIGRATED
        .get_or_try_init(|| async { migration::Migrator::up(&db, None).await })
        .await?;
    Ok(db)
}

pub fn memory_registry() -> (Arc<MemoryDocumentStore>, Arc<EntityServiceRegistry>) {
    let store = Arc::new(MemoryDocumentStore::new());
    let registry = Arc::new(EntityServiceRegistry::new(store.clone()));
    (store, registry)
}

pub fn input(value: Json) -> EntityInput {
    serde_json::from_value(value).expect("valid entity input")
}

/// Create an active entity named after its code.
pub async fn seed(registry: &EntityServiceRegistry, t: EntityType, code: &str, parent: Option<Uuid>) -> EntityView {
    let mut body = json!({"code": code, "name": {"en": code}});
    if let Some(parent_id) = parent {
        body["parentId"] = json!(parent_id);
    }
    registry.get(t).create(input(body)).await.expect("seed entity")
}

pub struct Chain {
    pub series: EntityView,
    pub category: EntityView,
    pub sub_category: EntityView,
    pub specification: EntityView,
    pub product: EntityView,
}

/// One entity per catalog level: S1 > C1 > SC1 > SP1 > P1.
pub async fn seed_chain(registry: &EntityServiceRegistry) -> Chain {
    let series = seed(registry, EntityType::Series, "S1", None).await;
    let category = seed(registry, EntityType::Categories, "C1", Some(series.id)).await;
    let sub_category = seed(registry, EntityType::SubCategories, "SC1", Some(category.id)).await;
    let specification = seed(registry, EntityType::Specifications, "SP1", Some(sub_category.id)).await;
    let product = seed(registry, EntityType::Products, "P1", Some(specification.id)).await;
    Chain { series, category, sub_category, specification, product }
}
