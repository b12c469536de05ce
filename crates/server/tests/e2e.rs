use std::net::SocketAddr;
use std::sync::Arc;

use reqwest::StatusCode as HttpStatusCode;
use serde_json::{json, Value};
use tokio::net::TcpListener;

use configs::CatalogConfig;
use server::startup::build_app;
use server::state::AppState;
use service::store::MemoryDocumentStore;

const ADMIN_KEY: &str = "test-admin-key";

struct TestApp {
    base_url: String,
    client: reqwest::Client,
}

impl TestApp {
    fn url(&self, path: &str) -> String { format!("{}{}", self.base_url, path) }

    async fn create(&self, entity_type: &str, body: Value) -> anyhow::Result<Value> {
        let res = self
            .client
            .post(self.url(&format!("/api/entities/{entity_type}")))
            .header("X-API-Key", ADMIN_KEY)
            .json(&body)
            .send()
            .await?;
        assert_eq!(res.status(), HttpStatusCode::CREATED, "create {entity_type}");
        Ok(res.json().await?)
    }

    async fn get_json(&self, path: &str, admin: bool) -> anyhow::Result<(HttpStatusCode, Value)> {
        let mut req = self.client.get(self.url(path));
        if admin {
            req = req.header("X-API-Key", ADMIN_KEY);
        }
        let res = req.send().await?;
        let status = res.status();
        Ok((status, res.json().await?))
    }
}

async fn start_server() -> anyhow::Result<TestApp> {
    let catalog = CatalogConfig { admin_api_key: Some(ADMIN_KEY.into()), ..CatalogConfig::default() };
    let app = build_app(AppState::new(Arc::new(MemoryDocumentStore::new()), catalog));
    let listener = TcpListener::bind((std::net::Ipv4Addr::LOCALHOST, 0)).await?;
    let addr: SocketAddr = listener.local_addr()?;
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await { eprintln!("server error: {}", e); }
    });
    Ok(TestApp { base_url: format!("http://{}:{}", addr.ip(), addr.port()), client: reqwest::Client::new() })
}

fn id(v: &Value) -> String { v["id"].as_str().expect("id").to_string() }

#[tokio::test]
async fn e2e_public_health_and_metrics() -> anyhow::Result<()> {
    let app = start_server().await?;
    let (status, body) = app.get_json("/health", false).await?;
    assert_eq!(status, HttpStatusCode::OK);
    assert_eq!(body, json!({"status": "ok"}));

    app.get_json("/api/hierarchy", false).await?;
    let res = app.client.get(app.url("/metrics")).send().await?;
    assert_eq!(res.status(), HttpStatusCode::OK);
    assert!(res.text().await?.contains("catalog_requests_total"));
    Ok(())
}

#[tokio::test]
async fn e2e_tree_filters_inactive_products_for_anonymous_callers() -> anyhow::Result<()> {
    let app = start_server().await?;
    let series = app.create("series", json!({"code": "S1", "name": {"en": "Pumps"}})).await?;
    let cat = app.create("categories", json!({"code": "C1", "series": id(&series)})).await?;
    let sub = app.create("subCategories", json!({"code": "SC1", "parentId": id(&cat)})).await?;
    let spec = app.create("specifications", json!({"code": "SP1", "parentId": id(&sub)})).await?;
    app.create("products", json!({"code": "10", "parentId": id(&spec)})).await?;
    app.create("products", json!({"code": "2", "parentId": id(&spec), "isActive": false})).await?;
    let product = app.create("products", json!({"code": "1", "parentId": id(&spec)})).await?;
    assert_eq!(product["series"]["id"], series["id"]);

    let path = format!("/api/hierarchy/specifications/{}", id(&spec));
    let (status, anon) = app.get_json(&path, false).await?;
    assert_eq!(status, HttpStatusCode::OK);
    let codes: Vec<_> = anon["products"].as_array().unwrap().iter().map(|p| p["code"].clone()).collect();
    assert_eq!(codes, [json!("1"), json!("10")]);

    let (_, admin) = app.get_json(&path, true).await?;
    let codes: Vec<_> = admin["products"].as_array().unwrap().iter().map(|p| p["code"].clone()).collect();
    assert_eq!(codes, [json!("1"), json!("2"), json!("10")]);

    let (_, full) = app.get_json("/api/hierarchy?maxDepth=1", false).await?;
    assert_eq!(full[0]["code"], json!("S1"));
    assert_eq!(full[0]["categories"][0]["depthTruncated"], json!(true));

    let (_, parents) = app.get_json(&format!("/api/hierarchy/products/{}/parents", id(&product)), false).await?;
    assert_eq!(parents["complete"], json!(true));
    assert_eq!(parents["chain"].as_array().unwrap().len(), 5);

    let (_, children) = app.get_json(&format!("/api/hierarchy/series/{}/children?language=en", id(&series)), false).await?;
    assert_eq!(children["childType"], json!("categories"));
    assert_eq!(children["parent"]["displayName"], json!("Pumps"));
    Ok(())
}

#[tokio::test]
async fn e2e_search_update_and_cascade_delete() -> anyhow::Result<()> {
    let app = start_server().await?;
    let a1 = app.create("series", json!({"code": "A1"})).await?;
    app.create("series", json!({"code": "ABC"})).await?;
    app.create("series", json!({"code": "ABCDEF"})).await?;
    let b1 = app.create("categories", json!({"code": "B1", "parentId": id(&a1)})).await?;

    let (_, found) = app.get_json("/api/entities/series?keyword=abc&page=1&limit=10", false).await?;
    assert_eq!(found["data"].as_array().unwrap().len(), 1);
    assert_eq!(found["data"][0]["code"], json!("ABC"));
    assert_eq!(found["pagination"], json!({"page": 1, "limit": 10, "total": 1, "pages": 1}));

    let (_, fuzzy) = app.get_json("/api/entities/series?keyword=BCD", false).await?;
    assert_eq!(fuzzy["data"][0]["code"], json!("ABCDEF"));
    assert_eq!(fuzzy["pagination"], Value::Null);

    let res = app
        .client
        .put(app.url(&format!("/api/entities/categories/{}", id(&b1))))
        .header("X-API-Key", ADMIN_KEY)
        .json(&json!({"name": {"en": "Valves"}, "rating": 4}))
        .send()
        .await?;
    assert_eq!(res.status(), HttpStatusCode::OK);
    let updated: Value = res.json().await?;
    assert_eq!(updated["rating"], json!(4));
    assert!(updated.get("version").is_none());

    let res = app
        .client
        .delete(app.url(&format!("/api/entities/series/{}", id(&a1))))
        .header("X-API-Key", ADMIN_KEY)
        .send()
        .await?;
    assert_eq!(res.status(), HttpStatusCode::OK);
    let body: Value = res.json().await?;
    assert_eq!(body["removed"], json!(2));

    let (status, body) = app.get_json(&format!("/api/entities/categories/{}", id(&b1)), false).await?;
    assert_eq!(status, HttpStatusCode::NOT_FOUND);
    assert_eq!(body["error"], json!("Not Found"));
    Ok(())
}

#[tokio::test]
async fn e2e_error_statuses() -> anyhow::Result<()> {
    let app = start_server().await?;
    let (status, _) = app.get_json("/api/entities/widgets", false).await?;
    assert_eq!(status, HttpStatusCode::BAD_REQUEST);

    app.create("series", json!({"code": "S1"})).await?;
    let res = app
        .client
        .post(app.url("/api/entities/series"))
        .header("X-API-Key", ADMIN_KEY)
        .json(&json!({"code": "S1"}))
        .send()
        .await?;
    assert_eq!(res.status(), HttpStatusCode::CONFLICT);

    let res = app
        .client
        .post(app.url("/api/entities/categories"))
        .header("X-API-Key", ADMIN_KEY)
        .json(&json!({"code": "C1"}))
        .send()
        .await?;
    assert_eq!(res.status(), HttpStatusCode::BAD_REQUEST);

    let res = app
        .client
        .post(app.url("/api/entities/news/batch"))
        .header("X-API-Key", ADMIN_KEY)
        .json(&json!({"toCreate": [{"title": "hello"}], "toUpdate": [{"isActive": true}]}))
        .send()
        .await?;
    assert_eq!(res.status(), HttpStatusCode::OK);
    let report: Value = res.json().await?;
    assert_eq!(report["created"].as_array().unwrap().len(), 1);
    assert_eq!(report["errors"].as_array().unwrap().len(), 1);

    let news_id = id(&report["created"][0]);
    let (status, _) = app.get_json(&format!("/api/entities/news/{news_id}"), false).await?;
    assert_eq!(status, HttpStatusCode::NOT_FOUND);
    let (status, _) = app.get_json(&format!("/api/entities/news/{news_id}"), true).await?;
    assert_eq!(status, HttpStatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn e2e_writes_require_admin_key() -> anyhow::Result<()> {
    let app = start_server().await?;
    let series = app.create("series", json!({"code": "S1"})).await?;
    let item = app.url(&format!("/api/entities/series/{}", id(&series)));

    let res = app.client.post(app.url("/api/entities/series")).json(&json!({"code": "S2"})).send().await?;
    assert_eq!(res.status(), HttpStatusCode::UNAUTHORIZED);
    let body: Value = res.json().await?;
    assert_eq!(body["error"], json!("Unauthorized"));

    let res = app.client.put(&item).header("X-API-Key", "wrong").json(&json!({"isActive": false})).send().await?;
    assert_eq!(res.status(), HttpStatusCode::UNAUTHORIZED);
    let res = app.client.delete(&item).send().await?;
    assert_eq!(res.status(), HttpStatusCode::UNAUTHORIZED);
    let res = app.client.post(app.url("/api/entities/news/batch")).json(&json!({"toCreate": [{}]})).send().await?;
    assert_eq!(res.status(), HttpStatusCode::UNAUTHORIZED);

    // reads stay open and the series survived
    let (status, body) = app.get_json(&format!("/api/entities/series/{}", id(&series)), false).await?;
    assert_eq!(status, HttpStatusCode::OK);
    assert_eq!(body["isActive"], json!(true));
    Ok(())
}
