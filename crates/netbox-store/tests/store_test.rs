//! NetBoxStore against an in-process fake of the NetBox prefix and tenant API

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use ipam_core::{ErrorKind, IpamConfig, PoolHierarchy, PoolPatch, PoolSpec, PoolStatus, PoolStore};
use netbox_store::NetBoxStore;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

const PAGE_SIZE: usize = 2;

#[derive(Clone)]
struct FakeNetBox {
    addr: SocketAddr,
    prefixes: Arc<Mutex<Vec<Value>>>,
    tenants: Arc<Vec<Value>>,
}

fn page(fake: &FakeNetBox, path: &str, items: Vec<Value>, offset: usize) -> Value {
    let next = if offset + PAGE_SIZE < items.len() {
        json!(format!("http://{}{}?offset={}", fake.addr, path, offset + PAGE_SIZE))
    } else {
        Value::Null
    };
    json!({
        "count": items.len(),
        "next": next,
        "previous": null,
        "results": items.into_iter().skip(offset).take(PAGE_SIZE).collect::<Vec<_>>(),
    })
}

async fn list_prefixes(State(fake): State<FakeNetBox>, Query(query): Query<HashMap<String, String>>) -> Json<Value> {
    let offset = query.get("offset").and_then(|o| o.parse().ok()).unwrap_or(0);
    let name = query.get("cf_ipam_pool_name__ie").map(|n| n.to_lowercase());
    let items: Vec<Value> = fake
        .prefixes
        .lock()
        .unwrap()
        .iter()
        .filter(|p| match &name {
            None => true,
            Some(wanted) => p["custom_fields"]["ipam_pool_name"]
                .as_str()
                .is_some_and(|n| n.to_lowercase() == *wanted),
        })
        .cloned()
        .collect();
    Json(page(&fake, "/api/ipam/prefixes/", items, offset))
}

async fn create_prefix(State(fake): State<FakeNetBox>, Json(mut body): Json<Value>) -> (StatusCode, Json<Value>) {
    let mut prefixes = fake.prefixes.lock().unwrap();
    let id = prefixes.iter().filter_map(|p| p["id"].as_u64()).max().unwrap_or(0) + 1;
    body["id"] = json!(id);
    body["created"] = json!("2025-06-01T00:00:00Z");
    body["last_updated"] = json!("2025-06-01T00:00:00Z");
    prefixes.push(body.clone());
    (StatusCode::CREATED, Json(body))
}

async fn get_prefix(State(fake): State<FakeNetBox>, Path(id): Path<u64>) -> Result<Json<Value>, StatusCode> {
    fake.prefixes
        .lock()
        .unwrap()
        .iter()
        .find(|p| p["id"] == json!(id))
        .cloned()
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

async fn patch_prefix(
    State(fake): State<FakeNetBox>,
    Path(id): Path<u64>,
    Json(patch): Json<Value>,
) -> Result<Json<Value>, StatusCode> {
    let mut prefixes = fake.prefixes.lock().unwrap();
    let prefix = prefixes.iter_mut().find(|p| p["id"] == json!(id)).ok_or(StatusCode::NOT_FOUND)?;
    if let Some(status) = patch.get("status") {
        prefix["status"] = status.clone();
    }
    if let Some(description) = patch.get("description") {
        prefix["description"] = description.clone();
    }
    if let Some(tags) = patch.pointer("/custom_fields/ipam_tags") {
        prefix["custom_fields"]["ipam_tags"] = tags.clone();
    }
    Ok(Json(prefix.clone()))
}

async fn list_tenants(State(fake): State<FakeNetBox>, Query(query): Query<HashMap<String, String>>) -> Json<Value> {
    let offset = query.get("offset").and_then(|o| o.parse().ok()).unwrap_or(0);
    Json(page(&fake, "/api/tenancy/tenants/", fake.tenants.to_vec(), offset))
}

async fn start_fake(prefixes: Vec<Value>, tenants: Vec<Value>) -> NetBoxStore {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let fake = FakeNetBox {
        addr: listener.local_addr().unwrap(),
        prefixes: Arc::new(Mutex::new(prefixes)),
        tenants: Arc::new(tenants),
    };
    let base_url = format!("http://{}", fake.addr);

    let app = Router::new()
        .route("/api/ipam/prefixes/", get(list_prefixes).post(create_prefix))
        .route("/api/ipam/prefixes/{id}/", get(get_prefix).patch(patch_prefix))
        .route("/api/tenancy/tenants/", get(list_tenants))
        .route("/api/status/", get(|| async { Json(json!({"netbox-version": "4.1.0"})) }))
        .with_state(fake);
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    NetBoxStore::new(&base_url, "test-token").unwrap()
}

fn stored_prefix(id: u64, prefix: &str, name: &str, parent: Option<u64>) -> Value {
    json!({
        "id": id,
        "prefix": prefix,
        "status": {"value": "active", "label": "Active"},
        "description": "",
        "custom_fields": {
            "ipam_pool_name": name,
            "ipam_pool_type": "region",
            "ipam_parent_id": parent,
            "ipam_source": "manual",
            "ipam_tags": {}
        }
    })
}

#[tokio::test]
async fn test_list_follows_pagination_and_skips_ipv6() {
    let store = start_fake(
        vec![
            stored_prefix(5, "10.2.0.0/16", "eu", Some(1)),
            stored_prefix(1, "10.0.0.0/8", "corp", None),
            json!({"id": 3, "prefix": "2001:db8::/32", "status": "active"}),
            stored_prefix(4, "10.1.0.0/16", "us", Some(1)),
            stored_prefix(9, "172.16.0.0/12", "lab", None),
        ],
        Vec::new(),
    )
    .await;

    let pools = store.list_pools(&CancellationToken::new()).await.unwrap();
    let ids: Vec<_> = pools.iter().map(|p| p.id).collect();
    assert_eq!(ids, vec![1, 4, 5, 9]);
}

#[tokio::test]
async fn test_get_missing_pool_is_none() {
    let store = start_fake(vec![stored_prefix(1, "10.0.0.0/8", "corp", None)], Vec::new()).await;
    let cancel = CancellationToken::new();

    assert!(store.get_pool(&cancel, 1).await.unwrap().is_some());
    assert!(store.get_pool(&cancel, 2).await.unwrap().is_none());
}

#[tokio::test]
async fn test_hierarchy_create_and_update_through_netbox() {
    let store = start_fake(vec![stored_prefix(1, "10.0.0.0/8", "corp", None)], Vec::new()).await;
    let config = IpamConfig::default();
    let cancel = CancellationToken::new();
    let hierarchy = PoolHierarchy::new(&store, &config);

    let created = hierarchy
        .create(
            &cancel,
            &PoolSpec {
                name: "us-east".to_string(),
                cidr: "10.1.0.0/16".to_string(),
                parent_id: Some(1),
                ..PoolSpec::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(created.id, 2);
    assert_eq!(created.parent_id, Some(1));
    assert_eq!(created.status, PoolStatus::Planned);
    assert_eq!(created.name, "us-east");

    let updated = hierarchy
        .update(
            &cancel,
            created.id,
            &PoolPatch {
                status: Some("active".to_string()),
                ..PoolPatch::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.status, PoolStatus::Active);

    let err = hierarchy
        .create(
            &cancel,
            &PoolSpec {
                name: "rogue".to_string(),
                cidr: "10.1.2.0/24".to_string(),
                ..PoolSpec::default()
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
}

#[tokio::test]
async fn test_duplicate_name_and_missing_parent() {
    let store = start_fake(vec![stored_prefix(1, "10.0.0.0/8", "corp", None)], Vec::new()).await;
    let config = IpamConfig::default();
    let cancel = CancellationToken::new();
    let hierarchy = PoolHierarchy::new(&store, &config);

    let new_pool = hierarchy
        .validate_spec(&PoolSpec {
            name: "CORP".to_string(),
            cidr: "192.168.0.0/16".to_string(),
            ..PoolSpec::default()
        })
        .unwrap();
    let err = store.create_pool(&cancel, new_pool.clone()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    let orphan = ipam_core::NewPool {
        name: "orphan".to_string(),
        parent_id: Some(77),
        ..new_pool
    };
    let err = store.create_pool(&cancel, orphan).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_update_missing_pool_is_not_found() {
    let store = start_fake(Vec::new(), Vec::new()).await;
    let err = store
        .update_pool(
            &CancellationToken::new(),
            42,
            ipam_core::PoolUpdate {
                status: Some(PoolStatus::Active),
                ..ipam_core::PoolUpdate::default()
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_list_accounts_from_tenants() {
    let store = start_fake(
        Vec::new(),
        vec![
            json!({"id": 2, "name": "Beta", "slug": "aws-2", "custom_fields": {"ipam_provider": "aws"}}),
            json!({"id": 1, "name": "Alpha", "slug": "gcp-1", "custom_fields": {"ipam_provider": "gcp", "ipam_account_cidr": "10.8.0.0/16"}}),
            json!({"id": 3, "name": "Gamma", "slug": "aws-3", "custom_fields": {}}),
        ],
    )
    .await;

    let accounts = store.list_accounts(&CancellationToken::new()).await.unwrap();
    let keys: Vec<_> = accounts.iter().map(|a| a.key.as_str()).collect();
    assert_eq!(keys, vec!["gcp-1", "aws-2", "aws-3"]);
    assert_eq!(accounts[0].cidr.map(|c| c.to_string()), Some("10.8.0.0/16".to_string()));
}

#[tokio::test]
async fn test_cancelled_token_short_circuits() {
    let store = start_fake(Vec::new(), Vec::new()).await;
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = store.list_pools(&cancel).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Cancelled);
}

#[tokio::test]
async fn test_validate_token() {
    let store = start_fake(Vec::new(), Vec::new()).await;
    store.validate_token(&CancellationToken::new()).await.unwrap();
}

#[tokio::test]
async fn test_unreachable_netbox_is_storage_error() {
    let store = NetBoxStore::new("http://127.0.0.1:1", "token").unwrap();
    let err = store.list_pools(&CancellationToken::new()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Storage);
}

#[tokio::test]
async fn test_cancel_while_body_is_stalled() {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    // Headers and a partial body arrive, then the server goes quiet
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = [0u8; 4096];
        let _ = socket.read(&mut request).await;
        let _ = socket
            .write_all(b"HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: 1000\r\n\r\n{\"count\":")
            .await;
        let _ = socket.flush().await;
        tokio::time::sleep(Duration::from_secs(60)).await;
    });

    let store = NetBoxStore::with_timeout(&format!("http://{}", addr), "token", Duration::from_secs(30)).unwrap();
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        trigger.cancel();
    });

    let started = Instant::now();
    let err = store.list_pools(&cancel).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Cancelled);
    assert!(started.elapsed() < Duration::from_secs(5), "took {:?}", started.elapsed());
}
