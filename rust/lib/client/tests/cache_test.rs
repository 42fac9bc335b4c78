//! Entity cache and write path against the mock proxy.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::*;
use serde_json::{json, Map};
use stockroom_client::{
    ApiError, Collection, CollectionPhase, Draft, EntityCache, FetchOutcome, MemoryStore,
    ProxyClient, ProxyConfig, SessionManager, WriteNotice,
};

struct Fixture {
    proxy: MockProxy,
    client: ProxyClient,
    session: Arc<SessionManager>,
    cache: Arc<EntityCache>,
}

async fn signed_in() -> Fixture {
    let proxy = start_mock_proxy().await;
    let client = ProxyClient::new(ProxyConfig::new(&proxy.base_url)).unwrap();
    let session = Arc::new(SessionManager::new(client.clone(), Arc::new(MemoryStore::new())));
    assert!(session.sign_in(ADMIN_EMAIL, ADMIN_PASSWORD).await);
    let cache = Arc::new(EntityCache::new(client.clone(), session.clone()));
    Fixture { proxy, client, session, cache }
}

// =====================================================================
// fetch
// =====================================================================

#[tokio::test]
async fn fetch_populates_collection() {
    let f = signed_in().await;

    let outcome = f.cache.fetch(Collection::Products).await;
    assert_eq!(outcome, FetchOutcome::Fetched { count: 2 });

    let snap = f.cache.get(Collection::Products);
    assert_eq!(snap.phase, CollectionPhase::Populated);
    assert!(snap.error.is_none());
    assert!(snap.last_fetched_at.is_some());
    assert_eq!(snap.find(1).unwrap().str_field("name"), Some("Desk"));
    assert_eq!(snap.find(1).unwrap().many2one("categ_id").label(), Some("Furniture"));
}

#[tokio::test]
async fn duplicate_fetch_while_pending_makes_one_request() {
    let f = signed_in().await;
    f.proxy.state.set_list_delay(Duration::from_millis(200));

    let (a, b) = tokio::join!(
        f.cache.fetch(Collection::Products),
        f.cache.fetch(Collection::Products)
    );

    assert_eq!(a, FetchOutcome::Fetched { count: 2 });
    assert_eq!(b, FetchOutcome::AlreadyInFlight);
    assert_eq!(f.proxy.state.hits("products"), 1);
}

#[tokio::test]
async fn different_collections_fetch_independently() {
    let f = signed_in().await;
    f.proxy.state.set_list_delay(Duration::from_millis(50));

    let (a, b) = tokio::join!(
        f.cache.fetch(Collection::Products),
        f.cache.fetch(Collection::Quants)
    );

    assert_eq!(a, FetchOutcome::Fetched { count: 2 });
    assert_eq!(b, FetchOutcome::Fetched { count: 1 });
    assert_eq!(f.proxy.state.hits("products"), 1);
    assert_eq!(f.proxy.state.hits("quants"), 1);
}

#[tokio::test]
async fn failed_refresh_keeps_previous_data() {
    let f = signed_in().await;
    f.cache.fetch(Collection::Products).await;

    f.proxy.state.revoke(ADMIN_SESSION);
    let outcome = f.cache.fetch(Collection::Products).await;
    assert_eq!(outcome, FetchOutcome::Failed("Session expired".into()));

    let snap = f.cache.get(Collection::Products);
    assert_eq!(snap.phase, CollectionPhase::Errored);
    assert_eq!(snap.error.as_deref(), Some("Session expired"));
    assert_eq!(snap.data.len(), 2, "stale data stays readable");
}

#[tokio::test]
async fn fetch_after_sign_out_fails_without_request() {
    let f = signed_in().await;
    f.session.sign_out();

    let outcome = f.cache.fetch(Collection::Products).await;
    assert!(matches!(outcome, FetchOutcome::Failed(_)));
    assert_eq!(f.proxy.state.hits("products"), 0);
}

#[tokio::test]
async fn close_discards_pending_result() {
    let f = signed_in().await;
    f.proxy.state.set_list_delay(Duration::from_millis(200));

    let cache = f.cache.clone();
    let pending = tokio::spawn(async move { cache.fetch(Collection::Products).await });
    tokio::time::sleep(Duration::from_millis(50)).await;
    f.cache.close();

    assert_eq!(pending.await.unwrap(), FetchOutcome::Discarded);
    let snap = f.cache.get(Collection::Products);
    assert!(snap.data.is_empty());
    assert_ne!(snap.phase, CollectionPhase::Loading);
}

#[tokio::test]
async fn cancelled_fetch_does_not_block_the_next_one() {
    let f = signed_in().await;
    f.proxy.state.set_list_delay(Duration::from_millis(300));

    let timed_out = tokio::time::timeout(Duration::from_millis(50), f.cache.fetch(Collection::Products)).await;
    assert!(timed_out.is_err());

    let snap = f.cache.get(Collection::Products);
    assert_eq!(snap.phase, CollectionPhase::Errored);
    assert!(snap.data.is_empty());

    f.proxy.state.set_list_delay(Duration::ZERO);
    let outcome = f.cache.fetch(Collection::Products).await;
    assert_eq!(outcome, FetchOutcome::Fetched { count: 2 });
    assert_eq!(f.cache.get(Collection::Products).phase, CollectionPhase::Populated);
}

#[tokio::test]
async fn cancelled_refresh_keeps_previous_data() {
    let f = signed_in().await;
    f.cache.fetch(Collection::Quants).await;

    f.proxy.state.set_list_delay(Duration::from_millis(300));
    let timed_out = tokio::time::timeout(Duration::from_millis(50), f.cache.fetch(Collection::Quants)).await;
    assert!(timed_out.is_err());

    let snap = f.cache.get(Collection::Quants);
    assert_eq!(snap.phase, CollectionPhase::Errored);
    assert_eq!(snap.data.len(), 1);
    assert!(snap.last_fetched_at.is_some());
}

#[tokio::test]
async fn clear_discards_pending_result() {
    let f = signed_in().await;
    f.proxy.state.set_list_delay(Duration::from_millis(200));

    let cache = f.cache.clone();
    let pending = tokio::spawn(async move { cache.fetch(Collection::Quants).await });
    tokio::time::sleep(Duration::from_millis(50)).await;
    f.cache.clear();

    assert_eq!(pending.await.unwrap(), FetchOutcome::Discarded);
    assert_eq!(f.cache.get(Collection::Quants).phase, CollectionPhase::Empty);
}

// =====================================================================
// write path + manual invalidation
// =====================================================================

#[tokio::test]
async fn write_then_refetch_returns_new_values() {
    let f = signed_in().await;
    f.cache.fetch(Collection::Products).await;
    f.cache.fetch(Collection::Quants).await;

    let desk = f.cache.get(Collection::Products).find(1).cloned().unwrap();
    let mut draft = Draft::edit(desk);
    draft.set("name", "Standing desk").set("list_price", 199.0);
    draft
        .save_update(&f.client, f.session.as_ref(), Collection::Products, 1)
        .await
        .unwrap();
    assert!(!draft.is_dirty());
    assert_eq!(draft.original().unwrap().str_field("name"), Some("Standing desk"));

    // Cache is caller-invalidated: nothing changed yet.
    assert_eq!(
        f.cache.get(Collection::Products).find(1).unwrap().str_field("name"),
        Some("Desk")
    );

    f.cache.fetch(Collection::Products).await;
    let desk = f.cache.get(Collection::Products).find(1).cloned().unwrap();
    assert_eq!(desk.str_field("name"), Some("Standing desk"));
    assert_eq!(desk.f64_field("list_price"), Some(199.0));

    // Writing a product never touches quants.
    let quants = f.cache.get(Collection::Quants);
    assert!(!quants.stale);
    assert_eq!(f.proxy.state.hits("quants"), 1);
}

#[tokio::test]
async fn rejected_write_keeps_draft() {
    let f = signed_in().await;
    f.cache.fetch(Collection::Products).await;

    let chair = f.cache.get(Collection::Products).find(2).cloned().unwrap();
    let mut draft = Draft::edit(chair);
    draft.set("list_price", -5.0);

    let err = draft
        .save_update(&f.client, f.session.as_ref(), Collection::Products, 2)
        .await
        .unwrap_err();
    match &err {
        ApiError::Rejected(msg) => assert_eq!(msg, "Sales price cannot be negative"),
        other => panic!("expected Rejected, got: {:?}", other),
    }
    assert!(draft.is_dirty());
    assert_eq!(draft.values()["list_price"], json!(-5.0));

    let notice = WriteNotice::from_error(&err);
    assert_eq!(notice.message, "Sales price cannot be negative");
    assert!(!notice.is_expired());

    // Correct and resubmit.
    draft.set("list_price", 50.0);
    draft
        .save_update(&f.client, f.session.as_ref(), Collection::Products, 2)
        .await
        .unwrap();
    assert_eq!(f.proxy.state.hits("products:update"), 2);
}

#[tokio::test]
async fn create_with_related_commands() {
    let f = signed_in().await;

    let mut draft = Draft::new();
    draft.set("name", "Cold room");
    draft.replace_many2many("product_ids", &[1, 2]);
    let mut capacity = Map::new();
    capacity.insert("package_type_id".into(), json!(4));
    capacity.insert("quantity".into(), json!(20));
    draft.create_related("capacity_ids", capacity);

    let id = draft
        .save_create(&f.client, f.session.as_ref(), Collection::StorageCategories)
        .await
        .unwrap();
    assert_eq!(id, 1);
    assert!(!draft.is_dirty());

    f.cache.fetch(Collection::StorageCategories).await;
    let snap = f.cache.get(Collection::StorageCategories);
    let created = snap.find(1).unwrap();
    assert_eq!(created.str_field("name"), Some("Cold room"));
    assert_eq!(created.raw("product_ids"), Some(&json!([[6, 0, [1, 2]]])));
    assert_eq!(
        created.raw("capacity_ids"),
        Some(&json!([[0, 0, {"package_type_id": 4, "quantity": 20}]]))
    );
}

#[tokio::test]
async fn invalidate_then_refresh_stale() {
    let f = signed_in().await;
    f.cache.fetch(Collection::Products).await;
    f.cache.fetch(Collection::Quants).await;

    assert!(f.cache.invalidate(Collection::Quants));
    let outcomes = f.cache.refresh_stale().await;

    assert_eq!(outcomes, vec![(Collection::Quants, FetchOutcome::Fetched { count: 1 })]);
    assert!(!f.cache.get(Collection::Quants).stale);
    assert_eq!(f.proxy.state.hits("quants"), 2);
    assert_eq!(f.proxy.state.hits("products"), 1);
}
