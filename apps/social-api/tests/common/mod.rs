#![allow(dead_code)]

pub mod slow_store;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tokio::sync::mpsc;

use social_api::auth::tokens;
use social_api::config::Config;
use social_api::hub::registry::Frame;
use social_api::hub::{Event, EventHub, Room};
use social_api::models::user::{Role, User, UserCosmetics};
use social_api::store::kv::{KeyValueStore, MemoryKv};
use social_api::store::memory::MemoryStore;
use social_api::store::Store;
use social_api::AppState;
use social_common::PrefixedId;

/// Build a test AppState over empty in-memory stores with the hub installed.
pub fn test_state() -> AppState {
    test_state_with(Arc::new(MemoryStore::new()))
}

/// Like [`test_state`], over a caller-supplied document store.
pub fn test_state_with(store: Arc<dyn Store>) -> AppState {
    let kv: Arc<dyn KeyValueStore> = Arc::new(MemoryKv::new());
    let config = Config {
        ping_interval: Duration::from_millis(200),
        ping_timeout: Duration::from_secs(5),
        ..Config::default()
    };
    let state = AppState::new(store, kv, config);
    state.install_hub();
    state
}

/// Build the full application router wired to the test state.
pub fn test_app() -> (Router, AppState) {
    let state = test_state();
    let app = social_api::routes::router().with_state(state.clone());
    (app, state)
}

/// Build the application router over a caller-supplied document store.
pub fn test_app_with(store: Arc<dyn Store>) -> (Router, AppState) {
    let state = test_state_with(store);
    let app = social_api::routes::router().with_state(state.clone());
    (app, state)
}

pub fn hub(state: &AppState) -> Arc<EventHub> {
    state.hub.get().expect("hub installed")
}

/// Create a user directly in the store and mint a session for them.
pub async fn seed_user(state: &AppState, username: &str) -> (User, String) {
    let user = User::new(User::generate(), username, username);
    let user = state.store.create_user(user).await.expect("create user");
    let token = tokens::issue_session(state.kv.as_ref(), &user.id)
        .await
        .expect("issue session");
    (user, token)
}

pub async fn seed_admin(state: &AppState, username: &str) -> (User, String) {
    let (user, token) = seed_user(state, username).await;
    let cosmetics = UserCosmetics {
        role: Some(Role::Admin),
        ..Default::default()
    };
    let user = state
        .store
        .update_cosmetics(&user.id, cosmetics)
        .await
        .expect("promote")
        .after;
    (user, token)
}

pub fn bearer(token: &str) -> String {
    format!("Bearer {token}")
}

/// An in-process hub connection that joined `user_id`'s room and the feed,
/// as a signed-in client does.
pub async fn listen_as(state: &AppState, user_id: &str) -> (String, mpsc::Receiver<Frame>) {
    let hub = hub(state);
    let (conn_id, mut rx) = hub.connect();
    hub.join_user_room(&conn_id, user_id).await;
    hub.join(&conn_id, Room::Feed);
    // Our own presence announcement.
    drain(&mut rx);
    (conn_id, rx)
}

/// Every event currently queued for a connection, in order.
pub fn drain(rx: &mut mpsc::Receiver<Frame>) -> Vec<Event> {
    let mut events = Vec::new();
    while let Ok(frame) = rx.try_recv() {
        events.push(serde_json::from_str(&frame).expect("decode frame"));
    }
    events
}

/// Topic names of every queued event, in order.
pub fn drain_topics(rx: &mut mpsc::Receiver<Frame>) -> Vec<&'static str> {
    drain(rx).iter().map(Event::topic).collect()
}
