mod common;

use axum::http::header::AUTHORIZATION;
use axum::http::StatusCode;
use axum_test::TestServer;
use serde_json::json;

use common::{bearer, drain, drain_topics, listen_as, seed_user};
use social_api::hub::events::{FollowAction, FriendStatus};
use social_api::hub::Event;

// ---------------------------------------------------------------------------
// Follows
// ---------------------------------------------------------------------------

#[tokio::test]
async fn follow_announces_to_actor_feed_and_target() {
    let (app, state) = common::test_app();
    let server = TestServer::new(app).unwrap();
    let (alice, alice_token) = seed_user(&state, "alice").await;
    let (bob, _) = seed_user(&state, "bob").await;
    let (carol, _) = seed_user(&state, "carol").await;

    let (_, mut alice_rx) = listen_as(&state, &alice.id).await;
    let (_, mut bob_rx) = listen_as(&state, &bob.id).await;
    let (_, mut carol_rx) = listen_as(&state, &carol.id).await;
    drain(&mut alice_rx);
    drain(&mut bob_rx);

    server
        .post(&format!("/api/v1/follows/{}", bob.id))
        .add_header(AUTHORIZATION, bearer(&alice_token))
        .await
        .assert_status(StatusCode::CREATED);

    assert_eq!(drain_topics(&mut alice_rx), vec!["user-followed", "follow-updated"]);
    assert_eq!(drain_topics(&mut bob_rx), vec!["follow-updated", "new-notification"]);
    match drain(&mut carol_rx).as_slice() {
        [Event::FollowUpdated(update)] => {
            assert_eq!(update.follower_id, alice.id);
            assert_eq!(update.following_id, bob.id);
            assert_eq!(update.action, FollowAction::Follow);
        }
        other => panic!("unexpected events {other:?}"),
    }
}

#[tokio::test]
async fn follow_rules() {
    let (app, state) = common::test_app();
    let server = TestServer::new(app).unwrap();
    let (alice, alice_token) = seed_user(&state, "alice").await;
    let (bob, _) = seed_user(&state, "bob").await;

    server
        .post(&format!("/api/v1/follows/{}", alice.id))
        .add_header(AUTHORIZATION, bearer(&alice_token))
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    server
        .post("/api/v1/follows/usr_missing")
        .add_header(AUTHORIZATION, bearer(&alice_token))
        .await
        .assert_status(StatusCode::NOT_FOUND);

    server
        .post(&format!("/api/v1/follows/{}", bob.id))
        .add_header(AUTHORIZATION, bearer(&alice_token))
        .await
        .assert_status(StatusCode::CREATED);
    server
        .post(&format!("/api/v1/follows/{}", bob.id))
        .add_header(AUTHORIZATION, bearer(&alice_token))
        .await
        .assert_status(StatusCode::CONFLICT);
}

#[tokio::test]
async fn unfollow_and_status() {
    let (app, state) = common::test_app();
    let server = TestServer::new(app).unwrap();
    let (alice, alice_token) = seed_user(&state, "alice").await;
    let (bob, bob_token) = seed_user(&state, "bob").await;

    server
        .delete(&format!("/api/v1/follows/{}", bob.id))
        .add_header(AUTHORIZATION, bearer(&alice_token))
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    server
        .post(&format!("/api/v1/follows/{}", bob.id))
        .add_header(AUTHORIZATION, bearer(&alice_token))
        .await
        .assert_status(StatusCode::CREATED);

    let status: serde_json::Value = server
        .get(&format!("/api/v1/follows/status/{}", alice.id))
        .add_header(AUTHORIZATION, bearer(&bob_token))
        .await
        .json();
    assert_eq!(status["is_following"], false);
    assert_eq!(status["followed_by"], true);

    let (_, mut alice_rx) = listen_as(&state, &alice.id).await;
    let resp = server
        .delete(&format!("/api/v1/follows/{}", bob.id))
        .add_header(AUTHORIZATION, bearer(&alice_token))
        .await;
    resp.assert_status_ok();
    assert_eq!(resp.json::<serde_json::Value>()["is_following"], false);
    assert_eq!(drain_topics(&mut alice_rx), vec!["user-unfollowed", "follow-updated"]);
}

// ---------------------------------------------------------------------------
// Friends
// ---------------------------------------------------------------------------

async fn send_request(server: &TestServer, token: &str, receiver_id: &str) -> String {
    let resp = server
        .post("/api/v1/friends/requests")
        .add_header(AUTHORIZATION, bearer(token))
        .json(&json!({ "receiver_id": receiver_id, "message": "hi!" }))
        .await;
    resp.assert_status(StatusCode::CREATED);
    resp.json::<serde_json::Value>()["id"]
        .as_str()
        .unwrap()
        .to_string()
}

fn friend_updates(events: Vec<Event>) -> Vec<(String, FriendStatus)> {
    events
        .into_iter()
        .filter_map(|e| match e {
            Event::FriendStatusUpdate(u) => Some((u.user_id, u.status)),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn friend_request_lifecycle_updates_both_sides() {
    let (app, state) = common::test_app();
    let server = TestServer::new(app).unwrap();
    let (alice, alice_token) = seed_user(&state, "alice").await;
    let (bob, bob_token) = seed_user(&state, "bob").await;

    let (_, mut alice_rx) = listen_as(&state, &alice.id).await;
    let (_, mut bob_rx) = listen_as(&state, &bob.id).await;
    drain(&mut alice_rx);

    let request_id = send_request(&server, &alice_token, &bob.id).await;
    assert_eq!(
        friend_updates(drain(&mut alice_rx)),
        vec![(bob.id.clone(), FriendStatus::PendingSent)]
    );
    let bob_events = drain(&mut bob_rx);
    assert_eq!(bob_events.first().map(Event::topic), Some("new-notification"));
    assert_eq!(
        friend_updates(bob_events),
        vec![(alice.id.clone(), FriendStatus::PendingReceived)]
    );

    // Only the receiver may answer.
    server
        .post(&format!("/api/v1/friends/requests/{request_id}"))
        .add_header(AUTHORIZATION, bearer(&alice_token))
        .json(&json!({ "action": "accept" }))
        .await
        .assert_status(StatusCode::FORBIDDEN);

    server
        .post(&format!("/api/v1/friends/requests/{request_id}"))
        .add_header(AUTHORIZATION, bearer(&bob_token))
        .json(&json!({ "action": "accept" }))
        .await
        .assert_status_ok();
    assert_eq!(
        friend_updates(drain(&mut alice_rx)),
        vec![(bob.id.clone(), FriendStatus::Friends)]
    );
    assert_eq!(
        friend_updates(drain(&mut bob_rx)),
        vec![(alice.id.clone(), FriendStatus::Friends)]
    );

    // Answering twice is rejected.
    server
        .post(&format!("/api/v1/friends/requests/{request_id}"))
        .add_header(AUTHORIZATION, bearer(&bob_token))
        .json(&json!({ "action": "decline" }))
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    let status: serde_json::Value = server
        .get(&format!("/api/v1/friends/status/{}", alice.id))
        .add_header(AUTHORIZATION, bearer(&bob_token))
        .await
        .json();
    assert_eq!(status["status"], "friends");

    server
        .post("/api/v1/friends/requests")
        .add_header(AUTHORIZATION, bearer(&bob_token))
        .json(&json!({ "receiver_id": alice.id }))
        .await
        .assert_status(StatusCode::CONFLICT);

    server
        .delete(&format!("/api/v1/friends/{}", alice.id))
        .add_header(AUTHORIZATION, bearer(&bob_token))
        .await
        .assert_status_ok();
    assert_eq!(
        friend_updates(drain(&mut alice_rx)),
        vec![(bob.id.clone(), FriendStatus::None)]
    );

    server
        .delete(&format!("/api/v1/friends/{}", alice.id))
        .add_header(AUTHORIZATION, bearer(&bob_token))
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn duplicate_pending_request_conflicts_either_way() {
    let (app, state) = common::test_app();
    let server = TestServer::new(app).unwrap();
    let (alice, alice_token) = seed_user(&state, "alice").await;
    let (bob, bob_token) = seed_user(&state, "bob").await;

    send_request(&server, &alice_token, &bob.id).await;

    for (token, receiver) in [(&alice_token, &bob.id), (&bob_token, &alice.id)] {
        server
            .post("/api/v1/friends/requests")
            .add_header(AUTHORIZATION, bearer(token))
            .json(&json!({ "receiver_id": receiver }))
            .await
            .assert_status(StatusCode::CONFLICT);
    }

    server
        .post("/api/v1/friends/requests")
        .add_header(AUTHORIZATION, bearer(&alice_token))
        .json(&json!({ "receiver_id": alice.id }))
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn sender_can_cancel_pending_request() {
    let (app, state) = common::test_app();
    let server = TestServer::new(app).unwrap();
    let (alice, alice_token) = seed_user(&state, "alice").await;
    let (bob, bob_token) = seed_user(&state, "bob").await;

    let request_id = send_request(&server, &alice_token, &bob.id).await;
    let (_, mut bob_rx) = listen_as(&state, &bob.id).await;

    server
        .delete(&format!("/api/v1/friends/requests/{request_id}"))
        .add_header(AUTHORIZATION, bearer(&bob_token))
        .await
        .assert_status(StatusCode::FORBIDDEN);

    server
        .delete(&format!("/api/v1/friends/requests/{request_id}"))
        .add_header(AUTHORIZATION, bearer(&alice_token))
        .await
        .assert_status(StatusCode::NO_CONTENT);

    assert_eq!(
        friend_updates(drain(&mut bob_rx)),
        vec![(alice.id.clone(), FriendStatus::None)]
    );

    let status: serde_json::Value = server
        .get(&format!("/api/v1/friends/status/{}", bob.id))
        .add_header(AUTHORIZATION, bearer(&alice_token))
        .await
        .json();
    assert_eq!(status["status"], "none");
}
