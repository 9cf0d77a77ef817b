//! Integration tests for a session running over the in-memory store

mod common;

use ::common::crypto::{
    Cipher, Envelope, KeyMaterial, SeaCipher, Secret, SecretKey, SignedEnvelope,
};
use ::common::decoder::{DropReason, OWNER_ENCRYPTION_KEY_FIELD};
use ::common::graph::{Node, Value};
use ::common::testkit::CountingCipher;
use ::common::transport::{Delivery, StoreTransport};

use crate::common::{seal, setup_session, WINDOW};

#[tokio::test(start_paused = true)]
async fn test_field_burst_publishes_one_snapshot() {
    let (session, rx) = setup_session(SeaCipher, None);

    let mut node = Node::new("profile");
    for (field, value) in [("name", "alice"), ("city", "paris"), ("lang", "fr")] {
        node.put(field, value);
        session.receive(Delivery::from(node.clone())).await;
    }
    assert!(rx.try_recv().is_none());

    tokio::time::sleep(WINDOW * 2).await;

    let snapshot = rx.recv().await.unwrap();
    let profile = snapshot.get("profile").unwrap();
    assert_eq!(profile.get("name"), Some(&Value::text("alice")));
    assert_eq!(profile.get("lang"), Some(&Value::text("fr")));
    assert!(rx.try_recv().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_own_write_echo_decodes_from_cache() {
    let keys = KeyMaterial::generate();
    let (session, rx) = setup_session(CountingCipher::new(SeaCipher), Some(keys));
    let id = session.child_id(None);
    let echoes = session.transport().subscribe();

    session.put(&id, "secret", Value::text("hello")).await.unwrap();
    let optimistic = rx.recv().await.unwrap();
    assert_eq!(
        optimistic.get(&id).and_then(|node| node.get("secret")),
        Some(&Value::text("hello"))
    );

    let echo = echoes.recv_async().await.unwrap();
    let report = session.receive(echo).await;
    assert!(report.is_clean());
    assert!(session.flush());

    let reconciled = rx.recv().await.unwrap();
    assert_eq!(
        reconciled.get(&id).and_then(|node| node.get("secret")),
        Some(&Value::text("hello"))
    );
    assert_eq!(session.snapshot(), reconciled);
    assert_eq!(session.cipher().decrypt_calls(), 0);
    assert_eq!(session.cipher().encrypt_calls(), 1);
}

/// Write one field, feed the store's echo back in, and return the settled value
async fn write_and_reconcile<C: Cipher>(
    session: &::common::session::Session<::common::transport::MemoryTransport, C>,
    id: &str,
    field: &str,
    value: Value,
) -> Option<Value> {
    let echoes = session.transport().subscribe();
    session.put(id, field, value).await.unwrap();

    let echo = echoes.recv_async().await.unwrap();
    let report = session.receive(echo).await;
    assert!(report.is_clean(), "echo dropped fields: {:?}", report.dropped);
    session.flush();

    session.snapshot().get(id).and_then(|node| node.get(field)).cloned()
}

#[tokio::test]
async fn test_public_write_survives_echo() {
    let (session, _rx) = setup_session(SeaCipher, Some(KeyMaterial::generate()));

    let settled = write_and_reconcile(&session, "list", "title", Value::text("groceries")).await;
    assert_eq!(settled, Some(Value::text("groceries")));

    let stored = session.transport().node("list").unwrap();
    let wire = stored.get("title").and_then(Value::as_text).unwrap();
    assert!(SignedEnvelope::is_signed(wire));
    assert!(!wire.contains("SEA{"));
}

#[tokio::test]
async fn test_encryption_only_session_survives_echo() {
    let keys = KeyMaterial::default().with_encryption(Secret::generate());
    let (session, _rx) = setup_session(SeaCipher, Some(keys));
    let id = session.child_id(None);
    assert_eq!(id, "sess");

    let settled = write_and_reconcile(&session, &id, "note", Value::text("mine")).await;
    assert_eq!(settled, Some(Value::text("mine")));
}

#[tokio::test]
async fn test_write_to_shared_owner_seals_with_their_key() {
    let shared = Secret::generate();
    let (session, _rx) =
        setup_session(CountingCipher::new(SeaCipher), Some(KeyMaterial::generate()));
    session.vault().remember_self_key("friend", shared.clone());

    let settled = write_and_reconcile(&session, "doc~friend.", "body", Value::text("hi")).await;
    assert_eq!(settled, Some(Value::text("hi")));
    assert_eq!(session.cipher().decrypt_calls(), 0);

    let stored = session.transport().node("doc~friend.").unwrap();
    let wire = stored.get("body").and_then(Value::as_text).unwrap().to_string();
    assert!(!SignedEnvelope::is_signed(&wire));
    assert_eq!(
        SeaCipher.decrypt(&wire, &shared).await.unwrap(),
        ::common::graph::Scalar::from("hi")
    );
}

#[tokio::test]
async fn test_empty_text_write_survives_echo() {
    let (session, _rx) = setup_session(SeaCipher, Some(KeyMaterial::generate()));
    let id = session.child_id(None);

    let settled = write_and_reconcile(&session, &id, "draft", Value::text("")).await;
    assert_eq!(settled, Some(Value::text("")));
}

#[tokio::test]
async fn test_write_without_keys_is_plain() {
    let (session, _rx) = setup_session(SeaCipher, None);

    session.put("open", "note", Value::text("hi")).await.unwrap();

    let stored = session.transport().node("open").unwrap();
    assert_eq!(stored.get("note"), Some(&Value::text("hi")));
}

#[tokio::test]
async fn test_forged_signature_is_dropped() {
    let owner = SecretKey::generate();
    let intruder = SecretKey::generate();
    let (session, _rx) = setup_session(SeaCipher, None);
    let id = format!("doc~{}.", owner.public());

    let forged = SignedEnvelope::sign(
        Envelope {
            id: id.clone(),
            field: "title".to_string(),
            value: Value::text("pwned"),
            state: 1,
        },
        &intruder,
    )
    .unwrap();
    let genuine = SignedEnvelope::sign(
        Envelope {
            id: id.clone(),
            field: "body".to_string(),
            value: Value::text("hello"),
            state: 2,
        },
        &owner,
    )
    .unwrap();

    let raw = Node::new(id.as_str())
        .with("title", forged.to_wire().unwrap().as_str())
        .with("body", genuine.to_wire().unwrap().as_str());
    let report = session.receive(Delivery::from(raw)).await;
    session.flush();

    assert_eq!(
        report.dropped,
        vec![("title".to_string(), DropReason::InvalidSignature)]
    );
    let decoded = session.snapshot().get(&id).cloned().unwrap();
    assert!(!decoded.contains("title"));
    assert_eq!(decoded.get("body"), Some(&Value::text("hello")));
}

#[tokio::test]
async fn test_delegated_key_unlocks_owner_grant() {
    let owner_key = Secret::generate();
    let forwarded = Secret::generate();
    let keys = KeyMaterial::default()
        .with_signing(SecretKey::generate())
        .with_owner_encryption(owner_key.clone());
    let (session, _rx) = setup_session(SeaCipher, Some(keys));
    let owner = session.public_key().unwrap().to_hex();
    let id = format!("grant~{}.~delegate.", owner);

    let raw = Node::new(id.as_str()).with(
        OWNER_ENCRYPTION_KEY_FIELD,
        seal(&forwarded.to_hex(), &owner_key).await,
    );
    let report = session.receive(Delivery::new(raw, id.as_str())).await;

    assert!(report.is_clean());
    assert_eq!(
        session.vault().lookup_delegated_key("delegate"),
        Some(forwarded)
    );
}

#[tokio::test]
async fn test_anonymous_delivery_lands_under_fallback_key() {
    let (session, _rx) = setup_session(SeaCipher, None);

    session
        .receive(Delivery::new(Node::anonymous().with("k", "v"), "fallback"))
        .await;
    session.flush();

    assert!(session.snapshot().contains_key("fallback"));
}

#[tokio::test]
async fn test_members_of_tracks_snapshot() {
    let (session, _rx) = setup_session(SeaCipher, None);

    session
        .receive(Delivery::from(
            Node::new("todos")
                .with("a", Value::reference("todo-a"))
                .with("b", Value::reference("todo-b")),
        ))
        .await;
    session
        .receive(Delivery::from(Node::new("todo-a").with("text", "milk")))
        .await;
    assert!(session.members_of("todos").is_empty());

    session.flush();
    let members = session.members_of("todos");
    assert_eq!(members.len(), 1);
    assert_eq!(members[0].id(), Some("todo-a"));
}
