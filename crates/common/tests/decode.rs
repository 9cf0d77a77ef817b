//! Integration tests for decoding raw nodes against a vault and cache

mod common;

use ::common::cache::DecryptionCache;
use ::common::crypto::{Secret, SeaCipher};
use ::common::decoder::{decode, DropReason, NodeDecoder, ENCRYPTION_KEY_FIELD};
use ::common::graph::{members_of, Node, Snapshot, Value};
use ::common::testkit::{CountingCipher, TableCipher};
use ::common::vault::KeyVault;

use crate::common::seal;

#[tokio::test]
async fn test_missing_key_recovers_on_redelivery() {
    common::init_tracing();
    let key = Secret::generate();
    let cipher = TableCipher::new().with_entry("SEA{xxx}", &key, "hello");
    let vault = KeyVault::new();
    let cache = DecryptionCache::new();
    let raw = Node::new("A~pub1.").with("secret", "SEA{xxx}");

    let first = decode(&raw, &vault, &cache, &cipher).await;
    assert_eq!(first, Node::new("A~pub1."));

    vault.remember_self_key("pub1", key);
    let second = decode(&raw, &vault, &cache, &cipher).await;
    assert_eq!(second, Node::new("A~pub1.").with("secret", "hello"));
}

#[tokio::test]
async fn test_same_ciphertext_decrypts_once() {
    let key = Secret::generate();
    let sealed = seal("hello", &key).await;
    let cipher = CountingCipher::new(SeaCipher);
    let vault = KeyVault::new();
    vault.remember_self_key("pub1", key);
    let cache = DecryptionCache::new();

    let a = Node::new("a~pub1.").with("x", sealed.clone());
    let b = Node::new("b~pub1.").with("y", sealed);

    let decoded_a = decode(&a, &vault, &cache, &cipher).await;
    let decoded_b = decode(&b, &vault, &cache, &cipher).await;

    assert_eq!(decoded_a.get("x"), Some(&Value::text("hello")));
    assert_eq!(decoded_b.get("y"), Some(&Value::text("hello")));
    assert_eq!(cipher.decrypt_calls(), 1);
}

#[tokio::test]
async fn test_key_material_flows_down_a_chain() {
    common::init_tracing();
    let owner_key = Secret::generate();
    let delegate_key = Secret::generate();
    let vault = KeyVault::new();
    vault.remember_self_key("owner", owner_key.clone());
    let cache = DecryptionCache::new();

    let grant = Node::new("root~owner.~delegate.").with(
        ENCRYPTION_KEY_FIELD,
        seal(&delegate_key.to_hex(), &owner_key).await,
    );
    let private = Node::new("notes~delegate.").with("body", seal("for delegate", &delegate_key).await);

    // before the grant arrives the delegate's fields are unreadable
    let decoder = NodeDecoder::new(&vault, &cache, &SeaCipher);
    let (early, report) = decoder.decode_with_report(&private).await;
    assert!(early.is_empty());
    assert_eq!(report.dropped, vec![("body".to_string(), DropReason::MissingKey)]);

    let (_, report) = decoder.decode_with_report(&grant).await;
    assert_eq!(report.registered, vec!["delegate".to_string()]);
    assert_eq!(vault.lookup_self_key("delegate"), Some(delegate_key));

    let late = decoder.decode(&private).await;
    assert_eq!(late.get("body"), Some(&Value::text("for delegate")));
}

#[tokio::test]
async fn test_wrong_key_is_dropped_and_not_cached() {
    let right = Secret::generate();
    let wrong = Secret::generate();
    let raw = Node::new("a~pub1.").with("secret", seal("hello", &right).await);
    let vault = KeyVault::new();
    let cache = DecryptionCache::new();

    vault.remember_self_key("pub1", wrong);
    let (decoded, report) = NodeDecoder::new(&vault, &cache, &SeaCipher)
        .decode_with_report(&raw)
        .await;
    assert!(!decoded.contains("secret"));
    assert_eq!(report.dropped[0].1, DropReason::DecryptionFailure);
    assert!(cache.is_empty());

    vault.remember_self_key("pub1", right);
    let decoded = decode(&raw, &vault, &cache, &SeaCipher).await;
    assert_eq!(decoded.get("secret"), Some(&Value::text("hello")));
}

#[tokio::test]
async fn test_decoded_set_skips_members_not_yet_received() {
    let vault = KeyVault::new();
    let cache = DecryptionCache::new();
    let set = Node::new("list")
        .with("1", Value::reference("item1"))
        .with("2", Value::reference("item2"));
    let item = Node::new("item1").with("title", "first");

    let mut snapshot = Snapshot::new();
    for raw in [&set, &item] {
        let decoded = decode(raw, &vault, &cache, &SeaCipher).await;
        snapshot.insert(raw.id().unwrap(), decoded);
    }

    assert_eq!(members_of(&snapshot, "list"), vec![&item]);
    assert!(members_of(&snapshot, "item2").is_empty());
}
