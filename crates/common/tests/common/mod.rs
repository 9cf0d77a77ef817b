//! Shared test utilities for reconciliation integration tests
#![allow(dead_code)]

use std::time::Duration;

use common::crypto::{Cipher, KeyMaterial, SeaCipher, Secret};
use common::graph::{Scalar, Value};
use common::session::{Session, SessionConfig};
use common::transport::MemoryTransport;

pub const WINDOW: Duration = Duration::from_millis(50);

/// Install a subscriber once so `RUST_LOG` works in tests
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A session over a fresh in-memory store, with a fixed session id
pub fn setup_session<C: Cipher>(
    cipher: C,
    keys: Option<KeyMaterial>,
) -> (
    Session<MemoryTransport, C>,
    common::coalescer::SnapshotReceiver,
) {
    init_tracing();
    Session::new(
        MemoryTransport::new(),
        cipher,
        keys,
        SessionConfig {
            coalesce_window: WINDOW,
            session_id: Some("sess".to_string()),
        },
    )
}

/// Seal a text value the way a peer holding `key` would
pub async fn seal(text: &str, key: &Secret) -> Value {
    let ciphertext = SeaCipher
        .encrypt(&Scalar::from(text), key)
        .await
        .unwrap();
    Value::text(ciphertext)
}
