//! Delivery worker
//!
//! Drains a transport subscription into a session, one delivery at a time
//! in arrival order. Decoding is never parallel: a key-material node must be
//! fully decoded before the node that depends on it.

use futures::StreamExt;
use tokio::sync::watch;

use common::crypto::Cipher;
use common::session::Session;
use common::transport::{Delivery, StoreTransport};

/// Stream of deliveries, as produced by `Receiver::into_stream`
pub type DeliveryStream = flume::r#async::RecvStream<'static, Delivery>;

/// What a worker did before it stopped
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerSummary {
    pub deliveries: usize,
    pub dropped_fields: usize,
}

/// Run the background worker for a session
///
/// Stops when the stream ends (the transport closed) or when `shutdown`
/// fires or loses its sender, then flushes whatever the coalescer still
/// holds.
///
/// # Example
///
/// ```ignore
/// let deliveries = session.transport().subscribe().into_stream();
/// tokio::spawn(run_worker(session.clone(), deliveries, shutdown_rx));
/// ```
pub async fn run_worker<T, C>(
    session: Session<T, C>,
    mut deliveries: DeliveryStream,
    mut shutdown: watch::Receiver<()>,
) -> WorkerSummary
where
    T: StoreTransport,
    C: Cipher,
{
    tracing::info!("Starting delivery worker for session {}", session.id());
    let mut summary = WorkerSummary::default();

    loop {
        tokio::select! {
            delivery = deliveries.next() => {
                let Some(delivery) = delivery else {
                    tracing::info!("Delivery stream closed, shutting down worker");
                    break;
                };
                let report = session.receive(delivery).await;
                summary.deliveries += 1;
                summary.dropped_fields += report.dropped.len();
            }

            _ = shutdown.changed() => {
                tracing::info!("Shutdown signal received, stopping delivery worker");
                break;
            }
        }
    }

    session.flush();
    tracing::info!(
        deliveries = summary.deliveries,
        dropped_fields = summary.dropped_fields,
        "Delivery worker stopped for session {}",
        session.id()
    );
    summary
}

#[cfg(test)]
mod tests {
    use super::*;

    use common::crypto::{KeyMaterial, SeaCipher};
    use common::graph::{Node, Value};
    use common::session::SessionConfig;
    use common::transport::MemoryTransport;

    fn session() -> Session<MemoryTransport, SeaCipher> {
        let (session, _rx) = Session::new(
            MemoryTransport::new(),
            SeaCipher,
            Some(KeyMaterial::generate()),
            SessionConfig::default(),
        );
        session
    }

    #[tokio::test]
    async fn test_drains_until_transport_closes() {
        let session = session();
        let transport = session.transport().clone();
        let deliveries = transport.subscribe().into_stream();
        let (_shutdown_tx, shutdown_rx) = watch::channel(());

        transport
            .publish(Node::new("a").with("x", "1").into())
            .unwrap();
        transport
            .publish(Node::new("b").with("ref", Value::reference("a")).into())
            .unwrap();
        transport.close();

        let summary = run_worker(session.clone(), deliveries, shutdown_rx).await;

        assert_eq!(summary.deliveries, 2);
        assert_eq!(summary.dropped_fields, 0);
        assert_eq!(session.members_of("b").len(), 1);
    }

    #[tokio::test]
    async fn test_stops_on_shutdown_and_flushes() {
        let session = session();
        let transport = session.transport().clone();
        let deliveries = transport.subscribe().into_stream();
        let (shutdown_tx, shutdown_rx) = watch::channel(());

        let handle = tokio::spawn(run_worker(session.clone(), deliveries, shutdown_rx));

        let id = session.child_id(None);
        session.put(&id, "name", Value::text("alice")).await.unwrap();
        tokio::task::yield_now().await;
        shutdown_tx.send(()).unwrap();

        handle.await.unwrap();
        assert_eq!(
            session.snapshot().get(&id).and_then(|node| node.get("name")),
            Some(&Value::text("alice"))
        );
    }
}
