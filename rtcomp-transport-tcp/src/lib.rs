//! A concrete TCP `Provider`/`Consumer` pair for the pluggable transport
//! contract.
//!
//! Why: `rtcomp-dataflow`'s built-in transport only wires components that
//! live in the same process. Anything that needs to cross a process
//! boundary needs a real transport plugin registered under a distinct
//! `interface_type`, and this crate is that plugin for TCP.
//!
//! What: a `Provider` that binds `tcp.address` and forwards every accepted
//! connection's frames into the connector's local buffer, and a `Consumer`
//! that lazily connects to the peer's `tcp.address` and reconnects after any
//! I/O failure.
//!
//! How: both sides run on a single process-wide Tokio runtime ([`runtime`]);
//! `Provider::push` / `Consumer::send` stay synchronous, as the transport
//! trait contract requires, by blocking on that runtime's handle. Frames are
//! length-prefixed (4-byte big-endian length, then payload) so a stream of
//! pushes over one socket stays delimited.
//!
//! Trade-offs: the factory closures in [`TransportRegistry`] return a boxed
//! `Provider`/`Consumer` with no `Result`, so a bind or address-parse
//! failure can't be propagated at registration time. Instead of changing
//! that contract, a failed bind/parse degrades to a provider or consumer
//! that reports every subsequent call as [`TransportFailureKind::Lost`],
//! logging the real cause once at construction time. This mirrors how a
//! connector that loses its peer mid-flight already self-disconnects.

mod channel;
mod error;
mod listener;
mod runtime;

use std::net::SocketAddr;
use std::sync::Arc;

use rtcomp_dataflow::{Consumer, GuardedBuffer, Provider, TransportFailureKind, TransportRegistry, TransportResult};
use rtcomp_core::Properties;

pub use channel::TcpConsumer;
pub use error::TcpTransportError;
pub use listener::TcpProvider;

/// The `interface_type` this crate registers itself under.
pub const INTERFACE_TYPE: &str = "tcp";

fn resolve_address(props: &Properties) -> Result<SocketAddr, TcpTransportError> {
    let raw = props.get("tcp.address");
    if raw.is_empty() {
        return Err(TcpTransportError::MissingAddress);
    }
    raw.parse::<SocketAddr>().map_err(|source| TcpTransportError::InvalidAddress { address: raw, source })
}

struct FailedProvider;

impl Provider for FailedProvider {
    fn push(&self, _payload: &[u8]) -> TransportResult<()> {
        Err(TransportFailureKind::Lost)
    }
}

struct FailedConsumer;

impl Consumer for FailedConsumer {
    fn send(&self, _payload: &[u8]) -> TransportResult<()> {
        Err(TransportFailureKind::Lost)
    }
}

/// Register the TCP provider/consumer factories under [`INTERFACE_TYPE`].
/// Analogous to `rtcomp_dataflow::transport`'s own `register_local_transport`,
/// but reached over a real socket instead of an in-process directory.
pub fn register_tcp_transport(registry: &TransportRegistry) {
    registry.register_provider(
        INTERFACE_TYPE,
        Arc::new(|connector_id, props, sink: Arc<GuardedBuffer<Vec<u8>>>| {
            match resolve_address(props).and_then(|address| TcpProvider::bind(address, sink)) {
                Ok(provider) => Box::new(provider) as Box<dyn Provider>,
                Err(err) => {
                    tracing::error!(connector_id, error = %err, "tcp provider failed to start; every connection through it will report the peer as lost");
                    Box::new(FailedProvider) as Box<dyn Provider>
                }
            }
        }),
    );

    registry.register_consumer(
        INTERFACE_TYPE,
        Arc::new(|connector_id, props| match resolve_address(props) {
            Ok(address) => Box::new(TcpConsumer::new(address)) as Box<dyn Consumer>,
            Err(err) => {
                tracing::error!(connector_id, error = %err, "tcp consumer has no usable peer address; every send will report the peer as lost");
                Box::new(FailedConsumer) as Box<dyn Consumer>
            }
        }),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use rtcomp_dataflow::BufferConfig;
    use std::time::{Duration, Instant};

    fn free_loopback_address() -> SocketAddr {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind a throwaway socket to find a free port");
        listener.local_addr().expect("local_addr")
    }

    fn wait_for<F: Fn() -> bool>(condition: F, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        false
    }

    #[test]
    fn a_pushed_payload_round_trips_over_a_real_loopback_socket() {
        let registry = TransportRegistry::empty();
        register_tcp_transport(&registry);

        let address = free_loopback_address();
        let mut props = Properties::new_root();
        props.set("tcp.address", address.to_string());

        let sink = Arc::new(GuardedBuffer::new(BufferConfig::default()));
        let _provider = registry.make_provider(INTERFACE_TYPE, "conn-1", &props, sink.clone()).expect("provider");
        let consumer = registry.make_consumer(INTERFACE_TYPE, "conn-1", &props).expect("consumer");

        consumer.send(b"hello over tcp").expect("send");

        assert!(wait_for(|| sink.get() == Some(b"hello over tcp".to_vec()), Duration::from_secs(1)));
    }

    #[test]
    fn missing_address_degrades_to_a_consumer_that_reports_the_peer_lost() {
        let registry = TransportRegistry::empty();
        register_tcp_transport(&registry);

        let consumer = registry.make_consumer(INTERFACE_TYPE, "conn-2", &Properties::new_root()).expect("consumer");
        assert_eq!(consumer.send(b"x").unwrap_err(), TransportFailureKind::Lost);
    }

    #[test]
    fn resolve_address_rejects_a_malformed_address() {
        let mut props = Properties::new_root();
        props.set("tcp.address", "not-an-address");
        assert!(matches!(resolve_address(&props), Err(TcpTransportError::InvalidAddress { .. })));
    }
}
