//! Pluggable transports: the `Provider`/`Consumer` traits, per-side factory
//! registries, and the built-in in-process "local" transport.
//!
//! The wire format itself is out of scope; what every transport must honor
//! is the endian invariant: a payload encoded with flag `e` is decoded with
//! flag `e`, carried in `ConnectorInfo.properties.serializer.cdr.endian`.

use std::sync::Arc;

use dashmap::DashMap;
use rtcomp_core::{Properties, Result, RtcError};

use crate::buffer_policy::{GuardedBuffer, WriteOutcome};

/// Why a remote call failed, distinguishing the three `ON_RECEIVER_*` /
/// `ON_SENDER_*` event families.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportFailureKind {
    /// The remote buffer is full and its policy does not accept the write.
    Full,
    /// The remote call did not complete before its deadline.
    Timeout,
    /// The peer is gone; the connector that observes this should self
    /// disconnect.
    Lost,
}

pub type TransportResult<T> = std::result::Result<T, TransportFailureKind>;

/// Server-side half of a connector's transport: accepts encoded payloads
/// pushed by a remote `Consumer` and forwards them into the local buffer it
/// was constructed with.
pub trait Provider: Send + Sync {
    fn push(&self, payload: &[u8]) -> TransportResult<()>;
}

/// Client-side half: holds enough information to reach the remote
/// `Provider` and forward encoded payloads to it.
pub trait Consumer: Send + Sync {
    fn send(&self, payload: &[u8]) -> TransportResult<()>;

    /// Pull-mode request: ask the remote side for its current value.
    /// Transports that only implement push dataflow leave this as the
    /// default, which always reports the peer unreachable.
    fn pull(&self) -> TransportResult<Vec<u8>> {
        Err(TransportFailureKind::Lost)
    }
}

pub type ProviderFactoryFn =
    dyn Fn(&str, &Properties, Arc<GuardedBuffer<Vec<u8>>>) -> Box<dyn Provider> + Send + Sync;
pub type ConsumerFactoryFn = dyn Fn(&str, &Properties) -> Box<dyn Consumer> + Send + Sync;

/// Per-side registries of transport factories, keyed by `interface_type`
/// (e.g. `"local"`, `"tcp"`).
pub struct TransportRegistry {
    provider_factories: DashMap<String, Arc<ProviderFactoryFn>>,
    consumer_factories: DashMap<String, Arc<ConsumerFactoryFn>>,
}

impl TransportRegistry {
    pub fn empty() -> Self {
        Self {
            provider_factories: DashMap::new(),
            consumer_factories: DashMap::new(),
        }
    }

    /// A registry pre-populated with the in-process "local" transport, the
    /// default used when a connector's negotiated `interface_type` is
    /// unspecified.
    pub fn with_builtin() -> Self {
        let registry = Self::empty();
        register_local_transport(&registry);
        registry
    }

    pub fn register_provider(&self, interface_type: impl Into<String>, factory: Arc<ProviderFactoryFn>) {
        self.provider_factories.insert(interface_type.into(), factory);
    }

    pub fn register_consumer(&self, interface_type: impl Into<String>, factory: Arc<ConsumerFactoryFn>) {
        self.consumer_factories.insert(interface_type.into(), factory);
    }

    pub fn make_provider(
        &self,
        interface_type: &str,
        connector_id: &str,
        props: &Properties,
        sink: Arc<GuardedBuffer<Vec<u8>>>,
    ) -> Result<Box<dyn Provider>> {
        let factory = self
            .provider_factories
            .get(interface_type)
            .ok_or_else(|| RtcError::not_available(format!("no provider factory for interface_type {interface_type}")))?;
        Ok(factory(connector_id, props, sink))
    }

    pub fn make_consumer(&self, interface_type: &str, connector_id: &str, props: &Properties) -> Result<Box<dyn Consumer>> {
        let factory = self
            .consumer_factories
            .get(interface_type)
            .ok_or_else(|| RtcError::not_available(format!("no consumer factory for interface_type {interface_type}")))?;
        Ok(factory(connector_id, props))
    }

    pub fn supports(&self, interface_type: &str) -> bool {
        self.provider_factories.contains_key(interface_type) && self.consumer_factories.contains_key(interface_type)
    }
}

/// In-process transport: the provider registers itself under the connector
/// id in a shared directory; the paired consumer looks it up and calls
/// straight into it. Used as the default so a workspace with only
/// in-process components never needs a network transport plugin.
struct LocalProvider {
    sink: Arc<GuardedBuffer<Vec<u8>>>,
}

impl Provider for LocalProvider {
    fn push(&self, payload: &[u8]) -> TransportResult<()> {
        match self.sink.put(payload.to_vec()) {
            WriteOutcome::Accepted | WriteOutcome::Overwrote => Ok(()),
            WriteOutcome::Dropped => Err(TransportFailureKind::Full),
            WriteOutcome::TimedOut => Err(TransportFailureKind::Timeout),
        }
    }
}

/// Directory entry wrapper: removes itself on drop, so disconnecting a
/// connector (dropping its `Provider`) releases the local transport's
/// bookkeeping without a separate explicit teardown call.
struct ProviderHandle {
    connector_id: String,
    directory: Arc<DashMap<String, Arc<dyn Provider>>>,
    inner: Arc<dyn Provider>,
}

impl Provider for ProviderHandle {
    fn push(&self, payload: &[u8]) -> TransportResult<()> {
        self.inner.push(payload)
    }
}

impl Drop for ProviderHandle {
    fn drop(&mut self) {
        self.directory.remove(&self.connector_id);
    }
}

struct LocalConsumer {
    connector_id: String,
    directory: Arc<DashMap<String, Arc<dyn Provider>>>,
}

impl Consumer for LocalConsumer {
    fn send(&self, payload: &[u8]) -> TransportResult<()> {
        let provider = self.directory.get(&self.connector_id).ok_or(TransportFailureKind::Lost)?;
        provider.push(payload)
    }
}

fn register_local_transport(registry: &TransportRegistry) {
    let directory: Arc<DashMap<String, Arc<dyn Provider>>> = Arc::new(DashMap::new());

    let provider_directory = directory.clone();
    registry.register_provider(
        "local",
        Arc::new(move |connector_id, _props, sink| {
            let provider: Arc<dyn Provider> = Arc::new(LocalProvider { sink });
            provider_directory.insert(connector_id.to_string(), provider.clone());
            Box::new(ProviderHandle {
                connector_id: connector_id.to_string(),
                directory: provider_directory.clone(),
                inner: provider,
            }) as Box<dyn Provider>
        }),
    );

    registry.register_consumer(
        "local",
        Arc::new(move |connector_id, _props| {
            Box::new(LocalConsumer {
                connector_id: connector_id.to_string(),
                directory: directory.clone(),
            }) as Box<dyn Consumer>
        }),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_transport_round_trips_a_payload() {
        let registry = TransportRegistry::with_builtin();
        let sink = Arc::new(GuardedBuffer::new(crate::buffer_policy::BufferConfig::default()));

        let _provider = registry
            .make_provider("local", "conn-1", &Properties::new_root(), sink.clone())
            .expect("provider");
        let consumer = registry
            .make_consumer("local", "conn-1", &Properties::new_root())
            .expect("consumer");

        consumer.send(b"hello").expect("send");
        assert_eq!(sink.get(), Some(b"hello".to_vec()));
    }

    #[test]
    fn consumer_reports_peer_lost_once_provider_is_dropped() {
        let registry = TransportRegistry::with_builtin();
        let sink = Arc::new(GuardedBuffer::new(crate::buffer_policy::BufferConfig::default()));
        let provider = registry
            .make_provider("local", "conn-2", &Properties::new_root(), sink)
            .expect("provider");
        let consumer = registry
            .make_consumer("local", "conn-2", &Properties::new_root())
            .expect("consumer");

        drop(provider);
        assert_eq!(consumer.send(b"x").unwrap_err(), TransportFailureKind::Lost);
    }

    #[test]
    fn consumer_reports_transport_failure_when_no_provider_was_ever_registered() {
        let registry = TransportRegistry::with_builtin();
        let consumer = registry
            .make_consumer("local", "missing-conn", &Properties::new_root())
            .expect("consumer");
        assert_eq!(consumer.send(b"x").unwrap_err(), TransportFailureKind::Lost);
    }

    #[test]
    fn unknown_interface_type_is_not_available() {
        let registry = TransportRegistry::with_builtin();
        let err = registry
            .make_consumer("shared_memory", "conn-1", &Properties::new_root())
            .unwrap_err();
        assert_eq!(err.code(), rtcomp_core::ReturnCode::NotAvailable);
    }
}
