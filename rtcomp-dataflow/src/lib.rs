//! Typed data-flow layer: connector metadata, listener chains, buffer
//! policies, pluggable transports, negotiation, and the port types that tie
//! them together.

pub mod buffer_policy;
pub mod connector_info;
pub mod listener;
pub mod negotiation;
pub mod port;
pub mod transport;

pub use buffer_policy::{BufferConfig, FullPolicy, GuardedBuffer, ReadOutcome, WriteOutcome};
pub use connector_info::ConnectorInfo;
pub use listener::{
    ConnectorEvent, ConnectorListener, ConnectorListenerChain, DataListener, DataPortEvent, ListenerHandle, ListenerResult,
    TypedListenerChain,
};
pub use negotiation::negotiate;
pub use port::{connect, disconnect, ConnectorListeners, DataListeners, InPort, OutPort, Payload};
pub use transport::{Consumer, Provider, TransportFailureKind, TransportRegistry, TransportResult};
