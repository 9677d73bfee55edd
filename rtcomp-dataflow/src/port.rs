//! Typed ports, connectors, and the push/pull data paths.
//!
//! `OutPort<T>` and `InPort<T>` are the two endpoint kinds; `connect` performs
//! negotiation and wires a Provider/Consumer pair
//! through the registered [`TransportRegistry`]. `OutPort::write` and
//! `InPort::read` fire the same listener sequence for the push and pull
//! paths respectively.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use rtcomp_core::{next_id, ErrorCategory, Properties, Result, RtcError};

use crate::buffer_policy::{BufferConfig, FullPolicy, GuardedBuffer, WriteOutcome};
use crate::connector_info::ConnectorInfo;
use crate::listener::{ConnectorEvent, ConnectorListenerChain, DataPortEvent, TypedListenerChain};
use crate::negotiation::negotiate;
use crate::transport::{Consumer, Provider, TransportFailureKind, TransportRegistry, TransportResult};

/// A value that can cross a connector's transport boundary. Implementations
/// must honor the little-endian flag they are given: the same flag used to encode must be used to decode.
pub trait Payload: Send + Clone + 'static {
    fn encode(&self, little_endian: bool) -> Vec<u8>;
    fn decode(bytes: &[u8], little_endian: bool) -> Result<Self>
    where
        Self: Sized;
}

macro_rules! impl_payload_for_int {
    ($($t:ty),+ $(,)?) => {
        $(
            impl Payload for $t {
                fn encode(&self, little_endian: bool) -> Vec<u8> {
                    if little_endian { self.to_le_bytes().to_vec() } else { self.to_be_bytes().to_vec() }
                }

                fn decode(bytes: &[u8], little_endian: bool) -> Result<Self> {
                    let arr: [u8; std::mem::size_of::<$t>()] = bytes
                        .try_into()
                        .map_err(|_| RtcError::bad_parameter(concat!("wrong byte length decoding ", stringify!($t))))?;
                    Ok(if little_endian { <$t>::from_le_bytes(arr) } else { <$t>::from_be_bytes(arr) })
                }
            }
        )+
    };
}

impl_payload_for_int!(i8, i16, i32, i64, u8, u16, u32, u64, f32, f64);

impl Payload for String {
    fn encode(&self, _little_endian: bool) -> Vec<u8> {
        self.as_bytes().to_vec()
    }

    fn decode(bytes: &[u8], _little_endian: bool) -> Result<Self> {
        String::from_utf8(bytes.to_vec()).map_err(|e| RtcError::bad_parameter("invalid utf8 payload").with_source(e))
    }
}

/// The ten typed listener chains a port exposes, one per [`DataPortEvent`].
pub struct DataListeners<T> {
    pub on_buffer_write: TypedListenerChain<T>,
    pub on_buffer_full: TypedListenerChain<T>,
    pub on_buffer_write_timeout: TypedListenerChain<T>,
    pub on_buffer_overwrite: TypedListenerChain<T>,
    pub on_buffer_read: TypedListenerChain<T>,
    pub on_send: TypedListenerChain<T>,
    pub on_received: TypedListenerChain<T>,
    pub on_receiver_full: TypedListenerChain<T>,
    pub on_receiver_timeout: TypedListenerChain<T>,
    pub on_receiver_error: TypedListenerChain<T>,
}

impl<T> Default for DataListeners<T> {
    fn default() -> Self {
        Self {
            on_buffer_write: TypedListenerChain::new(),
            on_buffer_full: TypedListenerChain::new(),
            on_buffer_write_timeout: TypedListenerChain::new(),
            on_buffer_overwrite: TypedListenerChain::new(),
            on_buffer_read: TypedListenerChain::new(),
            on_send: TypedListenerChain::new(),
            on_received: TypedListenerChain::new(),
            on_receiver_full: TypedListenerChain::new(),
            on_receiver_timeout: TypedListenerChain::new(),
            on_receiver_error: TypedListenerChain::new(),
        }
    }
}

impl<T> DataListeners<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn chain(&self, event: DataPortEvent) -> &TypedListenerChain<T> {
        match event {
            DataPortEvent::OnBufferWrite => &self.on_buffer_write,
            DataPortEvent::OnBufferFull => &self.on_buffer_full,
            DataPortEvent::OnBufferWriteTimeout => &self.on_buffer_write_timeout,
            DataPortEvent::OnBufferOverwrite => &self.on_buffer_overwrite,
            DataPortEvent::OnBufferRead => &self.on_buffer_read,
            DataPortEvent::OnSend => &self.on_send,
            DataPortEvent::OnReceived => &self.on_received,
            DataPortEvent::OnReceiverFull => &self.on_receiver_full,
            DataPortEvent::OnReceiverTimeout => &self.on_receiver_timeout,
            DataPortEvent::OnReceiverError => &self.on_receiver_error,
        }
    }
}

/// The seven untyped listener chains a port exposes, one per
/// [`ConnectorEvent`].
pub struct ConnectorListeners {
    pub on_buffer_empty: ConnectorListenerChain,
    pub on_buffer_read_timeout: ConnectorListenerChain,
    pub on_sender_empty: ConnectorListenerChain,
    pub on_sender_timeout: ConnectorListenerChain,
    pub on_sender_error: ConnectorListenerChain,
    pub on_connect: ConnectorListenerChain,
    pub on_disconnect: ConnectorListenerChain,
}

impl Default for ConnectorListeners {
    fn default() -> Self {
        Self {
            on_buffer_empty: ConnectorListenerChain::new(),
            on_buffer_read_timeout: ConnectorListenerChain::new(),
            on_sender_empty: ConnectorListenerChain::new(),
            on_sender_timeout: ConnectorListenerChain::new(),
            on_sender_error: ConnectorListenerChain::new(),
            on_connect: ConnectorListenerChain::new(),
            on_disconnect: ConnectorListenerChain::new(),
        }
    }
}

impl ConnectorListeners {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn chain(&self, event: ConnectorEvent) -> &ConnectorListenerChain {
        match event {
            ConnectorEvent::OnBufferEmpty => &self.on_buffer_empty,
            ConnectorEvent::OnBufferReadTimeout => &self.on_buffer_read_timeout,
            ConnectorEvent::OnSenderEmpty => &self.on_sender_empty,
            ConnectorEvent::OnSenderTimeout => &self.on_sender_timeout,
            ConnectorEvent::OnSenderError => &self.on_sender_error,
            ConnectorEvent::OnConnect => &self.on_connect,
            ConnectorEvent::OnDisconnect => &self.on_disconnect,
        }
    }
}

struct OutConnectorEntry<T: Payload> {
    info: ConnectorInfo,
    consumer: Box<dyn Consumer>,
    send_buffer: Option<GuardedBuffer<T>>,
}

struct InConnectorEntry {
    info: ConnectorInfo,
    // Kept alive for the connector's lifetime: dropping it releases the
    // transport's bookkeeping (e.g. the local transport's directory entry).
    #[allow(dead_code)]
    provider: Box<dyn Provider>,
}

/// An OutPort: pushes values to every connected InPort.
pub struct OutPort<T: Payload> {
    name: String,
    endpoint_id: String,
    connectors: RwLock<Vec<OutConnectorEntry<T>>>,
    data_listeners: DataListeners<T>,
    connector_listeners: ConnectorListeners,
    transports: Arc<TransportRegistry>,
}

impl<T: Payload> OutPort<T> {
    pub fn new(name: impl Into<String>, transports: Arc<TransportRegistry>) -> Self {
        let name = name.into();
        Self {
            endpoint_id: name.clone(),
            name,
            connectors: RwLock::new(Vec::new()),
            data_listeners: DataListeners::new(),
            connector_listeners: ConnectorListeners::new(),
            transports,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data_listeners(&self) -> &DataListeners<T> {
        &self.data_listeners
    }

    pub fn connector_listeners(&self) -> &ConnectorListeners {
        &self.connector_listeners
    }

    pub fn connector_count(&self) -> usize {
        self.connectors.read().len()
    }

    /// Push `value` to every connected InPort, firing the full push-path
    /// listener sequence per connector. A connector whose peer
    /// is confirmed gone self-disconnects after this call returns.
    pub fn write(&self, value: T) -> Result<()> {
        let mut lost = Vec::new();
        {
            let guard = self.connectors.read();
            for connector in guard.iter() {
                if let Err(TransportFailureKind::Lost) = self.push_through_buffer(connector, value.clone()) {
                    lost.push(connector.info.id().to_string());
                }
            }
        }
        for connector_id in &lost {
            self.self_disconnect(connector_id);
        }
        Ok(())
    }

    fn self_disconnect(&self, connector_id: &str) {
        let removed = {
            let mut guard = self.connectors.write();
            let idx = guard.iter().position(|c| c.info.id() == connector_id);
            idx.map(|i| guard.remove(i))
        };
        if let Some(entry) = removed {
            self.connector_listeners.on_disconnect.notify(&entry.info);
        }
    }

    fn push_through_buffer(&self, connector: &OutConnectorEntry<T>, mut payload: T) -> TransportResult<()> {
        let info = &connector.info;
        self.data_listeners.on_buffer_write.notify(info, &mut payload);

        let Some(buffer) = &connector.send_buffer else {
            return self.send_over_transport(connector, payload);
        };

        let was_full = buffer.is_full();
        let outcome = buffer.put(payload.clone());
        if was_full {
            self.data_listeners.on_buffer_full.notify(info, &mut payload);
        }
        match outcome {
            WriteOutcome::Overwrote => {
                self.data_listeners.on_buffer_overwrite.notify(info, &mut payload);
            }
            WriteOutcome::TimedOut => {
                self.data_listeners.on_buffer_write_timeout.notify(info, &mut payload);
                return Ok(());
            }
            WriteOutcome::Dropped => return Ok(()),
            WriteOutcome::Accepted => {}
        }

        match buffer.get() {
            Some(to_send) => self.send_over_transport(connector, to_send),
            None => Ok(()),
        }
    }

    fn send_over_transport(&self, connector: &OutConnectorEntry<T>, mut payload: T) -> TransportResult<()> {
        let info = &connector.info;
        self.data_listeners.on_send.notify(info, &mut payload);
        let bytes = payload.encode(info.is_little_endian());

        match connector.consumer.send(&bytes) {
            Ok(()) => {
                self.data_listeners.on_received.notify(info, &mut payload);
                Ok(())
            }
            Err(TransportFailureKind::Full) => {
                self.data_listeners.on_receiver_full.notify(info, &mut payload);
                Err(TransportFailureKind::Full)
            }
            Err(TransportFailureKind::Timeout) => {
                self.data_listeners.on_receiver_timeout.notify(info, &mut payload);
                Err(TransportFailureKind::Timeout)
            }
            Err(TransportFailureKind::Lost) => {
                self.data_listeners.on_receiver_error.notify(info, &mut payload);
                Err(TransportFailureKind::Lost)
            }
        }
    }
}

/// An InPort: receives values pushed by connected OutPorts into one shared
/// buffer.
pub struct InPort<T: Payload> {
    name: String,
    endpoint_id: String,
    recv_buffer: Arc<GuardedBuffer<Vec<u8>>>,
    connectors: RwLock<Vec<InConnectorEntry>>,
    data_listeners: DataListeners<T>,
    connector_listeners: ConnectorListeners,
    transports: Arc<TransportRegistry>,
}

impl<T: Payload> InPort<T> {
    pub fn new(name: impl Into<String>, transports: Arc<TransportRegistry>, buffer_config: BufferConfig) -> Self {
        let name = name.into();
        Self {
            endpoint_id: name.clone(),
            name,
            recv_buffer: Arc::new(GuardedBuffer::new(buffer_config)),
            connectors: RwLock::new(Vec::new()),
            data_listeners: DataListeners::new(),
            connector_listeners: ConnectorListeners::new(),
            transports,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data_listeners(&self) -> &DataListeners<T> {
        &self.data_listeners
    }

    pub fn connector_listeners(&self) -> &ConnectorListeners {
        &self.connector_listeners
    }

    pub fn connector_count(&self) -> usize {
        self.connectors.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.recv_buffer.is_empty()
    }

    fn any_connector_info(&self) -> Option<ConnectorInfo> {
        self.connectors.read().first().map(|c| c.info.clone())
    }

    /// Pop and decode the oldest queued value. Fires `ON_BUFFER_READ` on
    /// success, or the untyped `ON_BUFFER_EMPTY` when the buffer has nothing
    /// queued.
    pub fn read(&self) -> Result<T> {
        match self.recv_buffer.get() {
            Some(bytes) => {
                let little_endian = self.any_connector_info().map(|i| i.is_little_endian()).unwrap_or(true);
                let mut payload = T::decode(&bytes, little_endian)?;
                if let Some(info) = self.any_connector_info() {
                    self.data_listeners.on_buffer_read.notify(&info, &mut payload);
                }
                Ok(payload)
            }
            None => {
                if let Some(info) = self.any_connector_info() {
                    self.connector_listeners.on_buffer_empty.notify(&info);
                }
                Err(RtcError::not_available("buffer empty").with_category(ErrorCategory::BufferPressure))
            }
        }
    }
}

fn parse_or<T: FromStr>(value: &str, default: T) -> T {
    value.parse().unwrap_or(default)
}

/// Negotiate and wire a connector between `out_port` and `in_port`. Both ports' connector lists are updated and `ON_CONNECT`
/// fires on both before returning.
pub fn connect<T: Payload>(out_port: &OutPort<T>, in_port: &InPort<T>, requested: &Properties) -> Result<ConnectorInfo> {
    let negotiated = negotiate(requested, &out_port.transports)?;
    let connector_id = next_id("conn");
    let ports = vec![out_port.endpoint_id.clone(), in_port.endpoint_id.clone()];
    let name = format!("{}:{}", out_port.name, in_port.name);
    let info = ConnectorInfo::new(connector_id.clone(), name, ports, negotiated.clone());

    let interface_type = negotiated.get("dataport.interface_type");
    let provider = out_port
        .transports
        .make_provider(&interface_type, &connector_id, &negotiated, in_port.recv_buffer.clone())?;
    let consumer = out_port.transports.make_consumer(&interface_type, &connector_id, &negotiated)?;

    let subscription_type = negotiated.get("dataport.subscription_type");
    let send_buffer = if subscription_type == "flush" {
        None
    } else {
        let length = parse_or(&negotiated.get("buffer.length"), 8usize);
        let full_policy = match negotiated.get("buffer.write.full_policy").as_str() {
            "block" => FullPolicy::Block,
            "drop" => FullPolicy::Drop,
            _ => FullPolicy::Overwrite,
        };
        let write_timeout_ms = parse_or(&negotiated.get("buffer.write.timeout_ms"), 0u64);
        Some(GuardedBuffer::new(BufferConfig {
            length,
            full_policy,
            write_timeout: Duration::from_millis(write_timeout_ms),
        }))
    };

    out_port.connectors.write().push(OutConnectorEntry {
        info: info.clone(),
        consumer,
        send_buffer,
    });
    in_port.connectors.write().push(InConnectorEntry {
        info: info.clone(),
        provider,
    });

    out_port.connector_listeners.on_connect.notify(&info);
    in_port.connector_listeners.on_connect.notify(&info);

    Ok(info)
}

/// Tear down the named connector on both sides, firing `ON_DISCONNECT` on
/// whichever side still has it.
pub fn disconnect<T: Payload>(out_port: &OutPort<T>, in_port: &InPort<T>, connector_id: &str) -> Result<()> {
    let out_removed = {
        let mut guard = out_port.connectors.write();
        guard.iter().position(|c| c.info.id() == connector_id).map(|idx| guard.remove(idx))
    };
    let in_removed = {
        let mut guard = in_port.connectors.write();
        guard.iter().position(|c| c.info.id() == connector_id).map(|idx| guard.remove(idx))
    };

    if out_removed.is_none() && in_removed.is_none() {
        return Err(RtcError::not_available("no such connector"));
    }
    if let Some(entry) = &out_removed {
        out_port.connector_listeners.on_disconnect.notify(&entry.info);
    }
    if let Some(entry) = &in_removed {
        in_port.connector_listeners.on_disconnect.notify(&entry.info);
    }
    Ok(())
}
