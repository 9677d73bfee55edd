//! Sender side: a lazily-established connection to the peer's `tcp.address`,
//! reconnected on the next `send` after any I/O failure.

use std::net::SocketAddr;

use bytes::{BufMut, BytesMut};
use rtcomp_dataflow::{Consumer, TransportFailureKind, TransportResult};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::Mutex;

use crate::error::TcpTransportError;
use crate::runtime;

pub struct TcpConsumer {
    address: SocketAddr,
    stream: Mutex<Option<TcpStream>>,
}

impl TcpConsumer {
    pub(crate) fn new(address: SocketAddr) -> Self {
        Self { address, stream: Mutex::new(None) }
    }
}

impl Consumer for TcpConsumer {
    fn send(&self, payload: &[u8]) -> TransportResult<()> {
        runtime::handle().block_on(async {
            let mut guard = self.stream.lock().await;
            if guard.is_none() {
                let stream = TcpStream::connect(self.address).await.map_err(|source| {
                    let err: rtcomp_core::RtcError = TcpTransportError::ConnectFailed { address: self.address.to_string(), source }.into();
                    tracing::warn!(address = %self.address, error = %err, "tcp consumer failed to connect");
                    TransportFailureKind::Lost
                })?;
                *guard = Some(stream);
            }

            let stream = guard.as_mut().expect("just populated above");
            let mut frame = BytesMut::with_capacity(4 + payload.len());
            frame.put_u32(payload.len() as u32);
            frame.put_slice(payload);
            let wrote = stream.write_all(&frame).await;

            if wrote.is_err() {
                *guard = None;
                return Err(TransportFailureKind::Lost);
            }
            Ok(())
        })
    }
}
