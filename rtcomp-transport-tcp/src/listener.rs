//! Receiver side: binds `tcp.address` and forwards every accepted
//! connection's frames into the connector's local buffer, exactly like
//! `LocalProvider` but fed over the wire instead of by an in-process call.

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::{Buf, BytesMut};
use rtcomp_dataflow::{GuardedBuffer, Provider, TransportFailureKind, TransportResult, WriteOutcome};
use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;

use crate::error::TcpTransportError;
use crate::runtime;

pub struct TcpProvider {
    sink: Arc<GuardedBuffer<Vec<u8>>>,
    shutdown: Option<oneshot::Sender<()>>,
}

impl TcpProvider {
    pub(crate) fn bind(address: SocketAddr, sink: Arc<GuardedBuffer<Vec<u8>>>) -> Result<Self, TcpTransportError> {
        let handle = runtime::handle();
        let listener = handle
            .block_on(TcpListener::bind(address))
            .map_err(|source| TcpTransportError::BindFailed { address: address.to_string(), source })?;

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let accept_sink = sink.clone();
        handle.spawn(accept_loop(listener, accept_sink, shutdown_rx));

        Ok(Self { sink, shutdown: Some(shutdown_tx) })
    }
}

impl Provider for TcpProvider {
    fn push(&self, payload: &[u8]) -> TransportResult<()> {
        match self.sink.put(payload.to_vec()) {
            WriteOutcome::Accepted | WriteOutcome::Overwrote => Ok(()),
            WriteOutcome::Dropped => Err(TransportFailureKind::Full),
            WriteOutcome::TimedOut => Err(TransportFailureKind::Timeout),
        }
    }
}

impl Drop for TcpProvider {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

async fn accept_loop(listener: TcpListener, sink: Arc<GuardedBuffer<Vec<u8>>>, mut shutdown: oneshot::Receiver<()>) {
    loop {
        tokio::select! {
            _ = &mut shutdown => return,
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, peer)) => {
                        tracing::debug!(%peer, "tcp transport accepted a connection");
                        tokio::spawn(read_frames(stream, sink.clone()));
                    }
                    Err(err) => {
                        tracing::warn!(error = %err, "tcp transport accept loop stopping after an accept error");
                        return;
                    }
                }
            }
        }
    }
}

async fn read_frames(mut stream: TcpStream, sink: Arc<GuardedBuffer<Vec<u8>>>) {
    loop {
        let mut len_buf = BytesMut::zeroed(4);
        if stream.read_exact(&mut len_buf).await.is_err() {
            return;
        }
        let len = len_buf.get_u32() as usize;

        let mut payload = BytesMut::zeroed(len);
        if stream.read_exact(&mut payload).await.is_err() {
            return;
        }
        let _ = sink.put(payload.to_vec());
    }
}
