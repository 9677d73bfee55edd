//! Leaf errors for the TCP transport, converted into `RtcError` at the
//! crate boundary.

use rtcomp_core::RtcError;

#[derive(Debug, thiserror::Error)]
pub enum TcpTransportError {
    #[error("connector is missing a tcp.address property")]
    MissingAddress,
    #[error("invalid tcp.address {address:?}: {source}")]
    InvalidAddress { address: String, source: std::net::AddrParseError },
    #[error("failed to bind {address}: {source}")]
    BindFailed { address: String, source: std::io::Error },
    #[error("failed to connect to {address}: {source}")]
    ConnectFailed { address: String, source: std::io::Error },
}

impl From<TcpTransportError> for RtcError {
    fn from(err: TcpTransportError) -> Self {
        RtcError::not_available(err.to_string())
    }
}
