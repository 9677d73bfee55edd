//! A single process-wide Tokio runtime, lazily started on first use.
//!
//! Neither side of the transport contract (`Provider::push` /
//! `Consumer::send`) is async, so every TCP operation crosses into async
//! code through this runtime's `Handle` and blocks the caller until it
//! completes.

use std::sync::OnceLock;

use tokio::runtime::{Handle, Runtime};

static RUNTIME: OnceLock<Runtime> = OnceLock::new();

pub(crate) fn handle() -> Handle {
    RUNTIME
        .get_or_init(|| {
            Runtime::new().expect("failed to start the rtcomp-transport-tcp runtime")
        })
        .handle()
        .clone()
}
