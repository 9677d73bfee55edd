//! Per-event listener chains attached to a connector.
//!
//! Two parallel vocabularies exist: typed (data) events that carry a decoded
//! payload, and untyped events that carry only the [`ConnectorInfo`]. Unlike
//! the source this is distilled from, there is no need for a runtime
//! payload-type tag or a per-fire type-match cache: a [`TypedListenerChain<T>`] is
//! generic over its payload type, so the compiler already guarantees every
//! listener in the chain accepts exactly that type. The chain still decodes
//! the payload once per event and shares the `&mut T` across listeners in
//! registration order, same as the source's fan-out contract.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use crate::connector_info::ConnectorInfo;

/// The ten typed (data-carrying) hook points of the push/pull data path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataPortEvent {
    OnBufferWrite,
    OnBufferFull,
    OnBufferWriteTimeout,
    OnBufferOverwrite,
    OnBufferRead,
    OnSend,
    OnReceived,
    OnReceiverFull,
    OnReceiverTimeout,
    OnReceiverError,
}

/// The seven untyped (ConnectorInfo-only) hook points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectorEvent {
    OnBufferEmpty,
    OnBufferReadTimeout,
    OnSenderEmpty,
    OnSenderTimeout,
    OnSenderError,
    OnConnect,
    OnDisconnect,
}

/// Bits a listener may return to tell the chain what it changed. If
/// `DATA_CHANGED` is set, listeners later in the same chain observe the
/// mutated payload rather than the original.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ListenerResult(u8);

impl ListenerResult {
    pub const NONE: ListenerResult = ListenerResult(0);
    pub const INFO_CHANGED: ListenerResult = ListenerResult(1 << 0);
    pub const DATA_CHANGED: ListenerResult = ListenerResult(1 << 1);

    pub fn contains(self, bit: ListenerResult) -> bool {
        self.0 & bit.0 == bit.0
    }
}

impl std::ops::BitOr for ListenerResult {
    type Output = ListenerResult;
    fn bitor(self, rhs: ListenerResult) -> ListenerResult {
        ListenerResult(self.0 | rhs.0)
    }
}

/// Opaque handle returned by `add`, used to `remove` a listener before its
/// owning chain is dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerHandle(u64);

static NEXT_HANDLE: AtomicU64 = AtomicU64::new(1);

fn next_handle() -> ListenerHandle {
    ListenerHandle(NEXT_HANDLE.fetch_add(1, Ordering::Relaxed))
}

/// A typed listener invoked with the connector snapshot and a mutable
/// reference to the decoded payload.
pub trait DataListener<T>: Send + Sync {
    fn on_event(&self, info: &ConnectorInfo, payload: &mut T) -> ListenerResult;
}

impl<T, F> DataListener<T> for F
where
    F: Fn(&ConnectorInfo, &mut T) -> ListenerResult + Send + Sync,
{
    fn on_event(&self, info: &ConnectorInfo, payload: &mut T) -> ListenerResult {
        self(info, payload)
    }
}

/// An untyped listener invoked with only the connector snapshot.
pub trait ConnectorListener: Send + Sync {
    fn on_event(&self, info: &ConnectorInfo);
}

impl<F> ConnectorListener for F
where
    F: Fn(&ConnectorInfo) + Send + Sync,
{
    fn on_event(&self, info: &ConnectorInfo) {
        self(info)
    }
}

struct Entry<L: ?Sized> {
    handle: ListenerHandle,
    /// `true` if this entry should be dropped when the chain itself is
    /// dropped, rather than requiring an explicit `remove` first. Rust's
    /// ownership model makes both cases memory-safe; the flag is kept for
    /// parity with callers that want to distinguish "fire and forget"
    /// registrations from ones they intend to unregister later.
    #[allow(dead_code)]
    autoclean: bool,
    listener: Box<L>,
}

/// Ordered registry of typed listeners for one event kind on one connector.
pub struct TypedListenerChain<T> {
    entries: RwLock<Vec<Entry<dyn DataListener<T>>>>,
}

impl<T> Default for TypedListenerChain<T> {
    fn default() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
        }
    }
}

impl<T> TypedListenerChain<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, listener: impl DataListener<T> + 'static, autoclean: bool) -> ListenerHandle {
        let handle = next_handle();
        self.entries.write().push(Entry {
            handle,
            autoclean,
            listener: Box::new(listener),
        });
        handle
    }

    pub fn remove(&self, handle: ListenerHandle) {
        self.entries.write().retain(|e| e.handle != handle);
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Fire every listener in registration order, feeding each the same
    /// payload (mutated in place when a listener reports `DATA_CHANGED`).
    /// Listeners never panic across this boundary by contract, but a panic
    /// is still caught and logged so one misbehaving listener cannot corrupt
    /// the chain for its neighbors.
    pub fn notify(&self, info: &ConnectorInfo, payload: &mut T) {
        let guard = self.entries.read();
        for entry in guard.iter() {
            let listener = &entry.listener;
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| listener.on_event(info, payload)));
            match result {
                Ok(_) => {}
                Err(_) => {
                    tracing::warn!(connector = info.id(), "listener panicked; chain continues");
                }
            }
        }
    }
}

/// Ordered registry of untyped listeners for one event kind on one connector.
pub struct ConnectorListenerChain {
    entries: RwLock<Vec<Entry<dyn ConnectorListener>>>,
}

impl Default for ConnectorListenerChain {
    fn default() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
        }
    }
}

impl ConnectorListenerChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, listener: impl ConnectorListener + 'static, autoclean: bool) -> ListenerHandle {
        let handle = next_handle();
        self.entries.write().push(Entry {
            handle,
            autoclean,
            listener: Box::new(listener),
        });
        handle
    }

    pub fn remove(&self, handle: ListenerHandle) {
        self.entries.write().retain(|e| e.handle != handle);
    }

    pub fn notify(&self, info: &ConnectorInfo) {
        let guard = self.entries.read();
        for entry in guard.iter() {
            let listener = &entry.listener;
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| listener.on_event(info)));
            if result.is_err() {
                tracing::warn!(connector = info.id(), "listener panicked; chain continues");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rtcomp_core::Properties;
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
    use std::sync::Arc;

    fn sample_info() -> ConnectorInfo {
        ConnectorInfo::new("c-1", "out:in", vec!["out".into(), "in".into()], Properties::new_root())
    }

    #[test]
    fn listeners_fire_in_registration_order() {
        let chain: TypedListenerChain<i32> = TypedListenerChain::new();
        let order = Arc::new(parking_lot::Mutex::new(Vec::new()));

        let order_a = order.clone();
        chain.add(move |_: &ConnectorInfo, _: &mut i32| {
            order_a.lock().push("a");
            ListenerResult::NONE
        }, true);
        let order_b = order.clone();
        chain.add(move |_: &ConnectorInfo, _: &mut i32| {
            order_b.lock().push("b");
            ListenerResult::NONE
        }, true);

        let info = sample_info();
        let mut payload = 0;
        chain.notify(&info, &mut payload);
        assert_eq!(*order.lock(), vec!["a", "b"]);
    }

    #[test]
    fn data_changed_propagates_to_later_listeners() {
        let chain: TypedListenerChain<i32> = TypedListenerChain::new();
        chain.add(|_: &ConnectorInfo, payload: &mut i32| {
            *payload += 1;
            ListenerResult::DATA_CHANGED
        }, true);
        let seen = Arc::new(AtomicUsize::new(0));
        let seen_clone = seen.clone();
        chain.add(move |_: &ConnectorInfo, payload: &mut i32| {
            seen_clone.store(*payload as usize, AtomicOrdering::SeqCst);
            ListenerResult::NONE
        }, true);

        let info = sample_info();
        let mut payload = 41;
        chain.notify(&info, &mut payload);
        assert_eq!(seen.load(AtomicOrdering::SeqCst), 42);
    }

    #[test]
    fn remove_drops_listener_from_future_notifications() {
        let chain: TypedListenerChain<i32> = TypedListenerChain::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();
        let handle = chain.add(move |_: &ConnectorInfo, _: &mut i32| {
            calls_clone.fetch_add(1, AtomicOrdering::SeqCst);
            ListenerResult::NONE
        }, false);

        let info = sample_info();
        chain.notify(&info, &mut 0);
        chain.remove(handle);
        chain.notify(&info, &mut 0);
        assert_eq!(calls.load(AtomicOrdering::SeqCst), 1);
    }

    #[test]
    fn a_panicking_listener_does_not_block_its_neighbors() {
        let chain: TypedListenerChain<i32> = TypedListenerChain::new();
        chain.add(|_: &ConnectorInfo, _: &mut i32| panic!("boom"), true);
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();
        chain.add(move |_: &ConnectorInfo, _: &mut i32| {
            calls_clone.fetch_add(1, AtomicOrdering::SeqCst);
            ListenerResult::NONE
        }, true);

        let info = sample_info();
        chain.notify(&info, &mut 0);
        assert_eq!(calls.load(AtomicOrdering::SeqCst), 1);
    }

    #[test]
    fn untyped_chain_fires_in_order() {
        let chain = ConnectorListenerChain::new();
        let order = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let order_a = order.clone();
        chain.add(move |_: &ConnectorInfo| order_a.lock().push(1), true);
        let order_b = order.clone();
        chain.add(move |_: &ConnectorInfo| order_b.lock().push(2), true);

        chain.notify(&sample_info());
        assert_eq!(*order.lock(), vec![1, 2]);
    }
}
