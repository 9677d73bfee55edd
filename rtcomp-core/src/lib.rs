//! Primitives shared by every layer of the RTC middleware: the fixed-shape
//! buffers connectors are built on, the hierarchical `Properties`
//! configuration tree, the common error/return-code vocabulary, and
//! small ambient helpers (id generation, logging bootstrap).

pub mod error;
pub mod ids;
pub mod logging;
pub mod properties;
pub mod ring_buffer;

pub use error::{ErrorCategory, Result, ReturnCode, RtcError};
pub use ids::next_id;
pub use properties::Properties;
pub use ring_buffer::{FifoBuffer, FifoWriteOutcome, RingBuffer};
