//! Back-pressure and concurrency primitives shared by every pipeline stage.
//!
//! - [`line_reader`]: resumable line reader with a pause/resume contract
//! - [`write_queue`]: bounded write queue with one writer thread per file
//! - [`gate`]: in-flight counter enforcing a concurrency ceiling

pub mod gate;
pub mod line_reader;
pub mod write_queue;

pub use gate::{GatePermit, InFlightGate};
pub use line_reader::{Line, ReadSignal, ReaderState, ResumableLineReader};
pub use write_queue::{WriteHandle, WriteQueue, WriteQueueError, WriteQueueStats, WriteSummary};
