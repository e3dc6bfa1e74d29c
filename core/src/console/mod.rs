//! Run-scoped I/O shared by every backend: the transcript sink and the
//! input coordinator.

pub mod input;
pub mod output;

pub use input::{echo_line, InputCoordinator, InputError, PendingInputRequest};
pub use output::{OutputSink, STOPPED_MARKER};
