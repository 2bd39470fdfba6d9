//! Trace recording: adapters for the
//! [`TraceRecorder`](middleware_application::TraceRecorder) port.
//!
//! [`JsonlTraceRecorder`] appends the audit trail to a JSONL file;
//! [`InMemoryTraceRecorder`] keeps it in process.

mod jsonl_recorder;
mod memory_recorder;

pub use jsonl_recorder::JsonlTraceRecorder;
pub use memory_recorder::InMemoryTraceRecorder;
