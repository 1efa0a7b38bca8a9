//! Small shared types threaded through the pipeline and CLI.

use std::time::Instant;

/// Per-invocation context, created once at the entry point and passed
/// down by reference.
///
/// Whether an invocation is a cold start is a property of the process
/// hosting the library, so the hosting side decides it (the CLI marks
/// its first request cold) and the library only reads it. Wall-clock
/// runtime is measured from construction.
#[derive(Debug, Clone)]
pub struct InvocationContext {
    started: Instant,
    cold_start: bool,
}

impl InvocationContext {
    pub fn new(cold_start: bool) -> Self {
        Self {
            started: Instant::now(),
            cold_start,
        }
    }

    pub fn cold_start(&self) -> bool {
        self.cold_start
    }

    /// Milliseconds elapsed since the invocation began.
    pub fn runtime_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }
}
