// Copyright 2024-2026 TVMDP Contributors
// SPDX-License-Identifier: Apache-2.0

//! Completion handshake between the dispatcher and a polling caller.
//!
//! The dispatcher fills the [`ResultSink`] and then sets the
//! [`CompletionSignal`] with `Release` ordering. A caller that observes the
//! signal with `Acquire` ordering is guaranteed to read the finished result
//! and may reuse its tensor buffers. Nothing blocks: callers poll.

use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU64, Ordering};
use std::time::Duration;

/// Outcome of one inference run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunResult {
    /// `0` on success, negative errno otherwise.
    pub error_code: i32,
    pub start: u64,
    pub end: u64,
}

impl RunResult {
    pub fn is_ok(&self) -> bool {
        self.error_code == 0
    }

    /// Elapsed ticks between the two timestamps.
    pub fn latency(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }
}

/// Flag set once a run's result is published.
#[derive(Debug, Default)]
pub struct CompletionSignal {
    done: AtomicBool,
}

impl CompletionSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self) {
        self.done.store(true, Ordering::Release);
    }

    pub fn is_set(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }

    /// Re-arm the signal before reusing it for another run.
    pub fn reset(&self) {
        self.done.store(false, Ordering::Release);
    }

    /// Busy-poll until set.
    pub fn spin_wait(&self) {
        while !self.is_set() {
            std::hint::spin_loop();
        }
    }

    /// Poll until set, sleeping `poll_interval` between checks.
    pub async fn wait(&self, poll_interval: Duration) {
        while !self.is_set() {
            tokio::time::sleep(poll_interval).await;
        }
    }
}

/// Destination for the error code and timestamps of a run.
#[derive(Debug, Default)]
pub struct ResultSink {
    error_code: AtomicI32,
    start: AtomicU64,
    end: AtomicU64,
}

impl ResultSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write a result. Publication happens through the completion signal.
    pub fn store(&self, result: RunResult) {
        self.error_code.store(result.error_code, Ordering::Relaxed);
        self.start.store(result.start, Ordering::Relaxed);
        self.end.store(result.end, Ordering::Relaxed);
    }

    /// Raw snapshot; only meaningful after the signal was observed.
    pub fn read(&self) -> RunResult {
        RunResult {
            error_code: self.error_code.load(Ordering::Relaxed),
            start: self.start.load(Ordering::Relaxed),
            end: self.end.load(Ordering::Relaxed),
        }
    }

    /// The result, if `signal` has been set.
    pub fn poll(&self, signal: &CompletionSignal) -> Option<RunResult> {
        signal.is_set().then(|| self.read())
    }
}
