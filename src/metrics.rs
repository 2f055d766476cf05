//! Task observability: counters, the active-task gauge, and cumulative
//! task durations.
//!
//! One [`TaskMetrics`] instance is shared by every task a bridge spawns.
//! Counters are plain relaxed atomics; [`TaskMetrics::snapshot`] produces a
//! consistent-enough copy for scraping and assertions.

use crate::http::types::Method;
use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::{Duration, Instant},
};

const STATUS_LO: u16 = 100;
const STATUS_HI: u16 = 599;

/// Counter collection shared across all tasks of one bridge.
#[derive(Debug)]
pub struct TaskMetrics {
    active_tasks: AtomicU64,
    tasks_completed: AtomicU64,
    task_micros: AtomicU64,

    read_bytes: AtomicU64,
    read_calls: AtomicU64,
    read_waits: AtomicU64,
    write_bytes: AtomicU64,
    write_calls: AtomicU64,
    write_waits: AtomicU64,

    container_exceptions: AtomicU64,
    async_exceptions: AtomicU64,
    service_exceptions: AtomicU64,
    timeout_exceptions: AtomicU64,

    methods: [AtomicU64; Method::BUCKETS],
    statuses: Box<[AtomicU64]>,
    status_other: AtomicU64,
}

impl TaskMetrics {
    pub fn new() -> Self {
        let span = usize::from(STATUS_HI - STATUS_LO) + 1;

        Self {
            active_tasks: AtomicU64::new(0),
            tasks_completed: AtomicU64::new(0),
            task_micros: AtomicU64::new(0),

            read_bytes: AtomicU64::new(0),
            read_calls: AtomicU64::new(0),
            read_waits: AtomicU64::new(0),
            write_bytes: AtomicU64::new(0),
            write_calls: AtomicU64::new(0),
            write_waits: AtomicU64::new(0),

            container_exceptions: AtomicU64::new(0),
            async_exceptions: AtomicU64::new(0),
            service_exceptions: AtomicU64::new(0),
            timeout_exceptions: AtomicU64::new(0),

            methods: std::array::from_fn(|_| AtomicU64::new(0)),
            statuses: (0..span)
                .map(|_| AtomicU64::new(0))
                .collect::<Vec<_>>()
                .into_boxed_slice(),
            status_other: AtomicU64::new(0),
        }
    }

    /// Copies every counter into a plain value for scraping or assertions.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            active_tasks: self.active_tasks.load(Ordering::Relaxed),
            tasks_completed: self.tasks_completed.load(Ordering::Relaxed),
            task_time: Duration::from_micros(self.task_micros.load(Ordering::Relaxed)),

            read_bytes: self.read_bytes.load(Ordering::Relaxed),
            read_calls: self.read_calls.load(Ordering::Relaxed),
            read_waits: self.read_waits.load(Ordering::Relaxed),
            write_bytes: self.write_bytes.load(Ordering::Relaxed),
            write_calls: self.write_calls.load(Ordering::Relaxed),
            write_waits: self.write_waits.load(Ordering::Relaxed),

            container_exceptions: self.container_exceptions.load(Ordering::Relaxed),
            async_exceptions: self.async_exceptions.load(Ordering::Relaxed),
            service_exceptions: self.service_exceptions.load(Ordering::Relaxed),
            timeout_exceptions: self.timeout_exceptions.load(Ordering::Relaxed),

            methods: std::array::from_fn(|i| self.methods[i].load(Ordering::Relaxed)),
            statuses: self
                .statuses
                .iter()
                .map(|c| c.load(Ordering::Relaxed))
                .collect(),
            status_other: self.status_other.load(Ordering::Relaxed),
        }
    }
}

// Recording side, driven by the task.
impl TaskMetrics {
    pub(crate) fn task_started(&self) -> TaskTimer {
        self.active_tasks.fetch_add(1, Ordering::Relaxed);
        TaskTimer {
            started: Instant::now(),
        }
    }

    pub(crate) fn task_finished(&self, timer: TaskTimer) {
        self.active_tasks.fetch_sub(1, Ordering::Relaxed);
        self.tasks_completed.fetch_add(1, Ordering::Relaxed);
        self.task_micros.fetch_add(
            timer.started.elapsed().as_micros() as u64,
            Ordering::Relaxed,
        );
    }

    pub(crate) fn record_method(&self, method: Method) {
        self.methods[method.bucket()].fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_status(&self, status: u16) {
        match status {
            STATUS_LO..=STATUS_HI => {
                self.statuses[usize::from(status - STATUS_LO)].fetch_add(1, Ordering::Relaxed)
            }
            _ => self.status_other.fetch_add(1, Ordering::Relaxed),
        };
    }

    pub(crate) fn record_read(&self, bytes: usize) {
        self.read_calls.fetch_add(1, Ordering::Relaxed);
        self.read_bytes.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub(crate) fn read_wait(&self) {
        self.read_waits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_write(&self, bytes: usize) {
        self.write_calls.fetch_add(1, Ordering::Relaxed);
        self.write_bytes.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub(crate) fn write_wait(&self) {
        self.write_waits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn container_exception(&self) {
        self.container_exceptions.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn async_exception(&self) {
        self.async_exceptions.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn service_exception(&self) {
        self.service_exceptions.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn timeout_exception(&self) {
        self.timeout_exceptions.fetch_add(1, Ordering::Relaxed);
    }
}

impl Default for TaskMetrics {
    fn default() -> Self {
        Self::new()
    }
}

// Scope of one task on the active gauge and the duration accumulator.
#[derive(Debug)]
pub(crate) struct TaskTimer {
    started: Instant,
}

/// Point-in-time copy of every counter.
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    /// Tasks currently alive.
    pub active_tasks: u64,
    /// Tasks that reached their terminal state.
    pub tasks_completed: u64,
    /// Wall-clock time accumulated across completed tasks.
    pub task_time: Duration,

    /// Body bytes read from container input streams.
    pub read_bytes: u64,
    /// Non-blocking read calls issued.
    pub read_calls: u64,
    /// Times a read loop parked waiting for input readiness.
    pub read_waits: u64,
    /// Body bytes written to container output streams.
    pub write_bytes: u64,
    /// Non-blocking write calls issued.
    pub write_calls: u64,
    /// Times a write loop parked waiting for output readiness.
    pub write_waits: u64,

    /// Container calls that failed inside a guarded block.
    pub container_exceptions: u64,
    /// Transactions torn down through the death path.
    pub async_exceptions: u64,
    /// Application failures surfaced by the evaluator.
    pub service_exceptions: u64,
    /// Container timeouts adopted by tasks.
    pub timeout_exceptions: u64,

    methods: [u64; Method::BUCKETS],
    statuses: Vec<u64>,
    status_other: u64,
}

impl MetricsSnapshot {
    /// Requests seen for `method`'s bucket (`TRACE` shares the `OTHER` bucket).
    #[inline]
    pub fn method(&self, method: Method) -> u64 {
        self.methods[method.bucket()]
    }

    /// Responses produced with `code`; codes outside `[100, 599]` share one
    /// overflow bucket.
    #[inline]
    pub fn status(&self, code: u16) -> u64 {
        match code {
            STATUS_LO..=STATUS_HI => self.statuses[usize::from(code - STATUS_LO)],
            _ => self.status_other,
        }
    }
}

#[cfg(test)]
mod metrics_tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let metrics = TaskMetrics::new();

        metrics.record_read(100);
        metrics.record_read(28);
        metrics.read_wait();
        metrics.record_write(4096);
        metrics.write_wait();
        metrics.write_wait();
        metrics.container_exception();
        metrics.async_exception();
        metrics.service_exception();
        metrics.timeout_exception();

        let snap = metrics.snapshot();
        assert_eq!(snap.read_calls, 2);
        assert_eq!(snap.read_bytes, 128);
        assert_eq!(snap.read_waits, 1);
        assert_eq!(snap.write_calls, 1);
        assert_eq!(snap.write_bytes, 4096);
        assert_eq!(snap.write_waits, 2);
        assert_eq!(snap.container_exceptions, 1);
        assert_eq!(snap.async_exceptions, 1);
        assert_eq!(snap.service_exceptions, 1);
        assert_eq!(snap.timeout_exceptions, 1);
    }

    #[test]
    fn status_buckets() {
        let metrics = TaskMetrics::new();

        #[rustfmt::skip]
        let recorded = [
            100, 200, 200, 204, 404, 500, 504, 599,
            99, 600, 0, 65535,
        ];
        for status in recorded {
            metrics.record_status(status);
        }

        let snap = metrics.snapshot();
        assert_eq!(snap.status(100), 1);
        assert_eq!(snap.status(200), 2);
        assert_eq!(snap.status(204), 1);
        assert_eq!(snap.status(404), 1);
        assert_eq!(snap.status(500), 1);
        assert_eq!(snap.status(504), 1);
        assert_eq!(snap.status(599), 1);
        assert_eq!(snap.status(301), 0);
        // Everything outside [100, 599] lands in one bucket.
        assert_eq!(snap.status(99), 4);
        assert_eq!(snap.status(600), 4);
    }

    #[test]
    fn method_buckets() {
        let metrics = TaskMetrics::new();

        metrics.record_method(Method::Get);
        metrics.record_method(Method::Get);
        metrics.record_method(Method::Patch);
        metrics.record_method(Method::Trace);
        metrics.record_method(Method::Other);

        let snap = metrics.snapshot();
        assert_eq!(snap.method(Method::Get), 2);
        assert_eq!(snap.method(Method::Patch), 1);
        assert_eq!(snap.method(Method::Other), 2);
        assert_eq!(snap.method(Method::Trace), 2);
        assert_eq!(snap.method(Method::Post), 0);
    }

    #[test]
    fn gauge_and_durations() {
        let metrics = TaskMetrics::new();

        let first = metrics.task_started();
        let second = metrics.task_started();
        assert_eq!(metrics.snapshot().active_tasks, 2);

        metrics.task_finished(first);
        metrics.task_finished(second);

        let snap = metrics.snapshot();
        assert_eq!(snap.active_tasks, 0);
        assert_eq!(snap.tasks_completed, 2);
    }
}
