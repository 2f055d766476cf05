//! Adaptor over the reactive runtime
//!
//! The task never talks to the reactive runtime directly. It hands an
//! [`Evaluator`] a thunk over `service(request)` and gets back an
//! [`Evaluation`]: a cancellable computation that completes with the first
//! non-draft [`Response`] the thunk produces, or with the handler's error.

use crate::{errors::ServiceError, http::response::Response};
use std::{pin::pin, sync::Arc};
use tokio::{
    runtime::Handle,
    sync::{oneshot, Notify},
    task::JoinHandle,
};

/// Thunk the evaluator re-invokes until it yields a non-draft response.
///
/// The thunk must be pure with respect to its captured request: the
/// evaluator may call it any number of times.
pub type Service = Arc<dyn Fn() -> Result<Response, ServiceError> + Send + Sync>;

/// A pending reactive computation.
///
/// Completes at most once. After [`cancel`](Evaluation::cancel) the spawned
/// work is aborted and the completion channel closes without a value, which
/// the owning task distinguishes from an application failure.
#[derive(Debug)]
pub struct Evaluation {
    work: JoinHandle<()>,
    pub(crate) completion: oneshot::Receiver<Result<Response, ServiceError>>,
}

impl Evaluation {
    /// Pairs the spawned work with the channel it completes through.
    pub fn new(
        work: JoinHandle<()>,
        completion: oneshot::Receiver<Result<Response, ServiceError>>,
    ) -> Self {
        Evaluation { work, completion }
    }

    /// Stops the evaluation. Reliably ends the spawned work; no result is
    /// delivered afterwards. Cancelling a finished evaluation is a no-op.
    pub fn cancel(&self) {
        self.work.abort();
    }
}

/// Interface over the reactive runtime.
pub trait Evaluator: Send + Sync + 'static {
    /// Starts evaluating `service` on `executor` (or the evaluator's own
    /// default executor when `None`), completing with the first non-draft
    /// response.
    fn evaluate(&self, service: Service, executor: Option<Handle>) -> Evaluation;
}

impl<E: Evaluator + ?Sized> Evaluator for Arc<E> {
    fn evaluate(&self, service: Service, executor: Option<Handle>) -> Evaluation {
        (**self).evaluate(service, executor)
    }
}

/// Built-in evaluator driven by an explicit change signal.
///
/// Every evaluation runs the thunk once immediately. When the result is a
/// draft, the evaluation parks until [`signal`](SignalEvaluator::signal)
/// fires, then runs the thunk again. A change that arrives while the thunk
/// is executing is not lost: the wakeup is armed before each invocation.
///
/// This is the crate's stand-in for an external reactive runtime;
/// anything implementing [`Evaluator`] can replace it.
#[derive(Debug, Default)]
pub struct SignalEvaluator {
    changes: Arc<Notify>,
}

impl SignalEvaluator {
    pub fn new() -> Self {
        SignalEvaluator {
            changes: Arc::new(Notify::new()),
        }
    }

    /// Wakes every evaluation whose last result was a draft.
    pub fn signal(&self) {
        self.changes.notify_waiters();
    }
}

impl Evaluator for SignalEvaluator {
    fn evaluate(&self, service: Service, executor: Option<Handle>) -> Evaluation {
        let (tx, rx) = oneshot::channel();
        let changes = self.changes.clone();
        let executor = executor.unwrap_or_else(Handle::current);

        let work = executor.spawn(async move {
            let result = loop {
                let mut rerun = pin!(changes.notified());
                rerun.as_mut().enable();

                match service() {
                    Ok(response) if !response.is_draft() => break Ok(response),
                    Ok(_) => rerun.await,
                    Err(error) => break Err(error),
                }
            };
            let _ = tx.send(result);
        });

        Evaluation::new(work, rx)
    }
}

#[cfg(test)]
mod signal_evaluator_tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::time::sleep;

    fn counting_service(calls: Arc<AtomicUsize>, drafts: usize) -> Service {
        Arc::new(move || {
            let call = calls.fetch_add(1, Ordering::SeqCst);
            let mut response = Response::new();
            response.set_draft(call < drafts);
            Ok(response)
        })
    }

    async fn wait_for_calls(calls: &AtomicUsize, at_least: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while calls.load(Ordering::SeqCst) < at_least {
                sleep(Duration::from_millis(1)).await;
            }
        })
        .await
        .expect("service was never invoked");
    }

    #[tokio::test]
    async fn completes_without_drafts() {
        let evaluator = SignalEvaluator::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let mut evaluation = evaluator.evaluate(counting_service(calls.clone(), 0), None);
        let response = (&mut evaluation.completion).await.unwrap().unwrap();

        assert_eq!(response.status(), 200);
        assert!(!response.is_draft());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn reruns_on_signal_until_non_draft() {
        let evaluator = SignalEvaluator::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let mut evaluation = evaluator.evaluate(counting_service(calls.clone(), 2), None);

        wait_for_calls(&calls, 1).await;
        evaluator.signal();
        wait_for_calls(&calls, 2).await;
        evaluator.signal();

        let response = (&mut evaluation.completion).await.unwrap().unwrap();
        assert!(!response.is_draft());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn propagates_handler_errors() {
        let evaluator = SignalEvaluator::new();
        let service: Service = Arc::new(|| Err(ServiceError::new("boom")));

        let mut evaluation = evaluator.evaluate(service, None);
        let result = (&mut evaluation.completion).await.unwrap();

        assert_eq!(result.unwrap_err().to_string(), "service failed: boom");
    }

    #[tokio::test]
    async fn cancel_closes_the_completion_channel() {
        let evaluator = SignalEvaluator::new();
        let calls = Arc::new(AtomicUsize::new(0));

        // Permanently drafting service: would never complete on its own.
        let service: Service = {
            let calls = calls.clone();
            Arc::new(move || {
                calls.fetch_add(1, Ordering::SeqCst);
                let mut response = Response::new();
                response.set_draft(true);
                Ok(response)
            })
        };

        let mut evaluation = evaluator.evaluate(service, None);
        wait_for_calls(&calls, 1).await;

        evaluation.cancel();
        assert!((&mut evaluation.completion).await.is_err());

        let parked = calls.load(Ordering::SeqCst);
        evaluator.signal();
        sleep(Duration::from_millis(5)).await;
        assert_eq!(calls.load(Ordering::SeqCst), parked);
    }
}
