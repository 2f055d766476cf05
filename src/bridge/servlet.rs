//! Application-facing servlet surface and the container-facing entry point

use crate::{
    bridge::{
        evaluator::{Evaluator, SignalEvaluator},
        task::Task,
    },
    container::Transaction,
    errors::ServiceError,
    http::{
        request::Request,
        response::Response,
        types::{MethodSet, NO_STORE},
    },
    limits::TaskLimits,
    metrics::TaskMetrics,
};
use bytes::Bytes;
use std::sync::Arc;
use tokio::runtime::Handle;

// The prebuilt refusal every unhandled method receives.
fn method_not_allowed() -> Response {
    let mut response = Response::new();
    response
        .set_status(405)
        .set_header("Cache-Control", NO_STORE);
    response
}

/// Application entry point: per-method handlers plus the `service` dispatch.
///
/// Implementations override any subset of the `do_*` handlers (or
/// [`service`](Servlet::service) itself) and declare the overridden set via
/// [`overrides`](Servlet::overrides) so the default `OPTIONS` handler can
/// build its `Allow` header. Every handler not overridden answers
/// `405 Method Not Allowed`.
///
/// Handlers must be pure with respect to the request: the reactive
/// evaluator may invoke `service` any number of times with the same
/// `Request` while the handler's inputs settle, so a handler must not rely
/// on observing its own side effects between invocations. A handler whose
/// inputs are not available yet returns a [draft](Response::set_draft)
/// response and is re-invoked when they change.
///
/// # Examples
/// ```
/// use reactive_web::{Method, MethodSet, Request, Response, Servlet, ServiceError};
///
/// struct Hello;
///
/// impl Servlet for Hello {
///     fn overrides(&self) -> MethodSet {
///         MethodSet::new().with(Method::Get)
///     }
///
///     fn do_get(&self, _request: &Request) -> Result<Response, ServiceError> {
///         let mut response = Response::new();
///         response.set_header("Content-Type", "text/plain");
///         response.set_data("hello");
///         Ok(response)
///     }
/// }
/// ```
pub trait Servlet: Send + Sync + 'static {
    /// The per-method handlers this servlet declares it overrides.
    ///
    /// Feeds the default `OPTIONS` handler; an empty set is valid and
    /// yields `Allow: OPTIONS`.
    fn overrides(&self) -> MethodSet {
        MethodSet::new()
    }

    /// Executor the reactive evaluation of `service` runs on.
    ///
    /// `None` selects the evaluator's shared executor.
    fn executor(&self) -> Option<Handle> {
        None
    }

    fn do_get(&self, _request: &Request) -> Result<Response, ServiceError> {
        Ok(method_not_allowed())
    }

    fn do_post(&self, _request: &Request) -> Result<Response, ServiceError> {
        Ok(method_not_allowed())
    }

    fn do_put(&self, _request: &Request) -> Result<Response, ServiceError> {
        Ok(method_not_allowed())
    }

    fn do_delete(&self, _request: &Request) -> Result<Response, ServiceError> {
        Ok(method_not_allowed())
    }

    /// Defaults to `do_get` with the body replaced by an empty buffer.
    fn do_head(&self, request: &Request) -> Result<Response, ServiceError> {
        let mut response = self.do_get(request)?;
        response.set_data(Bytes::new());
        Ok(response)
    }

    /// Defaults to a `200` advertising the declared methods.
    fn do_options(&self, _request: &Request) -> Result<Response, ServiceError> {
        let mut response = Response::new();
        response
            .set_header("Allow", self.overrides().allow_header())
            .set_header("Cache-Control", NO_STORE);
        Ok(response)
    }

    fn do_trace(&self, _request: &Request) -> Result<Response, ServiceError> {
        Ok(method_not_allowed())
    }

    /// Dispatches on the request's method token.
    ///
    /// Unknown tokens (including `PATCH`, which has no handler of its own)
    /// receive the prebuilt `405`.
    fn service(&self, request: &Request) -> Result<Response, ServiceError> {
        match request.method() {
            "GET" => self.do_get(request),
            "HEAD" => self.do_head(request),
            "OPTIONS" => self.do_options(request),
            "POST" => self.do_post(request),
            "PUT" => self.do_put(request),
            "DELETE" => self.do_delete(request),
            "TRACE" => self.do_trace(request),
            _ => Ok(method_not_allowed()),
        }
    }
}

/// Binds one servlet to an evaluator, limits, and a metrics collection,
/// and runs one request task per container transaction.
///
/// The container keeps one `Bridge` per deployed servlet and calls
/// [`serve`](Bridge::serve) for every request it accepts.
pub struct Bridge<S: Servlet> {
    servlet: Arc<S>,
    evaluator: Arc<dyn Evaluator>,
    limits: TaskLimits,
    metrics: Arc<TaskMetrics>,
}

impl<S: Servlet> Bridge<S> {
    /// Wraps `servlet` with a [`SignalEvaluator`], default limits, and a
    /// fresh metrics collection.
    pub fn new(servlet: S) -> Self {
        Bridge {
            servlet: Arc::new(servlet),
            evaluator: Arc::new(SignalEvaluator::new()),
            limits: TaskLimits::default(),
            metrics: Arc::new(TaskMetrics::new()),
        }
    }

    /// Replaces the reactive evaluator.
    pub fn evaluator<E: Evaluator>(mut self, evaluator: E) -> Self {
        self.evaluator = Arc::new(evaluator);
        self
    }

    /// Replaces the task limits.
    pub fn limits(mut self, limits: TaskLimits) -> Self {
        self.limits = limits;
        self
    }

    /// The metrics collection every task of this bridge reports into.
    pub fn metrics(&self) -> &Arc<TaskMetrics> {
        &self.metrics
    }

    /// Entry point the container invokes once per request.
    ///
    /// Activates async mode on `transaction` and spawns the per-request
    /// task onto the current runtime, which therefore must be the
    /// container pool. Never blocks and never fails: every outcome,
    /// including container breakage, ends in the transaction being
    /// completed.
    pub fn serve<T: Transaction>(&self, transaction: T) {
        Task::spawn(
            self.servlet.clone(),
            transaction,
            self.evaluator.clone(),
            self.limits.clone(),
            self.metrics.clone(),
        );
    }
}

#[cfg(test)]
mod dispatch_tests {
    use super::*;
    use crate::http::types::Method;

    struct Bare;

    impl Servlet for Bare {}

    fn request_for(method: &str) -> Request {
        let mut request = Request::new();
        request.set_method(method);
        request
    }

    #[test]
    fn unhandled_methods_get_405() {
        #[rustfmt::skip]
        let cases = [
            "GET", "HEAD", "POST", "PUT", "DELETE", "TRACE",
            "PATCH", "BREW", "",
        ];

        for method in cases {
            let response = Bare.service(&request_for(method)).unwrap();

            assert_eq!(response.status(), 405, "method {method:?}");
            assert_eq!(
                response.headers().get("cache-control"),
                Some("no-cache, no-store"),
                "method {method:?}"
            );
            assert!(response.data().is_empty(), "method {method:?}");
        }
    }

    #[test]
    fn options_default() {
        let response = Bare.service(&request_for("OPTIONS")).unwrap();

        assert_eq!(response.status(), 200);
        assert_eq!(response.headers().get("allow"), Some("OPTIONS"));
        assert_eq!(
            response.headers().get("cache-control"),
            Some("no-cache, no-store")
        );
    }

    struct GetOnly;

    impl Servlet for GetOnly {
        fn overrides(&self) -> MethodSet {
            MethodSet::new().with(Method::Get)
        }

        fn do_get(&self, _request: &Request) -> Result<Response, ServiceError> {
            let mut response = Response::new();
            response
                .set_header("Content-Type", "text/plain")
                .set_data("body bytes");
            Ok(response)
        }
    }

    #[test]
    fn options_advertises_declared_methods() {
        let response = GetOnly.service(&request_for("OPTIONS")).unwrap();

        assert_eq!(response.status(), 200);
        assert_eq!(response.headers().get("Allow"), Some("GET, HEAD, OPTIONS"));
        assert_eq!(
            response.headers().get("Cache-Control"),
            Some("no-cache, no-store")
        );
    }

    #[test]
    fn head_defers_to_get_and_drops_the_body() {
        let response = GetOnly.service(&request_for("HEAD")).unwrap();

        assert_eq!(response.status(), 200);
        assert_eq!(response.headers().get("content-type"), Some("text/plain"));
        assert!(response.data().is_empty());
    }

    #[test]
    fn head_stays_405_without_get() {
        let response = Bare.service(&request_for("HEAD")).unwrap();

        assert_eq!(response.status(), 405);
        assert!(response.data().is_empty());
    }

    #[test]
    fn service_is_repeatable() {
        let request = request_for("GET");

        let first = GetOnly.service(&request).unwrap();
        let second = GetOnly.service(&request).unwrap();

        assert_eq!(first.status(), second.status());
        assert_eq!(first.data(), second.data());
        assert_eq!(
            first.headers().iter().collect::<Vec<_>>(),
            second.headers().iter().collect::<Vec<_>>()
        );
    }

    #[test]
    fn executor_defaults_to_shared() {
        assert!(Bare.executor().is_none());
    }
}
