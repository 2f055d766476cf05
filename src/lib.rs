//! reactive_web - Reactive bridge for callback-driven async HTTP containers
//!
//! Connects an embedding HTTP container (the component owning sockets,
//! parsing, and non-blocking I/O callbacks) to an application model where
//! the handler is a pure function from an immutable [`Request`] to a
//! [`Response`] value. A handler whose inputs are not available yet
//! returns a provisional *draft* response; the reactive [`Evaluator`]
//! re-runs it when its dependencies change and the first non-draft value
//! is delivered to the client. No thread ever blocks on I/O.
//!
//! # Architecture
//!
//! - **[`Servlet`]** - the application surface: per-method handlers with
//!   defaults, a `service` dispatch, and an executor selector.
//! - **[`Bridge`]** - binds a servlet to an evaluator, limits, and
//!   metrics; the container calls [`Bridge::serve`] once per request.
//! - **Task** (internal) - the per-request state machine. It buffers the
//!   body through the container's non-blocking reads, hands the request
//!   to the evaluator on the servlet's executor, then drains the response
//!   body through non-blocking writes. Container callbacks and evaluator
//!   completion fan into one event stream, so each task is a
//!   single-writer state machine with at-most-once response delivery and
//!   deterministic teardown on error, timeout, and cancellation.
//! - **[`container`]** - the traits the embedding container implements.
//!
//! # Usage
//!
//! ```
//! use reactive_web::{Bridge, Method, MethodSet, Request, Response, Servlet, ServiceError};
//!
//! struct Hello;
//!
//! impl Servlet for Hello {
//!     fn overrides(&self) -> MethodSet {
//!         MethodSet::new().with(Method::Get)
//!     }
//!
//!     fn do_get(&self, _request: &Request) -> Result<Response, ServiceError> {
//!         let mut response = Response::new();
//!         response.set_header("Content-Type", "text/plain");
//!         response.set_data("Hello World!");
//!         Ok(response)
//!     }
//! }
//!
//! let bridge = Bridge::new(Hello);
//! // The container calls bridge.serve(transaction) for every request,
//! // from within its tokio runtime.
//! # let _ = bridge;
//! ```
//!
//! # Error semantics on the wire
//!
//! - Unhandled methods answer `405` with `Cache-Control: no-cache, no-store`.
//! - A failing handler answers a bare `500` (status and `Cache-Control`
//!   only, no body).
//! - A container timeout answers a bare `504` the same way, unless a
//!   response already started.
//! - Container failures tear the transaction down without writing
//!   anything. No error ever propagates back into a container callback.
pub(crate) mod http {
    pub(crate) mod request;
    pub(crate) mod response;
    pub(crate) mod types;
}
pub(crate) mod bridge {
    pub(crate) mod evaluator;
    pub(crate) mod servlet;
    pub(crate) mod task;
}
pub mod container;
pub(crate) mod errors;
pub mod limits;
pub mod metrics;

pub use crate::{
    bridge::{
        evaluator::{Evaluation, Evaluator, Service, SignalEvaluator},
        servlet::{Bridge, Servlet},
    },
    container::{RawRequest, TaskListener, Transaction},
    errors::{ConvertError, ServiceError},
    http::{
        request::Request,
        response::Response,
        types::{HeaderMap, Method, MethodSet},
    },
};
