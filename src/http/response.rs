//! Response value produced by application handlers

use crate::http::types::HeaderMap;
use bytes::Bytes;
use cookie::Cookie;

/// Complete HTTP response described as a plain value.
///
/// A handler builds one of these and returns it; no I/O happens here. The
/// body is a [`Bytes`] window: the task clones the window before writing,
/// so the handler's own handle (and any buffer shared across requests
/// behind it) is never advanced or truncated. Nothing is derived
/// automatically - a `Content-Length` header, for instance, is only sent
/// if the handler sets one.
///
/// A response marked as a [draft](Response::set_draft) is provisional: the
/// reactive evaluator discards it and re-invokes the handler once its
/// inputs change, until a non-draft value is produced.
///
/// # Examples
/// ```
/// use reactive_web::Response;
///
/// let mut response = Response::new();
/// response
///     .set_status(201)
///     .set_header("Content-Type", "text/plain")
///     .set_data("created");
///
/// assert_eq!(response.status(), 201);
/// assert!(!response.is_draft());
/// ```
#[derive(Debug, Clone)]
pub struct Response {
    status: u16,
    headers: HeaderMap,
    cookies: Vec<Cookie<'static>>,
    data: Bytes,
    draft: bool,
}

impl Response {
    /// Creates a `200` response with no headers, no cookies, and an empty
    /// body.
    pub fn new() -> Self {
        Response {
            status: 200,
            headers: HeaderMap::new(),
            cookies: Vec::new(),
            data: Bytes::new(),
            draft: false,
        }
    }
}

// Public API
impl Response {
    /// HTTP status code.
    #[inline(always)]
    pub const fn status(&self) -> u16 {
        self.status
    }

    /// Response headers, written to the wire in iteration order.
    #[inline(always)]
    pub const fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Mutable access to the headers.
    #[inline(always)]
    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Response cookies, in insertion order.
    #[inline(always)]
    pub fn cookies(&self) -> &[Cookie<'static>] {
        &self.cookies
    }

    /// Body window.
    #[inline(always)]
    pub const fn data(&self) -> &Bytes {
        &self.data
    }

    /// Whether this value is provisional and should be re-evaluated.
    #[inline(always)]
    pub const fn is_draft(&self) -> bool {
        self.draft
    }
}

// Fluent setters
impl Response {
    pub fn set_status(&mut self, status: u16) -> &mut Self {
        self.status = status;
        self
    }

    /// Stores a header, replacing any case-insensitively matching one.
    pub fn set_header<N: Into<String>, V: Into<String>>(&mut self, name: N, value: V) -> &mut Self {
        self.headers.set(name, value);
        self
    }

    pub fn add_cookie(&mut self, cookie: Cookie<'static>) -> &mut Self {
        self.cookies.push(cookie);
        self
    }

    pub fn set_data<D: Into<Bytes>>(&mut self, data: D) -> &mut Self {
        self.data = data.into();
        self
    }

    pub fn set_draft(&mut self, draft: bool) -> &mut Self {
        self.draft = draft;
        self
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod response_tests {
    use super::*;

    #[test]
    fn defaults() {
        let response = Response::new();

        assert_eq!(response.status(), 200);
        assert!(response.headers().is_empty());
        assert!(response.cookies().is_empty());
        assert!(response.data().is_empty());
        assert!(!response.is_draft());
    }

    #[test]
    fn fluent_construction() {
        let mut response = Response::new();
        response
            .set_status(404)
            .set_header("Content-Type", "application/json")
            .add_cookie(Cookie::new("seen", "1"))
            .set_data(&b"{}"[..]);

        assert_eq!(response.status(), 404);
        assert_eq!(
            response.headers().get("content-type"),
            Some("application/json")
        );
        assert_eq!(response.cookies().len(), 1);
        assert_eq!(response.data().as_ref(), b"{}");
    }

    #[test]
    fn body_window_is_independent() {
        let shared = Bytes::from_static(b"shared across requests");
        let mut response = Response::new();
        response.set_data(shared.clone());

        // Consuming a clone of the window leaves the handler's bytes alone.
        let mut consumed = response.data().clone();
        let _ = consumed.split_to(7);

        assert_eq!(shared.as_ref(), b"shared across requests");
        assert_eq!(response.data().as_ref(), b"shared across requests");
        assert_eq!(consumed.as_ref(), b"across requests");
    }

    #[test]
    fn draft_flag_round_trip() {
        let mut response = Response::new();

        response.set_draft(true);
        assert!(response.is_draft());
        response.set_draft(false);
        assert!(!response.is_draft());
    }
}
