//! Immutable request snapshot and its conversion from the container request

use crate::{container::RawRequest, errors::ConvertError, http::types::HeaderMap};
use bytes::Bytes;
use cookie::Cookie;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use url::Url;

/// Immutable snapshot of one inbound HTTP request, body included.
///
/// Handlers receive `&Request` and may be re-invoked with the same value
/// any number of times, so nothing here is lazily populated: by the time a
/// handler runs, the URL is parsed and canonicalized, repeated headers are
/// fused into single `", "`-joined values, and the body is fully buffered.
///
/// The type stays mutable for conversion and for tests; the `set_*`
/// methods are fluent and return the receiver.
#[derive(Debug, Clone)]
pub struct Request {
    local: SocketAddr,
    remote: SocketAddr,
    method: String,
    url: Option<Url>,
    headers: HeaderMap,
    cookies: Vec<Cookie<'static>>,
    data: Bytes,
}

impl Request {
    /// Creates an empty request: method `GET`, unset URL, no headers,
    /// no cookies, empty body, zero endpoints.
    pub fn new() -> Self {
        Request {
            local: zero_endpoint(0),
            remote: zero_endpoint(0),
            method: "GET".to_owned(),
            url: None,
            headers: HeaderMap::new(),
            cookies: Vec::new(),
            data: Bytes::new(),
        }
    }

    /// Builds the request value from the container's raw request.
    ///
    /// Addresses fall back to a zero-address endpoint with the known port
    /// when the container's numeric host string does not parse. The URL is
    /// the container URL with `"?" + query` appended when a query is
    /// present; a URL that fails to parse fails the whole conversion. The
    /// body is not read here - the task buffers it separately.
    pub fn from_raw<R: RawRequest + ?Sized>(raw: &R) -> Result<Self, ConvertError> {
        let mut request = Request::new();
        request.local = endpoint(raw.local_name(), raw.local_port());
        request.remote = endpoint(raw.remote_name(), raw.remote_port());
        request.method = raw.method().to_ascii_uppercase();

        request.url = Some(match raw.query() {
            Some(query) => Url::parse(&format!("{}?{}", raw.url(), query))?,
            None => Url::parse(raw.url())?,
        });

        for name in raw.header_names() {
            for value in raw.header_values(&name) {
                request.headers.append(name.as_str(), value);
            }
        }
        request.cookies = raw.cookies();

        Ok(request)
    }
}

// Public API
impl Request {
    /// Network endpoint of the server side of the connection.
    #[inline(always)]
    pub const fn local(&self) -> SocketAddr {
        self.local
    }

    /// Network endpoint of the client side of the connection.
    #[inline(always)]
    pub const fn remote(&self) -> SocketAddr {
        self.remote
    }

    /// Uppercase method token, `"GET"` by default.
    #[inline(always)]
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Parsed absolute-form URL, query included. Unset until assigned.
    #[inline(always)]
    pub const fn url(&self) -> Option<&Url> {
        self.url.as_ref()
    }

    /// Request headers.
    #[inline(always)]
    pub const fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Mutable access to the headers, for conversion and tests.
    #[inline(always)]
    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Request cookies, in container order.
    #[inline(always)]
    pub fn cookies(&self) -> &[Cookie<'static>] {
        &self.cookies
    }

    /// Fully buffered request body.
    #[inline(always)]
    pub const fn data(&self) -> &Bytes {
        &self.data
    }
}

// Fluent setters
impl Request {
    pub fn set_local(&mut self, local: SocketAddr) -> &mut Self {
        self.local = local;
        self
    }

    pub fn set_remote(&mut self, remote: SocketAddr) -> &mut Self {
        self.remote = remote;
        self
    }

    pub fn set_method<M: Into<String>>(&mut self, method: M) -> &mut Self {
        self.method = method.into();
        self
    }

    pub fn set_url(&mut self, url: Url) -> &mut Self {
        self.url = Some(url);
        self
    }

    pub fn set_cookies(&mut self, cookies: Vec<Cookie<'static>>) -> &mut Self {
        self.cookies = cookies;
        self
    }

    pub fn set_data<D: Into<Bytes>>(&mut self, data: D) -> &mut Self {
        self.data = data.into();
        self
    }
}

impl Default for Request {
    fn default() -> Self {
        Self::new()
    }
}

#[inline]
fn endpoint(name: &str, port: u16) -> SocketAddr {
    match name.parse::<IpAddr>() {
        Ok(ip) => SocketAddr::new(ip, port),
        Err(_) => zero_endpoint(port),
    }
}

#[inline(always)]
fn zero_endpoint(port: u16) -> SocketAddr {
    SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port)
}

#[cfg(test)]
mod request_tests {
    use super::*;

    #[test]
    fn defaults() {
        let request = Request::new();

        assert_eq!(request.method(), "GET");
        assert_eq!(request.url(), None);
        assert!(request.headers().is_empty());
        assert!(request.cookies().is_empty());
        assert!(request.data().is_empty());
        assert_eq!(request.local(), "0.0.0.0:0".parse().unwrap());
        assert_eq!(request.remote(), "0.0.0.0:0".parse().unwrap());
    }

    #[test]
    fn fluent_setters() {
        let mut request = Request::new();
        request
            .set_method("POST")
            .set_url(Url::parse("http://example.com/up").unwrap())
            .set_data(&b"payload"[..]);

        assert_eq!(request.method(), "POST");
        assert_eq!(request.url().unwrap().path(), "/up");
        assert_eq!(request.data().as_ref(), b"payload");
    }
}
