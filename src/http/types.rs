//! Core HTTP value types shared by requests and responses

/// `Cache-Control` value carried by every synthesized error response.
pub(crate) const NO_STORE: &str = "no-cache, no-store";

// METHOD

/// HTTP request methods known to the dispatcher and the metric buckets.
///
/// Dispatch itself operates on the raw request token so that unknown
/// methods stay representable; this enum names the handlers a servlet can
/// declare and the buckets the per-method counters use. Tokens that match
/// none of the named methods map to [`Method::Other`].
///
/// # References
///
/// - [RFC 7231, Section 4](https://datatracker.ietf.org/doc/html/rfc7231#section-4)
/// - [RFC 5789](https://datatracker.ietf.org/doc/html/rfc5789) (PATCH method)
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Method {
    /// GET method - transfer a current representation of the target resource
    Get,
    /// HEAD method - same as GET but without response body
    Head,
    /// OPTIONS method - describe the communication options for the target resource
    Options,
    /// POST method - perform resource-specific processing on the request payload
    Post,
    /// PUT method - replace all current representations of the target resource
    Put,
    /// DELETE method - remove all current representations of the target resource
    Delete,
    /// PATCH method - apply partial modifications to a resource
    Patch,
    /// TRACE method - perform a message loop-back test along the request path
    Trace,
    /// Any token not named above
    Other,
}

impl Method {
    /// Maps an uppercase method token onto a known method.
    #[inline]
    pub fn from_token(token: &str) -> Self {
        match token {
            "GET" => Method::Get,
            "HEAD" => Method::Head,
            "OPTIONS" => Method::Options,
            "POST" => Method::Post,
            "PUT" => Method::Put,
            "DELETE" => Method::Delete,
            "PATCH" => Method::Patch,
            "TRACE" => Method::Trace,
            _ => Method::Other,
        }
    }

    /// Returns the wire token for this method.
    #[inline]
    pub const fn token(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Options => "OPTIONS",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Patch => "PATCH",
            Method::Trace => "TRACE",
            Method::Other => "OTHER",
        }
    }

    // Metric bucket index. TRACE has no bucket of its own and folds into
    // the `OTHER` bucket.
    #[inline(always)]
    pub(crate) const fn bucket(self) -> usize {
        match self {
            Method::Get => 0,
            Method::Head => 1,
            Method::Options => 2,
            Method::Post => 3,
            Method::Put => 4,
            Method::Delete => 5,
            Method::Patch => 6,
            Method::Trace | Method::Other => 7,
        }
    }

    pub(crate) const BUCKETS: usize = 8;
}

// METHOD SET

/// The set of per-method handlers a servlet declares it overrides.
///
/// Declared at construction time instead of discovered reflectively, which
/// keeps the `OPTIONS` handler deterministic. The set feeds the `Allow`
/// header: declared methods, plus `OPTIONS`, plus `HEAD` whenever `GET`
/// is declared.
///
/// # Examples
/// ```
/// use reactive_web::{Method, MethodSet};
///
/// let set = MethodSet::new().with(Method::Get).with(Method::Delete);
/// assert!(set.contains(Method::Get));
/// assert_eq!(set.allow_header(), "DELETE, GET, HEAD, OPTIONS");
/// ```
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub struct MethodSet(u16);

impl MethodSet {
    /// Creates an empty set.
    #[inline(always)]
    pub const fn new() -> Self {
        MethodSet(0)
    }

    /// Returns the set extended with `method`.
    #[inline(always)]
    pub const fn with(self, method: Method) -> Self {
        MethodSet(self.0 | 1 << method.bucket())
    }

    /// Whether `method` was declared.
    #[inline(always)]
    pub const fn contains(self, method: Method) -> bool {
        self.0 & 1 << method.bucket() != 0
    }

    /// Renders the `Allow` header value: the declared methods, `OPTIONS`,
    /// and `HEAD` when `GET` is declared, sorted and `", "`-joined.
    pub fn allow_header(self) -> String {
        let mut tokens = vec![Method::Options.token()];

        for method in [
            Method::Get,
            Method::Head,
            Method::Post,
            Method::Put,
            Method::Delete,
            Method::Patch,
            Method::Trace,
        ] {
            if self.contains(method) {
                tokens.push(method.token());
            }
        }
        if self.contains(Method::Get) {
            tokens.push(Method::Head.token());
        }

        tokens.sort_unstable();
        tokens.dedup();
        tokens.join(", ")
    }
}

// HEADER MAP

/// Header mapping with case-insensitive names and stable insertion order.
///
/// Lookup compares names per [RFC 7230](https://tools.ietf.org/html/rfc7230#section-3.2)
/// (ASCII case-insensitive). The original casing of the first insertion is
/// kept for iteration; repeated values for one name are fused into a single
/// `", "`-joined value by [`append`](HeaderMap::append).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderMap {
    entries: Vec<(String, String)>,
}

impl HeaderMap {
    /// Creates an empty map.
    #[inline(always)]
    pub fn new() -> Self {
        HeaderMap {
            entries: Vec::new(),
        }
    }

    /// Number of distinct header names.
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the map holds no headers.
    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the value stored under `name`, matched case-insensitively.
    #[inline]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Whether a value is stored under `name`.
    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Stores `value` under `name`, replacing any existing value with a
    /// case-insensitively matching name.
    pub fn set<N: Into<String>, V: Into<String>>(&mut self, name: N, value: V) {
        let name = name.into();
        match self
            .entries
            .iter_mut()
            .find(|(n, _)| n.eq_ignore_ascii_case(&name))
        {
            Some(entry) => entry.1 = value.into(),
            None => self.entries.push((name, value.into())),
        }
    }

    /// Adds `value` under `name`, fusing with an already-present value into
    /// one `", "`-joined list value.
    pub fn append<N: Into<String>, V: AsRef<str>>(&mut self, name: N, value: V) {
        let name = name.into();
        match self
            .entries
            .iter_mut()
            .find(|(n, _)| n.eq_ignore_ascii_case(&name))
        {
            Some(entry) => {
                entry.1.push_str(", ");
                entry.1.push_str(value.as_ref());
            }
            None => self.entries.push((name, value.as_ref().to_owned())),
        }
    }

    /// Iterates over `(name, value)` pairs in insertion order.
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }
}

#[cfg(test)]
mod method_tests {
    use super::*;

    #[test]
    fn from_token() {
        #[rustfmt::skip]
        let cases = [
            ("GET",     Method::Get),
            ("HEAD",    Method::Head),
            ("OPTIONS", Method::Options),
            ("POST",    Method::Post),
            ("PUT",     Method::Put),
            ("DELETE",  Method::Delete),
            ("PATCH",   Method::Patch),
            ("TRACE",   Method::Trace),

            ("BREW",    Method::Other),
            ("get",     Method::Other),
            ("",        Method::Other),
        ];

        for (token, expected) in cases {
            assert_eq!(Method::from_token(token), expected);
        }
    }

    #[test]
    fn buckets_are_dense() {
        let methods = [
            Method::Get,
            Method::Head,
            Method::Options,
            Method::Post,
            Method::Put,
            Method::Delete,
            Method::Patch,
            Method::Other,
        ];

        for (index, method) in methods.into_iter().enumerate() {
            assert_eq!(method.bucket(), index);
        }
        assert_eq!(Method::Trace.bucket(), Method::Other.bucket());
    }
}
