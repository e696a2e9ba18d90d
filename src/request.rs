//! Incoming HTTP request type.

use std::collections::HashMap;

use crate::method::Method;

/// An incoming HTTP request: method, path, headers, matched path params and
/// the decoded query string. The API is read-only, so the body is never read.
pub struct Request {
    pub(crate) method: Method,
    pub(crate) path: String,
    pub(crate) headers: Vec<(String, String)>,
    pub(crate) params: HashMap<String, String>,
    pub(crate) query: Vec<(String, String)>,
}

impl Request {
    pub(crate) fn new(
        method: Method,
        path: String,
        headers: Vec<(String, String)>,
        params: HashMap<String, String>,
        raw_query: Option<&str>,
    ) -> Self {
        let query = raw_query
            .map(|q| url::form_urlencoded::parse(q.as_bytes()).into_owned().collect())
            .unwrap_or_default();
        Self { method, path, headers, params, query }
    }

    /// Builds a request from hyper's parts plus the params captured by the router.
    pub(crate) fn from_parts(
        method: Method,
        parts: &http::request::Parts,
        params: HashMap<String, String>,
    ) -> Self {
        let headers = parts.headers.iter()
            .filter_map(|(k, v)| Some((k.as_str().to_owned(), v.to_str().ok()?.to_owned())))
            .collect();
        Self::new(method, parts.uri.path().to_owned(), headers, params, parts.uri.query())
    }

    pub fn method(&self) -> Method { self.method }
    pub fn path(&self) -> &str { &self.path }
    pub fn headers(&self) -> &[(String, String)] { &self.headers }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Returns a named path parameter.
    ///
    /// For a route `/api/mapa/delitos/{nivel}`, `req.param("nivel")` on
    /// `/api/mapa/delitos/ccaa` returns `Some("ccaa")`.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// Returns the first value of a query parameter, percent-decoded.
    pub fn query(&self, key: &str) -> Option<&str> {
        self.query.iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Like [`query`](Self::query), but an empty value counts as absent.
    /// Optional filters use this so `?tipologia=` adds no clause.
    pub fn query_filter(&self, key: &str) -> Option<&str> {
        self.query(key).filter(|v| !v.is_empty())
    }
}

#[cfg(test)]
pub(crate) fn test_request(path: &str, params: &[(&str, &str)], query: Option<&str>) -> Request {
    let params = params.iter()
        .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
        .collect();
    Request::new(Method::Get, path.to_owned(), Vec::new(), params, query)
}
