//! Radix-tree request router.
//!
//! One tree per HTTP method. O(path-length) lookup. You register a path, you
//! get a handler.

use std::collections::HashMap;
use std::sync::Arc;

use matchit::Router as MatchitRouter;

use crate::handler::{BoxedHandler, Handler};
use crate::method::Method;

/// Outcome of a routing lookup.
pub(crate) enum Route {
    Found(BoxedHandler, HashMap<String, String>),
    /// The path exists, but not for this method.
    MethodNotAllowed,
    NotFound,
}

/// The application router.
///
/// Build it once at startup; pass it to [`Server::serve`](crate::Server::serve).
/// Each [`Router::on`] call returns `self` so registrations chain naturally.
pub struct Router {
    routes: HashMap<Method, MatchitRouter<BoxedHandler>>,
}

impl Router {
    pub fn new() -> Self {
        Self { routes: HashMap::new() }
    }

    /// Register a handler for a method + path pair. Returns `self` for chaining.
    ///
    /// Path parameters use `{name}` syntax, catch-alls `{*name}`:
    ///
    /// ```rust,no_run
    /// # use criminalidad::{Method, Request, Response, Router};
    /// # async fn periodos(_: Request) -> Response { Response::text("") }
    /// # async fn agregado(_: Request) -> Response { Response::text("") }
    /// Router::new()
    ///     .on(Method::Get, "/api/mapa/periodos",                periodos)
    ///     .on(Method::Get, "/api/mapa/delitos/agregado/{nivel}", agregado);
    /// ```
    ///
    /// # Panics
    ///
    /// Panics on an invalid or conflicting route pattern; routes are fixed at
    /// startup, so this surfaces immediately.
    pub fn on(mut self, method: Method, path: &str, handler: impl Handler) -> Self {
        self.routes
            .entry(method)
            .or_default()
            .insert(path, handler.into_boxed_handler())
            .unwrap_or_else(|e| panic!("invalid route `{path}`: {e}"));
        self
    }

    pub(crate) fn lookup(&self, method: Method, path: &str) -> Route {
        if let Some(matched) = self.routes.get(&method).and_then(|tree| tree.at(path).ok()) {
            let handler = Arc::clone(matched.value);
            let params = matched.params.iter()
                .map(|(k, v)| (k.to_owned(), v.to_owned()))
                .collect();
            return Route::Found(handler, params);
        }
        if self.matches_any_method(path) {
            Route::MethodNotAllowed
        } else {
            Route::NotFound
        }
    }

    pub(crate) fn matches_any_method(&self, path: &str) -> bool {
        self.routes.values().any(|tree| tree.at(path).is_ok())
    }
}

impl Default for Router {
    fn default() -> Self { Self::new() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Request, Response};

    async fn ok(_: Request) -> Response { Response::text("ok") }

    fn router() -> Router {
        Router::new()
            .on(Method::Get, "/api/mapa/delitos/{nivel}", ok)
            .on(Method::Get, "/api/mapa/delitos/agregado/{nivel}", ok)
            .on(Method::Get, "/static/{*path}", ok)
    }

    #[test]
    fn static_segment_beats_param() {
        match router().lookup(Method::Get, "/api/mapa/delitos/agregado/ccaa") {
            Route::Found(_, params) => assert_eq!(params["nivel"], "ccaa"),
            _ => panic!("expected match"),
        }
        match router().lookup(Method::Get, "/api/mapa/delitos/provincia") {
            Route::Found(_, params) => assert_eq!(params["nivel"], "provincia"),
            _ => panic!("expected match"),
        }
    }

    #[test]
    fn catch_all_captures_rest() {
        match router().lookup(Method::Get, "/static/js/app.js") {
            Route::Found(_, params) => assert_eq!(params["path"], "js/app.js"),
            _ => panic!("expected match"),
        }
    }

    #[test]
    fn wrong_method_and_unknown_path() {
        assert!(matches!(
            router().lookup(Method::Post, "/api/mapa/delitos/ccaa"),
            Route::MethodNotAllowed
        ));
        assert!(matches!(router().lookup(Method::Get, "/nope"), Route::NotFound));
    }

    #[test]
    #[should_panic(expected = "invalid route")]
    fn conflicting_route_panics() {
        let _ = Router::new()
            .on(Method::Get, "/a/{x}", ok)
            .on(Method::Get, "/a/{y}", ok);
    }
}
