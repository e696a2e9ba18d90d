//! Handler trait and type erasure.
//!
//! The router holds handlers of different concrete types in one
//! `HashMap<Method, Tree>`, so each one is erased behind `dyn ErasedHandler`:
//!
//! ```text
//! async fn periodos(req: Request) -> Result<Json<_>, ApiError>   ← route code
//!        ↓ router.on(Method::Get, "/api/mapa/periodos", periodos)
//! periodos.into_boxed_handler()                                ← blanket impl
//!        ↓
//! Arc::new(FnHandler(periodos))      stored as BoxedHandler
//!        ↓
//! handler.call(req)  at request time                           ← one vtable call
//!        ↓
//! Box::pin(async { periodos(req).await.into_response() })
//! ```
//!
//! Handlers that need application state are closures capturing an `Arc`;
//! see [`with_state`].

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::request::Request;
use crate::response::{IntoResponse, Response};

/// A heap-allocated, type-erased future that resolves to a [`Response`].
pub(crate) type BoxFuture = Pin<Box<dyn Future<Output = Response> + Send + 'static>>;

/// Internal dispatch interface.
///
/// `#[doc(hidden)] pub` rather than `pub(crate)` because it appears in the
/// return type of the public `Handler` trait's `into_boxed_handler` method.
#[doc(hidden)]
pub trait ErasedHandler {
    fn call(&self, req: Request) -> BoxFuture;
}

#[doc(hidden)]
pub type BoxedHandler = Arc<dyn ErasedHandler + Send + Sync + 'static>;

/// Implemented for every valid route handler.
///
/// Automatically satisfied for any `async fn` or closure with the signature
/// `Fn(Request) -> impl Future<Output = impl IntoResponse>`. Sealed: only the
/// blanket impl below can satisfy it.
pub trait Handler: private::Sealed + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_boxed_handler(self) -> BoxedHandler;
}

mod private {
    pub trait Sealed {}
}

impl<F, Fut, R> private::Sealed for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
}

impl<F, Fut, R> Handler for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    fn into_boxed_handler(self) -> BoxedHandler {
        Arc::new(FnHandler(self))
    }
}

/// Bridges a concrete handler `F` to the trait-object world.
struct FnHandler<F>(F);

impl<F, Fut, R> ErasedHandler for FnHandler<F>
where
    F: Fn(Request) -> Fut + Send + Sync,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    fn call(&self, req: Request) -> BoxFuture {
        let fut = (self.0)(req);
        Box::pin(async move { fut.await.into_response() })
    }
}

/// Binds shared state to a two-argument handler, yielding a route handler.
///
/// ```rust,no_run
/// # use std::sync::Arc;
/// # use criminalidad::{with_state, Method, Request, Response, Router};
/// struct Counter(u64);
/// async fn show(c: Arc<Counter>, _req: Request) -> Response {
///     Response::text(c.0.to_string())
/// }
/// let app = Router::new().on(Method::Get, "/n", with_state(Arc::new(Counter(7)), show));
/// ```
pub fn with_state<S, F, Fut, R>(state: Arc<S>, f: F) -> impl Handler
where
    S: Send + Sync + 'static,
    F: Fn(Arc<S>, Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    move |req: Request| f(Arc::clone(&state), req)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::test_request;
    use crate::status::Status;

    #[tokio::test]
    async fn erased_handler_renders_response() {
        async fn missing(_: Request) -> Status { Status::NotFound }
        let h = missing.into_boxed_handler();
        let resp = h.call(test_request("/", &[], None)).await;
        assert_eq!(resp.status_code(), 404);
    }

    #[tokio::test]
    async fn state_is_shared_into_each_call() {
        async fn echo(s: Arc<String>, _: Request) -> String { s.as_str().to_owned() }
        let h = with_state(Arc::new("hola".to_owned()), echo).into_boxed_handler();
        let resp = h.call(test_request("/", &[], None)).await;
        assert_eq!(resp.body(), b"hola");
    }
}
