//! Handler trait and type erasure.
//!
//! The router holds handlers of different concrete types in one map, so each
//! handler is stored behind a trait object:
//!
//! ```text
//! async fn echo(req: Request) -> Response { … }    ← user writes this
//!        ↓ router.post("/echo", echo)
//! echo.into_boxed_handler()                       ← Handler blanket impl
//!        ↓
//! Arc::new(FnHandler(echo))                       ← stored as BoxedHandler
//!        ↓
//! handler.call(req)  at request time              ← one vtable dispatch
//!        ↓
//! Box::pin(async { echo(req).await.into_response() })
//! ```
//!
//! Handlers own their [`Request`] and return a [`Response`] value. They never
//! touch the response writer: the router writes the returned value through
//! whatever writer the middleware stack installed, which is how a capture
//! stage sees handler output without the handler knowing it exists.
//!
//! Per request this costs one `Arc` clone and one virtual call.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::request::Request;
use crate::response::{IntoResponse, Response};

/// A heap-allocated, type-erased future.
///
/// Two kinds of future share this alias. Handler futures are
/// `BoxFuture<'static, Response>`: they own their request and may be moved
/// to any worker thread. Middleware futures are `BoxFuture<'a, ()>` and
/// borrow the request's [`Context`](crate::Context) for `'a`, so a stage can
/// keep using the context after `next.run(ctx).await` returns.
///
/// The `Pin<Box<…>>` lets the runtime poll the future in place after it has
/// been type-erased.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

// ── Erased handlers ───────────────────────────────────────────────────────────

/// Internal dispatch interface.
///
/// `#[doc(hidden)] pub` because it appears in the signature of the public
/// `Handler` trait. Nothing outside the crate can do anything useful with it.
#[doc(hidden)]
pub trait ErasedHandler {
    fn call(&self, req: Request) -> BoxFuture<'static, Response>;
}

/// A type-erased handler shared across concurrent requests.
///
/// The router clones the `Arc` out of its tree for each matched request, so
/// the tree itself is never borrowed across an `.await`.
#[doc(hidden)]
pub type BoxedHandler = Arc<dyn ErasedHandler + Send + Sync + 'static>;

// ── Public Handler trait ──────────────────────────────────────────────────────

/// Implemented for every valid route handler.
///
/// There is nothing to implement by hand. Any function or closure of this
/// shape qualifies:
///
/// ```text
/// async fn name(req: Request) -> impl IntoResponse
/// ```
///
/// Closures are accepted too, as long as they are `Fn` and the future they
/// return is `Send + 'static`; capture shared state through an `Arc` and
/// clone it inside the closure.
///
/// The trait is sealed through a private supertrait, so the blanket impl
/// below is the only one.
pub trait Handler: private::Sealed + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_boxed_handler(self) -> BoxedHandler;
}

/// External crates cannot name `Sealed`, so they cannot implement `Handler`.
mod private {
    pub trait Sealed {}
}

// ── Blanket implementations ───────────────────────────────────────────────────

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

// ── Concrete wrapper ──────────────────────────────────────────────────────────

/// Holds a concrete handler `F` and implements [`ErasedHandler`] for it.
struct FnHandler<F>(F);

impl<F, Fut, R> ErasedHandler for FnHandler<F>
where
    F: Fn(Request) -> Fut + Send + Sync,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    fn call(&self, req: Request) -> BoxFuture<'static, Response> {
        // Calling `F` only builds its future; nothing runs until the router
        // awaits the boxed result.
        let fut = (self.0)(req);
        Box::pin(async move { fut.await.into_response() })
    }
}
