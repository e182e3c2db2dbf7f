//! # HttpDispatch
//!
//! HttpDispatch is an HTTP request router and handler dispatcher for [hyper](https://hyper.rs).
//!
//! Given a request's method and path, it finds the registered route, validates and converts the
//! request parameters, invokes the handler through its calling convention and, when anything
//! fails, answers through the most specific error route for the status and path.
//!
//! ## Features
//!
//! **Registration errors, not request errors:** Malformed templates, duplicate routes and invalid
//! validation conditions are reported while the router is built. A router that was fixed
//! successfully serves every request with exactly one response.
//!
//! **Immutable once fixed:** [`Router::fix`] consumes the builder and returns a [`Dispatcher`]
//! whose route table never changes. It is shared between connections without locks.
//!
//! **Calling conventions:** Handlers can write their response themselves, return JSON or text,
//! implement one method per HTTP verb, or serve static files. See [`Handler`].
//!
//! **Declarative validation:** Parameters from the path, the query string and the body are checked
//! and converted before the handler runs. See [`Validation`].
//!
//! **Error routes:** Error handlers are selected by status (exact or range) and path prefix.
//!
//! ## Usage
//!
//! Here is a simple example:
//!
//! ```rust,no_run
//! use httpdispatch::{HttpError, Params, Reply, Router};
//! use hyper::{Body, Request};
//! use serde_json::{json, Value};
//!
//! fn index(_: &Request<Body>, reply: Reply) -> Result<httpdispatch::Output, HttpError> {
//!     Ok(reply.html("<h1>Hello, World!</h1>"))
//! }
//!
//! async fn hello(_: Request<Body>, params: Params, _: Reply) -> Result<Value, HttpError> {
//!     Ok(json!({ "hello": params.get_str("user") }))
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let dispatcher = Router::default()
//!         .sync("/", index)?
//!         .get("/hello/{user}", hello)?
//!         .fix();
//!
//!     hyper::Server::bind(&([127, 0, 0, 1], 3000).into())
//!         .serve(dispatcher.into_service())
//!         .await?;
//!     Ok(())
//! }
//! ```
//!
//! ### Named parameters
//!
//! As you can see, `{user}` is a *named parameter*. The values are passed to RESTful handlers
//! and are also accessible via `req.extensions().get::<Params>()`.
//!
//! Named parameters match exactly one non-empty path segment:
//!
//! ```ignore
//! Pattern: /user/{user}
//!
//!  /user/gordon              match
//!  /user/gordon/             match
//!  /user/gordon/profile      no match
//!  /user/                    no match
//! ```
//!
//! Templates with the same structure may be registered for different methods. When several
//! templates match, a literal segment beats a parameter at the first position where they
//! differ, so `/user/new` is reached even if `/user/{user}` was registered first. Among equally
//! specific templates the one serving the request method wins, then the one registered first.
//!
//! ### Catch-all templates
//!
//! A final `*` segment matches one or more remaining segments, which are available as the `*`
//! parameter. Templates with an exact segment count are always preferred:
//!
//! ```ignore
//! Pattern: /src/*
//!
//!  /src/somefile.rs          match: *="somefile.rs"
//!  /src/subdir/somefile.rs   match: *="subdir/somefile.rs"
//!  /src/                     no match
//! ```
//!
//! ## Validation
//!
//! ```rust
//! use httpdispatch::{HttpError, Params, Reply, Route, Router, Handler, Validation};
//! use hyper::{Body, Request};
//!
//! # fn main() -> Result<(), httpdispatch::ConfigError> {
//! let search = Handler::get(|_: Request<Body>, params: Params, _: Reply| async move {
//!     // `page` is an integer here, defaulted to 1.
//!     Ok::<_, HttpError>(params.to_json())
//! });
//!
//! let dispatcher = Router::default()
//!     .add(Route::new("/search", search).validation(Validation::from_triples(&[
//!         ("q", "string", "not null, max 64"),
//!         ("page", "integer", "default 1, min 1"),
//!     ])?))?
//!     .fix();
//! # Ok(())
//! # }
//! ```
//!
//! ## Error routes
//!
//! ```rust
//! use httpdispatch::{ErrorHandler, ErrorInfo, HttpError, Reply, Router};
//! use serde_json::json;
//!
//! # fn main() -> Result<(), httpdispatch::ConfigError> {
//! let dispatcher = Router::default()
//!     // every 404 below /api
//!     .error(404, 0, "/api", ErrorHandler::sync(|info: &ErrorInfo, _: Reply| {
//!         Ok::<_, HttpError>(json!({ "error": info.message }))
//!     }))?
//!     // any other failure
//!     .error_any(ErrorHandler::new(|info: ErrorInfo, reply: Reply| async move {
//!         Ok::<_, HttpError>(reply.html(format!("<h1>{}</h1>", info.status)))
//!     }))?
//!     .fix();
//! # Ok(())
//! # }
//! ```
//!
//! ## Automatic OPTIONS responses and CORS
//!
//! `OPTIONS` requests are answered with an `Allow` header listing the methods the path serves.
//! The reply can be customized with [`Router::global_options`], e.g. to support CORS preflight
//! requests:
//!
//! ```rust
//! use httpdispatch::{HttpError, Reply, Router};
//! use hyper::header::{HeaderName, HeaderValue};
//! use hyper::{Body, Request};
//!
//! let router = Router::default().global_options(|_: &Request<Body>, mut reply: Reply| {
//!     reply.set_header(
//!         HeaderName::from_static("access-control-allow-origin"),
//!         HeaderValue::from_static("*"),
//!     );
//!     Ok::<_, HttpError>(reply.empty())
//! });
//! ```
//!
//! ### Static files
//!
//! You can use the router to serve pages from a static file directory:
//!
//! ```rust
//! use httpdispatch::Router;
//!
//! # fn main() -> Result<(), httpdispatch::ConfigError> {
//! let dispatcher = Router::default()
//!     .resource("/static/*", "./public")?
//!     .fix();
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]

pub(crate) mod dispatch;

#[doc(hidden)]
pub mod path;

pub mod error;
pub mod error_route;
pub mod handler;
pub mod method;
pub mod params;
pub mod reply;
pub mod resource;
pub mod table;
pub mod template;
pub mod validate;

#[doc(hidden)]
pub mod router;

#[doc(inline)]
pub use router::{Dispatcher, Route, Router};

pub use error::{ConfigError, ErrorKind, HttpError, ValidationError};
pub use handler::{
    Convention, ErrorHandler, ErrorInfo, Handler, HandlerResult, Output, ParamsHandler, Restful,
    SyncHandler,
};
pub use method::MethodMask;
pub use params::Params;
pub use reply::{Reply, ResponseDefaults};
pub use validate::{Validation, ValidationRule, ValueType};

// test the code examples in README.md
#[cfg(doctest)]
mod test_readme {
    macro_rules! doc_comment {
        ($x:expr) => {
            #[doc = $x]
            extern "C" {}
        };
    }

    doc_comment!(include_str!("../README.md"));
}
