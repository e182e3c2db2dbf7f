//! [`Router`](crate::Router) collects routes and error routes, and
//! [`fix`](crate::Router::fix)es them into a [`Dispatcher`](crate::Dispatcher)
//! that serves requests.
//!
//! Registration is fallible: a malformed template, a duplicate route or an
//! invalid condition is reported when it is registered, so a misconfigured
//! router never starts serving.
//!
//! ```rust,no_run
//! use httpdispatch::{HttpError, Params, Reply, Router};
//! use hyper::{Body, Request};
//! use serde_json::json;
//!
//! async fn greet(_: Request<Body>, params: Params, _: Reply) -> Result<serde_json::Value, HttpError> {
//!     Ok(json!({ "hello": params.get_str("name") }))
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let dispatcher = Router::default()
//!         .mount("/api")?
//!         .get("/json/{name}/greeting", greet)?
//!         .fix();
//!
//!     hyper::Server::bind(&([127, 0, 0, 1], 3000).into())
//!         .serve(dispatcher.into_service())
//!         .await?;
//!     Ok(())
//! }
//! ```
//!
//! Once fixed, the route table is immutable. The [`Dispatcher`] is a cheap
//! handle that can be cloned into every connection.
use crate::dispatch::{Core, Settings};
use crate::error::ConfigError;
use crate::error_route::{ErrorRoutes, ErrorRoutesBuilder};
use crate::handler::{ErrorHandler, Handler, ParamsHandler, Restful, SyncHandler};
use crate::method::MethodMask;
use crate::path;
use crate::reply::ResponseDefaults;
use crate::table::{Lookup, RouteTable, RouteTableBuilder};
use crate::validate::Validation;

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_util::future::{self, BoxFuture, FutureExt};
use hyper::service::Service;
use hyper::{Body, Method, Request, Response};

/// A route with its optional validation and response defaults.
///
/// ```rust
/// use httpdispatch::{Handler, HttpError, MethodMask, Reply, ResponseDefaults, Route, Validation};
/// use hyper::{Body, Request, StatusCode};
///
/// let route = Route::new("/users", Handler::sync(|_: &Request<Body>, reply: Reply| {
///     Ok::<_, HttpError>(reply.html("<h1>users</h1>"))
/// }))
/// .methods(MethodMask::GET | MethodMask::HEAD)
/// .validation(Validation::from_triples(&[("page", "integer", "def 1, min 1")])?)
/// .defaults(ResponseDefaults::new().status(StatusCode::OK));
/// # Ok::<(), httpdispatch::ConfigError>(())
/// ```
#[derive(Debug)]
pub struct Route {
    methods: MethodMask,
    path: String,
    handler: Handler,
    validation: Option<Validation>,
    defaults: Option<ResponseDefaults>,
}

impl Route {
    /// A route serving every method the handler's convention accepts.
    pub fn new(path: impl Into<String>, handler: Handler) -> Self {
        Self {
            methods: MethodMask::ALL,
            path: path.into(),
            handler,
            validation: None,
            defaults: None,
        }
    }

    /// Restricts the route to `methods`.
    pub fn methods(mut self, methods: MethodMask) -> Self {
        self.methods = methods;
        self
    }

    pub fn validation(mut self, validation: Validation) -> Self {
        self.validation = Some(validation);
        self
    }

    pub fn defaults(mut self, defaults: ResponseDefaults) -> Self {
        self.defaults = Some(defaults);
        self
    }
}

/// Router collects routes and error routes until it is fixed.
pub struct Router {
    mount: String,
    routes: RouteTableBuilder,
    errors: ErrorRoutesBuilder,
    settings: Settings,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prefixes every route registered afterwards with `base`.
    /// ```rust
    /// use httpdispatch::{HttpError, Params, Reply, Router};
    /// use hyper::{Body, Method, Request};
    ///
    /// let dispatcher = Router::default()
    ///     .mount("/api/v1")?
    ///     .get("/users", |_: Request<Body>, _: Params, _: Reply| async {
    ///         Ok::<_, HttpError>(serde_json::json!([]))
    ///     })?
    ///     .fix();
    ///
    /// assert!(dispatcher.lookup(&Method::GET, "/api/v1/users").is_some());
    /// # Ok::<(), httpdispatch::ConfigError>(())
    /// ```
    pub fn mount(mut self, base: &str) -> Result<Self, ConfigError> {
        if !base.starts_with('/') {
            return Err(ConfigError::InvalidMount(base.to_owned()));
        }
        self.mount = path::join(base, "");
        Ok(self)
    }

    /// Registers a route built with [`Route`].
    pub fn add(mut self, route: Route) -> Result<Self, ConfigError> {
        if !route.path.starts_with('/') {
            return Err(ConfigError::MalformedTemplate {
                template: route.path,
                reason: "expected a path beginning with '/'".to_owned(),
            });
        }
        let template = path::join(&self.mount, &route.path);
        self.routes.register(
            route.methods,
            &template,
            route.handler,
            route.validation,
            route.defaults,
        )?;
        Ok(self)
    }

    /// Registers `handler` for `path` and the methods in `methods`.
    pub fn handle(self, path: &str, methods: MethodMask, handler: Handler) -> Result<Self, ConfigError> {
        self.add(Route::new(path, handler).methods(methods))
    }

    /// Register a synchronous handler for every method.
    pub fn sync(self, path: &str, handler: impl SyncHandler + 'static) -> Result<Self, ConfigError> {
        self.handle(path, MethodMask::ALL, Handler::sync(handler))
    }

    /// Register a [`Restful`] resource for `GET`, `POST`, `PUT`, `PATCH` and `DELETE`.
    pub fn restful(self, path: &str, handler: impl Restful + 'static) -> Result<Self, ConfigError> {
        self.handle(path, MethodMask::ALL, Handler::restful(handler))
    }

    /// Register a handler for `GET` requests
    pub fn get(self, path: &str, handler: impl ParamsHandler + 'static) -> Result<Self, ConfigError> {
        self.handle(path, MethodMask::GET, Handler::get(handler))
    }

    /// Register a handler for `POST` requests
    pub fn post(self, path: &str, handler: impl ParamsHandler + 'static) -> Result<Self, ConfigError> {
        self.handle(path, MethodMask::POST, Handler::post(handler))
    }

    /// Register a handler for `PUT` requests
    pub fn put(self, path: &str, handler: impl ParamsHandler + 'static) -> Result<Self, ConfigError> {
        self.handle(path, MethodMask::PUT, Handler::put(handler))
    }

    /// Register a handler for `PATCH` requests
    pub fn patch(self, path: &str, handler: impl ParamsHandler + 'static) -> Result<Self, ConfigError> {
        self.handle(path, MethodMask::PATCH, Handler::patch(handler))
    }

    /// Register a handler for `DELETE` requests
    pub fn delete(self, path: &str, handler: impl ParamsHandler + 'static) -> Result<Self, ConfigError> {
        self.handle(path, MethodMask::DELETE, Handler::delete(handler))
    }

    /// Register a handler receiving the merged parameters for every method.
    pub fn any_method(self, path: &str, handler: impl ParamsHandler + 'static) -> Result<Self, ConfigError> {
        self.handle(path, MethodMask::ALL, Handler::any_method(handler))
    }

    /// Serve the files below `root` under `path`, which should end in `/*`.
    pub fn resource(self, path: &str, root: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        self.handle(path, MethodMask::GET | MethodMask::HEAD, Handler::resource(root))
    }

    /// The handler used when no route matches. May be registered once.
    pub fn any(
        mut self,
        handler: Handler,
        validation: Option<Validation>,
        defaults: Option<ResponseDefaults>,
    ) -> Result<Self, ConfigError> {
        self.routes.register_any(handler, validation, defaults)?;
        Ok(self)
    }

    /// Registers an error handler for statuses `start..=end` raised under `prefix`.
    ///
    /// An `end` of zero selects the single status `start`. `0, 0` selects
    /// every status. An empty prefix applies to every path.
    pub fn error(
        mut self,
        start: u16,
        end: u16,
        prefix: &str,
        handler: ErrorHandler,
    ) -> Result<Self, ConfigError> {
        self.errors.register(start, end, prefix, handler)?;
        Ok(self)
    }

    /// Registers an error handler for a single status on every path.
    pub fn error_status(self, status: u16, handler: ErrorHandler) -> Result<Self, ConfigError> {
        self.error(status, 0, "", handler)
    }

    /// Registers the error handler used for every status on every path.
    pub fn error_any(self, handler: ErrorHandler) -> Result<Self, ConfigError> {
        self.error(0, 0, "", handler)
    }

    /// If enabled, the router automatically replies to `OPTIONS` requests
    /// with an `Allow` header. Routes that serve `OPTIONS` themselves take
    /// priority over automatic replies. Enabled by default.
    pub fn handle_options(mut self, enabled: bool) -> Self {
        self.settings.handle_options = enabled;
        self
    }

    /// An optional handler that is called on automatic `OPTIONS` requests.
    /// The `Allow` header is set on its reply before it is called.
    pub fn global_options(mut self, handler: impl SyncHandler + 'static) -> Self {
        self.settings.global_options = Some(Arc::new(handler));
        self
    }

    /// If enabled, the built-in error response of a RESTful route carries a
    /// `{"status": .., "message": ..}` body instead of being status-only.
    pub fn json_errors(mut self, enabled: bool) -> Self {
        self.settings.json_errors = enabled;
        self
    }

    /// The largest form or JSON request body read into parameters. Larger
    /// bodies are answered with `413 Payload Too Large`. Defaults to 1 MiB.
    pub fn max_body_size(mut self, bytes: usize) -> Self {
        self.settings.max_body = bytes;
        self
    }

    /// Fixes the routes. The returned dispatcher is immutable and can be
    /// shared across threads.
    pub fn fix(self) -> Dispatcher {
        Dispatcher(Arc::new(Core {
            table: self.routes.fix(),
            errors: self.errors.fix(),
            settings: self.settings,
        }))
    }
}

/// The default configuration: no mount point, automatic `OPTIONS` replies and
/// status-only error responses.
impl Default for Router {
    fn default() -> Self {
        Self {
            mount: String::new(),
            routes: RouteTableBuilder::new(),
            errors: ErrorRoutesBuilder::new(),
            settings: Settings::default(),
        }
    }
}

/// A fixed router, serving requests.
#[derive(Clone)]
pub struct Dispatcher(Arc<Core>);

impl Dispatcher {
    pub fn table(&self) -> &RouteTable {
        &self.0.table
    }

    pub fn error_routes(&self) -> &ErrorRoutes {
        &self.0.errors
    }

    /// Lookup allows the manual lookup of the route for a method and path.
    /// ```rust
    /// use httpdispatch::{HttpError, Params, Reply, Router};
    /// use hyper::{Body, Method, Request};
    ///
    /// let dispatcher = Router::default()
    ///     .get("/home/{page}", |_: Request<Body>, _: Params, _: Reply| async {
    ///         Ok::<_, HttpError>("Welcome!")
    ///     })?
    ///     .fix();
    ///
    /// let lookup = dispatcher.lookup(&Method::GET, "/home/about").unwrap();
    /// assert_eq!(lookup.params.get_str("page"), Some("about"));
    /// # Ok::<(), httpdispatch::ConfigError>(())
    /// ```
    pub fn lookup(&self, method: &Method, path: &str) -> Option<Lookup<'_>> {
        self.0.table.lookup(method, path)
    }

    /// Converts the `Dispatcher` into a `Service` which you can serve directly with `Hyper`.
    /// If you have an existing `Service` that you want to incorporate a `Dispatcher` into, see
    /// [`Dispatcher::serve`](crate::Dispatcher::serve).
    /// ```rust,no_run
    /// # use httpdispatch::Router;
    /// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
    /// // Our dispatcher...
    /// let dispatcher = Router::default().fix();
    ///
    /// // Convert it into a service...
    /// let service = dispatcher.into_service();
    ///
    /// // Serve with hyper
    /// hyper::Server::bind(&([127, 0, 0, 1], 3030).into())
    ///     .serve(service)
    ///     .await?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn into_service(self) -> MakeDispatchService {
        MakeDispatchService(DispatchService(self))
    }

    /// An asynchronous function from a `Request` to a `Response`. The future
    /// always resolves to a response; failures are answered through the
    /// error routes.
    /// ```rust,no_run
    /// # use httpdispatch::Router;
    /// # use hyper::service::{make_service_fn, service_fn};
    /// # use hyper::{Request, Body, Server};
    /// # use std::convert::Infallible;
    ///
    /// # async fn run() {
    /// let dispatcher = Router::default().fix();
    ///
    /// let make_svc = make_service_fn(move |_| {
    ///     let dispatcher = dispatcher.clone();
    ///     async move {
    ///         Ok::<_, Infallible>(service_fn(move |req: Request<Body>| {
    ///             let dispatcher = dispatcher.clone();
    ///             async move { dispatcher.serve(req).await }
    ///         }))
    ///     }
    /// });
    ///
    /// let server = Server::bind(&([127, 0, 0, 1], 3000).into())
    ///     .serve(make_svc)
    ///     .await;
    /// # }
    /// ```
    pub fn serve(&self, req: Request<Body>) -> ResponseFut {
        ResponseFut(self.0.clone().dispatch(req).map(Ok::<_, hyper::Error>).boxed())
    }
}

#[doc(hidden)]
pub struct MakeDispatchService(DispatchService);

impl<T> Service<T> for MakeDispatchService {
    type Response = DispatchService;
    type Error = hyper::Error;
    type Future = future::Ready<Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, _: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, _: T) -> Self::Future {
        let service = self.0.clone();
        future::ok(service)
    }
}

#[doc(hidden)]
#[derive(Clone)]
pub struct DispatchService(Dispatcher);

impl Service<Request<Body>> for DispatchService {
    type Response = Response<Body>;
    type Error = hyper::Error;
    type Future = ResponseFut;

    fn poll_ready(&mut self, _: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        self.0.serve(req)
    }
}

/// The response future returned by [`Dispatcher::serve`].
pub struct ResponseFut(BoxFuture<'static, hyper::Result<Response<Body>>>);

impl Future for ResponseFut {
    type Output = hyper::Result<Response<Body>>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.0.as_mut().poll(cx)
    }
}
