//! The route table and its one-way transition from building to serving.
//!
//! A [`RouteTableBuilder`] collects entries single-threaded. [`fix`] consumes
//! it and produces an immutable [`RouteTable`] that can be shared across
//! threads without locks. Registering on a fixed table is impossible because
//! the builder no longer exists.
//!
//! [`fix`]: RouteTableBuilder::fix

use crate::error::ConfigError;
use crate::handler::Handler;
use crate::method::MethodMask;
use crate::params::Params;
use crate::path;
use crate::reply::ResponseDefaults;
use crate::template::{Shape, Template};
use crate::validate::Validation;

use hyper::Method;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;

/// One registered route.
#[derive(Debug)]
pub struct RouteEntry {
    mask: MethodMask,
    template: Template,
    handler: Handler,
    validation: Option<Validation>,
    defaults: Option<ResponseDefaults>,
}

impl RouteEntry {
    /// The methods the route was registered for.
    pub fn mask(&self) -> MethodMask {
        self.mask
    }

    /// The methods the route actually serves: the registered mask narrowed to
    /// what the handler's calling convention accepts.
    pub fn allowed(&self) -> MethodMask {
        self.mask & self.handler.convention().allowed()
    }

    pub fn template(&self) -> &Template {
        &self.template
    }

    pub fn handler(&self) -> &Handler {
        &self.handler
    }

    pub fn validation(&self) -> Option<&Validation> {
        self.validation.as_ref()
    }

    pub fn defaults(&self) -> Option<&ResponseDefaults> {
        self.defaults.as_ref()
    }
}

/// The result of a successful lookup.
#[derive(Debug)]
pub struct Lookup<'a> {
    pub entry: &'a RouteEntry,
    /// Path parameters, percent-decoded.
    pub params: Params,
    /// Whether no template matched and the any handler was chosen.
    pub fallback: bool,
}

impl Lookup<'_> {
    /// Whether the entry serves `method`. A `false` here is answered with 405.
    pub fn accepts(&self, method: &Method) -> bool {
        self.entry.allowed().contains(method)
    }
}

/// Collects routes before the table is fixed.
#[derive(Debug, Default)]
pub struct RouteTableBuilder {
    entries: Vec<RouteEntry>,
    any: Option<RouteEntry>,
}

impl RouteTableBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for `template` and the methods in `mask`.
    ///
    /// Fails when the template is malformed, or when a template of the same
    /// shape already serves one of the methods.
    pub fn register(
        &mut self,
        mask: MethodMask,
        template: &str,
        handler: Handler,
        validation: Option<Validation>,
        defaults: Option<ResponseDefaults>,
    ) -> Result<(), ConfigError> {
        let template = Template::parse(template)?;
        let entry = RouteEntry {
            mask,
            template,
            handler,
            validation,
            defaults,
        };

        let shape = entry.template.shape();
        let allowed = entry.allowed();
        if let Some(existing) = self
            .entries
            .iter()
            .find(|e| e.allowed().intersects(allowed) && e.template.shape() == shape)
        {
            return Err(ConfigError::DuplicateRoute {
                template: entry.template.as_str().to_owned(),
                methods: existing.allowed() & allowed,
            });
        }

        tracing::debug!(
            methods = %entry.allowed(),
            template = %entry.template,
            convention = ?entry.handler.convention(),
            "registered route"
        );
        self.entries.push(entry);
        Ok(())
    }

    /// Registers the handler used when no template matches. May be called once.
    pub fn register_any(
        &mut self,
        handler: Handler,
        validation: Option<Validation>,
        defaults: Option<ResponseDefaults>,
    ) -> Result<(), ConfigError> {
        if self.any.is_some() {
            return Err(ConfigError::DuplicateAny);
        }

        tracing::debug!(convention = ?handler.convention(), "registered any handler");
        self.any = Some(RouteEntry {
            mask: MethodMask::ALL,
            template: Template::fallback(),
            handler,
            validation,
            defaults,
        });
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Freezes the table for serving.
    pub fn fix(self) -> RouteTable {
        let mut by_len: HashMap<usize, Vec<usize>> = HashMap::new();
        let mut catch_all = Vec::new();

        for (i, entry) in self.entries.iter().enumerate() {
            if entry.template.is_catch_all() {
                catch_all.push(i);
            } else {
                by_len.entry(entry.template.len()).or_default().push(i);
            }
        }

        // Stable sorts, so registration order breaks ties.
        let entries = &self.entries;
        let precedence = |a: &usize, b: &usize| {
            entries[*a].template.precedence(&entries[*b].template)
        };
        for bucket in by_len.values_mut() {
            bucket.sort_by(precedence);
        }
        catch_all.sort_by(precedence);

        tracing::info!(
            routes = self.entries.len(),
            any = self.any.is_some(),
            "route table fixed"
        );

        RouteTable {
            entries: self.entries,
            by_len,
            catch_all,
            any: self.any,
        }
    }
}

/// The immutable, fixed route table.
#[derive(Debug)]
pub struct RouteTable {
    entries: Vec<RouteEntry>,
    /// Exact-count templates grouped by segment count, in precedence order.
    by_len: HashMap<usize, Vec<usize>>,
    catch_all: Vec<usize>,
    any: Option<RouteEntry>,
}

impl RouteTable {
    /// Finds the entry for `method` and `path`.
    ///
    /// Templates with an exact segment count are tried first. Among those
    /// matching the path, a literal segment beats a parameter at the first
    /// position where they differ; templates that tie go to the one serving
    /// `method`, then to the one registered first. When no exact template
    /// serves `method`, a catch-all that does is preferred, longest prefix
    /// first. Otherwise the best structural match is returned so the caller
    /// can answer 405. When nothing matches, the any handler is returned if
    /// one exists.
    pub fn lookup(&self, method: &Method, path: &str) -> Option<Lookup<'_>> {
        let segments = path::segments(path);

        let exact = self
            .by_len
            .get(&segments.len())
            .map(Vec::as_slice)
            .unwrap_or_default();

        let exact = self.select(exact, &segments, method);
        if exact.as_ref().map_or(false, |found| found.accepts(method)) {
            return exact;
        }

        match (exact, self.select(&self.catch_all, &segments, method)) {
            (_, Some(tail)) if tail.accepts(method) => Some(tail),
            (Some(exact), _) => Some(exact),
            (None, Some(tail)) => Some(tail),
            (None, None) => self.any.as_ref().map(|entry| Lookup {
                entry,
                params: Params::new(),
                fallback: true,
            }),
        }
    }

    /// Picks from `candidates`, which are sorted by precedence. Only the
    /// templates tied with the first structural match are considered.
    fn select(&self, candidates: &[usize], segments: &[&str], method: &Method) -> Option<Lookup<'_>> {
        let mut first: Option<Lookup<'_>> = None;
        for &i in candidates {
            let entry = &self.entries[i];
            if let Some(best) = &first {
                if entry.template.precedence(&best.entry.template) != Ordering::Equal {
                    break;
                }
            }
            if let Some(params) = entry.template.matches(segments) {
                let found = Lookup {
                    entry,
                    params,
                    fallback: false,
                };
                if found.accepts(method) {
                    return Some(found);
                }
                if first.is_none() {
                    first = Some(found);
                }
            }
        }
        first
    }

    /// The union of methods served by templates matching `path`, exact and
    /// catch-all alike. The any handler is not considered.
    pub fn allowed(&self, path: &str) -> MethodMask {
        let segments = path::segments(path);
        self.by_len
            .get(&segments.len())
            .into_iter()
            .flatten()
            .chain(&self.catch_all)
            .map(|&i| &self.entries[i])
            .filter(|entry| entry.template.matches(&segments).is_some())
            .fold(MethodMask::NONE, |mask, entry| mask | entry.allowed())
    }

    /// Registered routes in registration order, without the any handler.
    pub fn routes(&self) -> impl Iterator<Item = &RouteEntry> {
        self.entries.iter()
    }

    pub fn any(&self) -> Option<&RouteEntry> {
        self.any.as_ref()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Display for RouteTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for entry in self.routes().chain(self.any.as_ref()) {
            writeln!(
                f,
                "{:<24} {} ({:?})",
                entry.allowed().to_string(),
                entry.template,
                entry.handler.convention()
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HttpError;
    use crate::reply::Reply;
    use hyper::{Body, Request};

    fn sync() -> Handler {
        Handler::sync(|_: &Request<Body>, reply: Reply| Ok::<_, HttpError>(reply))
    }

    fn named(name: &'static str) -> Handler {
        Handler::sync(move |_: &Request<Body>, reply: Reply| Ok::<_, HttpError>(reply.text(name)))
    }

    fn table(routes: &[(MethodMask, &str)]) -> RouteTable {
        let mut builder = RouteTableBuilder::new();
        for (mask, template) in routes {
            builder.register(*mask, template, sync(), None, None).unwrap();
        }
        builder.fix()
    }

    #[test]
    fn finds_registered_routes() {
        let table = table(&[
            (MethodMask::GET, "/"),
            (MethodMask::GET, "/users"),
            (MethodMask::GET, "/users/{id}"),
            (MethodMask::POST, "/users/{id}/posts"),
        ]);

        let tests = vec![
            ("/", "/"),
            ("/users", "/users"),
            ("/users/", "/users"),
            ("/users/42", "/users/{id}"),
            ("/users/42/posts", "/users/{id}/posts"),
        ];

        for (path, template) in tests {
            let lookup = table.lookup(&Method::GET, path).unwrap();
            assert_eq!(lookup.entry.template().as_str(), template, "path: {}", path);
            assert!(!lookup.fallback);
        }

        assert!(table.lookup(&Method::GET, "/nope").is_none());
    }

    #[test]
    fn extracts_path_parameters() {
        let table = table(&[(MethodMask::GET, "/json/{name}/greeting")]);
        let lookup = table.lookup(&Method::GET, "/json/alice/greeting").unwrap();
        assert_eq!(lookup.params.get_str("name"), Some("alice"));
        assert_eq!(lookup.params.len(), 1);
    }

    #[test]
    fn method_mask_breaks_ties_before_registration_order() {
        let mut builder = RouteTableBuilder::new();
        builder
            .register(MethodMask::GET, "/items/{id}", named("get"), None, None)
            .unwrap();
        builder
            .register(MethodMask::POST, "/items/{key}", named("post"), None, None)
            .unwrap();
        let table = builder.fix();

        let lookup = table.lookup(&Method::POST, "/items/1").unwrap();
        assert_eq!(lookup.entry.template().as_str(), "/items/{key}");
        assert!(lookup.accepts(&Method::POST));
    }

    #[test]
    fn wrong_method_returns_structural_match() {
        let table = table(&[(MethodMask::GET, "/only-get")]);
        let lookup = table.lookup(&Method::POST, "/only-get").unwrap();
        assert!(!lookup.accepts(&Method::POST));
        assert_eq!(table.allowed("/only-get"), MethodMask::GET);
    }

    #[test]
    fn falls_back_to_any_handler() {
        let mut builder = RouteTableBuilder::new();
        builder.register(MethodMask::GET, "/known", sync(), None, None).unwrap();
        builder.register_any(sync(), None, None).unwrap();
        let table = builder.fix();

        assert!(!table.lookup(&Method::GET, "/known").unwrap().fallback);
        let lookup = table.lookup(&Method::GET, "/unknown/path").unwrap();
        assert!(lookup.fallback);
        assert!(lookup.params.is_empty());
    }

    #[test]
    fn any_handler_registers_once() {
        let mut builder = RouteTableBuilder::new();
        builder.register_any(sync(), None, None).unwrap();
        assert_eq!(
            builder.register_any(sync(), None, None),
            Err(ConfigError::DuplicateAny)
        );
    }

    #[test]
    fn rejects_duplicates_at_registration() {
        let mut builder = RouteTableBuilder::new();
        builder.register(MethodMask::GET, "/a/{id}", sync(), None, None).unwrap();

        let err = builder
            .register(MethodMask::GET | MethodMask::PUT, "/a/{name}/", sync(), None, None)
            .unwrap_err();
        assert_eq!(
            err,
            ConfigError::DuplicateRoute {
                template: "/a/{name}/".into(),
                methods: MethodMask::GET,
            }
        );

        // Same shape, disjoint methods.
        builder.register(MethodMask::PUT, "/a/{name}", sync(), None, None).unwrap();
        // Different shape.
        builder.register(MethodMask::GET, "/a/new", sync(), None, None).unwrap();
        assert_eq!(builder.len(), 3);
    }

    #[test]
    fn duplicates_consider_convention_verbs() {
        let get = Handler::get(|_: Request<Body>, _: Params, _: Reply| async {
            Ok::<_, HttpError>(())
        });
        let post = Handler::post(|_: Request<Body>, _: Params, _: Reply| async {
            Ok::<_, HttpError>(())
        });

        let mut builder = RouteTableBuilder::new();
        builder.register(MethodMask::ALL, "/r", get, None, None).unwrap();
        builder.register(MethodMask::ALL, "/r", post, None, None).unwrap();
        let table = builder.fix();
        assert_eq!(table.allowed("/r"), MethodMask::GET | MethodMask::POST);
    }

    #[test]
    fn rejects_malformed_templates() {
        let mut builder = RouteTableBuilder::new();
        assert!(matches!(
            builder.register(MethodMask::GET, "/a/{", sync(), None, None),
            Err(ConfigError::MalformedTemplate { .. })
        ));
        assert!(builder.is_empty());
    }

    #[test]
    fn exact_templates_beat_catch_all() {
        let table = table(&[
            (MethodMask::GET, "/static/*"),
            (MethodMask::GET, "/static/css/*"),
            (MethodMask::GET, "/static/{file}"),
        ]);

        let lookup = table.lookup(&Method::GET, "/static/app.js").unwrap();
        assert_eq!(lookup.entry.template().as_str(), "/static/{file}");

        let lookup = table.lookup(&Method::GET, "/static/css/site.css").unwrap();
        assert_eq!(lookup.entry.template().as_str(), "/static/css/*");
        assert_eq!(lookup.params.get_str("*"), Some("site.css"));

        let lookup = table.lookup(&Method::GET, "/static/js/lib/a.js").unwrap();
        assert_eq!(lookup.entry.template().as_str(), "/static/*");
        assert_eq!(lookup.params.get_str("*"), Some("js/lib/a.js"));
    }

    #[test]
    fn literal_segments_beat_earlier_parameters() {
        let mut builder = RouteTableBuilder::new();
        builder
            .register(MethodMask::GET, "/users/{id}", named("param"), None, None)
            .unwrap();
        builder
            .register(MethodMask::GET, "/users/new", named("literal"), None, None)
            .unwrap();
        builder
            .register(MethodMask::GET, "/{kind}/new/{id}", sync(), None, None)
            .unwrap();
        builder
            .register(MethodMask::GET, "/users/{id}/{x}", sync(), None, None)
            .unwrap();
        let table = builder.fix();

        let lookup = table.lookup(&Method::GET, "/users/new").unwrap();
        assert_eq!(lookup.entry.template().as_str(), "/users/new");
        assert!(lookup.params.is_empty());

        let lookup = table.lookup(&Method::GET, "/users/7").unwrap();
        assert_eq!(lookup.entry.template().as_str(), "/users/{id}");

        let lookup = table.lookup(&Method::GET, "/users/new/7").unwrap();
        assert_eq!(lookup.entry.template().as_str(), "/users/{id}/{x}");
    }

    #[test]
    fn literal_match_wins_over_method_of_a_parameter() {
        let table = table(&[(MethodMask::GET, "/users/{id}"), (MethodMask::POST, "/users/new")]);

        let lookup = table.lookup(&Method::GET, "/users/new").unwrap();
        assert_eq!(lookup.entry.template().as_str(), "/users/new");
        assert!(!lookup.accepts(&Method::GET));
        assert_eq!(table.allowed("/users/new"), MethodMask::GET | MethodMask::POST);
    }

    #[test]
    fn verb_mismatch_falls_through_to_catch_all() {
        let table = table(&[(MethodMask::GET, "/files/{name}"), (MethodMask::ALL, "/files/*")]);

        let lookup = table.lookup(&Method::POST, "/files/a").unwrap();
        assert_eq!(lookup.entry.template().as_str(), "/files/*");
        assert_eq!(lookup.params.get_str("*"), Some("a"));

        let lookup = table.lookup(&Method::GET, "/files/a").unwrap();
        assert_eq!(lookup.entry.template().as_str(), "/files/{name}");

        let table = self::table(&[(MethodMask::GET, "/files/{name}"), (MethodMask::PUT, "/files/*")]);
        let lookup = table.lookup(&Method::POST, "/files/a").unwrap();
        assert_eq!(lookup.entry.template().as_str(), "/files/{name}");
        assert!(!lookup.accepts(&Method::POST));
        assert_eq!(table.allowed("/files/a"), MethodMask::GET | MethodMask::PUT);
    }

    #[test]
    fn repeated_lookups_are_stable() {
        let table = table(&[
            (MethodMask::GET, "/a/{x}"),
            (MethodMask::GET, "/a/b"),
            (MethodMask::POST, "/a/{y}"),
        ]);

        let first = table.lookup(&Method::GET, "/a/b").unwrap().entry as *const RouteEntry;
        for _ in 0..100 {
            let again = table.lookup(&Method::GET, "/a/b").unwrap().entry as *const RouteEntry;
            assert_eq!(first, again);
        }
    }

    #[test]
    fn lists_routes() {
        let table = table(&[(MethodMask::GET, "/a"), (MethodMask::POST, "/b/{id}")]);
        let templates: Vec<_> = table.routes().map(|e| e.template().as_str()).collect();
        assert_eq!(templates, vec!["/a", "/b/{id}"]);

        let listing = table.to_string();
        assert!(listing.contains("/b/{id}"));
        assert!(listing.contains("POST"));
    }
}
