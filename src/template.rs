//! Route path templates.
//!
//! A template is a slash-delimited, case-sensitive pattern made of three kinds
//! of segments:
//! ```ignore
//!  Syntax    Type
//!  users     literal segment
//!  {name}    named parameter, matches exactly one non-empty segment
//!  *         catch-all tail, only allowed last, matches one or more segments
//! ```
//!
//! Named parameters capture the percent-decoded segment text. A catch-all
//! captures the remaining path under the `*` key:
//! ```ignore
//!  Template: /json/{name}/greeting
//!
//!   /json/alice/greeting         match: name="alice"
//!   /json/alice/greeting/        match: name="alice"
//!   /json//greeting              no match
//!   /json/alice                  no match
//!
//!  Template: /static/*
//!
//!   /static/app.js               match: *="app.js"
//!   /static/css/site.css         match: *="css/site.css"
//!   /static                      no match
//! ```

use crate::error::ConfigError;
use crate::params::Params;
use crate::path;

use std::cmp::Ordering;
use std::fmt;

/// The key under which a catch-all tail is captured.
pub const CATCH_ALL: &str = "*";

/// One segment of a parsed template.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    Literal(String),
    Param(String),
    CatchAll,
}

/// The literal/parameter structure of a template, ignoring parameter names.
///
/// Two templates with equal shapes match exactly the same paths.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Shape(Vec<ShapeSegment>);

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum ShapeSegment {
    Literal(String),
    Param,
    CatchAll,
}

/// A parsed route template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    raw: String,
    segments: Vec<Segment>,
}

impl Template {
    /// Parses a template such as `/users/{id}/posts`.
    pub fn parse(raw: &str) -> Result<Template, ConfigError> {
        let malformed = |reason: &str| ConfigError::MalformedTemplate {
            template: raw.to_owned(),
            reason: reason.to_owned(),
        };

        if !raw.starts_with('/') {
            return Err(malformed("expected a path beginning with '/'"));
        }

        let parts = path::segments(raw);
        let last = parts.len().saturating_sub(1);
        let mut segments = Vec::with_capacity(parts.len());
        let mut names: Vec<&str> = Vec::new();

        for (i, part) in parts.iter().enumerate() {
            if *part == CATCH_ALL {
                if i != last {
                    return Err(malformed("a catch-all '*' must be the final segment"));
                }
                segments.push(Segment::CatchAll);
                continue;
            }

            let opens = part.matches('{').count();
            let closes = part.matches('}').count();
            if opens == 0 && closes == 0 {
                segments.push(Segment::Literal(path::decode(part).into_owned()));
                continue;
            }

            if opens != 1 || closes != 1 || !part.starts_with('{') || !part.ends_with('}') {
                return Err(malformed("unbalanced parameter braces"));
            }

            let name = part[1..part.len() - 1].trim();
            if name.is_empty() {
                return Err(malformed("empty parameter name"));
            }
            if name == CATCH_ALL {
                return Err(malformed("'*' is not a valid parameter name"));
            }
            if names.contains(&name) {
                return Err(malformed("duplicate parameter name"));
            }
            names.push(name);
            segments.push(Segment::Param(name.to_owned()));
        }

        Ok(Template {
            raw: raw.to_owned(),
            segments,
        })
    }

    /// The pseudo-template of the any handler, shown as `*`.
    pub(crate) fn fallback() -> Template {
        Template {
            raw: CATCH_ALL.to_owned(),
            segments: vec![Segment::CatchAll],
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Number of segments, including a trailing catch-all.
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn is_catch_all(&self) -> bool {
        matches!(self.segments.last(), Some(Segment::CatchAll))
    }

    /// Segments before a trailing catch-all, or all segments otherwise.
    pub(crate) fn fixed_len(&self) -> usize {
        if self.is_catch_all() {
            self.segments.len() - 1
        } else {
            self.segments.len()
        }
    }

    /// Orders templates for lookup. More fixed segments come first, then the
    /// template with a literal at the first position where the two differ.
    pub(crate) fn precedence(&self, other: &Template) -> Ordering {
        other
            .fixed_len()
            .cmp(&self.fixed_len())
            .then_with(|| self.ranks().cmp(other.ranks()))
    }

    fn ranks(&self) -> impl Iterator<Item = u8> + '_ {
        self.segments.iter().map(|segment| match segment {
            Segment::Literal(_) => 0,
            Segment::Param(_) => 1,
            Segment::CatchAll => 2,
        })
    }

    pub fn shape(&self) -> Shape {
        Shape(
            self.segments
                .iter()
                .map(|segment| match segment {
                    Segment::Literal(s) => ShapeSegment::Literal(s.clone()),
                    Segment::Param(_) => ShapeSegment::Param,
                    Segment::CatchAll => ShapeSegment::CatchAll,
                })
                .collect(),
        )
    }

    /// Matches already split request segments, extracting parameters.
    pub fn matches(&self, request: &[&str]) -> Option<Params> {
        let fixed = self.fixed_len();
        if self.is_catch_all() {
            if request.len() <= fixed {
                return None;
            }
        } else if request.len() != fixed {
            return None;
        }

        let mut params = Params::with_capacity(self.segments.len());
        for (segment, actual) in self.segments[..fixed].iter().zip(request) {
            match segment {
                Segment::Literal(expected) => {
                    if *expected != path::decode(actual) {
                        return None;
                    }
                }
                Segment::Param(name) => {
                    if actual.is_empty() {
                        return None;
                    }
                    params.insert(name.as_str(), path::decode(actual).into_owned());
                }
                Segment::CatchAll => unreachable!("catch-all is always the final segment"),
            }
        }

        if self.is_catch_all() {
            let tail = request[fixed..]
                .iter()
                .map(|s| path::decode(s))
                .collect::<Vec<_>>()
                .join("/");
            params.insert(CATCH_ALL, tail);
        }

        Some(params)
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matches(template: &str, path: &str) -> Option<Params> {
        Template::parse(template)
            .unwrap()
            .matches(&path::segments(path))
    }

    #[test]
    fn extracts_named_parameters() {
        let params = matches("/json/{name}/greeting", "/json/alice/greeting").unwrap();
        assert_eq!(params.get_str("name"), Some("alice"));
        assert_eq!(params.len(), 1);
    }

    #[test]
    fn parameters_are_percent_decoded() {
        let params = matches("/users/{name}", "/users/j%C3%BCrgen%20m").unwrap();
        assert_eq!(params.get_str("name"), Some("jürgen m"));
    }

    #[test]
    fn requires_equal_segment_count() {
        assert!(matches("/a/{b}", "/a").is_none());
        assert!(matches("/a/{b}", "/a/x/y").is_none());
        assert!(matches("/a/{b}", "/a/x").is_some());
    }

    #[test]
    fn trailing_slash_is_ignored() {
        assert!(matches("/a/b/", "/a/b").is_some());
        assert!(matches("/a/b", "/a/b/").is_some());
    }

    #[test]
    fn parameters_reject_empty_segments() {
        assert!(matches("/a/{b}/c", "/a//c").is_none());
    }

    #[test]
    fn empty_segments_are_literals() {
        assert!(matches("/a//c", "/a//c").is_some());
        assert!(matches("/a//c", "/a/c").is_none());
    }

    #[test]
    fn literals_are_case_sensitive() {
        assert!(matches("/Users", "/users").is_none());
    }

    #[test]
    fn catch_all_captures_tail() {
        let params = matches("/static/*", "/static/css/site.css").unwrap();
        assert_eq!(params.get_str(CATCH_ALL), Some("css/site.css"));
        assert!(matches("/static/*", "/static").is_none());
        assert!(matches("/static/*", "/other/x").is_none());
    }

    #[test]
    fn rejects_malformed_templates() {
        let tests = vec![
            "users",
            "/users/{id",
            "/users/id}",
            "/users/{}",
            "/users/{ }",
            "/users/{{id}}",
            "/users/x{id}",
            "/a/{id}/b/{id}",
            "/a/*/b",
        ];

        for template in tests {
            assert!(
                matches!(
                    Template::parse(template),
                    Err(ConfigError::MalformedTemplate { .. })
                ),
                "template: {:?}",
                template
            );
        }
    }

    #[test]
    fn shapes_ignore_parameter_names() {
        let a = Template::parse("/users/{id}").unwrap();
        let b = Template::parse("/users/{name}/").unwrap();
        let c = Template::parse("/users/new").unwrap();
        assert_eq!(a.shape(), b.shape());
        assert_ne!(a.shape(), c.shape());
    }

    #[test]
    fn literals_take_precedence_over_parameters() {
        let parse = |t| Template::parse(t).unwrap();
        assert_eq!(parse("/users/new").precedence(&parse("/users/{id}")), Ordering::Less);
        assert_eq!(parse("/{a}/b").precedence(&parse("/a/{b}")), Ordering::Greater);
        assert_eq!(parse("/a/{x}").precedence(&parse("/a/{y}")), Ordering::Equal);
        assert_eq!(parse("/a/b/*").precedence(&parse("/a/*")), Ordering::Less);
    }
}
