//! Error routes: choosing the error handler for a failed request.
//!
//! Error handlers are registered for a status range and an optional path
//! prefix. For a given status and request path the candidates are ranked in
//! fixed tiers, highest first:
//! ```ignore
//!  Tier  Status                 Prefix
//!  1     exact                  matching, non-empty
//!  2     exact                  empty
//!  3     range containing it    matching, non-empty   (also 0..0 with a prefix)
//!  4     range containing it    empty
//!  5     any (0..0)             empty
//! ```
//! Within a tier the longest prefix wins, then registration order. When no
//! entry applies the built-in status-only response is used.

use crate::error::ConfigError;
use crate::handler::ErrorHandler;
use crate::path;

use hyper::StatusCode;
use std::cmp::Reverse;

/// One registered error handler.
#[derive(Debug, Clone)]
pub struct ErrorRouteEntry {
    start: u16,
    end: u16,
    prefix: String,
    handler: ErrorHandler,
}

impl ErrorRouteEntry {
    pub fn start(&self) -> u16 {
        self.start
    }

    pub fn end(&self) -> u16 {
        self.end
    }

    /// The normalized path prefix, empty when the entry applies to every path.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn handler(&self) -> &ErrorHandler {
        &self.handler
    }

    fn is_any_status(&self) -> bool {
        self.start == 0 && self.end == 0
    }

    fn tier(&self, status: u16, path: &str) -> Option<u8> {
        let scoped = !self.prefix.is_empty();
        if scoped && !path::has_prefix(path, &self.prefix) {
            return None;
        }

        let tier = if self.is_any_status() {
            if scoped {
                3
            } else {
                5
            }
        } else if self.start == status && self.end == status {
            if scoped {
                1
            } else {
                2
            }
        } else if self.start <= status && status <= self.end {
            if scoped {
                3
            } else {
                4
            }
        } else {
            return None;
        };
        Some(tier)
    }
}

/// Collects error routes before they are fixed.
#[derive(Debug, Default)]
pub struct ErrorRoutesBuilder {
    entries: Vec<ErrorRouteEntry>,
}

impl ErrorRoutesBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for statuses `start..=end` under `prefix`.
    ///
    /// An `end` of zero means the single status `start`; `0, 0` means every
    /// status. An empty prefix (or `/`) applies to every path.
    pub fn register(
        &mut self,
        start: u16,
        end: u16,
        prefix: &str,
        handler: ErrorHandler,
    ) -> Result<(), ConfigError> {
        let end = if end == 0 { start } else { end };
        let valid = |s: u16| (100..=999).contains(&s);
        if !(start == 0 && end == 0) && (!valid(start) || !valid(end) || start > end) {
            return Err(ConfigError::InvalidErrorStatus { start, end });
        }

        let trimmed = path::trim(prefix);
        let prefix = if trimmed.is_empty() {
            String::new()
        } else {
            format!("/{}", trimmed)
        };

        tracing::debug!(
            start,
            end,
            prefix = %prefix,
            convention = ?handler.convention(),
            "registered error route"
        );
        self.entries.push(ErrorRouteEntry {
            start,
            end,
            prefix,
            handler,
        });
        Ok(())
    }

    pub fn fix(self) -> ErrorRoutes {
        ErrorRoutes {
            entries: self.entries,
        }
    }
}

/// The fixed error route selector.
#[derive(Debug, Default)]
pub struct ErrorRoutes {
    entries: Vec<ErrorRouteEntry>,
}

impl ErrorRoutes {
    /// Selects the error route for `status` raised while serving `path`.
    /// `None` means the built-in response should be sent.
    pub fn select(&self, status: StatusCode, path: &str) -> Option<&ErrorRouteEntry> {
        let status = status.as_u16();
        let selected = self
            .entries
            .iter()
            .enumerate()
            .filter_map(|(i, entry)| {
                entry
                    .tier(status, path)
                    .map(|tier| ((tier, Reverse(entry.prefix.len()), i), entry))
            })
            .min_by_key(|(key, _)| *key)
            .map(|(_, entry)| entry);

        tracing::debug!(
            status,
            path = %path,
            prefix = selected.map(|e| e.prefix.as_str()),
            "selected error route"
        );
        selected
    }

    pub fn entries(&self) -> &[ErrorRouteEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
