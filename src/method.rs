//! A compact set of HTTP methods.

use hyper::Method;
use std::fmt;
use std::ops::{BitAnd, BitOr};

/// A bitset of HTTP methods attached to a route.
///
/// ```rust
/// use httpdispatch::MethodMask;
/// use hyper::Method;
///
/// let mask = MethodMask::GET | MethodMask::POST;
/// assert!(mask.contains(&Method::GET));
/// assert!(!mask.contains(&Method::DELETE));
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MethodMask(u16);

impl MethodMask {
    pub const NONE: MethodMask = MethodMask(0);
    pub const GET: MethodMask = MethodMask(1);
    pub const HEAD: MethodMask = MethodMask(1 << 1);
    pub const POST: MethodMask = MethodMask(1 << 2);
    pub const PUT: MethodMask = MethodMask(1 << 3);
    pub const PATCH: MethodMask = MethodMask(1 << 4);
    pub const DELETE: MethodMask = MethodMask(1 << 5);
    pub const OPTIONS: MethodMask = MethodMask(1 << 6);
    pub const CONNECT: MethodMask = MethodMask(1 << 7);
    pub const TRACE: MethodMask = MethodMask(1 << 8);
    /// Extension methods that have no dedicated bit.
    pub const OTHER: MethodMask = MethodMask(1 << 9);
    pub const ALL: MethodMask = MethodMask((1 << 10) - 1);

    const NAMED: [(MethodMask, Method); 9] = [
        (MethodMask::GET, Method::GET),
        (MethodMask::HEAD, Method::HEAD),
        (MethodMask::POST, Method::POST),
        (MethodMask::PUT, Method::PUT),
        (MethodMask::PATCH, Method::PATCH),
        (MethodMask::DELETE, Method::DELETE),
        (MethodMask::OPTIONS, Method::OPTIONS),
        (MethodMask::CONNECT, Method::CONNECT),
        (MethodMask::TRACE, Method::TRACE),
    ];

    /// The single-method mask for `method`.
    pub fn of(method: &Method) -> MethodMask {
        Self::NAMED
            .iter()
            .find(|(_, m)| m == method)
            .map_or(MethodMask::OTHER, |(mask, _)| *mask)
    }

    pub fn contains(self, method: &Method) -> bool {
        self.intersects(MethodMask::of(method))
    }

    pub fn intersects(self, other: MethodMask) -> bool {
        self.0 & other.0 != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn is_all(self) -> bool {
        self == MethodMask::ALL
    }

    /// The named methods in this set, in a stable order.
    pub fn methods(self) -> Vec<Method> {
        Self::NAMED
            .iter()
            .filter(|(mask, _)| self.intersects(*mask))
            .map(|(_, method)| method.clone())
            .collect()
    }

    /// The value of an `Allow` header for this set.
    pub fn allow_header(self) -> String {
        self.methods()
            .iter()
            .map(Method::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl From<Method> for MethodMask {
    fn from(method: Method) -> Self {
        MethodMask::of(&method)
    }
}

impl From<&Method> for MethodMask {
    fn from(method: &Method) -> Self {
        MethodMask::of(method)
    }
}

impl BitOr for MethodMask {
    type Output = MethodMask;

    fn bitor(self, rhs: MethodMask) -> MethodMask {
        MethodMask(self.0 | rhs.0)
    }
}

impl BitAnd for MethodMask {
    type Output = MethodMask;

    fn bitand(self, rhs: MethodMask) -> MethodMask {
        MethodMask(self.0 & rhs.0)
    }
}

impl fmt::Display for MethodMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_all() {
            f.write_str("ALL")
        } else {
            f.write_str(&self.allow_header())
        }
    }
}

impl fmt::Debug for MethodMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MethodMask({})", self)
    }
}
