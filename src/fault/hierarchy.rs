//! Declared fault type hierarchy
//!
//! Fault types form a tree rooted at [`FaultType::ROOT`]. Matching against a
//! declared type walks from the concrete type towards the root, so a handler
//! or annotation declared for an ancestor also covers its descendants, and
//! the nearest declaration wins.

use crate::error::{FaultlineError, Result};
use serde::Serialize;
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;

/// Name of a node in the fault type hierarchy
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct FaultType(Cow<'static, str>);

static ROOT_TYPE: FaultType = FaultType::ROOT;

impl FaultType {
    pub const ROOT: FaultType = FaultType::from_static("Fault");
    pub const INVALID_INPUT: FaultType = FaultType::from_static("InvalidInput");
    pub const NOT_FOUND: FaultType = FaultType::from_static("NotFound");
    pub const UNAUTHORIZED: FaultType = FaultType::from_static("Unauthorized");
    pub const INTERNAL: FaultType = FaultType::from_static("Internal");

    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        *self == Self::ROOT
    }
}

impl fmt::Display for FaultType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&'static str> for FaultType {
    fn from(name: &'static str) -> Self {
        Self::from_static(name)
    }
}

impl From<String> for FaultType {
    fn from(name: String) -> Self {
        Self(Cow::Owned(name))
    }
}

/// Explicit child -> parent links between fault types.
///
/// Types that were never declared hang directly off the root.
#[derive(Debug, Clone, Default)]
pub struct TypeHierarchy {
    parents: HashMap<FaultType, FaultType>,
}

impl TypeHierarchy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare `parent` as the direct supertype of `child`.
    ///
    /// Redeclaring a child replaces its previous parent. Declarations that
    /// would give the root a parent or close a cycle are rejected.
    pub fn declare(
        &mut self,
        child: impl Into<FaultType>,
        parent: impl Into<FaultType>,
    ) -> Result<&mut Self> {
        let child = child.into();
        let parent = parent.into();

        let invalid = |message: &str| FaultlineError::InvalidHierarchy {
            child: child.to_string(),
            parent: parent.to_string(),
            message: message.to_string(),
        };

        if child.is_root() {
            return Err(invalid("the root type cannot have a parent"));
        }
        if self.ancestry(&parent).any(|ancestor| *ancestor == child) {
            return Err(invalid("declaration would create a cycle"));
        }

        tracing::debug!(child = %child, parent = %parent, "declared fault type");
        self.parents.insert(child, parent);
        Ok(self)
    }

    /// Direct supertype of `ty`; `None` only for the root.
    pub fn parent_of(&self, ty: &FaultType) -> Option<&FaultType> {
        if ty.is_root() {
            None
        } else {
            Some(self.parents.get(ty).unwrap_or(&ROOT_TYPE))
        }
    }

    /// Iterate from `ty` itself up to and including the root.
    pub fn ancestry<'a>(&'a self, ty: &'a FaultType) -> Ancestry<'a> {
        Ancestry {
            hierarchy: self,
            next: Some(ty),
        }
    }

    /// Number of parent hops from `ty` to `ancestor`, if `ancestor` is one.
    pub fn distance(&self, ty: &FaultType, ancestor: &FaultType) -> Option<usize> {
        self.ancestry(ty).position(|candidate| candidate == ancestor)
    }

    pub fn is_subtype(&self, ty: &FaultType, ancestor: &FaultType) -> bool {
        self.distance(ty, ancestor).is_some()
    }
}

/// Iterator returned by [`TypeHierarchy::ancestry`]
pub struct Ancestry<'a> {
    hierarchy: &'a TypeHierarchy,
    next: Option<&'a FaultType>,
}

impl<'a> Iterator for Ancestry<'a> {
    type Item = &'a FaultType;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = self.hierarchy.parent_of(current);
        Some(current)
    }
}
