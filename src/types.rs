//! Core types for the branching model.

use crate::error::{BranchError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Stable identifier for one element within a branch's lineage.
///
/// Unlike a path, an element id survives renames and moves.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Eid(pub i32);

impl fmt::Debug for Eid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Eid({})", self.0)
    }
}

impl fmt::Display for Eid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "e{}", self.0)
    }
}

/// Revision number. Revision 0 is the initial state of a repository.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub struct Revnum(pub u64);

impl Revnum {
    pub fn next(self) -> Self {
        Revnum(self.0 + 1)
    }
}

impl fmt::Debug for Revnum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Revnum({})", self.0)
    }
}

impl fmt::Display for Revnum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}", self.0)
    }
}

/// Branch id encoding the branch's nesting ancestry.
///
/// A top-level branch has a plain token id ("B0"). A branch nested under
/// element 5 of "B0" has id "B0.5"; nesting composes ("B0.5.9"). The id is
/// the persistent form, so [`Bid::nest`] and [`Bid::unnest`] round-trip
/// exactly.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Bid(String);

impl Bid {
    /// Create a top-level branch id.
    ///
    /// The token must be non-empty and must not contain '.', '/', or
    /// whitespace, so that nested ids stay parseable.
    pub fn root(token: impl Into<String>) -> Result<Self> {
        let token = token.into();
        if token.is_empty()
            || token
                .chars()
                .any(|c| c == '.' || c == '/' || c.is_whitespace())
        {
            return Err(BranchError::InvalidBranchId(token));
        }
        Ok(Bid(token))
    }

    /// The id of a branch nested under `eid` of this branch.
    pub fn nest(&self, eid: Eid) -> Bid {
        Bid(format!("{}.{}", self.0, eid.0))
    }

    /// Split a nested id into its outer id and the element it nests under.
    ///
    /// Returns `None` for a top-level id.
    pub fn unnest(&self) -> Option<(Bid, Eid)> {
        let (outer, last) = self.0.rsplit_once('.')?;
        let eid: i32 = last.parse().ok()?;
        if outer.is_empty() {
            return None;
        }
        Some((Bid(outer.to_string()), Eid(eid)))
    }

    /// How many levels deep this branch nests (0 for a top-level branch).
    pub fn nesting_depth(&self) -> usize {
        let mut depth = 0;
        let mut current = self.clone();
        while let Some((outer, _)) = current.unnest() {
            depth += 1;
            current = outer;
        }
        depth
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Bid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Bid({})", self.0)
    }
}

impl fmt::Display for Bid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Reference to an element of a branch at a point in history.
///
/// `rev: None` refers to the in-progress transaction rather than a
/// committed revision.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct ElRevRef {
    pub rev: Option<Revnum>,
    pub bid: Bid,
    pub eid: Eid,
}

impl ElRevRef {
    /// Reference into a committed revision.
    pub fn at(rev: Revnum, bid: Bid, eid: Eid) -> Self {
        Self {
            rev: Some(rev),
            bid,
            eid,
        }
    }

    /// Reference into the in-progress transaction.
    pub fn current(bid: Bid, eid: Eid) -> Self {
        Self {
            rev: None,
            bid,
            eid,
        }
    }
}

/// Result of resolving an element id or path within a revision.
///
/// `eid: None` means the branch resolved but the element is not present in
/// that revision's snapshot (it existed in the lineage but was deleted).
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct ElRevId {
    pub rev: Revnum,
    pub bid: Bid,
    pub eid: Option<Eid>,
}

/// Element properties (name/value pairs).
pub type Props = BTreeMap<String, String>;

/// Content of an element.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum Payload {
    /// The element is also the root of a nested branch stored elsewhere.
    SubbranchRoot,
    Dir {
        props: Props,
    },
    File {
        props: Props,
        text: Vec<u8>,
    },
}

impl Payload {
    /// An empty directory payload.
    pub fn dir() -> Self {
        Payload::Dir {
            props: Props::new(),
        }
    }

    /// A file payload with the given text.
    pub fn file(text: impl Into<Vec<u8>>) -> Self {
        Payload::File {
            props: Props::new(),
            text: text.into(),
        }
    }

    /// A file payload holding a JSON-encoded value.
    pub fn file_json(value: &impl Serialize) -> Result<Self> {
        Ok(Payload::File {
            props: Props::new(),
            text: serde_json::to_vec(value)?,
        })
    }

    pub fn is_subbranch_root(&self) -> bool {
        matches!(self, Payload::SubbranchRoot)
    }
}

/// One node of a branch's element tree.
///
/// The name is meaningful only relative to the parent; the root element has
/// no parent and an empty name.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct Element {
    pub parent: Option<Eid>,
    pub name: String,
    pub payload: Payload,
}

impl Element {
    pub fn new(parent: Eid, name: impl Into<String>, payload: Payload) -> Self {
        Self {
            parent: Some(parent),
            name: name.into(),
            payload,
        }
    }

    /// The root element of a branch.
    pub fn root(payload: Payload) -> Self {
        Self {
            parent: None,
            name: String::new(),
            payload,
        }
    }
}
