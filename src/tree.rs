//! EID-indexed element trees.
//!
//! An element tree is one branch's content at one point in time: which
//! elements exist, each one's parent and name, and its payload. All
//! structural invariants (unique sibling names, no dangling parents, no
//! cycles) are enforced at the mutation boundary.

use crate::error::{BranchError, Result};
use crate::types::{Eid, Element, Payload};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// One branch's elements, keyed by EID.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementTree {
    root_eid: Eid,
    elements: BTreeMap<Eid, Element>,
}

impl ElementTree {
    /// Create a tree holding just a root element.
    pub fn new(root_eid: Eid, root_payload: Payload) -> Self {
        let mut elements = BTreeMap::new();
        elements.insert(root_eid, Element::root(root_payload));
        Self { root_eid, elements }
    }

    /// Assemble a tree from pre-built parts, validating all invariants.
    pub fn from_parts(root_eid: Eid, elements: BTreeMap<Eid, Element>) -> Result<Self> {
        let tree = Self { root_eid, elements };
        tree.validate()?;
        Ok(tree)
    }

    pub fn root_eid(&self) -> Eid {
        self.root_eid
    }

    /// Read-only lookup; `None` if the EID is absent.
    pub fn get(&self, eid: Eid) -> Option<&Element> {
        self.elements.get(&eid)
    }

    pub fn contains(&self, eid: Eid) -> bool {
        self.elements.contains_key(&eid)
    }

    /// Full snapshot for iteration.
    pub fn elements(&self) -> &BTreeMap<Eid, Element> {
        &self.elements
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Children of `parent`, in EID order.
    pub fn children(&self, parent: Eid) -> impl Iterator<Item = (Eid, &Element)> {
        self.elements
            .iter()
            .filter(move |(_, el)| el.parent == Some(parent))
            .map(|(eid, el)| (*eid, el))
    }

    /// Path from the branch root to `eid`, in root-to-leaf order.
    ///
    /// The root itself is the empty path. Returns `None` if the parent chain
    /// is dangling or cyclic; callers should treat that as corruption, not
    /// as an ordinary miss.
    pub fn path_by_eid(&self, eid: Eid) -> Option<String> {
        let mut segments = Vec::new();
        let mut current = eid;
        let mut hops = 0;

        while current != self.root_eid {
            let el = self.elements.get(&current)?;
            segments.push(el.name.as_str());
            current = el.parent?;
            hops += 1;
            if hops > self.elements.len() {
                return None;
            }
        }

        segments.reverse();
        Some(segments.join("/"))
    }

    /// Inverse lookup: descend from the root by name at each segment.
    pub fn eid_by_path(&self, path: &str) -> Option<Eid> {
        let mut current = self.root_eid;
        if path.is_empty() {
            return Some(current);
        }
        for segment in path.split('/') {
            current = self
                .children(current)
                .find(|(_, el)| el.name == segment)
                .map(|(eid, _)| eid)?;
        }
        Some(current)
    }

    /// Insert or update an element, enforcing all structural invariants.
    pub fn set_element(&mut self, eid: Eid, element: Element) -> Result<()> {
        if eid == self.root_eid {
            if element.parent.is_some() || !element.name.is_empty() {
                return Err(BranchError::InvalidOperation(format!(
                    "root element {} cannot have a parent or a name",
                    eid
                )));
            }
        } else {
            let parent = element.parent.ok_or_else(|| {
                BranchError::InvalidOperation(format!("non-root element {} needs a parent", eid))
            })?;
            if !self.elements.contains_key(&parent) {
                return Err(BranchError::DanglingParent { parent });
            }
            self.check_no_cycle(eid, parent)?;
            if self.elements.iter().any(|(other, el)| {
                *other != eid && el.parent == Some(parent) && el.name == element.name
            }) {
                return Err(BranchError::DuplicateSiblingName {
                    parent,
                    name: element.name,
                });
            }
        }

        self.elements.insert(eid, element);
        Ok(())
    }

    /// Reject re-parenting `eid` under itself or one of its descendants.
    fn check_no_cycle(&self, eid: Eid, parent: Eid) -> Result<()> {
        let mut current = parent;
        let mut hops = 0;
        loop {
            if current == eid {
                return Err(BranchError::Cycle { eid, parent });
            }
            match self.elements.get(&current).and_then(|el| el.parent) {
                Some(next) => current = next,
                None => return Ok(()),
            }
            hops += 1;
            if hops > self.elements.len() {
                return Err(BranchError::Corruption(format!(
                    "parent chain of {} does not terminate",
                    parent
                )));
            }
        }
    }

    /// Remove one element. Its descendants are left in place, unreachable,
    /// until the next sequence point purges them.
    pub fn remove(&mut self, eid: Eid) -> Result<Element> {
        if eid == self.root_eid {
            return Err(BranchError::InvalidOperation(format!(
                "cannot delete branch root {}",
                eid
            )));
        }
        self.elements
            .remove(&eid)
            .ok_or(BranchError::ElementNotFound(eid))
    }

    /// Drop every element no longer reachable from the root. Returns the
    /// purged EIDs.
    pub fn purge_unreachable(&mut self) -> Vec<Eid> {
        let reachable = self.reachable_set();
        let doomed: Vec<Eid> = self
            .elements
            .keys()
            .filter(|eid| !reachable.contains(eid))
            .copied()
            .collect();
        for eid in &doomed {
            self.elements.remove(eid);
        }
        doomed
    }

    fn reachable_set(&self) -> BTreeSet<Eid> {
        let mut reachable = BTreeSet::new();
        let mut frontier = vec![self.root_eid];
        while let Some(eid) = frontier.pop() {
            if !reachable.insert(eid) {
                continue;
            }
            frontier.extend(self.children(eid).map(|(child, _)| child));
        }
        reachable
    }

    /// EIDs at or below `eid`.
    pub fn subtree_eids(&self, eid: Eid) -> Result<BTreeSet<Eid>> {
        if !self.elements.contains_key(&eid) {
            return Err(BranchError::ElementNotFound(eid));
        }
        let mut eids = BTreeSet::new();
        let mut frontier = vec![eid];
        while let Some(current) = frontier.pop() {
            if !eids.insert(current) {
                continue;
            }
            frontier.extend(self.children(current).map(|(child, _)| child));
        }
        Ok(eids)
    }

    /// EIDs in parent-before-child order, starting at the root.
    pub fn top_down_eids(&self) -> Vec<Eid> {
        let mut order = Vec::with_capacity(self.elements.len());
        let mut frontier = std::collections::VecDeque::from([self.root_eid]);
        let mut seen = BTreeSet::new();
        while let Some(eid) = frontier.pop_front() {
            if !seen.insert(eid) {
                continue;
            }
            order.push(eid);
            frontier.extend(self.children(eid).map(|(child, _)| child));
        }
        order
    }

    /// Full invariant sweep: root integrity, parent presence, sibling name
    /// uniqueness, and reachability of every element from the root.
    pub fn validate(&self) -> Result<()> {
        let root = self
            .elements
            .get(&self.root_eid)
            .ok_or_else(|| BranchError::Corruption(format!("root {} missing", self.root_eid)))?;
        if root.parent.is_some() || !root.name.is_empty() {
            return Err(BranchError::Corruption(format!(
                "root {} has a parent or a name",
                self.root_eid
            )));
        }

        let mut sibling_names = BTreeSet::new();
        for (eid, el) in &self.elements {
            if *eid == self.root_eid {
                continue;
            }
            let parent = el
                .parent
                .ok_or_else(|| BranchError::Corruption(format!("{} has no parent", eid)))?;
            if !self.elements.contains_key(&parent) {
                return Err(BranchError::DanglingParent { parent });
            }
            if !sibling_names.insert((parent, el.name.clone())) {
                return Err(BranchError::DuplicateSiblingName {
                    parent,
                    name: el.name.clone(),
                });
            }
        }

        let reachable = self.reachable_set();
        if reachable.len() != self.elements.len() {
            return Err(BranchError::Corruption(
                "tree contains elements unreachable from the root".into(),
            ));
        }
        Ok(())
    }
}
