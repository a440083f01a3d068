//! In-memory document tree
//!
//! A document is an invisible root holding an ordered list of top-level
//! entries; each entry owns an ordered list of children. Entries live in an
//! arena and are addressed by [`EntryId`], a generational handle, so a
//! handle to a deleted entry is detected instead of aliasing a newer one.
//!
//! The synthetic root has no handle: APIs take `Option<EntryId>` where
//! `None` means "the top level".
//!
//! Mutations are synchronous. Registered observers run after each mutation
//! completes, in registration order. The tree has no internal locking;
//! concurrent callers must serialize access themselves.

use std::fmt;

use crate::error::{CryptpadError, ErrorCategory, ErrorKind, Result};

/// Title of the entry created by [`Document::with_welcome_entry`].
pub const WELCOME_TITLE: &str = "Welcome";
const WELCOME_BODY: &str = "Select an entry on the left and start typing.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntryId {
    index: u32,
    generation: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

/// What a mutation did, delivered to observers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    Added {
        entry: EntryId,
        parent: Option<EntryId>,
    },
    /// `removed` counts the entry and all its descendants.
    Deleted { entry: EntryId, removed: usize },
    TitleChanged(EntryId),
    BodyChanged(EntryId),
    Moved {
        entry: EntryId,
        from: Option<EntryId>,
        to: Option<EntryId>,
    },
    Cleared,
}

/// Owned, handle-free copy of a subtree. Handy for comparisons.
///
/// Cloning, comparing and dropping walk the tree with an explicit stack, so
/// nesting depth is bounded by memory rather than by the call stack.
#[derive(Debug)]
pub struct EntryTree {
    pub title: String,
    pub body: String,
    pub children: Vec<EntryTree>,
}

impl EntryTree {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            children: Vec::new(),
        }
    }

    pub fn with_children(mut self, children: Vec<EntryTree>) -> Self {
        self.children = children;
        self
    }
}

impl Clone for EntryTree {
    fn clone(&self) -> Self {
        // Ancestors of `src`, each with the copies of its children made so far.
        let mut stack: Vec<(&EntryTree, Vec<EntryTree>)> = Vec::new();
        let (mut src, mut done) = (self, Vec::new());
        loop {
            if let Some(next) = src.children.get(done.len()) {
                stack.push((src, done));
                (src, done) = (next, Vec::new());
                continue;
            }
            let copy = EntryTree {
                title: src.title.clone(),
                body: src.body.clone(),
                children: done,
            };
            match stack.pop() {
                Some((parent, mut siblings)) => {
                    siblings.push(copy);
                    (src, done) = (parent, siblings);
                }
                None => return copy,
            }
        }
    }
}

impl PartialEq for EntryTree {
    fn eq(&self, other: &Self) -> bool {
        let mut pending = vec![(self, other)];
        while let Some((a, b)) = pending.pop() {
            if a.title != b.title || a.body != b.body || a.children.len() != b.children.len() {
                return false;
            }
            pending.extend(a.children.iter().zip(&b.children));
        }
        true
    }
}

impl Eq for EntryTree {}

impl Drop for EntryTree {
    fn drop(&mut self) {
        let mut pending = std::mem::take(&mut self.children);
        while let Some(mut tree) = pending.pop() {
            pending.append(&mut tree.children);
        }
    }
}

#[derive(Debug)]
struct Node {
    title: String,
    body: String,
    parent: Option<EntryId>,
    children: Vec<EntryId>,
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    node: Option<Node>,
}

type Observer = Box<dyn FnMut(&Change)>;

#[derive(Default)]
pub struct Document {
    slots: Vec<Slot>,
    free: Vec<u32>,
    top: Vec<EntryId>,
    len: usize,
    observers: Vec<(ObserverId, Observer)>,
    next_observer: u64,
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("entries", &self.snapshot())
            .field("observers", &self.observers.len())
            .finish()
    }
}

fn not_found() -> CryptpadError {
    CryptpadError::with_kind(
        ErrorCategory::User,
        ErrorKind::EntryNotFound,
        "entry does not exist in this document",
    )
}

fn invalid_move(msg: &str) -> CryptpadError {
    CryptpadError::with_kind(ErrorCategory::User, ErrorKind::InvalidMove, msg)
}

fn check_title(title: &str) -> Result<()> {
    if title.is_empty() {
        return Err(CryptpadError::with_kind(
            ErrorCategory::User,
            ErrorKind::InvalidTitle,
            "entry title must not be empty",
        ));
    }
    Ok(())
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    /// A fresh document holding one top-level entry, the way a new
    /// notebook starts out.
    pub fn with_welcome_entry() -> Self {
        let mut doc = Self::new();
        doc.insert(None, WELCOME_TITLE.to_string(), WELCOME_BODY.to_string());
        doc
    }

    /// Build a document from owned subtrees, preserving order.
    pub fn from_trees(trees: &[EntryTree]) -> Result<Self> {
        let mut doc = Self::new();
        let mut pending: Vec<(Option<EntryId>, &EntryTree)> =
            trees.iter().rev().map(|t| (None, t)).collect();
        while let Some((parent, tree)) = pending.pop() {
            check_title(&tree.title)?;
            let id = doc.insert(parent, tree.title.clone(), tree.body.clone());
            pending.extend(tree.children.iter().rev().map(|c| (Some(id), c)));
        }
        Ok(doc)
    }

    /// Append an untitled entry without notifying observers. The markup
    /// reader fills it in with [`Document::fill_parsed`] once the element
    /// closes; the parent must exist.
    pub(crate) fn insert_parsed(&mut self, parent: Option<EntryId>) -> EntryId {
        self.insert(parent, String::new(), String::new())
    }

    pub(crate) fn fill_parsed(&mut self, id: EntryId, title: String, body: String) -> Result<()> {
        check_title(&title)?;
        let node = self.node_mut(id)?;
        node.title = title;
        node.body = body;
        Ok(())
    }

    /// Number of entries, not counting the invisible root.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn node(&self, id: EntryId) -> Result<&Node> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_ref())
            .ok_or_else(not_found)
    }

    fn node_mut(&mut self, id: EntryId) -> Result<&mut Node> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_mut())
            .ok_or_else(not_found)
    }

    pub fn contains(&self, id: EntryId) -> bool {
        self.node(id).is_ok()
    }

    pub fn title(&self, id: EntryId) -> Result<&str> {
        Ok(&self.node(id)?.title)
    }

    pub fn body(&self, id: EntryId) -> Result<&str> {
        Ok(&self.node(id)?.body)
    }

    /// Parent of `id`; `None` for a top-level entry.
    pub fn parent(&self, id: EntryId) -> Result<Option<EntryId>> {
        Ok(self.node(id)?.parent)
    }

    /// Ordered children of `parent`, or the top-level entries for `None`.
    pub fn children(&self, parent: Option<EntryId>) -> Result<&[EntryId]> {
        match parent {
            None => Ok(&self.top),
            Some(id) => Ok(&self.node(id)?.children),
        }
    }

    fn children_mut(&mut self, parent: Option<EntryId>) -> Result<&mut Vec<EntryId>> {
        match parent {
            None => Ok(&mut self.top),
            Some(id) => Ok(&mut self.node_mut(id)?.children),
        }
    }

    /// True if `ancestor` is a strict ancestor of `id`.
    pub fn is_ancestor(&self, ancestor: EntryId, id: EntryId) -> Result<bool> {
        let mut current = self.node(id)?.parent;
        while let Some(p) = current {
            if p == ancestor {
                return Ok(true);
            }
            current = self.node(p)?.parent;
        }
        Ok(false)
    }

    fn insert(&mut self, parent: Option<EntryId>, title: String, body: String) -> EntryId {
        let node = Node {
            title,
            body,
            parent,
            children: Vec::new(),
        };
        let id = match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.node = Some(node);
                EntryId {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    node: Some(node),
                });
                EntryId {
                    index: (self.slots.len() - 1) as u32,
                    generation: 0,
                }
            }
        };
        // Callers have validated `parent`.
        if let Ok(siblings) = self.children_mut(parent) {
            siblings.push(id);
        }
        self.len += 1;
        id
    }

    /// Append a new entry under `parent` (`None` for the top level).
    pub fn add_entry(&mut self, parent: Option<EntryId>, title: impl Into<String>) -> Result<EntryId> {
        let title = title.into();
        check_title(&title)?;
        if let Some(p) = parent {
            self.node(p)?;
        }
        let id = self.insert(parent, title, String::new());
        self.notify(Change::Added { entry: id, parent });
        Ok(id)
    }

    /// Remove `id` and its whole subtree. Returns the number of entries removed.
    pub fn delete_entry(&mut self, id: EntryId) -> Result<usize> {
        let parent = self.node(id)?.parent;
        self.children_mut(parent)?.retain(|&c| c != id);

        let mut removed = 0;
        let mut pending = vec![id];
        while let Some(current) = pending.pop() {
            let slot = &mut self.slots[current.index as usize];
            if let Some(node) = slot.node.take() {
                pending.extend(node.children);
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(current.index);
                removed += 1;
            }
        }
        self.len -= removed;

        self.notify(Change::Deleted { entry: id, removed });
        Ok(removed)
    }

    pub fn set_title(&mut self, id: EntryId, title: impl Into<String>) -> Result<()> {
        let title = title.into();
        check_title(&title)?;
        self.node_mut(id)?.title = title;
        self.notify(Change::TitleChanged(id));
        Ok(())
    }

    pub fn set_body(&mut self, id: EntryId, body: impl Into<String>) -> Result<()> {
        self.node_mut(id)?.body = body.into();
        self.notify(Change::BodyChanged(id));
        Ok(())
    }

    /// Move `id` (with its subtree) under `new_parent` at `index`.
    ///
    /// `index` is the position in the destination's children once `id` has
    /// been detached; `None` appends. `new_parent = None` targets the top
    /// level and needs an explicit index: reordering top-level entries is
    /// allowed, dropping an entry onto the invisible root is not.
    ///
    /// Every check happens before anything changes; on error the tree is
    /// untouched.
    pub fn move_entry(
        &mut self,
        id: EntryId,
        new_parent: Option<EntryId>,
        index: Option<usize>,
    ) -> Result<()> {
        let old_parent = self.node(id)?.parent;

        match new_parent {
            None if index.is_none() => {
                return Err(invalid_move("cannot drop an entry onto the root"));
            }
            None => {}
            Some(p) => {
                self.node(p)?;
                if p == id {
                    return Err(invalid_move("cannot move an entry into itself"));
                }
                if self.is_ancestor(id, p)? {
                    return Err(invalid_move("cannot move an entry into its own descendant"));
                }
            }
        }

        let mut dest_len = self.children(new_parent)?.len();
        if old_parent == new_parent {
            dest_len -= 1;
        }
        let index = index.unwrap_or(dest_len);
        if index > dest_len {
            return Err(invalid_move("target position is out of range"));
        }

        self.children_mut(old_parent)?.retain(|&c| c != id);
        self.children_mut(new_parent)?.insert(index, id);
        self.node_mut(id)?.parent = new_parent;

        self.notify(Change::Moved {
            entry: id,
            from: old_parent,
            to: new_parent,
        });
        Ok(())
    }

    /// Remove every entry.
    pub fn clear(&mut self) {
        // Slots are retired rather than dropped so old handles stay invalid.
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if slot.node.take().is_some() {
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(index as u32);
            }
        }
        self.top.clear();
        self.len = 0;
        self.notify(Change::Cleared);
    }

    /// Follow titles from the top level down; first match wins at each level.
    pub fn find_path(&self, path: &[&str]) -> Option<EntryId> {
        let mut parent = None;
        for title in path {
            let children = self.children(parent).ok()?;
            let next = children
                .iter()
                .copied()
                .find(|&c| self.title(c).is_ok_and(|t| t == *title))?;
            parent = Some(next);
        }
        parent
    }

    /// Depth-first, pre-order walk yielding `(depth, id)`; top level is depth 0.
    pub fn walk(&self) -> Vec<(usize, EntryId)> {
        let mut out = Vec::with_capacity(self.len);
        let mut stack: Vec<(usize, EntryId)> = self.top.iter().rev().map(|&id| (0, id)).collect();
        while let Some((depth, id)) = stack.pop() {
            out.push((depth, id));
            if let Ok(node) = self.node(id) {
                stack.extend(node.children.iter().rev().map(|&c| (depth + 1, c)));
            }
        }
        out
    }

    /// Owned copy of the whole tree.
    pub fn snapshot(&self) -> Vec<EntryTree> {
        let mut out = Vec::with_capacity(self.top.len());
        // (entry, index of its next child to copy, copies made so far)
        let mut stack: Vec<(&Node, usize, Vec<EntryTree>)> = Vec::new();
        for &top in &self.top {
            let Ok(node) = self.node(top) else { continue };
            stack.push((node, 0, Vec::new()));
            while let Some((node, next, done)) = stack.last_mut() {
                if let Some(&child) = node.children.get(*next) {
                    *next += 1;
                    if let Ok(child) = self.node(child) {
                        stack.push((child, 0, Vec::new()));
                    }
                    continue;
                }
                let tree = EntryTree {
                    title: node.title.clone(),
                    body: node.body.clone(),
                    children: std::mem::take(done),
                };
                stack.pop();
                match stack.last_mut() {
                    Some((_, _, siblings)) => siblings.push(tree),
                    None => out.push(tree),
                }
            }
        }
        out
    }

    /// Register a callback run after every mutation.
    pub fn on_change(&mut self, observer: impl FnMut(&Change) + 'static) -> ObserverId {
        let id = ObserverId(self.next_observer);
        self.next_observer += 1;
        self.observers.push((id, Box::new(observer)));
        id
    }

    /// Returns false if the observer was not registered.
    pub fn remove_observer(&mut self, id: ObserverId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(oid, _)| *oid != id);
        self.observers.len() != before
    }

    fn notify(&mut self, change: Change) {
        for (_, observer) in self.observers.iter_mut() {
            observer(&change);
        }
    }
}
