//! The part tree: titled nodes with attributes, lazy text and owned children.

use std::fmt;

use tracing::debug;

use crate::error::{Error, Result};
use crate::io::{ContentSource, TextSource};
use crate::model::{Attributes, Value};

/// Attribute holding a part's title.
pub const TITLE_KEY: &str = "title";

/// Handle returned by [`Part::register_cleanup`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CleanupId(u64);

type Cleanup = Box<dyn FnOnce() + Send>;

/// A node of the document tree.
///
/// A part owns its children outright; dropping a part drops its subtree and
/// then runs the cleanup hooks registered on it.
#[derive(Default)]
pub struct Part {
    attributes: Attributes,
    children: Vec<Part>,
    text: TextSource,
    content: Option<ContentSource>,
    cleanups: Vec<(CleanupId, Cleanup)>,
    next_cleanup: u64,
}

impl Part {
    pub fn new(title: impl Into<String>) -> Self {
        Self::with_text(title, TextSource::default())
    }

    pub fn with_text(title: impl Into<String>, text: impl Into<TextSource>) -> Self {
        let mut part = Self::default();
        part.text = text.into();
        part.set_title(title);
        part
    }

    /// A part whose text is read from `source` in the encoding named by `label`.
    pub fn with_source(title: impl Into<String>, source: ContentSource, label: Option<&str>) -> Result<Self> {
        Ok(Self::with_text(title, TextSource::from_content(source, label)?))
    }

    // --- Attributes ---

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub fn attributes_mut(&mut self) -> &mut Attributes {
        &mut self.attributes
    }

    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    pub fn set_attribute(&mut self, name: &str, value: impl Into<Value>) -> bool {
        self.attributes.set(name, value)
    }

    pub fn remove_attribute(&mut self, name: &str) -> Option<Value> {
        self.attributes.remove(name)
    }

    /// The title, or an empty string when unset.
    pub fn title(&self) -> &str {
        self.attributes
            .get(TITLE_KEY)
            .and_then(|v| v.as_str().ok())
            .unwrap_or("")
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.attributes.set(TITLE_KEY, Value::String(title.into()));
    }

    // --- Text and content ---

    pub fn text_source(&self) -> &TextSource {
        &self.text
    }

    pub fn set_text_source(&mut self, text: TextSource) {
        self.text = text;
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = TextSource::Raw(text.into());
    }

    pub fn text(&self) -> Result<String> {
        self.text.text()
    }

    pub fn lines(&self, skip_empty: bool) -> Result<Vec<String>> {
        self.text.lines(skip_empty)
    }

    /// Non-text payload attached to this part, such as an embedded file.
    pub fn content(&self) -> Option<&ContentSource> {
        self.content.as_ref()
    }

    pub fn set_content(&mut self, content: Option<ContentSource>) {
        self.content = content;
    }

    // --- Children ---

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// True when this part has at least one child.
    pub fn is_section(&self) -> bool {
        !self.children.is_empty()
    }

    pub fn children(&self) -> &[Part] {
        &self.children
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Part> {
        self.children.iter()
    }

    /// Append a new child and return it.
    pub fn new_child(&mut self, title: impl Into<String>, text: impl Into<TextSource>) -> &mut Part {
        self.children.push(Part::with_text(title, text));
        let last = self.children.len() - 1;
        &mut self.children[last]
    }

    pub fn push(&mut self, part: impl Into<Part>) {
        self.children.push(part.into());
    }

    pub fn get(&self, index: usize) -> Option<&Part> {
        self.children.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Part> {
        self.children.get_mut(index)
    }

    /// Replace the child at `index`, returning the old one.
    pub fn set(&mut self, index: usize, part: impl Into<Part>) -> Result<Part> {
        let len = self.children.len();
        let slot = self
            .children
            .get_mut(index)
            .ok_or(Error::IndexOutOfRange { index, len })?;
        Ok(std::mem::replace(slot, part.into()))
    }

    /// Insert a child before `index`. `index == len()` appends.
    pub fn insert(&mut self, index: usize, part: impl Into<Part>) -> Result<()> {
        let len = self.children.len();
        if index > len {
            return Err(Error::IndexOutOfRange { index, len });
        }
        self.children.insert(index, part.into());
        Ok(())
    }

    pub fn remove(&mut self, index: usize) -> Result<Part> {
        let len = self.children.len();
        if index >= len {
            return Err(Error::IndexOutOfRange { index, len });
        }
        Ok(self.children.remove(index))
    }

    /// Index of the first child at or after `from` titled `title`.
    pub fn index_of(&self, title: &str, from: usize) -> Option<usize> {
        self.index_where(|part| part.title() == title, from)
    }

    /// Index of the first child at or after `from` matching `predicate`.
    pub fn index_where<F>(&self, mut predicate: F, from: usize) -> Option<usize>
    where
        F: FnMut(&Part) -> bool,
    {
        self.children
            .iter()
            .enumerate()
            .skip(from)
            .find(|(_, part)| predicate(part))
            .map(|(index, _)| index)
    }

    /// Descendants matching `predicate`, in pre-order.
    ///
    /// Only direct children are tested unless `recursive` is set.
    pub fn select<F>(&self, mut predicate: F, recursive: bool) -> Vec<&Part>
    where
        F: FnMut(&Part) -> bool,
    {
        let mut found = Vec::new();
        self.select_into(&mut predicate, recursive, &mut found);
        found
    }

    fn select_into<'a, F>(&'a self, predicate: &mut F, recursive: bool, found: &mut Vec<&'a Part>)
    where
        F: FnMut(&Part) -> bool,
    {
        for child in &self.children {
            if predicate(child) {
                found.push(child);
            }
            if recursive && child.is_section() {
                child.select_into(predicate, recursive, found);
            }
        }
    }

    /// Visit this part's descendants in pre-order.
    ///
    /// The visitor gets each part and its depth below `self` (children are 1).
    /// Returning false skips that part's children.
    pub fn walk<F>(&self, mut visitor: F)
    where
        F: FnMut(&Part, usize) -> bool,
    {
        fn visit<F: FnMut(&Part, usize) -> bool>(part: &Part, level: usize, visitor: &mut F) {
            for child in &part.children {
                if visitor(child, level) {
                    visit(child, level + 1, visitor);
                }
            }
        }
        visit(self, 1, &mut visitor);
    }

    /// Follow `path` down the tree. Negative indices count from the end.
    ///
    /// Returns `None` for an empty path or an index out of range at any level.
    pub fn find_by_path(&self, path: &[isize]) -> Option<&Part> {
        let (&first, rest) = path.split_first()?;
        let child = self.children.get(self.resolve_index(first)?)?;
        if rest.is_empty() {
            Some(child)
        } else {
            child.find_by_path(rest)
        }
    }

    pub fn find_by_path_mut(&mut self, path: &[isize]) -> Option<&mut Part> {
        let (&first, rest) = path.split_first()?;
        let index = self.resolve_index(first)?;
        let child = self.children.get_mut(index)?;
        if rest.is_empty() {
            Some(child)
        } else {
            child.find_by_path_mut(rest)
        }
    }

    fn resolve_index(&self, index: isize) -> Option<usize> {
        let resolved = if index < 0 {
            self.children.len().checked_sub(index.unsigned_abs())
        } else {
            Some(index as usize)
        };
        if resolved.is_none_or(|i| i >= self.children.len()) {
            debug!("index {index} out of range in part {:?}", self.title());
            return None;
        }
        resolved
    }

    /// Maximum nesting below this part; 0 for a leaf.
    pub fn depth(&self) -> usize {
        self.children
            .iter()
            .map(|child| child.depth() + 1)
            .max()
            .unwrap_or(0)
    }

    // --- Cleanup ---

    /// Register a hook run once when this part is dropped or cleaned up.
    pub fn register_cleanup<F>(&mut self, hook: F) -> CleanupId
    where
        F: FnOnce() + Send + 'static,
    {
        let id = CleanupId(self.next_cleanup);
        self.next_cleanup += 1;
        self.cleanups.push((id, Box::new(hook)));
        id
    }

    /// Unregister a hook without running it.
    pub fn remove_cleanup(&mut self, id: CleanupId) -> bool {
        let before = self.cleanups.len();
        self.cleanups.retain(|(other, _)| *other != id);
        self.cleanups.len() != before
    }

    /// Run and forget every registered hook, in registration order.
    pub fn cleanup(&mut self) {
        for (_, hook) in self.cleanups.drain(..) {
            hook();
        }
    }
}

impl Drop for Part {
    fn drop(&mut self) {
        // children first, then our own hooks
        self.children.clear();
        self.cleanup();
    }
}

impl fmt::Debug for Part {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Part")
            .field("attributes", &self.attributes)
            .field("text", &self.text)
            .field("content", &self.content)
            .field("children", &self.children)
            .field("cleanups", &self.cleanups.len())
            .finish()
    }
}

impl<'a> IntoIterator for &'a Part {
    type Item = &'a Part;
    type IntoIter = std::slice::Iter<'a, Part>;

    fn into_iter(self) -> Self::IntoIter {
        self.children.iter()
    }
}
