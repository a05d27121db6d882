//! Insertion-ordered identifier sets
//!
//! Collectors accumulate video, channel and thread IDs with set semantics.
//! Iteration follows first-insertion order so that chunking and per-parent
//! loops are deterministic for a given input stream.

use indexmap::IndexSet;

/// Contiguous run of identifiers handed to one lookup request.
pub type IdChunk = indexmap::set::Slice<String>;

/// Set of unique entity identifiers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdSet {
    ids: IndexSet<String>,
}

impl IdSet {
    /// Empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an identifier; returns `false` if it was already present.
    pub fn insert(&mut self, id: impl Into<String>) -> bool {
        self.ids.insert(id.into())
    }

    /// Whether the identifier is present.
    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    /// Number of unique identifiers.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Iterate in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.ids.iter().map(String::as_str)
    }

    /// Fixed-size chunks in insertion order; the last chunk may be shorter.
    ///
    /// # Panics
    /// Panics if `size` is zero.
    pub fn chunks(&self, size: usize) -> impl Iterator<Item = &IdChunk> {
        let len = self.ids.len();
        (0..len)
            .step_by(size)
            .filter_map(move |start| self.ids.get_range(start..(start + size).min(len)))
    }
}

impl<S: Into<String>> FromIterator<S> for IdSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = IdSet::new();
        set.extend(iter);
        set
    }
}

impl<S: Into<String>> Extend<S> for IdSet {
    fn extend<I: IntoIterator<Item = S>>(&mut self, iter: I) {
        self.ids.extend(iter.into_iter().map(Into::into));
    }
}
