//! Generator matrix: exact dispatch on ordered ring-kind pairs.
//!
//! The matrix is generic over what it stores so that dispatch stays pure.
//! The application layer instantiates it with shared generator handles.

use std::collections::HashMap;

use crate::domain::ring::RingKind;

/// Ordered `(outer, inner)` key. `(A, B)` and `(B, A)` are different keys.
pub type KindPair = (RingKind, RingKind);

#[derive(Debug, Clone)]
pub struct GeneratorMatrix<G> {
    entries: HashMap<KindPair, G>,
}

impl<G> Default for GeneratorMatrix<G> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<G> GeneratorMatrix<G> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a generator for the ordered pair. A second registration for
    /// the same pair replaces the first and returns it.
    pub fn register(&mut self, outer: RingKind, inner: RingKind, generator: G) -> Option<G> {
        self.entries.insert((outer, inner), generator)
    }

    pub fn with(mut self, outer: RingKind, inner: RingKind, generator: G) -> Self {
        self.register(outer, inner, generator);
        self
    }

    /// Exact lookup. No wildcard, no fallback to a related kind.
    pub fn lookup(&self, outer: RingKind, inner: RingKind) -> Option<&G> {
        self.entries.get(&(outer, inner))
    }

    pub fn contains(&self, outer: RingKind, inner: RingKind) -> bool {
        self.entries.contains_key(&(outer, inner))
    }

    /// Registered pairs in a stable order.
    pub fn pairs(&self) -> Vec<KindPair> {
        let mut pairs: Vec<_> = self.entries.keys().copied().collect();
        pairs.sort();
        pairs
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
