//! Id allocation for synthesized agents.
//!
//! The surrounding platform owns the id space. Synthesis never keeps
//! global counters; it asks an injected allocator for the next id.

/// Hands out globally unique, monotonically increasing ids.
pub trait IdAllocator {
    fn next(&mut self) -> u64;
}

/// Plain counter starting at a configurable first id.
#[derive(Debug, Clone)]
pub struct SequentialIds {
    next_id: u64,
}

impl SequentialIds {
    pub fn starting_at(first: u64) -> Self {
        Self { next_id: first }
    }

    /// The id the next call to `next()` will return.
    pub fn peek(&self) -> u64 {
        self.next_id
    }
}

impl Default for SequentialIds {
    fn default() -> Self {
        Self::starting_at(1)
    }
}

impl IdAllocator for SequentialIds {
    fn next(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

/// The three allocators a synthesis run draws from.
pub struct AgentIds {
    pub households: Box<dyn IdAllocator>,
    pub persons:    Box<dyn IdAllocator>,
    pub dwellings:  Box<dyn IdAllocator>,
}

impl AgentIds {
    pub fn new(
        households: Box<dyn IdAllocator>,
        persons: Box<dyn IdAllocator>,
        dwellings: Box<dyn IdAllocator>,
    ) -> Self {
        Self { households, persons, dwellings }
    }

    /// Three independent counters, each starting at 1.
    pub fn sequential() -> Self {
        Self::new(
            Box::new(SequentialIds::default()),
            Box::new(SequentialIds::default()),
            Box::new(SequentialIds::default()),
        )
    }
}
