//! Unique region names.
//!
//! A [`NameAllocator`] hands out indices from a lock-free counter. Indices
//! are unique among all callers of the same allocator within one process
//! run; they are not unique across runs. The process-wide default lives in
//! [`NameAllocator::global`], and isolated allocators can be created for
//! tests or injected into a [`RegionMapper`](crate::RegionMapper).

use std::borrow::Cow;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{MemError, MemResult};

/// Prefix of generated file names, giving `Data_0`, `Data_1`, ...
pub const DEFAULT_NAME_PREFIX: &str = "Data_";

#[derive(Debug)]
pub struct NameAllocator {
    counter: AtomicU64,
    prefix: Cow<'static, str>,
}

impl NameAllocator {
    pub const fn new() -> Self {
        Self {
            counter: AtomicU64::new(0),
            prefix: Cow::Borrowed(DEFAULT_NAME_PREFIX),
        }
    }

    pub fn with_prefix(prefix: impl Into<Cow<'static, str>>) -> Self {
        Self {
            counter: AtomicU64::new(0),
            prefix: prefix.into(),
        }
    }

    /// Start counting at `start` instead of zero.
    #[must_use]
    pub fn starting_at(self, start: u64) -> Self {
        self.counter.store(start, Ordering::Relaxed);
        self
    }

    /// The process-wide allocator.
    pub fn global() -> &'static NameAllocator {
        static GLOBAL: NameAllocator = NameAllocator::new();
        &GLOBAL
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Next index to be handed out.
    pub fn peek(&self) -> u64 {
        self.counter.load(Ordering::Relaxed)
    }

    /// Atomically advance the counter and return its prior value.
    ///
    /// Fails with [`MemError::NamesExhausted`] instead of wrapping around.
    pub fn next_index(&self) -> MemResult<u64> {
        self.counter
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_add(1))
            .map_err(|_| MemError::NamesExhausted)
    }

    /// Decimal form of [`next_index`](Self::next_index).
    pub fn allocate_file_index(&self) -> MemResult<String> {
        self.next_index().map(|index| index.to_string())
    }

    /// `prefix` followed by a fresh index.
    pub fn allocate_file_name(&self) -> MemResult<String> {
        let index = self.next_index()?;
        Ok(format!("{}{}", self.prefix, index))
    }
}

impl Default for NameAllocator {
    fn default() -> Self {
        Self::new()
    }
}

/// Allocate an index from the process-wide allocator.
pub fn allocate_file_index() -> MemResult<String> {
    NameAllocator::global().allocate_file_index()
}

/// Allocate a `Data_<index>` name from the process-wide allocator.
pub fn allocate_file_name() -> MemResult<String> {
    NameAllocator::global().allocate_file_name()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequential_indices() {
        let names = NameAllocator::new();
        assert_eq!(names.allocate_file_index().unwrap(), "0");
        assert_eq!(names.allocate_file_index().unwrap(), "1");
        assert_eq!(names.allocate_file_name().unwrap(), "Data_2");
        assert_eq!(names.peek(), 3);
    }

    #[test]
    fn test_custom_prefix() {
        let names = NameAllocator::with_prefix("Log_").starting_at(41);
        assert_eq!(names.prefix(), "Log_");
        assert_eq!(names.allocate_file_name().unwrap(), "Log_41");
    }

    #[test]
    fn test_exhaustion_is_reported() {
        let names = NameAllocator::new().starting_at(u64::MAX - 1);
        assert_eq!(names.next_index().unwrap(), u64::MAX - 1);
        assert!(matches!(names.next_index(), Err(MemError::NamesExhausted)));
        // a failed allocation leaves the counter untouched
        assert_eq!(names.peek(), u64::MAX);
        assert!(matches!(
            names.allocate_file_name(),
            Err(MemError::NamesExhausted)
        ));
    }

    #[test]
    fn test_global_names_are_distinct() {
        let a = allocate_file_name().unwrap();
        let b = allocate_file_name().unwrap();
        assert_ne!(a, b);
        assert!(a.starts_with(DEFAULT_NAME_PREFIX));
        assert!(allocate_file_index().unwrap().parse::<u64>().is_ok());
    }
}
