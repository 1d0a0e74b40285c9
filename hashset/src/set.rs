use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

use crossbeam_epoch::{self as epoch, Guard};
use lockfree::bucket_directory::BucketDirectory;
use lockfree::list::{self, List};
use lockfree::sort_key;

use crate::error::CreateError;

/// Default directory size a set starts with when no explicit capacity is
/// requested.
const DEFAULT_INITIAL_SIZE: usize = 16;

/// `count / size > LOAD_FACTOR` triggers a directory doubling, expressed as
/// the integer inequality `4 * count > 3 * size` to avoid floating point.
const LOAD_FACTOR_NUM: u64 = 3;
const LOAD_FACTOR_DEN: u64 = 4;

/// A lock-free, concurrent, extensible set of 32-bit unsigned keys, built on
/// a single split-ordered list: one lock-free ordered linked list provides
/// every mutation, and a growable directory of bucket pointers gives O(1)
/// expected entry points into it. Growing the set never rehashes existing
/// keys — only new bucket dummies are spliced into the already-ordered
/// list.
///
/// Every public method pins its own epoch guard internally; there is no
/// guard or handle for callers to manage. Dropping the last owner of a
/// `SplitOrderedHashSet` (directly, or via `Arc`) reclaims every node and
/// the current directory generation — this is the `destroy(h)` of the
/// design's external interface, expressed as ordinary Rust ownership.
///
/// Valid keys are `0..=0x7FFF_FFFF`: the sort-key encoding overwrites a
/// key's top bit, so a key with that bit already set would collide with
/// the same key without it. Passing such a key panics.
pub struct SplitOrderedHashSet {
    list: List<u32>,
    buckets: BucketDirectory,
    size: AtomicU32,
    count: AtomicUsize,
}

impl SplitOrderedHashSet {
    /// Creates a set with the default initial directory size (16).
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_INITIAL_SIZE)
            .expect("the default initial size is always a valid power of two >= 2")
    }

    /// Creates a set with a caller-chosen initial directory size, which must
    /// be a power of two of at least 2.
    pub fn with_capacity(initial_size: usize) -> Result<Self, CreateError> {
        if initial_size < 2 || !initial_size.is_power_of_two() {
            return Err(CreateError::InvalidInitialSize {
                requested: initial_size,
            });
        }

        let guard = epoch::pin();
        let list = List::new();
        let buckets = BucketDirectory::new(initial_size, &list, &guard);

        Ok(Self {
            list,
            buckets,
            size: AtomicU32::new(initial_size as u32),
            count: AtomicUsize::new(0),
        })
    }

    /// Returns whether `key` is a member of the set.
    pub fn contains(&self, key: u32) -> bool {
        Self::assert_valid_key(key);
        let guard = epoch::pin();
        let head = self.bucket_head(key, &guard);
        let (found, _) = list::find(head, &sort_key::regular_sort_key(key), &guard);
        found
    }

    /// Inserts `key`. Returns `true` if it was newly inserted, `false` if it
    /// was already present.
    pub fn insert(&self, key: u32) -> bool {
        Self::assert_valid_key(key);
        let guard = epoch::pin();
        let head = self.bucket_head(key, &guard);
        let inserted = list::insert(head, sort_key::regular_sort_key(key), &guard);
        if !inserted.is_new() {
            return false;
        }

        let new_count = self.count.fetch_add(1, Ordering::AcqRel) + 1;
        self.maybe_grow(new_count, &guard);
        true
    }

    /// Removes `key`. Returns `true` if it was present.
    pub fn remove(&self, key: u32) -> bool {
        Self::assert_valid_key(key);
        let guard = epoch::pin();
        let head = self.bucket_head(key, &guard);
        let removed = list::delete(head, &sort_key::regular_sort_key(key), &guard);
        if removed {
            self.count.fetch_sub(1, Ordering::AcqRel);
        }
        removed
    }

    /// An approximate count of live keys. Best-effort under concurrent
    /// mutation: a racing insert or remove may not yet be reflected.
    pub fn len(&self) -> usize {
        self.count.load(Ordering::Acquire)
    }

    /// Whether the set is (approximately) empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn bucket_head<'g>(&'g self, key: u32, guard: &'g Guard) -> &'g crossbeam_epoch::Atomic<lockfree::list::Node<u32>> {
        let size = self.size.load(Ordering::Acquire);
        let bucket = key % size;
        self.buckets.lookup_bucket(bucket, guard)
    }

    /// Requests growth if the freshly-observed load factor warrants it.
    /// Sampling `size` again here (rather than reusing the value `insert`
    /// used to pick a bucket) avoids repeatedly re-triggering a grow that
    /// just succeeded moments ago for a smaller `size`.
    fn maybe_grow(&self, new_count: usize, guard: &Guard) {
        let size = self.size.load(Ordering::Acquire);
        if LOAD_FACTOR_DEN * new_count as u64 > LOAD_FACTOR_NUM * size as u64 {
            self.try_grow(size, guard);
        }
    }

    /// Attempts to double `size` from `observed_size`. At most one caller
    /// racing on the same `observed_size` succeeds; the rest are no-ops, not
    /// retries — a directory wide enough for the new `size` is grown lazily
    /// on demand by `BucketDirectory`/`GrowableArray`, so a losing caller
    /// here has nothing to undo.
    fn try_grow(&self, observed_size: u32, _guard: &Guard) {
        let new_size = observed_size * 2;
        if self
            .size
            .compare_exchange(observed_size, new_size, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            tracing::debug!(from = observed_size, to = new_size, "hash set size doubled");
        }
    }

    fn assert_valid_key(key: u32) {
        assert!(
            key <= sort_key::MAX_KEY,
            "key {key} has its top bit set; valid keys are 0..=0x7FFF_FFFF"
        );
    }
}

impl Default for SplitOrderedHashSet {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_rejects_non_power_of_two_capacity() {
        assert_eq!(
            SplitOrderedHashSet::with_capacity(17).unwrap_err(),
            CreateError::InvalidInitialSize { requested: 17 }
        );
        assert_eq!(
            SplitOrderedHashSet::with_capacity(1).unwrap_err(),
            CreateError::InvalidInitialSize { requested: 1 }
        );
        assert!(SplitOrderedHashSet::with_capacity(32).is_ok());
    }

    #[test]
    #[should_panic]
    fn rejects_keys_with_the_top_bit_set() {
        let set = SplitOrderedHashSet::new();
        set.insert(0x8000_0000);
    }

    #[test]
    fn basic_insert_contains_remove() {
        let set = SplitOrderedHashSet::new();
        assert!(!set.contains(0));
        assert!(!set.contains(10));

        assert!(set.insert(0));
        assert!(set.insert(26));
        assert!(set.contains(0));
        assert!(!set.contains(10));

        assert!(set.remove(0));
        assert!(!set.contains(0));
        assert!(set.contains(26));
    }

    #[test]
    fn idempotent_insert() {
        let set = SplitOrderedHashSet::new();
        assert!(set.insert(5));
        assert!(!set.insert(5));
        assert!(!set.insert(5));
        assert_eq!(set.len(), 1);
    }

    // Size 16, load factor 0.75: growth triggers at count 13 and again at
    // 25, reaching at least 64. Membership of every inserted key must
    // survive each doubling.
    #[test]
    fn growth_is_transparent_to_membership() {
        let set = SplitOrderedHashSet::with_capacity(16).unwrap();
        for key in 0..50u32 {
            assert!(set.insert(key));
        }
        for key in 0..50u32 {
            assert!(set.contains(key), "missing key {key} after growth");
        }
        assert_eq!(set.len(), 50);
        assert!(set.size.load(Ordering::Acquire) >= 64);
    }

    // Regular keys never collide in sort key, regardless of bucket
    // assignment.
    #[test]
    fn odd_keys_get_distinct_sort_keys() {
        let set = SplitOrderedHashSet::new();
        for key in [1u32, 3, 5, 7, 9] {
            assert!(set.insert(key));
        }
        let mut sort_keys: Vec<u32> = [1u32, 3, 5, 7, 9]
            .iter()
            .map(|k| sort_key::regular_sort_key(*k))
            .collect();
        sort_keys.sort_unstable();
        sort_keys.dedup();
        assert_eq!(sort_keys.len(), 5);
    }

    #[test]
    fn remove_of_absent_key_is_false() {
        let set = SplitOrderedHashSet::new();
        assert!(!set.remove(42));
        set.insert(42);
        assert!(set.remove(42));
        assert!(!set.remove(42));
    }
}
