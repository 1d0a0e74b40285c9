//! The split-ordered bucket directory: a growable array of dummy-node
//! pointers into the list, with on-demand, recursively-correct
//! initialization.
//!
//! Only bucket 0 is initialized eagerly (by [`BucketDirectory::new`],
//! against the list's own head); every other bucket `b` is initialized the
//! first time it is looked up, which first recurses to guarantee
//! `parent(b)` is initialized, then splices a dummy keyed `dummy_sort_key(b)`
//! into the list starting from `parent(b)`'s directory slot. Concurrent
//! initializations of the same bucket are safe without any extra
//! synchronization: the underlying list never admits two nodes with the
//! same sort key, so every racing initializer converges on the same dummy,
//! and publishing it into the directory slot is idempotent.

use std::sync::atomic::Ordering;

use crossbeam_epoch::{Atomic, Guard};

use crate::list::{self, List, Node};
use crate::sort_key;
use crate::growable_array::GrowableArray;

pub struct BucketDirectory {
    buckets: GrowableArray<Node<u32>>,
}

impl BucketDirectory {
    /// Creates a directory of `initial_len` buckets and eagerly installs
    /// bucket 0's dummy (sort key 0) at the head of `list`.
    pub fn new(initial_len: usize, list: &List<u32>, guard: &Guard) -> Self {
        let buckets = GrowableArray::new(initial_len);
        let dummy = list::insert(list.head(), sort_key::dummy_sort_key(0), guard).node();
        buckets.get(0, guard).store(dummy, Ordering::Release);
        BucketDirectory { buckets }
    }

    /// Returns the directory slot delimiting bucket `index`, initializing
    /// it (and any uninitialized ancestor) first if necessary.
    pub fn lookup_bucket<'g>(&'g self, index: u32, guard: &'g Guard) -> &'g Atomic<Node<u32>> {
        let slot = self.buckets.get(index as usize, guard);
        if slot.load(Ordering::Acquire, guard).is_null() {
            self.initialize_bucket(index, guard);
        }
        self.buckets.get(index as usize, guard)
    }

    fn initialize_bucket<'g>(&'g self, index: u32, guard: &'g Guard) {
        debug_assert_ne!(index, 0, "bucket 0 is initialized eagerly in `new`");

        let parent_index = sort_key::parent(index);
        let parent_slot = self.buckets.get(parent_index as usize, guard);
        if parent_slot.load(Ordering::Acquire, guard).is_null() {
            self.initialize_bucket(parent_index, guard);
        }

        // Re-fetch: a concurrent growth may have widened the directory
        // between the check above and here, and we want the freshest
        // generation's slot as our splice point.
        let parent_head = self.buckets.get(parent_index as usize, guard);
        let dummy_key = sort_key::dummy_sort_key(index);
        let dummy = list::insert(parent_head, dummy_key, guard).node();

        tracing::trace!(bucket = index, parent = parent_index, "bucket initialized");
        self.buckets
            .get(index as usize, guard)
            .store(dummy, Ordering::Release);
    }
}
