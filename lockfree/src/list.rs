//! Lock-free ordered singly-linked list.
//!
//! Nodes are ordered ascending by `sort_key`. Deletion is logical-then-
//! physical: a node is first marked by tagging its own `next` pointer
//! (crossbeam-epoch's tag bit is exactly the "marked pointer" of the
//! design), then unlinked from its predecessor by CAS, by whichever thread
//! next walks past it. `find`/`insert`/`delete` all take the list head (or
//! any bucket directory slot — see `bucket_directory`) as an explicit
//! `&Atomic<Node<T>>` parameter, and `find` returns a `Cursor` the caller
//! threads into the following `insert`/`delete` call. There is no shared,
//! process-wide cursor.

use std::cmp::Ordering::{Equal, Greater, Less};
use std::sync::atomic::Ordering;

use crossbeam_epoch::{unprotected, Atomic, Guard, Owned, Shared};

/// A node of the ordered list.
///
/// The list stores no payload: this crate backs a *set*, not a map, and the
/// `sort_key` alone (a reversed-bit encoding of either a user key or a
/// dummy bucket delimiter) is both the ordering key and the only piece of
/// state a node carries.
#[derive(Debug)]
pub struct Node<T> {
    sort_key: T,
    next: Atomic<Node<T>>,
}

impl<T: Copy> Node<T> {
    /// The node's sort key.
    pub fn sort_key(&self) -> T {
        self.sort_key
    }
}

/// A lock-free ordered list of `Node<T>`, sorted ascending by `sort_key`.
#[derive(Debug)]
pub struct List<T> {
    head: Atomic<Node<T>>,
}

impl<T> Default for List<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> List<T> {
    /// Creates an empty list.
    pub fn new() -> Self {
        Self {
            head: Atomic::null(),
        }
    }

    /// The list's own head pointer, usable as a `find`/`insert`/`delete`
    /// entry point like any bucket directory slot.
    pub fn head(&self) -> &Atomic<Node<T>> {
        &self.head
    }
}

impl<T> Drop for List<T> {
    fn drop(&mut self) {
        unsafe {
            let guard = unprotected();
            let mut curr = self.head.load(Ordering::Relaxed, guard);
            while !curr.is_null() {
                let owned = curr.into_owned();
                curr = owned.next.load(Ordering::Relaxed, guard);
            }
        }
    }
}

/// A cursor into the list: `prev` is the atomic slot (a predecessor's
/// `next`, the list's own head, or a bucket directory slot) that currently
/// points at `curr`.
pub struct Cursor<'g, T> {
    prev: &'g Atomic<Node<T>>,
    curr: Shared<'g, Node<T>>,
}

impl<'g, T> Cursor<'g, T> {
    /// The node the cursor currently refers to (null if at the end of the
    /// list).
    pub fn current(&self) -> Shared<'g, Node<T>> {
        self.curr
    }
}

/// Outcome of [`insert`]: either a brand-new node was published, or an
/// equal-keyed node was already present.
pub enum Inserted<'g, T> {
    Created(Shared<'g, Node<T>>),
    Existing(Shared<'g, Node<T>>),
}

impl<'g, T> Inserted<'g, T> {
    /// The node at the key regardless of whether it was just created.
    pub fn node(&self) -> Shared<'g, Node<T>> {
        match *self {
            Inserted::Created(n) | Inserted::Existing(n) => n,
        }
    }

    /// Whether this call actually published a new node.
    pub fn is_new(&self) -> bool {
        matches!(self, Inserted::Created(_))
    }
}

/// Walks `head` for the first node whose `sort_key >= key`, physically
/// unlinking any logically-deleted node along the way. Returns whether that
/// node's key equals `key`, plus a cursor usable by an immediately
/// following `insert`/`delete`.
///
/// This is the Harris/Michael find: unlinking a marked node is a single CAS
/// of the predecessor's `next`; on CAS failure the whole walk restarts from
/// `head` (a concurrent mutation invalidated `prev`).
pub fn find<'g, T: Ord>(
    head: &'g Atomic<Node<T>>,
    key: &T,
    guard: &'g Guard,
) -> (bool, Cursor<'g, T>) {
    loop {
        if let Ok(result) = find_once(head, key, guard) {
            return result;
        }
    }
}

fn find_once<'g, T: Ord>(
    head: &'g Atomic<Node<T>>,
    key: &T,
    guard: &'g Guard,
) -> Result<(bool, Cursor<'g, T>), ()> {
    let mut prev = head;
    let mut curr = prev.load(Ordering::Acquire, guard);

    loop {
        let curr_ref = match unsafe { curr.as_ref() } {
            None => return Ok((false, Cursor { prev, curr })),
            Some(n) => n,
        };

        let next = curr_ref.next.load(Ordering::Acquire, guard);
        if next.tag() == 0 {
            match curr_ref.sort_key.cmp(key) {
                Less => {
                    prev = &curr_ref.next;
                    curr = next;
                }
                Equal => return Ok((true, Cursor { prev, curr })),
                Greater => return Ok((false, Cursor { prev, curr })),
            }
        } else {
            // `curr` is logically deleted. Help unlink it, then keep going
            // from the same predecessor.
            let unmarked_next = next.with_tag(0);
            match prev.compare_exchange(curr, unmarked_next, Ordering::AcqRel, Ordering::Acquire, guard) {
                Ok(_) => {
                    unsafe { guard.defer_destroy(curr) };
                    curr = unmarked_next;
                }
                Err(_) => return Err(()),
            }
        }
    }
}

/// Inserts a node with the given `sort_key` into the list rooted at `head`.
/// Duplicate sort keys are never inserted; the existing node is returned
/// instead so callers (in particular the bucket directory, splicing in a
/// dummy that lost a race) can reuse it.
pub fn insert<'g, T: Ord + Copy>(
    head: &'g Atomic<Node<T>>,
    sort_key: T,
    guard: &'g Guard,
) -> Inserted<'g, T> {
    let mut node = Owned::new(Node {
        sort_key,
        next: Atomic::null(),
    });

    loop {
        let (found, cursor) = find(head, &sort_key, guard);
        if found {
            return Inserted::Existing(cursor.curr);
        }

        node.next.store(cursor.curr, Ordering::Relaxed);
        match cursor
            .prev
            .compare_exchange(cursor.curr, node, Ordering::AcqRel, Ordering::Acquire, guard)
        {
            Ok(published) => return Inserted::Created(published),
            Err(e) => node = e.new,
        }
    }
}

/// Removes the node with the given `sort_key`, if present. Returns whether
/// a node was removed.
///
/// Linearizes at the CAS that sets the deletion mark; the subsequent
/// physical unlink is best-effort (a losing CAS there just leaves the work
/// for the next traverser.
pub fn delete<'g, T: Ord + Copy>(head: &'g Atomic<Node<T>>, key: &T, guard: &'g Guard) -> bool {
    loop {
        let (found, cursor) = find(head, key, guard);
        if !found {
            return false;
        }

        let curr_ref = unsafe { cursor.curr.deref() };
        let next = curr_ref.next.load(Ordering::Acquire, guard);
        if next.tag() == 1 {
            // Someone else is deleting the same node; retry the find.
            continue;
        }

        let marked_next = next.with_tag(1);
        if curr_ref
            .next
            .compare_exchange(next, marked_next, Ordering::AcqRel, Ordering::Acquire, guard)
            .is_err()
        {
            continue;
        }

        if cursor
            .prev
            .compare_exchange(cursor.curr, next, Ordering::AcqRel, Ordering::Acquire, guard)
            .is_ok()
        {
            unsafe { guard.defer_destroy(cursor.curr) };
        } else {
            // Let the next traverser finish the physical unlink.
            let _ = find(head, key, guard);
        }
        return true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_epoch as epoch;

    #[test]
    fn insert_find_delete_roundtrip() {
        let list: List<u32> = List::new();
        let guard = epoch::pin();

        assert!(insert(list.head(), 5, &guard).is_new());
        assert!(!insert(list.head(), 5, &guard).is_new());

        let (found, _) = find(list.head(), &5, &guard);
        assert!(found);

        assert!(delete(list.head(), &5, &guard));
        let (found, _) = find(list.head(), &5, &guard);
        assert!(!found);
        assert!(!delete(list.head(), &5, &guard));
    }

    #[test]
    fn order_is_maintained() {
        let list: List<u32> = List::new();
        let guard = epoch::pin();
        for key in [9, 1, 5, 3, 7] {
            insert(list.head(), key, &guard);
        }

        let mut seen = Vec::new();
        let mut curr = list.head().load(Ordering::Acquire, &guard);
        while let Some(n) = unsafe { curr.as_ref() } {
            seen.push(n.sort_key());
            curr = n.next.load(Ordering::Acquire, &guard);
        }
        assert_eq!(seen, vec![1, 3, 5, 7, 9]);
    }

    #[test]
    fn concurrent_disjoint_inserts_converge() {
        use crossbeam_utils::thread;

        let list: List<u32> = List::new();
        thread::scope(|scope| {
            for t in 0..8u32 {
                let list = &list;
                scope.spawn(move |_| {
                    let guard = epoch::pin();
                    for i in 0..64u32 {
                        assert!(insert(list.head(), t * 64 + i, &guard).is_new());
                    }
                });
            }
        })
        .unwrap();

        let guard = epoch::pin();
        for key in 0..(8 * 64) {
            let (found, _) = find(list.head(), &key, &guard);
            assert!(found, "missing key {key}");
        }
    }

    #[test]
    fn randomized_insert_delete_matches_a_btreeset_model() {
        use rand::rngs::StdRng;
        use rand::{Rng, SeedableRng};
        use std::collections::BTreeSet;

        let list: List<u32> = List::new();
        let mut model = BTreeSet::new();
        let mut rng = StdRng::seed_from_u64(42);
        let guard = epoch::pin();

        for _ in 0..2000 {
            let key = rng.gen_range(0..500u32);
            if rng.gen_bool(0.5) {
                assert_eq!(insert(list.head(), key, &guard).is_new(), model.insert(key));
            } else {
                assert_eq!(delete(list.head(), &key, &guard), model.remove(&key));
            }
        }

        let mut seen = Vec::new();
        let mut curr = list.head().load(Ordering::Acquire, &guard);
        while let Some(n) = unsafe { curr.as_ref() } {
            seen.push(n.sort_key());
            curr = n.next.load(Ordering::Acquire, &guard);
        }
        assert_eq!(seen, model.into_iter().collect::<Vec<_>>());
    }
}

#[cfg(feature = "check-loom")]
mod loom_tests {
    use super::*;

    #[test]
    fn two_threads_insert_disjoint_keys() {
        loom::model(|| {
            let list = std::sync::Arc::new(List::<u32>::new());
            let a = {
                let list = list.clone();
                loom::thread::spawn(move || {
                    let guard = crossbeam_epoch::pin();
                    insert(list.head(), 1, &guard).is_new()
                })
            };
            let b = {
                let list = list.clone();
                loom::thread::spawn(move || {
                    let guard = crossbeam_epoch::pin();
                    insert(list.head(), 2, &guard).is_new()
                })
            };
            assert!(a.join().unwrap());
            assert!(b.join().unwrap());

            let guard = crossbeam_epoch::pin();
            assert!(find(list.head(), &1, &guard).0);
            assert!(find(list.head(), &2, &guard).0);
        });
    }
}
