//! Ordered, pool-backed duplicate-detection index over URL strings.
//!
//! Insertion is an explicit binary-search-tree walk expressed
//! iteratively rather than recursively: it's the natural shape of a
//! BST descent and it can't blow the stack on a pathologically sorted
//! insertion sequence.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::pool::{Pool, PoolIndex};

struct UrlEntry {
    url: String,
    request_count: u32,
    left: Option<PoolIndex>,
    right: Option<PoolIndex>,
    parent: Option<PoolIndex>,
}

struct Inner {
    pool: Pool<UrlEntry>,
    root: Option<PoolIndex>,
    /// Allocation order, which is insertion order: the crawl loop
    /// fetches a level's URLs in the order they were discovered, not
    /// in the BST's sorted order.
    order: Vec<PoolIndex>,
}

/// An ordered lookup structure over one cache's URLs. Two of these
/// exist at a time (the filling and draining caches); `len()` is kept
/// on a separate atomic so a status-sink reader can poll it without
/// taking the insert/lookup mutex.
pub struct UrlIndex {
    inner: Mutex<Inner>,
    len: AtomicUsize,
}

impl UrlIndex {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                pool: Pool::new(),
                root: None,
                order: Vec::new(),
            }),
            len: AtomicUsize::new(0),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.len.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `true` iff `url` is already present.
    #[must_use]
    pub fn contains(&self, url: &str) -> bool {
        let inner = self.inner.lock();
        find(&inner, url).is_some()
    }

    /// Insert `url` if absent. Returns `true` if it was newly
    /// inserted, `false` if it was already present.
    pub fn insert(&self, url: &str) -> bool {
        let mut inner = self.inner.lock();
        if find(&inner, url).is_some() {
            return false;
        }

        let entry = UrlEntry {
            url: url.to_string(),
            request_count: 0,
            left: None,
            right: None,
            parent: None,
        };

        let new_idx = inner.pool.alloc(entry);
        inner.order.push(new_idx);

        let Some(root) = inner.root else {
            inner.root = Some(new_idx);
            self.len.fetch_add(1, Ordering::Relaxed);
            return true;
        };

        let mut cursor = root;
        loop {
            let cursor_url_cmp = inner.pool.get(cursor).url.as_str().cmp(url);
            let next = match cursor_url_cmp {
                std::cmp::Ordering::Greater => &mut inner.pool.get_mut(cursor).left,
                std::cmp::Ordering::Less => &mut inner.pool.get_mut(cursor).right,
                std::cmp::Ordering::Equal => unreachable!("checked by find() above"),
            };
            match *next {
                Some(child) => cursor = child,
                None => {
                    *next = Some(new_idx);
                    inner.pool.get_mut(new_idx).parent = Some(cursor);
                    break;
                }
            }
        }
        self.len.fetch_add(1, Ordering::Relaxed);
        true
    }

    /// Drop every entry, ready to be reused as the next level's
    /// filling cache.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.pool.clear();
        inner.root = None;
        inner.order.clear();
        self.len.store(0, Ordering::Relaxed);
    }

    /// URLs in the order they were inserted (insertion order, not
    /// sorted order - this is what the per-level fetch loop iterates).
    #[must_use]
    pub fn urls_in_insertion_order(&self) -> Vec<String> {
        let inner = self.inner.lock();
        inner
            .order
            .iter()
            .map(|idx| inner.pool.get(*idx).url.clone())
            .collect()
    }

    /// In-order (sorted) traversal, exposed for the dedup property
    /// tests.
    #[must_use]
    pub fn urls_sorted(&self) -> Vec<String> {
        let inner = self.inner.lock();
        let mut out = Vec::with_capacity(inner.order.len());
        if let Some(root) = inner.root {
            in_order(&inner.pool, root, &mut out);
        }
        out
    }

    /// Bump the request counter for `url`, used to track re-fetches of
    /// the same page within a level (HEAD then GET).
    pub fn bump_request_count(&self, url: &str) {
        let mut inner = self.inner.lock();
        if let Some(idx) = find(&inner, url) {
            inner.pool.get_mut(idx).request_count += 1;
        }
    }
}

impl Default for UrlIndex {
    fn default() -> Self {
        Self::new()
    }
}

fn find(inner: &Inner, url: &str) -> Option<PoolIndex> {
    let mut cursor = inner.root?;
    loop {
        let entry = inner.pool.get(cursor);
        cursor = match entry.url.as_str().cmp(url) {
            std::cmp::Ordering::Equal => return Some(cursor),
            std::cmp::Ordering::Greater => entry.left?,
            std::cmp::Ordering::Less => entry.right?,
        };
    }
}

fn in_order(pool: &Pool<UrlEntry>, node: PoolIndex, out: &mut Vec<String>) {
    let entry = pool.get(node);
    let (left, right) = (entry.left, entry.right);
    if let Some(left) = left {
        in_order(pool, left, out);
    }
    out.push(pool.get(node).url.clone());
    if let Some(right) = right {
        in_order(pool, right, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_deduplicates() {
        let idx = UrlIndex::new();
        assert!(idx.insert("http://x.test/a"));
        assert!(!idx.insert("http://x.test/a"));
        assert_eq!(idx.len(), 1);
    }

    #[test]
    fn sorted_traversal_is_sorted() {
        let idx = UrlIndex::new();
        for u in ["http://x.test/c", "http://x.test/a", "http://x.test/b"] {
            idx.insert(u);
        }
        let sorted = idx.urls_sorted();
        let mut expect = sorted.clone();
        expect.sort();
        assert_eq!(sorted, expect);
    }

    #[test]
    fn insertion_order_is_preserved_for_fetch_loop() {
        let idx = UrlIndex::new();
        let inserted = ["http://x.test/c", "http://x.test/a", "http://x.test/b"];
        for u in inserted {
            idx.insert(u);
        }
        assert_eq!(idx.urls_in_insertion_order(), inserted.to_vec());
    }

    #[test]
    fn clear_allows_reuse() {
        let idx = UrlIndex::new();
        idx.insert("http://x.test/a");
        idx.clear();
        assert!(idx.is_empty());
        assert!(!idx.contains("http://x.test/a"));
        idx.insert("http://x.test/a");
        assert!(idx.contains("http://x.test/a"));
    }

    proptest::proptest! {
        #[test]
        fn property_insert_then_sorted_matches_distinct_set(urls in proptest::collection::vec("[a-c]{1,3}", 0..40)) {
            let idx = UrlIndex::new();
            let mut expected = std::collections::BTreeSet::new();
            for u in &urls {
                idx.insert(u);
                expected.insert(u.clone());
            }
            let sorted = idx.urls_sorted();
            let expected: Vec<String> = expected.into_iter().collect();
            prop_assert_eq!(sorted, expected);
        }
    }
}
