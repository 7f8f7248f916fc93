//! Growable byte buffer with the head/tail cursor vocabulary the HTTP
//! codec and link rewriter are built on.
//!
//! The underlying storage is a plain `Vec<u8>`; growth and reallocation
//! are handled by the allocator, so unlike a hand-rolled arena there is
//! no address to keep stable and no relocation sweep to perform. What's
//! preserved from that model is the *operation vocabulary* -
//! `append`/`collapse`/`shift`/`snip` - because the codec's read loop and
//! the rewriter's in-place substitution are both naturally expressed in
//! terms of it.

/// A contiguous, growable byte region addressed by offsets rather than
/// pointers, so callers can hold an offset across an operation that may
/// reallocate without it dangling.
#[derive(Debug, Default, Clone)]
pub struct ByteBuffer {
    data: Vec<u8>,
    head: usize,
}

impl ByteBuffer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
            head: 0,
        }
    }

    /// Live bytes, i.e. `[head, tail)`.
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.data[self.head..]
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len() - self.head
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Offset of one past the last live byte, measured from `head`.
    #[must_use]
    pub fn tail(&self) -> usize {
        self.len()
    }

    /// Append bytes at `tail`, growing the allocation if needed.
    pub fn append(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
        self.integrity();
    }

    /// Remove `count` bytes at `offset` (relative to `head`) by
    /// left-shifting the suffix. Decreases `tail`. Does not grow.
    pub fn collapse(&mut self, offset: usize, count: usize) {
        if count == 0 {
            return;
        }
        let start = self.head + offset;
        let end = (start + count).min(self.data.len());
        self.data.drain(start..end);
        self.integrity();
    }

    /// Insert `count` zero bytes at `offset` (relative to `head`) by
    /// right-shifting the suffix. May grow the allocation.
    pub fn shift(&mut self, offset: usize, count: usize) {
        if count == 0 {
            return;
        }
        let at = self.head + offset;
        let at = at.min(self.data.len());
        self.data.splice(at..at, std::iter::repeat_n(0u8, count));
        self.integrity();
    }

    /// Insert `bytes` at `offset` (relative to `head`), right-shifting
    /// the suffix. The general form of [`Self::shift`], which always
    /// inserts zeros; this inserts the given content directly so
    /// callers don't need a shift followed by a manual fill-in.
    pub fn insert(&mut self, offset: usize, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }
        let at = (self.head + offset).min(self.data.len());
        self.data.splice(at..at, bytes.iter().copied());
        self.integrity();
    }

    /// Decrease `tail` by `n`, discarding the trailing `n` live bytes.
    pub fn snip(&mut self, n: usize) {
        let new_len = self.data.len().saturating_sub(n.min(self.len()));
        self.data.truncate(new_len.max(self.head));
        self.integrity();
    }

    /// Drop all live bytes before `offset` (relative to `head`),
    /// advancing `head`. Used after a request/response has been
    /// fully framed to discard the header without copying the body.
    pub fn advance_head(&mut self, offset: usize) {
        self.head = (self.head + offset).min(self.data.len());
        self.integrity();
    }

    /// Reset the buffer to empty, reusing its allocation.
    pub fn clear(&mut self) {
        self.data.clear();
        self.head = 0;
    }

    /// `data ≤ head ≤ tail ≤ end` - always true by construction for a
    /// `Vec`-backed buffer, but kept as an explicit assertion so the
    /// invariant stays visible at the call sites that matter (after a
    /// `collapse`/`shift` pair in the link rewriter, in particular).
    fn integrity(&self) {
        debug_assert!(self.head <= self.data.len());
    }

    /// Find the first occurrence of `needle` within the live region,
    /// returning an offset relative to `head`.
    #[must_use]
    pub fn find(&self, needle: &[u8]) -> Option<usize> {
        find_subslice(self.as_slice(), needle)
    }

    #[must_use]
    pub fn find_from(&self, start: usize, needle: &[u8]) -> Option<usize> {
        let slice = self.as_slice();
        if start > slice.len() {
            return None;
        }
        find_subslice(&slice[start..], needle).map(|pos| pos + start)
    }
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
