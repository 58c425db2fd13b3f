//! Bump arena allocation and scratch-arena discipline.
//!
//! `Arena` is a single growable byte region with a bump offset; allocations
//! never move relative to each other because nothing is ever freed except by
//! `reset`, which rewinds the offset to zero. Callers never receive a borrow
//! tied to the arena's lifetime: every allocation returns an `ArenaOffset`
//! handle that must be resolved back through the arena that produced it, so
//! a later allocation growing the backing `Vec<u8>` can never invalidate an
//! outstanding reference.
//!
//! `ScratchArena` layers LIFO save-points onto a thread-local pair of arenas,
//! mirroring the "two scratch arenas per thread, pick the one that does not
//! conflict with a caller-supplied arena" contract used throughout the text
//! and render subsystems.

use std::cell::RefCell;

const CHUNK_SIZE: usize = 64 * 1024;
const GROWING_SLICE_FLOOR: usize = 128;

#[cfg(debug_assertions)]
const POISON_RESET: u8 = 0xDD;
#[cfg(debug_assertions)]
const POISON_GROW: u8 = 0xCD;

/// A handle to a byte range inside an `Arena`. Never dereferenced directly;
/// always resolved through the arena that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArenaOffset {
    offset: u32,
    len: u32,
}

impl ArenaOffset {
    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// A unique identity for an arena instance, used by `scratch_begin` to avoid
/// handing out an arena that aliases one the caller already holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArenaId(usize);

/// A contiguous bump-allocated byte region.
///
/// Invariant: `offset <= data.len() <= capacity`. `alloc` panics if growing
/// past `capacity` would be required; the core has no recovery strategy for
/// an arena that has genuinely run out of room, so this mirrors the
/// documented abort-on-allocation-exhaustion policy.
pub struct Arena {
    data: Vec<u8>,
    offset: usize,
    capacity: usize,
}

impl Arena {
    pub fn new(capacity: usize) -> Self {
        Self {
            data: Vec::new(),
            offset: 0,
            capacity,
        }
    }

    pub fn id(&self) -> ArenaId {
        ArenaId(self.data.as_ptr() as usize)
    }

    pub fn len(&self) -> usize {
        self.offset
    }

    pub fn is_empty(&self) -> bool {
        self.offset == 0
    }

    /// Reserve room for `additional` more bytes beyond the current offset,
    /// growing the backing vector in `CHUNK_SIZE` increments and poisoning
    /// the newly committed region in debug builds.
    fn reserve_committed(&mut self, additional: usize) {
        let needed = self.offset + additional;
        if needed > self.capacity {
            panic!("arena capacity exceeded: requested {needed}, capacity {}", self.capacity);
        }
        if needed <= self.data.len() {
            return;
        }
        let grown_to = needed.div_ceil(CHUNK_SIZE) * CHUNK_SIZE;
        let grown_to = grown_to.min(self.capacity).max(needed);
        let old_len = self.data.len();
        if old_len > 0 {
            tracing::warn!(target: "arena", old_len, grown_to, "arena_grew");
        }
        self.data.resize(grown_to, 0);
        #[cfg(debug_assertions)]
        {
            for b in &mut self.data[old_len..] {
                *b = POISON_GROW;
            }
        }
        let _ = old_len;
    }

    fn align_offset(offset: usize, align: usize) -> usize {
        (offset + align - 1) & !(align - 1)
    }

    /// Bump-allocate `len` bytes aligned to `align`, returning a handle.
    pub fn alloc(&mut self, len: usize, align: usize) -> ArenaOffset {
        debug_assert!(align.is_power_of_two());
        let aligned = Self::align_offset(self.offset, align);
        self.reserve_committed((aligned - self.offset) + len);
        self.offset = aligned + len;
        ArenaOffset {
            offset: aligned as u32,
            len: len as u32,
        }
    }

    pub fn alloc_bytes(&mut self, bytes: &[u8]) -> ArenaOffset {
        let handle = self.alloc(bytes.len(), 1);
        self.get_mut(handle).copy_from_slice(bytes);
        handle
    }

    pub fn get(&self, handle: ArenaOffset) -> &[u8] {
        let start = handle.offset as usize;
        let end = start + handle.len as usize;
        &self.data[start..end]
    }

    pub fn get_mut(&mut self, handle: ArenaOffset) -> &mut [u8] {
        let start = handle.offset as usize;
        let end = start + handle.len as usize;
        &mut self.data[start..end]
    }

    /// `true` iff `handle` is the most recent allocation, i.e. it ends at the
    /// current bump offset. Used by `GrowingSlice` to decide whether a grow
    /// can happen in place.
    pub fn is_tail(&self, handle: ArenaOffset) -> bool {
        (handle.offset + handle.len) as usize == self.offset
    }

    /// Rewind the bump offset to zero without releasing the backing storage.
    /// In debug builds the reclaimed region is poisoned so stale handles read
    /// back garbage instead of silently-still-valid data.
    pub fn reset(&mut self) {
        #[cfg(debug_assertions)]
        {
            for b in &mut self.data[..self.offset] {
                *b = POISON_RESET;
            }
        }
        self.offset = 0;
    }
}

/// A resizable byte sequence embedded in an arena. Grows in place when its
/// tail coincides with the arena's bump offset; otherwise reallocates and
/// copies, doubling capacity with a floor of `GROWING_SLICE_FLOOR` bytes.
pub struct GrowingSlice {
    handle: ArenaOffset,
    len: usize,
}

impl GrowingSlice {
    pub fn new() -> Self {
        Self {
            handle: ArenaOffset { offset: 0, len: 0 },
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_slice<'a>(&self, arena: &'a Arena) -> &'a [u8] {
        &arena.get(self.handle)[..self.len]
    }

    fn capacity(&self) -> usize {
        self.handle.len()
    }

    fn grow_to(&mut self, arena: &mut Arena, min_capacity: usize) {
        if min_capacity <= self.capacity() {
            return;
        }
        let mut new_cap = self.capacity().max(GROWING_SLICE_FLOOR);
        while new_cap < min_capacity {
            new_cap *= 2;
        }
        if self.capacity() > 0 && arena.is_tail(self.handle) {
            let extra = new_cap - self.capacity();
            let grown = arena.alloc(extra, 1);
            debug_assert_eq!(grown.offset, self.handle.offset + self.handle.len);
            self.handle = ArenaOffset {
                offset: self.handle.offset,
                len: self.handle.len + grown.len,
            };
        } else {
            let new_handle = arena.alloc(new_cap, 1);
            if self.len > 0 {
                // New allocation always lands past the old one, so the
                // ranges never overlap.
                copy_within_arena(arena, self.handle.offset as usize, new_handle.offset as usize, self.len);
            }
            self.handle = new_handle;
        }
    }

    /// Append bytes, growing the backing allocation as needed.
    pub fn append(&mut self, arena: &mut Arena, suffix: &[u8]) {
        self.grow_to(arena, self.len + suffix.len());
        let start = self.handle.offset as usize + self.len;
        arena.data[start..start + suffix.len()].copy_from_slice(suffix);
        self.len += suffix.len();
    }

    /// Append `rep` repeated `count` times using doubling: copy `rep` once,
    /// then repeatedly double the already-written region, halving the number
    /// of memcpy calls relative to appending `rep` one copy at a time.
    pub fn append_repeat(&mut self, arena: &mut Arena, rep: &[u8], count: usize) {
        if count == 0 || rep.is_empty() {
            return;
        }
        self.append(arena, rep);
        let mut written = rep.len();
        let target = rep.len() * count;
        self.grow_to(arena, target);
        while written < target {
            let take = written.min(target - written);
            let start = self.handle.offset as usize + self.len;
            let src_start = self.handle.offset as usize + self.len - written;
            copy_within_arena(arena, src_start, start, take);
            self.len += take;
            written += take;
        }
    }

    /// Append the decimal representation of `v`, consuming digits two at a
    /// time via a lookup table keyed by `v % 100` to halve the number of
    /// division operations relative to one-digit-at-a-time formatting.
    pub fn append_decimal(&mut self, arena: &mut Arena, v: u64) {
        const TWO_DIGIT_LUT: [[u8; 2]; 100] = {
            let mut table = [[0u8; 2]; 100];
            let mut i = 0;
            while i < 100 {
                table[i] = [b'0' + (i / 10) as u8, b'0' + (i % 10) as u8];
                i += 1;
            }
            table
        };

        if v == 0 {
            self.append(arena, b"0");
            return;
        }
        let mut digits = [0u8; 20];
        let mut pos = digits.len();
        let mut n = v;
        while n >= 100 {
            pos -= 2;
            digits[pos..pos + 2].copy_from_slice(&TWO_DIGIT_LUT[(n % 100) as usize]);
            n /= 100;
        }
        if n >= 10 {
            pos -= 2;
            digits[pos..pos + 2].copy_from_slice(&TWO_DIGIT_LUT[n as usize]);
        } else {
            pos -= 1;
            digits[pos] = b'0' + n as u8;
        }
        self.append(arena, &digits[pos..]);
    }
}

impl Default for GrowingSlice {
    fn default() -> Self {
        Self::new()
    }
}

fn copy_within_arena(arena: &mut Arena, src: usize, dst: usize, len: usize) {
    arena.data.copy_within(src..src + len, dst);
}

thread_local! {
    static SCRATCH: [RefCell<Arena>; 2] = [
        RefCell::new(Arena::new(64 * 1024 * 1024)),
        RefCell::new(Arena::new(64 * 1024 * 1024)),
    ];
}

/// A LIFO save-point into one of the thread's two scratch arenas. Ending a
/// guard out of order (ending an outer guard while an inner one is live) is
/// a programming error caught by `debug_assert!` in `Drop`.
pub struct ScratchGuard {
    slot: usize,
    save_offset: usize,
}

impl ScratchGuard {
    pub fn arena_id(&self) -> ArenaId {
        SCRATCH.with(|s| s[self.slot].borrow().id())
    }

    pub fn with_arena<R>(&self, f: impl FnOnce(&mut Arena) -> R) -> R {
        SCRATCH.with(|s| f(&mut s[self.slot].borrow_mut()))
    }
}

impl Drop for ScratchGuard {
    fn drop(&mut self) {
        SCRATCH.with(|s| {
            let mut arena = s[self.slot].borrow_mut();
            debug_assert!(
                arena.offset >= self.save_offset,
                "scratch save-points must be ended in LIFO order"
            );
            arena.offset = self.save_offset;
        });
    }
}

/// Begin a scratch save-point, preferring whichever of the two thread-local
/// scratch arenas is not `conflict`, so a function that both writes into a
/// caller-supplied arena and needs scratch storage never aliases the two.
pub fn scratch_begin(conflict: Option<ArenaId>) -> ScratchGuard {
    let slot = SCRATCH.with(|s| {
        let id0 = s[0].borrow().id();
        match conflict {
            Some(c) if c == id0 => 1,
            _ => 0,
        }
    });
    let save_offset = SCRATCH.with(|s| s[slot].borrow().offset);
    ScratchGuard { slot, save_offset }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alloc_and_read_back() {
        let mut arena = Arena::new(1024 * 1024);
        let h1 = arena.alloc_bytes(b"hello");
        let h2 = arena.alloc_bytes(b"world");
        assert_eq!(arena.get(h1), b"hello");
        assert_eq!(arena.get(h2), b"world");
    }

    #[test]
    fn reset_rewinds_offset() {
        let mut arena = Arena::new(1024 * 1024);
        arena.alloc_bytes(b"abc");
        assert_eq!(arena.len(), 3);
        arena.reset();
        assert_eq!(arena.len(), 0);
        let h = arena.alloc_bytes(b"xy");
        assert_eq!(h.len(), 2);
    }

    #[test]
    #[should_panic(expected = "arena capacity exceeded")]
    fn alloc_past_capacity_panics() {
        let mut arena = Arena::new(4);
        arena.alloc(8, 1);
    }

    #[test]
    fn growing_slice_append_grows_in_place_at_tail() {
        let mut arena = Arena::new(1024 * 1024);
        let mut slice = GrowingSlice::new();
        slice.append(&mut arena, b"ab");
        slice.append(&mut arena, b"cd");
        assert_eq!(slice.as_slice(&arena), b"abcd");
    }

    #[test]
    fn growing_slice_append_survives_interleaved_allocation() {
        let mut arena = Arena::new(1024 * 1024);
        let mut slice = GrowingSlice::new();
        slice.append(&mut arena, b"ab");
        // This allocation sits at the slice's tail, forcing the next append
        // to reallocate rather than grow in place.
        let other = arena.alloc_bytes(b"Z");
        slice.append(&mut arena, b"cd");
        assert_eq!(slice.as_slice(&arena), b"abcd");
        assert_eq!(arena.get(other), b"Z");
    }

    #[test]
    fn growing_slice_append_repeat() {
        let mut arena = Arena::new(1024 * 1024);
        let mut slice = GrowingSlice::new();
        slice.append_repeat(&mut arena, b"ab", 5);
        assert_eq!(slice.as_slice(&arena), b"ababababab");
    }

    #[test]
    fn growing_slice_append_decimal() {
        let mut arena = Arena::new(1024 * 1024);
        for (v, expected) in [(0u64, "0"), (7, "7"), (42, "42"), (12345, "12345"), (1000000, "1000000")] {
            let mut slice = GrowingSlice::new();
            slice.append_decimal(&mut arena, v);
            assert_eq!(slice.as_slice(&arena), expected.as_bytes());
        }
    }

    #[test]
    fn scratch_begin_avoids_conflict() {
        let mut owner = Arena::new(1024);
        owner.alloc_bytes(b"x");
        let g1 = scratch_begin(Some(owner.id()));
        let inner_id = g1.arena_id();
        assert_ne!(inner_id, owner.id());
        drop(g1);
    }

    #[test]
    fn scratch_guards_nest_lifo() {
        let outer = scratch_begin(None);
        outer.with_arena(|a| {
            a.alloc_bytes(b"outer");
        });
        {
            let inner = scratch_begin(None);
            inner.with_arena(|a| {
                a.alloc_bytes(b"inner");
            });
        }
        outer.with_arena(|a| {
            assert!(a.len() >= b"outer".len());
        });
    }
}
