//! Block registry, link registry, and dirty-page tracking for the JIT code
//! cache.
//!
//! `JitCache` never evicts an individual compiled block: a guest page is
//! either entirely "jited" (every block compiled from it is valid) or
//! entirely invalidated in one sweep when a write lands on it. This mirrors
//! `core::units::mmu::tlb::Tlb`'s direct-mapped, lock-free-on-the-hot-path
//! design rather than pulling in a general-purpose concurrent map.

use std::collections::HashMap;
use std::ptr;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use crate::atomic::{bit_next_pow2, fetch_and_u32, fetch_or_u32, load_u32};
use crate::common::constants::PAGE_SHIFT;
use crate::spinlock::Spinlock;

use super::heap::{CodeHeap, JitHeapError};

/// A flat bit-per-page matrix, addressed as `(page >> 17, page >> 12 & 31)`.
///
/// Used for both `jited_pages` and `dirty_pages`; all operations use
/// relaxed ordering since correctness here only requires each bit's own
/// read-modify-write to be atomic, not a happens-before relationship with
/// other memory.
struct PageBitMatrix {
    groups: Vec<AtomicU32>,
}

impl PageBitMatrix {
    fn new(phys_limit: u64) -> Self {
        let page_count = (phys_limit >> PAGE_SHIFT) + 1;
        let group_count = (page_count >> 5) + 1;
        let mut groups = Vec::with_capacity(group_count as usize);
        groups.resize_with(group_count as usize, || AtomicU32::new(0));
        Self { groups }
    }

    fn locate(&self, page: u64) -> Option<(usize, u32)> {
        let group = page >> 5;
        let bit = (page & 31) as u32;
        self.groups.get(group as usize).map(|_| (group as usize, bit))
    }

    fn test(&self, page: u64) -> bool {
        match self.locate(page) {
            Some((group, bit)) => (load_u32(&self.groups[group], Ordering::Relaxed) >> bit) & 1 != 0,
            None => false,
        }
    }

    fn set(&self, page: u64) {
        if let Some((group, bit)) = self.locate(page) {
            fetch_or_u32(&self.groups[group], 1 << bit, Ordering::Relaxed);
        }
    }

    fn clear(&self, page: u64) {
        if let Some((group, bit)) = self.locate(page) {
            fetch_and_u32(&self.groups[group], !(1 << bit), Ordering::Relaxed);
        }
    }

    /// Atomically tests and clears a bit; returns the value the bit had
    /// before clearing.
    fn test_and_clear(&self, page: u64) -> bool {
        match self.locate(page) {
            Some((group, bit)) => {
                let prev = fetch_and_u32(&self.groups[group], !(1 << bit), Ordering::Relaxed);
                (prev >> bit) & 1 != 0
            }
            None => false,
        }
    }

    fn reset_all(&self) {
        for group in &self.groups {
            group.store(0, Ordering::Relaxed);
        }
    }
}

/// One direct-mapped registry slot: a physical PC tag plus the code address
/// it resolved to. `tag == EMPTY_TAG` marks an unused slot.
struct Slot {
    tag: AtomicU64,
    code_addr: AtomicU64,
}

const EMPTY_TAG: u64 = u64::MAX;

/// Direct-mapped `phys_pc -> code_addr` table.
///
/// Lookups and inserts are lock-free; collisions simply overwrite the slot
/// (a stale entry this evicts becomes a lookup miss, which is always safe
/// — the caller recompiles).
struct BlockRegistry {
    slots: Vec<Slot>,
    mask: u64,
}

impl BlockRegistry {
    fn new(capacity: usize) -> Self {
        let capacity = bit_next_pow2(capacity.max(1));
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || Slot {
            tag: AtomicU64::new(EMPTY_TAG),
            code_addr: AtomicU64::new(0),
        });
        Self {
            slots,
            mask: (capacity - 1) as u64,
        }
    }

    fn index(&self, phys_pc: u64) -> usize {
        (phys_pc & self.mask) as usize
    }

    fn lookup(&self, phys_pc: u64) -> Option<u64> {
        let slot = &self.slots[self.index(phys_pc)];
        if slot.tag.load(Ordering::Acquire) == phys_pc {
            Some(slot.code_addr.load(Ordering::Acquire))
        } else {
            None
        }
    }

    fn insert(&self, phys_pc: u64, code_addr: u64) {
        let slot = &self.slots[self.index(phys_pc)];
        slot.code_addr.store(code_addr, Ordering::Release);
        slot.tag.store(phys_pc, Ordering::Release);
    }

    fn remove(&self, phys_pc: u64) {
        let slot = &self.slots[self.index(phys_pc)];
        if slot.tag.load(Ordering::Acquire) == phys_pc {
            slot.tag.store(EMPTY_TAG, Ordering::Release);
        }
    }

    /// Removes every entry whose tag falls within the 4 KiB page starting
    /// at `page_base`. Only called under the JIT spinlock, on the cold
    /// invalidation path.
    fn remove_page(&self, page_base: u64) {
        let page_end = page_base + (1 << PAGE_SHIFT);
        for slot in &self.slots {
            let tag = slot.tag.load(Ordering::Acquire);
            if tag != EMPTY_TAG && tag >= page_base && tag < page_end {
                slot.tag.store(EMPTY_TAG, Ordering::Release);
            }
        }
    }

    fn clear(&self) {
        for slot in &self.slots {
            slot.tag.store(EMPTY_TAG, Ordering::Relaxed);
        }
    }
}

/// Per-compile-call scratch state: the emitted code bytes plus the patch
/// sites this block itself defers to other (not-yet-compiled) blocks.
#[derive(Default)]
pub struct BlockBuilder {
    /// Code bytes emitted so far for this block.
    pub emit: Vec<u8>,
    pending_links: Vec<(u64, usize)>,
}

impl BlockBuilder {
    /// Resets the builder for a fresh compile of a new block.
    pub fn block_init(&mut self) {
        self.emit.clear();
        self.pending_links.clear();
    }

    /// Records that the byte offset `patch_site_offset` within `emit` is a
    /// jump target that must be patched once `target_phys_pc` is compiled.
    pub fn defer_link(&mut self, target_phys_pc: u64, patch_site_offset: usize) {
        self.pending_links.push((target_phys_pc, patch_site_offset));
    }
}

/// Point-in-time counters for the JIT code cache; all fields are plain
/// snapshots loaded with relaxed ordering.
#[derive(Debug, Default, Clone, Copy)]
pub struct JitStats {
    /// Total `block_lookup` calls.
    pub lookups: u64,
    /// Lookups that found a valid block.
    pub hits: u64,
    /// Lookups that found nothing (including invalidated pages).
    pub misses: u64,
    /// Blocks written via `block_finalize`.
    pub blocks_compiled: u64,
    /// Total code bytes written to the heap.
    pub bytes_compiled: u64,
    /// Page invalidations performed (a dirty bit observed and cleared).
    pub invalidations: u64,
    /// Number of times `flush_cache` has run.
    pub cache_flushes: u64,
}

#[derive(Default)]
struct StatsInner {
    lookups: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    blocks_compiled: AtomicU64,
    bytes_compiled: AtomicU64,
    invalidations: AtomicU64,
    cache_flushes: AtomicU64,
}

/// The JIT code cache: heap, block registry, link registry, and dirty/jited
/// page bitmaps, tied together behind the block-lifecycle operations a
/// codegen backend calls into.
pub struct JitCache {
    heap: CodeHeap,
    blocks: BlockRegistry,
    links: Spinlock<HashMap<u64, Vec<u64>>>,
    jited_pages: PageBitMatrix,
    dirty_pages: PageBitMatrix,
    flush_threshold: usize,
    stats: StatsInner,
}

impl JitCache {
    /// Creates a cache over a heap of `heap_size` bytes, addressing up to
    /// `phys_limit` bytes of guest physical memory, flushing once the heap
    /// has used more than `flush_threshold` bytes.
    pub fn new(
        heap_size: usize,
        phys_limit: u64,
        block_capacity: usize,
        flush_threshold: usize,
    ) -> Result<Self, JitHeapError> {
        Ok(Self {
            heap: CodeHeap::new(heap_size)?,
            blocks: BlockRegistry::new(block_capacity),
            links: Spinlock::new(HashMap::new()),
            jited_pages: PageBitMatrix::new(phys_limit),
            dirty_pages: PageBitMatrix::new(phys_limit),
            flush_threshold,
            stats: StatsInner::default(),
        })
    }

    fn page_of(addr: u64) -> u64 {
        addr >> PAGE_SHIFT
    }

    /// Looks up the compiled code address for `phys_pc`, lazily
    /// invalidating the containing page if its dirty bit is set.
    pub fn block_lookup(&self, phys_pc: u64) -> Option<u64> {
        self.stats.lookups.fetch_add(1, Ordering::Relaxed);

        let page = Self::page_of(phys_pc);
        if self.dirty_pages.test_and_clear(page) {
            self.invalidate_page(page);
            self.stats.misses.fetch_add(1, Ordering::Relaxed);
            return None;
        }

        match self.blocks.lookup(phys_pc) {
            Some(addr) => {
                self.stats.hits.fetch_add(1, Ordering::Relaxed);
                Some(addr)
            }
            None => {
                self.stats.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    fn invalidate_page(&self, page: u64) {
        let page_base = page << PAGE_SHIFT;
        let page_end = page_base + (1 << PAGE_SHIFT);
        let mut links = self.links.lock();
        links.retain(|&target, _| !(target >= page_base && target < page_end));
        self.blocks.remove_page(page_base);
        self.jited_pages.clear(page);
        self.stats.invalidations.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(page_base, "jit: page invalidated");
    }

    /// Writes `block`'s emitted code into the heap, registers it at
    /// `phys_pc`, patches any sites that were waiting for this block, and
    /// marks its page jited. Returns `None` if the heap has no room; the
    /// caller must `flush_cache` and retry.
    pub fn block_finalize(&self, phys_pc: u64, block: &BlockBuilder) -> Option<u64> {
        let len = block.emit.len();
        let Some((write_ptr, code_addr, _offset)) = self.heap.reserve(len) else {
            tracing::warn!(phys_pc, len, "jit: code heap exhausted, flush required");
            return None;
        };

        // SAFETY: `reserve` guarantees `write_ptr` is valid for `len` bytes
        // and exclusively owned by this call (the bump cursor already
        // advanced past it).
        unsafe {
            ptr::copy_nonoverlapping(block.emit.as_ptr(), write_ptr, len);
        }

        self.blocks.insert(phys_pc, code_addr);

        {
            let mut links = self.links.lock();
            for &(target, offset) in &block.pending_links {
                links
                    .entry(target)
                    .or_default()
                    .push(code_addr + offset as u64);
            }
            if let Some(waiting) = links.remove(&phys_pc) {
                for site in waiting {
                    // SAFETY: `site` was recorded as a code address inside a
                    // previously finalized block's writable heap region,
                    // which remains valid for the cache's lifetime.
                    unsafe {
                        (site as *mut u64).write_unaligned(code_addr);
                    }
                    self.heap.flush_icache(site, std::mem::size_of::<u64>());
                }
            }
        }

        self.heap.flush_icache(code_addr, len);
        self.jited_pages.set(Self::page_of(phys_pc));

        self.stats.blocks_compiled.fetch_add(1, Ordering::Relaxed);
        self.stats
            .bytes_compiled
            .fetch_add(len as u64, Ordering::Relaxed);

        tracing::trace!(phys_pc, code_addr, len, "jit: block finalized");
        Some(code_addr)
    }

    /// Marks every jited page touching `[addr, addr+size)` dirty, clearing
    /// its jited bit. Called whenever a guest store lands in that range.
    pub fn mark_dirty_mem(&self, addr: u64, size: u64) {
        if size == 0 {
            return;
        }
        let first_page = Self::page_of(addr);
        let last_page = Self::page_of(addr + size - 1);
        for page in first_page..=last_page {
            if self.jited_pages.test(page) {
                self.dirty_pages.set(page);
                self.jited_pages.clear(page);
            }
        }
    }

    /// Resets the cache: drops all registries and, if the heap has grown
    /// past the flush threshold, releases its physical backing too.
    pub fn flush_cache(&self) {
        if self.heap.curr() > self.flush_threshold {
            self.heap.release_physical_backing();
        }
        self.blocks.clear();
        self.links.lock().clear();
        self.heap.reset();
        self.jited_pages.reset_all();
        self.dirty_pages.reset_all();
        self.stats.cache_flushes.fetch_add(1, Ordering::Relaxed);
        tracing::info!(heap_bytes_used = self.heap.curr(), "jit: cache flushed");
    }

    /// A snapshot of the cache's counters.
    pub fn stats(&self) -> JitStats {
        JitStats {
            lookups: self.stats.lookups.load(Ordering::Relaxed),
            hits: self.stats.hits.load(Ordering::Relaxed),
            misses: self.stats.misses.load(Ordering::Relaxed),
            blocks_compiled: self.stats.blocks_compiled.load(Ordering::Relaxed),
            bytes_compiled: self.stats.bytes_compiled.load(Ordering::Relaxed),
            invalidations: self.stats.invalidations.load(Ordering::Relaxed),
            cache_flushes: self.stats.cache_flushes.load(Ordering::Relaxed),
        }
    }
}
