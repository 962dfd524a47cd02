//! JIT code-cache protocol.
//!
//! This module implements the heap, block registry, link registry, and
//! dirty-page tracking a block-level dynamic binary translator plugs into.
//! It does not contain a codegen backend: `BlockBuilder::emit` is an opaque
//! byte buffer the caller fills with host machine code, and cross-block
//! jumps are patched as absolute 8-byte code addresses rather than
//! relative displacements, so this crate never needs to know the specific
//! instruction encoding a given codegen backend emits.
//!
//! Mutations to the block and link registries (`block_finalize`, the
//! invalidation path inside `block_lookup`, and `flush_cache`) all happen
//! under `JitCache`'s internal spinlock; `block_lookup`'s normal hit path
//! is lock-free, reading only atomic bit matrices and direct-mapped slots.

/// Block registry, link registry, dirty-page tracking, and the public
/// `JitCache`/`JitStats`/`BlockBuilder` types.
pub mod cache;
/// RWX/W^X code heap allocation.
pub mod heap;
/// Host instruction-cache coherence after writing JIT code.
pub mod icache;

pub use cache::{BlockBuilder, JitCache, JitStats};
pub use heap::{CodeHeap, JitHeapError};
