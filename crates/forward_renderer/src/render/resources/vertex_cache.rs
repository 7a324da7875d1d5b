//! Vertex cache binder
//!
//! Geometry reaches the GPU through an opaque cache handle. Binding resolves
//! the handle to an offset in the shared vertex buffer; a handle whose memory
//! was reclaimed this frame resolves to nothing and the caller skips the draw.

use std::collections::HashMap;

/// Opaque handle to cached vertex data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheHandle(pub u32);

/// Byte offset into the shared vertex buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferOffset(pub usize);

/// Resolves geometry handles to buffer offsets
pub trait VertexCache {
    /// Resolve a handle, `None` when its backing memory was evicted
    fn bind(&mut self, handle: CacheHandle) -> Option<BufferOffset>;
}

/// Frame-scoped cache used by tools and tests
///
/// Allocations are packed linearly; eviction only forgets the handle.
#[derive(Debug, Clone, Default)]
pub struct FrameVertexCache {
    entries: HashMap<CacheHandle, BufferOffset>,
    next_handle: u32,
    next_offset: usize,
    bind_count: usize,
    miss_count: usize,
}

impl FrameVertexCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve `size` bytes and return the handle for them
    pub fn alloc(&mut self, size: usize) -> CacheHandle {
        let handle = CacheHandle(self.next_handle);
        self.next_handle += 1;
        self.entries.insert(handle, BufferOffset(self.next_offset));
        self.next_offset += size;
        log::trace!("Vertex cache alloc {:?} ({} bytes)", handle, size);
        handle
    }

    /// Drop a handle's backing memory
    pub fn evict(&mut self, handle: CacheHandle) -> bool {
        self.entries.remove(&handle).is_some()
    }

    /// Forget everything and start a new frame
    pub fn clear(&mut self) {
        self.entries.clear();
        self.next_offset = 0;
        self.bind_count = 0;
        self.miss_count = 0;
    }

    /// Successful binds since the last clear
    pub const fn bind_count(&self) -> usize {
        self.bind_count
    }

    /// Failed binds since the last clear
    pub const fn miss_count(&self) -> usize {
        self.miss_count
    }
}

impl VertexCache for FrameVertexCache {
    fn bind(&mut self, handle: CacheHandle) -> Option<BufferOffset> {
        let offset = self.entries.get(&handle).copied();
        if offset.is_some() {
            self.bind_count += 1;
        } else {
            self.miss_count += 1;
        }
        offset
    }
}
