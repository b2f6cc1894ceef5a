// chunk.rs - Fixed-size chunk buffers and per-archetype storage
//
// Every archetype owns one `DataComponentStorage`: an ordered list of
// chunks plus the slot -> entity table. Slots are global within the
// storage (`chunk = slot / capacity`, `row = slot % capacity`) and stay
// dense over `0..len` because removal swaps the last slot into the hole.

use bytemuck::{Pod, Zeroable};

use super::archetype::ArchetypeInfo;
use super::component::{ComponentId, DataComponentType};
use super::entity::Entity;

/// Alignment of every chunk buffer; the upper bound on component alignment.
pub const CHUNK_ALIGN: usize = 64;

#[repr(C, align(64))]
#[derive(Clone, Copy)]
struct ChunkLine([u8; CHUNK_ALIGN]);

// SAFETY: a padding-free byte array; size equals alignment.
unsafe impl Zeroable for ChunkLine {}
unsafe impl Pod for ChunkLine {}

/// A zero-initialized, 64-byte aligned block of raw component bytes.
pub(crate) struct Chunk {
    lines: Box<[ChunkLine]>,
}

impl Chunk {
    /// `bytes` must be a multiple of [`CHUNK_ALIGN`].
    fn new(bytes: usize) -> Self {
        debug_assert_eq!(bytes % CHUNK_ALIGN, 0);
        Self {
            lines: vec![ChunkLine::zeroed(); bytes / CHUNK_ALIGN].into_boxed_slice(),
        }
    }

    #[inline]
    fn bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.lines)
    }

    #[inline]
    fn bytes_mut(&mut self) -> &mut [u8] {
        bytemuck::cast_slice_mut(&mut self.lines)
    }

    #[inline]
    fn base_ptr(&mut self) -> *mut u8 {
        self.lines.as_mut_ptr() as *mut u8
    }
}

/// Chunked component storage for one archetype.
pub(crate) struct DataComponentStorage {
    types: Vec<DataComponentType>,
    chunk_capacity: usize,
    chunk_bytes: usize,
    entities: Vec<Entity>,
    chunks: Vec<Chunk>,
}

impl DataComponentStorage {
    pub fn new(info: &ArchetypeInfo, chunk_bytes: usize) -> Self {
        // Column-less storages only track slots; their chunks own no bytes.
        let chunk_bytes = if info.types().is_empty() { 0 } else { chunk_bytes };
        Self {
            types: info.types().to_vec(),
            chunk_capacity: info.chunk_capacity(),
            chunk_bytes,
            entities: Vec::new(),
            chunks: Vec::new(),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    #[inline]
    pub fn chunk_capacity(&self) -> usize {
        self.chunk_capacity
    }

    #[inline]
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Occupied slots in `chunk`.
    pub fn chunk_len(&self, chunk: usize) -> usize {
        let start = chunk * self.chunk_capacity;
        self.len().saturating_sub(start).min(self.chunk_capacity)
    }

    /// Slot -> entity table, dense over `0..len`.
    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn types(&self) -> &[DataComponentType] {
        &self.types
    }

    pub fn type_index(&self, id: ComponentId) -> Option<usize> {
        self.types.binary_search_by_key(&id, |ty| ty.id).ok()
    }

    /// Append `entity`, allocating a chunk when all are full.
    ///
    /// Returns the new slot and whether a chunk was allocated. The slot's
    /// component bytes are zeroed.
    pub fn push(&mut self, entity: Entity) -> (usize, bool) {
        let slot = self.entities.len();
        let allocated = slot == self.chunks.len() * self.chunk_capacity;
        if allocated {
            self.chunks.push(Chunk::new(self.chunk_bytes));
        } else {
            for index in 0..self.types.len() {
                self.component_bytes_mut(slot, index).fill(0);
            }
        }
        self.entities.push(entity);
        (slot, allocated)
    }

    /// Remove `slot` by moving the last occupied slot into it.
    ///
    /// `fix_index` is called with the moved entity and its new slot. Trailing
    /// chunks that become empty are freed.
    pub fn swap_remove(&mut self, slot: usize, mut fix_index: impl FnMut(Entity, usize)) {
        let last = self.entities.len() - 1;
        if slot != last {
            for index in 0..self.types.len() {
                let size = self.types[index].size;
                let (src_chunk, src_start) = self.locate(last, index);
                let (dst_chunk, dst_start) = self.locate(slot, index);
                if src_chunk == dst_chunk {
                    self.chunks[src_chunk]
                        .bytes_mut()
                        .copy_within(src_start..src_start + size, dst_start);
                } else {
                    let (low, high) = self.chunks.split_at_mut(src_chunk);
                    low[dst_chunk].bytes_mut()[dst_start..dst_start + size]
                        .copy_from_slice(&high[0].bytes()[src_start..src_start + size]);
                }
            }
        }

        self.entities.swap_remove(slot);
        if let Some(&moved) = self.entities.get(slot) {
            fix_index(moved, slot);
        }

        let needed = self.entities.len().div_ceil(self.chunk_capacity);
        self.chunks.truncate(needed);
    }

    /// Drop every chunk and slot.
    pub fn clear(&mut self) {
        self.entities.clear();
        self.chunks.clear();
    }

    /// Chunk index and byte offset of component `index` at `slot`.
    #[inline]
    fn locate(&self, slot: usize, index: usize) -> (usize, usize) {
        let ty = &self.types[index];
        let (chunk, row) = (slot / self.chunk_capacity, slot % self.chunk_capacity);
        (chunk, ty.offset + row * ty.size)
    }

    pub fn component_bytes(&self, slot: usize, index: usize) -> &[u8] {
        let size = self.types[index].size;
        let (chunk, start) = self.locate(slot, index);
        &self.chunks[chunk].bytes()[start..start + size]
    }

    pub fn component_bytes_mut(&mut self, slot: usize, index: usize) -> &mut [u8] {
        let size = self.types[index].size;
        let (chunk, start) = self.locate(slot, index);
        &mut self.chunks[chunk].bytes_mut()[start..start + size]
    }

    /// Copy of the component at `slot`. `T` must match the type at `index`.
    pub fn read<T: Pod>(&self, slot: usize, index: usize) -> T {
        *bytemuck::from_bytes(self.component_bytes(slot, index))
    }

    pub fn get_mut<T: Pod>(&mut self, slot: usize, index: usize) -> &mut T {
        bytemuck::from_bytes_mut(self.component_bytes_mut(slot, index))
    }

    /// Pointer to the first element of component `index` in `chunk`.
    pub fn column_ptr(&mut self, chunk: usize, index: usize) -> *mut u8 {
        let offset = self.types[index].offset;
        self.chunks[chunk].base_ptr().wrapping_add(offset)
    }
}

/// Copy every component both storages share from `src_slot` to `dst_slot`.
pub(crate) fn copy_shared_components(
    src: &DataComponentStorage,
    src_slot: usize,
    dst: &mut DataComponentStorage,
    dst_slot: usize,
) {
    for dst_index in 0..dst.types.len() {
        if let Some(src_index) = src.type_index(dst.types[dst_index].id) {
            dst.component_bytes_mut(dst_slot, dst_index)
                .copy_from_slice(src.component_bytes(src_slot, src_index));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn storage(capacity_hint: usize) -> DataComponentStorage {
        // Two u32 components; 1024-byte chunks hold 128 entities.
        let types = vec![
            DataComponentType {
                name: "A".into(),
                id: ComponentId::new(0),
                size: 4,
                align: 4,
                offset: 0,
            },
            DataComponentType {
                name: "B".into(),
                id: ComponentId::new(1),
                size: 4,
                align: 4,
                offset: 0,
            },
        ];
        let info = ArchetypeInfo::new("AB", types, capacity_hint).unwrap();
        DataComponentStorage::new(&info, capacity_hint)
    }

    fn fill(storage: &mut DataComponentStorage, n: u32) {
        for i in 1..=n {
            let (slot, _) = storage.push(Entity::new(i, 1));
            *storage.get_mut::<u32>(slot, 0) = i;
            *storage.get_mut::<u32>(slot, 1) = i * 10;
        }
    }

    #[test]
    fn chunks_are_allocated_on_demand() {
        let mut s = storage(1024);
        assert_eq!(s.chunk_capacity(), 128);
        fill(&mut s, 129);
        assert_eq!(s.chunk_count(), 2);
        assert_eq!(s.chunk_len(0), 128);
        assert_eq!(s.chunk_len(1), 1);
        assert_eq!(s.read::<u32>(128, 1), 1290);
    }

    #[test]
    fn swap_remove_moves_last_slot_across_chunks() {
        let mut s = storage(1024);
        fill(&mut s, 129);
        let mut moved = Vec::new();
        s.swap_remove(3, |e, slot| moved.push((e, slot)));

        assert_eq!(moved, vec![(Entity::new(129, 1), 3)]);
        assert_eq!(s.len(), 128);
        assert_eq!(s.chunk_count(), 1);
        assert_eq!(s.read::<u32>(3, 0), 129);
        assert_eq!(s.read::<u32>(3, 1), 1290);
        assert_eq!(s.entities()[3], Entity::new(129, 1));
    }

    #[test]
    fn removing_last_slot_moves_nothing() {
        let mut s = storage(1024);
        fill(&mut s, 3);
        let mut calls = 0;
        s.swap_remove(2, |_, _| calls += 1);
        assert_eq!(calls, 0);
        assert_eq!(s.len(), 2);
    }

    #[test]
    fn reused_slots_are_zeroed() {
        let mut s = storage(1024);
        fill(&mut s, 2);
        s.swap_remove(1, |_, _| {});
        let (slot, allocated) = s.push(Entity::new(9, 1));
        assert_eq!(slot, 1);
        assert!(!allocated);
        assert_eq!(s.read::<u32>(1, 0), 0);
        assert_eq!(s.read::<u32>(1, 1), 0);
    }

    #[test]
    fn columns_are_contiguous() {
        let mut s = storage(1024);
        fill(&mut s, 4);
        let column = s.column_ptr(0, 1) as *const u32;
        let values: Vec<u32> = (0..4).map(|row| unsafe { *column.add(row) }).collect();
        assert_eq!(values, vec![10, 20, 30, 40]);
        assert_eq!(column as usize % 4, 0);
    }

    #[test]
    fn column_less_storage_allocates_no_bytes() {
        let mut s = DataComponentStorage::new(&ArchetypeInfo::empty(1024), 1024);
        for i in 1..=300 {
            s.push(Entity::new(i, 1));
        }
        assert_eq!(s.chunk_count(), 3);
        assert!(s.chunks.iter().all(|chunk| chunk.bytes().is_empty()));
        s.swap_remove(0, |_, _| {});
        assert_eq!(s.entities()[0], Entity::new(300, 1));
    }

    #[test]
    fn shared_components_are_copied() {
        let mut src = storage(1024);
        fill(&mut src, 1);
        let mut dst = storage(2048);
        let (slot, _) = dst.push(Entity::new(1, 1));
        copy_shared_components(&src, 0, &mut dst, slot);
        assert_eq!(dst.read::<u32>(slot, 0), 1);
        assert_eq!(dst.read::<u32>(slot, 1), 10);
    }
}
