//! Bitmap resources.
//!
//! Bitmaps live in graphics RAM, which is handed out by a bump allocator
//! and never reclaimed. Before a bitmap can be drawn its source, layout
//! and size must be loaded into one of a small number of hardware handles;
//! the manager keeps bitmaps resident in handles between draws and picks a
//! victim when all handles are taken.
//!
//! Victim selection walks the handles round-robin from a cursor, skips the
//! handle drawn most recently, and prefers an empty handle to an occupied
//! one. Never evicting the last drawn handle keeps two bitmaps drawn in
//! alternation from evicting each other on every call.

use alloc::vec;
use alloc::vec::Vec;

use crate::dl;
use crate::regs::{mem, BitmapFormat, Filter, Primitive, Wrap};
use crate::transport::Transport;
use crate::{Eve, EveError};

/// Bitmap identifier, valid for the session that created it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BitmapId(u16);

impl BitmapId {
    /// Position in the descriptor table.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Where a bitmap lives and how to load it into a handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitmapDescriptor {
    address: u32,
    data_size: u32,
    layout_word: u32,
    size_word: u32,
    slot: Option<u8>,
}

impl BitmapDescriptor {
    /// Start of the pixel data in graphics RAM.
    pub fn address(&self) -> u32 {
        self.address
    }

    /// Bytes reserved for the pixel data.
    pub fn data_size(&self) -> u32 {
        self.data_size
    }

    /// Prepared BITMAP_LAYOUT word.
    pub fn layout_word(&self) -> u32 {
        self.layout_word
    }

    /// Prepared BITMAP_SIZE word.
    pub fn size_word(&self) -> u32 {
        self.size_word
    }

    /// Handle currently loaded with this bitmap.
    pub fn slot(&self) -> Option<u8> {
        self.slot
    }

    /// Rendered `(width, height)`.
    pub fn render_size(&self) -> (u32, u32) {
        dl::bitmap_size_dimensions(self.size_word)
    }
}

/// Descriptor table, graphics RAM allocator and handle table.
#[derive(Debug, Clone)]
pub struct BitmapManager {
    bitmaps: Vec<BitmapDescriptor>,
    capacity: usize,
    /// Bitmap loaded into each handle.
    slots: Vec<Option<BitmapId>>,
    /// Next handle to consider for eviction.
    cursor: u8,
    /// Handle used by the most recent draw.
    last_used: Option<u8>,
    /// Next free byte of graphics RAM.
    ram_cursor: u32,
}

impl BitmapManager {
    /// Manager for up to `capacity` bitmaps over `handles` hardware handles.
    /// `handles` comes from a validated [`EveConfig`](crate::EveConfig) and
    /// is never zero.
    pub(crate) fn new(capacity: usize, handles: u8) -> Self {
        BitmapManager {
            bitmaps: Vec::with_capacity(capacity),
            capacity,
            slots: vec![None; handles as usize],
            cursor: 0,
            last_used: None,
            ram_cursor: mem::RAM_G,
        }
    }

    /// Allocate a bitmap of `width` x `height` pixels, rendered at its
    /// natural size with bilinear filtering and border wrap.
    pub fn allocate(&mut self, format: BitmapFormat, width: u32, height: u32) -> Result<BitmapId, EveError> {
        let stride = format.row_bytes(width).ok_or(EveError::OutOfGraphicsMemory)?;
        check_layout(stride, height)?;
        check_size(width, height)?;
        let size = stride.checked_mul(height).ok_or(EveError::OutOfGraphicsMemory)?;
        self.insert(
            size,
            dl::bitmap_layout(format, stride, height),
            dl::bitmap_size(Filter::Bilinear, Wrap::Border, Wrap::Border, width, height),
        )
    }

    /// Allocate a bitmap with every layout and sampling parameter spelled
    /// out. `cells` stacked images of `stride * layout_height` bytes each
    /// are reserved.
    #[allow(clippy::too_many_arguments)]
    pub fn allocate_verbose(
        &mut self,
        format: BitmapFormat,
        stride: u32,
        layout_height: u32,
        cells: u32,
        filter: Filter,
        wrap_x: Wrap,
        wrap_y: Wrap,
        render_width: u32,
        render_height: u32,
    ) -> Result<BitmapId, EveError> {
        check_layout(stride, layout_height)?;
        check_size(render_width, render_height)?;
        let size = stride
            .checked_mul(layout_height)
            .and_then(|image| image.checked_mul(cells))
            .ok_or(EveError::OutOfGraphicsMemory)?;
        self.insert(
            size,
            dl::bitmap_layout(format, stride, layout_height),
            dl::bitmap_size(filter, wrap_x, wrap_y, render_width, render_height),
        )
    }

    fn insert(&mut self, data_size: u32, layout_word: u32, size_word: u32) -> Result<BitmapId, EveError> {
        if self.bitmaps.len() >= self.capacity {
            return Err(EveError::BitmapTableFull);
        }
        let end = self
            .ram_cursor
            .checked_add(data_size)
            .filter(|end| *end <= mem::RAM_G + mem::RAM_G_SIZE)
            .ok_or(EveError::OutOfGraphicsMemory)?;

        let id = BitmapId(self.bitmaps.len() as u16);
        self.bitmaps.push(BitmapDescriptor {
            address: self.ram_cursor,
            data_size,
            layout_word,
            size_word,
            slot: None,
        });
        self.ram_cursor = end;
        log::trace!("evegl: bitmap {:?} at {:#x}, {} bytes", id, self.bitmaps[id.index()].address, data_size);
        Ok(id)
    }

    pub fn descriptor(&self, id: BitmapId) -> Result<&BitmapDescriptor, EveError> {
        self.bitmaps.get(id.index()).ok_or(EveError::InvalidBitmap(id))
    }

    fn descriptor_mut(&mut self, id: BitmapId) -> Result<&mut BitmapDescriptor, EveError> {
        self.bitmaps.get_mut(id.index()).ok_or(EveError::InvalidBitmap(id))
    }

    /// Change sampling parameters, keeping the render size.
    pub fn set_params(&mut self, id: BitmapId, filter: Filter, wrap_x: Wrap, wrap_y: Wrap) -> Result<(), EveError> {
        let desc = self.descriptor_mut(id)?;
        let params = dl::bitmap_size(filter, wrap_x, wrap_y, 0, 0);
        desc.size_word = params | (desc.size_word & dl::BITMAP_SIZE_DIMENSIONS);
        self.unbind(id);
        Ok(())
    }

    /// Change the render size, keeping the sampling parameters.
    pub fn set_size(&mut self, id: BitmapId, width: u32, height: u32) -> Result<(), EveError> {
        check_size(width, height)?;
        let desc = self.descriptor_mut(id)?;
        let dims = dl::bitmap_size(Filter::Nearest, Wrap::Border, Wrap::Border, width, height);
        desc.size_word = (desc.size_word & !dl::BITMAP_SIZE_DIMENSIONS) | (dims & dl::BITMAP_SIZE_DIMENSIONS);
        self.unbind(id);
        Ok(())
    }

    /// Drop the handle binding of `id`, if any.
    fn unbind(&mut self, id: BitmapId) {
        if let Some(slot) = self.bitmaps[id.index()].slot.take() {
            self.slots[slot as usize] = None;
        }
    }

    /// Choose the handle to load next.
    pub fn pick_slot(&mut self) -> u8 {
        let count = self.slots.len() as u8;
        let mut fallback = None;
        let mut chosen = None;

        for step in 0..count {
            let slot = (self.cursor + step) % count;
            if Some(slot) == self.last_used {
                continue;
            }
            if self.slots[slot as usize].is_none() {
                chosen = Some(slot);
                break;
            }
            fallback.get_or_insert(slot);
        }

        // With at least two handles something other than `last_used` is
        // always visited.
        let slot = chosen.or(fallback).unwrap_or(self.cursor % count);
        self.cursor = (slot + 1) % count;
        slot
    }

    /// Record that `slot` now holds `id`. Returns the evicted bitmap.
    pub fn bind(&mut self, slot: u8, id: BitmapId) -> Result<Option<BitmapId>, EveError> {
        self.check_slot(slot)?;
        self.descriptor(id)?;

        let evicted = self.slots[slot as usize].filter(|old| *old != id);
        if let Some(old) = evicted {
            self.bitmaps[old.index()].slot = None;
            log::trace!("evegl: evicting bitmap {:?} from handle {}", old, slot);
        }
        if let Some(previous) = self.bitmaps[id.index()].slot {
            if previous != slot {
                self.slots[previous as usize] = None;
            }
        }
        self.slots[slot as usize] = Some(id);
        self.bitmaps[id.index()].slot = Some(slot);
        Ok(evicted)
    }

    /// Take a handle out of management for one-off manual use.
    pub fn take_unmanaged_slot(&mut self) -> u8 {
        let slot = self.pick_slot();
        self.release_slot(slot);
        slot
    }

    /// Empty `slot`, returning what it held.
    pub fn release_slot(&mut self, slot: u8) -> Option<BitmapId> {
        let old = self.slots.get_mut(slot as usize)?.take()?;
        self.bitmaps[old.index()].slot = None;
        Some(old)
    }

    /// Note that `slot` was just drawn from.
    pub fn mark_drawn(&mut self, slot: u8) {
        self.last_used = Some(slot);
    }

    /// Bitmap loaded into `slot`.
    pub fn occupant(&self, slot: u8) -> Option<BitmapId> {
        self.slots.get(slot as usize).copied().flatten()
    }

    pub fn last_used(&self) -> Option<u8> {
        self.last_used
    }

    pub fn handle_count(&self) -> u8 {
        self.slots.len() as u8
    }

    /// Number of bitmaps allocated.
    pub fn len(&self) -> usize {
        self.bitmaps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bitmaps.is_empty()
    }

    /// Bytes of graphics RAM handed out so far.
    pub fn ram_used(&self) -> u32 {
        self.ram_cursor - mem::RAM_G
    }

    pub(crate) fn check_slot(&self, slot: u8) -> Result<(), EveError> {
        if (slot as usize) < self.slots.len() {
            Ok(())
        } else {
            Err(EveError::InvalidHandle(slot))
        }
    }

    #[cfg(test)]
    fn is_consistent(&self) -> bool {
        let forward = self.slots.iter().enumerate().all(|(slot, occupant)| match occupant {
            Some(id) => self.bitmaps[id.index()].slot == Some(slot as u8),
            None => true,
        });
        let backward = self.bitmaps.iter().enumerate().all(|(index, desc)| match desc.slot {
            Some(slot) => self.slots[slot as usize] == Some(BitmapId(index as u16)),
            None => true,
        });
        forward && backward
    }
}

fn check_layout(stride: u32, height: u32) -> Result<(), EveError> {
    if stride > dl::MAX_LAYOUT_STRIDE || height > dl::MAX_LAYOUT_HEIGHT {
        return Err(EveError::BitmapDimensions { width: stride, height });
    }
    Ok(())
}

fn check_size(width: u32, height: u32) -> Result<(), EveError> {
    if width > dl::MAX_SIZE_DIMENSION || height > dl::MAX_SIZE_DIMENSION {
        return Err(EveError::BitmapDimensions { width, height });
    }
    Ok(())
}

impl<T: Transport> Eve<T> {
    /// Reserve graphics RAM for a `width` x `height` bitmap.
    pub fn create_bitmap(&mut self, format: BitmapFormat, width: u32, height: u32) -> Result<BitmapId, EveError> {
        self.bitmaps.allocate(format, width, height)
    }

    /// Reserve graphics RAM for a bitmap with explicit layout and sampling.
    #[allow(clippy::too_many_arguments)]
    pub fn create_bitmap_verbose(
        &mut self,
        format: BitmapFormat,
        stride: u32,
        layout_height: u32,
        cells: u32,
        filter: Filter,
        wrap_x: Wrap,
        wrap_y: Wrap,
        render_width: u32,
        render_height: u32,
    ) -> Result<BitmapId, EveError> {
        self.bitmaps.allocate_verbose(
            format,
            stride,
            layout_height,
            cells,
            filter,
            wrap_x,
            wrap_y,
            render_width,
            render_height,
        )
    }

    /// Copy pixel data into the bitmap's region, starting `offset` bytes in.
    ///
    /// This is an immediate write and cannot happen inside a frame.
    pub fn bitmap_buffer_data(&mut self, id: BitmapId, offset: u32, data: &[u8]) -> Result<(), EveError> {
        self.require_idle()?;
        let desc = *self.bitmaps.descriptor(id)?;
        let end = offset as usize + data.len();
        if end > desc.data_size() as usize {
            return Err(EveError::OutOfBounds {
                address: desc.address() + offset,
                len: data.len(),
            });
        }
        self.queue.write_mem(desc.address() + offset, data)
    }

    pub fn set_bitmap_params(&mut self, id: BitmapId, filter: Filter, wrap_x: Wrap, wrap_y: Wrap) -> Result<(), EveError> {
        self.bitmaps.set_params(id, filter, wrap_x, wrap_y)
    }

    pub fn set_bitmap_size(&mut self, id: BitmapId, width: u32, height: u32) -> Result<(), EveError> {
        self.bitmaps.set_size(id, width, height)
    }

    /// Rendered `(width, height)` of a bitmap.
    pub fn bitmap_size(&self, id: BitmapId) -> Result<(u32, u32), EveError> {
        Ok(self.bitmaps.descriptor(id)?.render_size())
    }

    pub fn bitmap(&self, id: BitmapId) -> Result<&BitmapDescriptor, EveError> {
        self.bitmaps.descriptor(id)
    }

    pub fn bitmap_manager(&self) -> &BitmapManager {
        &self.bitmaps
    }

    /// Load `id` into a handle chosen by the eviction policy.
    pub fn use_bitmap(&mut self, id: BitmapId) -> Result<u8, EveError> {
        self.bitmaps.descriptor(id)?;
        let slot = self.bitmaps.pick_slot();
        self.set_bitmap_handle(slot, id)
    }

    /// Load `id` into `slot`, evicting whatever was there.
    ///
    /// The binding is recorded once the words are queued. If sending fails
    /// part way the handle may hold a mix of old and new state, so it is
    /// left empty.
    pub fn set_bitmap_handle(&mut self, slot: u8, id: BitmapId) -> Result<u8, EveError> {
        let desc = *self.bitmaps.descriptor(id)?;
        self.bitmaps.check_slot(slot)?;

        if let Err(err) = self.load_handle(slot, &desc) {
            self.bitmaps.release_slot(slot);
            return Err(err);
        }
        self.bitmaps.bind(slot, id)?;
        Ok(slot)
    }

    fn load_handle(&mut self, slot: u8, desc: &BitmapDescriptor) -> Result<(), EveError> {
        self.bitmap_handle(slot)?;
        self.queue.ensure_space(12)?;
        self.queue.append32(dl::bitmap_source(desc.address()))?;
        self.queue.append32(desc.layout_word())?;
        self.queue.append32(desc.size_word())
    }

    /// Hand out a handle for manual use. The caller owns it until the next
    /// managed draw.
    pub fn take_unmanaged_slot(&mut self) -> u8 {
        self.bitmaps.take_unmanaged_slot()
    }

    /// Draw whatever is loaded in `slot`.
    pub fn draw_bitmap_in_handle(&mut self, slot: u8, x: u16, y: u16, cell: u8) -> Result<(), EveError> {
        self.begin(Primitive::Bitmaps)?;
        self.vertex2ii(x, y, slot, cell)?;
        self.end()?;
        self.bitmaps.mark_drawn(slot);
        Ok(())
    }

    pub fn draw_bitmap(&mut self, id: BitmapId, x: u16, y: u16) -> Result<(), EveError> {
        self.draw_bitmap_cell(id, x, y, 0)
    }

    /// Draw one cell of a bitmap, loading it into a handle first if needed.
    pub fn draw_bitmap_cell(&mut self, id: BitmapId, x: u16, y: u16, cell: u8) -> Result<(), EveError> {
        let slot = if self.config.cache_bitmap_handles {
            match self.bitmaps.descriptor(id)?.slot() {
                Some(slot) => slot,
                None => self.use_bitmap(id)?,
            }
        } else {
            self.set_bitmap_handle(0, id)?
        };
        self.draw_bitmap_in_handle(slot, x, y, cell)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EveConfig;
    use crate::sim::SimDevice;
    use crate::transport::TransportError;

    #[test]
    fn test_allocation_is_monotonic() {
        let mut m = BitmapManager::new(8, 15);
        let a = m.allocate(BitmapFormat::L1, 9, 10).unwrap();
        let b = m.allocate(BitmapFormat::Rgb565, 4, 4).unwrap();
        let c = m.allocate(BitmapFormat::L4, 3, 1).unwrap();

        let (da, db, dc) = (
            *m.descriptor(a).unwrap(),
            *m.descriptor(b).unwrap(),
            *m.descriptor(c).unwrap(),
        );
        assert_eq!(da.data_size(), 20);
        assert_eq!(db.data_size(), 32);
        assert_eq!(dc.data_size(), 2);
        assert!(db.address() >= da.address() + da.data_size());
        assert!(dc.address() >= db.address() + db.data_size());
        assert_eq!(m.ram_used(), 54);
        assert_eq!(da.slot(), None);
    }

    #[test]
    fn test_allocation_limits() {
        let mut m = BitmapManager::new(3, 15);
        m.allocate(BitmapFormat::L8, 1, 1).unwrap();
        let big = |m: &mut BitmapManager| {
            m.allocate_verbose(BitmapFormat::L8, 1000, 200, 1, Filter::Nearest, Wrap::Border, Wrap::Border, 1, 1)
        };
        big(&mut m).unwrap();
        assert_eq!(big(&mut m), Err(EveError::OutOfGraphicsMemory));
        m.allocate(BitmapFormat::L8, 1, 1).unwrap();
        assert_eq!(m.allocate(BitmapFormat::L8, 1, 1), Err(EveError::BitmapTableFull));
    }

    #[test]
    fn test_oversized_dimensions_rejected() {
        let mut m = BitmapManager::new(4, 15);
        assert_eq!(m.allocate(BitmapFormat::Rgb565, u32::MAX, 1), Err(EveError::OutOfGraphicsMemory));
        assert_eq!(
            m.allocate(BitmapFormat::Rgb565, 512, 1),
            Err(EveError::BitmapDimensions { width: 1024, height: 1 })
        );
        assert_eq!(
            m.allocate(BitmapFormat::L1, 8, 512),
            Err(EveError::BitmapDimensions { width: 1, height: 512 })
        );
        assert_eq!(
            m.allocate_verbose(BitmapFormat::L8, 4, 4, u32::MAX, Filter::Nearest, Wrap::Border, Wrap::Border, 4, 4),
            Err(EveError::OutOfGraphicsMemory)
        );
        assert_eq!(
            m.allocate_verbose(BitmapFormat::L8, 4, 4, 1, Filter::Nearest, Wrap::Border, Wrap::Border, 600, 4),
            Err(EveError::BitmapDimensions { width: 600, height: 4 })
        );
        assert!(m.is_empty());
        assert_eq!(m.ram_used(), 0);

        let id = m.allocate(BitmapFormat::L8, 511, 511).unwrap();
        assert_eq!(m.set_size(id, 600, 10), Err(EveError::BitmapDimensions { width: 600, height: 10 }));
        assert_eq!(m.descriptor(id).unwrap().render_size(), (511, 511));
    }

    #[test]
    fn test_verbose_size_counts_cells() {
        let mut m = BitmapManager::new(2, 15);
        let id = m
            .allocate_verbose(BitmapFormat::L1, 2, 16, 10, Filter::Nearest, Wrap::Border, Wrap::Border, 48, 64)
            .unwrap();
        let desc = m.descriptor(id).unwrap();
        assert_eq!(desc.data_size(), 320);
        assert_eq!(desc.render_size(), (48, 64));
    }

    #[test]
    fn test_params_and_size_keep_other_bits() {
        let mut m = BitmapManager::new(2, 15);
        let id = m.allocate(BitmapFormat::Argb4, 100, 50).unwrap();
        m.set_params(id, Filter::Nearest, Wrap::Repeat, Wrap::Repeat).unwrap();
        let word = m.descriptor(id).unwrap().size_word();
        assert_eq!(word, dl::bitmap_size(Filter::Nearest, Wrap::Repeat, Wrap::Repeat, 100, 50));

        m.set_size(id, 200, 25).unwrap();
        let word = m.descriptor(id).unwrap().size_word();
        assert_eq!(word, dl::bitmap_size(Filter::Nearest, Wrap::Repeat, Wrap::Repeat, 200, 25));
    }

    #[test]
    fn test_mutation_clears_binding() {
        let mut m = BitmapManager::new(2, 4);
        let id = m.allocate(BitmapFormat::L8, 8, 8).unwrap();
        m.bind(2, id).unwrap();
        m.set_size(id, 4, 4).unwrap();
        assert_eq!(m.descriptor(id).unwrap().slot(), None);
        assert_eq!(m.occupant(2), None);
        assert!(m.is_consistent());
    }

    #[test]
    fn test_pick_prefers_empty_and_skips_last_used() {
        let mut m = BitmapManager::new(4, 3);
        let ids: Vec<_> = (0..3).map(|_| m.allocate(BitmapFormat::L8, 1, 1).unwrap()).collect();
        for (slot, id) in ids.iter().enumerate() {
            assert_eq!(m.pick_slot(), slot as u8);
            m.bind(slot as u8, *id).unwrap();
        }
        m.mark_drawn(0);
        // Cursor wrapped to 0, which is last used
        assert_eq!(m.pick_slot(), 1);
        m.release_slot(2);
        m.mark_drawn(2);
        assert_eq!(m.pick_slot(), 0);
    }

    #[test]
    fn test_bind_keeps_bijection() {
        let mut m = BitmapManager::new(4, 2);
        let a = m.allocate(BitmapFormat::L8, 1, 1).unwrap();
        let b = m.allocate(BitmapFormat::L8, 1, 1).unwrap();
        assert_eq!(m.bind(0, a).unwrap(), None);
        assert_eq!(m.bind(0, b).unwrap(), Some(a));
        assert_eq!(m.descriptor(a).unwrap().slot(), None);
        assert!(m.is_consistent());

        // Moving a bound bitmap empties its old slot
        assert_eq!(m.bind(1, b).unwrap(), None);
        assert_eq!(m.occupant(0), None);
        assert!(m.is_consistent());

        assert_eq!(m.bind(2, a), Err(EveError::InvalidHandle(2)));
    }

    #[test]
    fn test_unmanaged_slot_is_emptied() {
        let mut m = BitmapManager::new(4, 2);
        let a = m.allocate(BitmapFormat::L8, 1, 1).unwrap();
        m.bind(0, a).unwrap();
        m.mark_drawn(1);
        assert_eq!(m.take_unmanaged_slot(), 0);
        assert_eq!(m.descriptor(a).unwrap().slot(), None);
        assert!(m.is_consistent());
    }

    fn session(config: EveConfig) -> Eve<SimDevice> {
        Eve::new(SimDevice::new(), config).unwrap()
    }

    fn bitmap_handle_words(eve: &Eve<SimDevice>) -> usize {
        eve.bus()
            .executed_words()
            .iter()
            .filter(|w| *w >> 24 == 1)
            .count()
    }

    #[test]
    fn test_alternating_draws_bind_once() {
        let mut config = EveConfig::default();
        config.bitmap_handles = 2;
        let mut eve = session(config);
        let x = eve.create_bitmap(BitmapFormat::L8, 8, 8).unwrap();
        let y = eve.create_bitmap(BitmapFormat::L8, 8, 8).unwrap();

        eve.begin_frame().unwrap();
        for _ in 0..4 {
            eve.draw_bitmap(x, 0, 0).unwrap();
            eve.draw_bitmap(y, 10, 0).unwrap();
        }
        eve.end_frame().unwrap();

        // One BITMAP_SOURCE per bind
        assert_eq!(bitmap_handle_words(&eve), 2);
        assert!(eve.bitmap_manager().is_consistent());
    }

    #[test]
    fn test_third_bitmap_evicts_least_recent() {
        let mut config = EveConfig::default();
        config.bitmap_handles = 2;
        let mut eve = session(config);
        let x = eve.create_bitmap(BitmapFormat::L8, 8, 8).unwrap();
        let y = eve.create_bitmap(BitmapFormat::L8, 8, 8).unwrap();
        let z = eve.create_bitmap(BitmapFormat::L8, 8, 8).unwrap();

        eve.begin_frame().unwrap();
        eve.draw_bitmap(x, 0, 0).unwrap();
        eve.draw_bitmap(y, 0, 0).unwrap();
        eve.draw_bitmap(z, 0, 0).unwrap();
        eve.end_frame().unwrap();

        assert_eq!(eve.bitmap(x).unwrap().slot(), None);
        assert_eq!(eve.bitmap(y).unwrap().slot(), Some(1));
        assert_eq!(eve.bitmap(z).unwrap().slot(), Some(0));
    }

    #[test]
    fn test_bind_emits_handle_source_layout_size() {
        let mut eve = session(EveConfig::default());
        let id = eve.create_bitmap(BitmapFormat::Rgb565, 16, 4).unwrap();
        let desc = *eve.bitmap(id).unwrap();

        eve.begin_frame().unwrap();
        eve.set_bitmap_handle(3, id).unwrap();
        eve.draw_bitmap_in_handle(3, 5, 6, 0).unwrap();
        eve.end_frame().unwrap();

        // Skip DLSTART and CLEAR
        let words = eve.bus().executed_words();
        assert_eq!(
            &words[2..8],
            &[
                dl::bitmap_handle(3),
                dl::bitmap_source(desc.address()),
                desc.layout_word(),
                desc.size_word(),
                dl::begin(Primitive::Bitmaps),
                dl::vertex2ii(5, 6, 3, 0),
            ]
        );
        assert_eq!(eve.bitmap_manager().last_used(), Some(3));
    }

    #[test]
    fn test_failed_load_is_not_recorded() {
        let mut eve = session(EveConfig::default());
        let id = eve.create_bitmap(BitmapFormat::L8, 8, 8).unwrap();
        let desc = *eve.bitmap(id).unwrap();

        eve.begin_frame().unwrap();
        eve.bus_mut().fail_next(TransportError(-5));
        assert!(eve.draw_bitmap(id, 0, 0).is_err());
        assert_eq!(eve.bitmap(id).unwrap().slot(), None);
        assert!(eve.bitmap_manager().is_consistent());

        eve.draw_bitmap(id, 0, 0).unwrap();
        eve.end_frame().unwrap();

        assert!(eve.bitmap(id).unwrap().slot().is_some());
        assert!(eve.bus().executed_words().contains(&dl::bitmap_source(desc.address())));
        assert!(eve.bitmap_manager().is_consistent());
    }

    #[test]
    fn test_failed_load_empties_handle() {
        let mut eve = session(EveConfig::default());
        let a = eve.create_bitmap(BitmapFormat::L8, 8, 8).unwrap();
        let b = eve.create_bitmap(BitmapFormat::L8, 8, 8).unwrap();

        eve.begin_frame().unwrap();
        eve.set_bitmap_handle(0, a).unwrap();
        eve.bitmap_handle(1).unwrap();
        eve.bus_mut().fail_next(TransportError(-5));
        assert!(eve.set_bitmap_handle(0, b).is_err());
        eve.end_frame().unwrap();

        assert_eq!(eve.bitmap_manager().occupant(0), None);
        assert_eq!(eve.bitmap(a).unwrap().slot(), None);
        assert_eq!(eve.set_bitmap_handle(99, a), Err(EveError::InvalidHandle(99)));
        assert!(eve.bitmap_manager().is_consistent());
    }

    #[test]
    fn test_uncached_handles_always_rebind_slot_zero() {
        let mut eve = session(EveConfig::uncached());
        let id = eve.create_bitmap(BitmapFormat::L8, 8, 8).unwrap();
        eve.begin_frame().unwrap();
        eve.draw_bitmap(id, 0, 0).unwrap();
        eve.draw_bitmap(id, 0, 0).unwrap();
        eve.end_frame().unwrap();
        assert_eq!(bitmap_handle_words(&eve), 2);
    }

    #[test]
    fn test_buffer_data_writes_graphics_ram() {
        let mut eve = session(EveConfig::default());
        let _pad = eve.create_bitmap(BitmapFormat::L8, 4, 1).unwrap();
        let id = eve.create_bitmap(BitmapFormat::L8, 4, 2).unwrap();
        eve.bitmap_buffer_data(id, 2, &[1, 2, 3]).unwrap();
        assert_eq!(eve.bus().memory(mem::RAM_G + 4, 5), [0, 0, 1, 2, 3]);

        assert_eq!(
            eve.bitmap_buffer_data(id, 6, &[0; 3]),
            Err(EveError::OutOfBounds { address: mem::RAM_G + 10, len: 3 })
        );
        eve.begin_frame().unwrap();
        assert_eq!(eve.bitmap_buffer_data(id, 0, &[0]), Err(EveError::AlreadyInFrame));
    }
}
