//! Command queue.
//!
//! Host-side view of the coprocessor's 4 KiB command ring. Commands are
//! streamed into RAM_CMD through one open append write; the device only
//! starts executing them once the write pointer is committed to
//! REG_CMD_WRITE.
//!
//! Flow control is done ahead of time: a command states its full size with
//! [`CommandQueue::ensure_space`] before emitting anything, so a command is
//! never split across a flush. When the cached free space runs out the
//! queue is flushed, which blocks until the device has drained every
//! pending byte.

use crate::regs::{mem, reg, val};
use crate::transport::Transport;
use crate::wire;
use crate::EveError;

/// Usable bytes in the ring. The device keeps one word free so that a
/// full ring can be told apart from an empty one.
pub const CMD_QUEUE_CAPACITY: u16 = 4092;

/// Mask applied to ring offsets.
pub const CMD_QUEUE_MASK: u16 = (mem::RAM_CMD_SIZE - 1) as u16;

const ZERO_PAD: [u8; 4] = [0; 4];

/// Command ring writer that owns the bus.
pub struct CommandQueue<T: Transport> {
    bus: T,
    /// Last read pointer reported by the device.
    read_index: u16,
    /// Offset of the next byte to write, always masked to the ring.
    write_index: u16,
    /// Bytes that may be written before the next flush.
    free_space: u16,
    /// Whether an append write is open at `write_index`.
    appending: bool,
    /// Flushes performed since creation.
    flushes: u32,
}

impl<T: Transport> CommandQueue<T> {
    /// Wrap a transport. The ring is assumed empty at offset zero.
    pub fn new(bus: T) -> Self {
        CommandQueue {
            bus,
            read_index: 0,
            write_index: 0,
            free_space: CMD_QUEUE_CAPACITY,
            appending: false,
            flushes: 0,
        }
    }

    pub fn bus(&self) -> &T {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut T {
        &mut self.bus
    }

    /// Give the transport back.
    pub fn into_inner(self) -> T {
        self.bus
    }

    pub fn read_index(&self) -> u16 {
        self.read_index
    }

    pub fn write_index(&self) -> u16 {
        self.write_index
    }

    pub fn free_space(&self) -> u16 {
        self.free_space
    }

    pub fn is_appending(&self) -> bool {
        self.appending
    }

    /// Number of flushes performed so far.
    pub fn flushes(&self) -> u32 {
        self.flushes
    }

    // Immediate register access. Must not be used while an append is open,
    // the transport would interleave the two transactions.

    pub fn read8(&mut self, address: u32) -> Result<u8, EveError> {
        let mut buf = [0u8; 1];
        self.bus.read(address, &mut buf)?;
        Ok(buf[0])
    }

    pub fn read16(&mut self, address: u32) -> Result<u16, EveError> {
        let mut buf = [0u8; 2];
        self.bus.read(address, &mut buf)?;
        Ok(wire::decode_u16(buf))
    }

    pub fn read32(&mut self, address: u32) -> Result<u32, EveError> {
        let mut buf = [0u8; 4];
        self.bus.read(address, &mut buf)?;
        Ok(wire::decode_u32(buf))
    }

    pub fn write8(&mut self, address: u32, value: u8) -> Result<(), EveError> {
        self.bus.write(address, &[value])?;
        Ok(())
    }

    pub fn write16(&mut self, address: u32, value: u16) -> Result<(), EveError> {
        self.bus.write(address, &wire::encode_u16(value))?;
        Ok(())
    }

    pub fn write32(&mut self, address: u32, value: u32) -> Result<(), EveError> {
        self.bus.write(address, &wire::encode_u32(value))?;
        Ok(())
    }

    /// Write a block of raw bytes to device memory.
    pub fn write_mem(&mut self, address: u32, data: &[u8]) -> Result<(), EveError> {
        self.bus.write(address, data)?;
        Ok(())
    }

    /// Open the append write at the current write pointer, if not open.
    pub fn begin_append(&mut self) -> Result<(), EveError> {
        if !self.appending {
            self.bus.begin_append(mem::RAM_CMD + self.write_index as u32)?;
            self.appending = true;
        }
        Ok(())
    }

    /// Close the append write, if open.
    pub fn end_append(&mut self) -> Result<(), EveError> {
        if self.appending {
            self.bus.end_append()?;
            self.appending = false;
        }
        Ok(())
    }

    /// Make room for `size` bytes that must reach the ring without a flush
    /// in between.
    pub fn ensure_space(&mut self, size: usize) -> Result<(), EveError> {
        if size > CMD_QUEUE_CAPACITY as usize {
            return Err(EveError::CommandTooLarge(size));
        }
        if (self.free_space as usize) < size {
            self.flush()?;
        }
        Ok(())
    }

    /// Append one word in device byte order.
    pub fn append32(&mut self, value: u32) -> Result<(), EveError> {
        self.append_bytes(&wire::encode_u32(value))
    }

    /// Append one half-word in device byte order.
    pub fn append16(&mut self, value: u16) -> Result<(), EveError> {
        self.append_bytes(&wire::encode_u16(value))
    }

    /// Append raw bytes.
    ///
    /// Callers reserve space first. A payload larger than the remaining
    /// space is streamed, flushing between chunks, which only makes sense
    /// for commands that consume their data incrementally.
    pub fn append_bytes(&mut self, mut data: &[u8]) -> Result<(), EveError> {
        self.begin_append()?;
        while !data.is_empty() {
            if self.free_space == 0 {
                self.flush()?;
            }
            let take = data.len().min(self.free_space as usize);
            let (chunk, rest) = data.split_at(take);
            self.bus.append(chunk)?;
            self.advance(take as u16);
            data = rest;
        }
        Ok(())
    }

    /// Pad with zero bytes up to the next word boundary.
    pub fn align(&mut self) -> Result<(), EveError> {
        let pad = (4 - (self.write_index & 3) as usize) & 3;
        if pad != 0 {
            self.append_bytes(&ZERO_PAD[..pad])?;
        }
        Ok(())
    }

    /// Emit a single 32-bit command.
    pub fn command(&mut self, word: u32) -> Result<(), EveError> {
        self.ensure_space(4)?;
        self.append32(word)
    }

    /// Hand everything written so far to the device and wait for it to
    /// drain, then continue appending where the stream left off.
    pub fn flush(&mut self) -> Result<(), EveError> {
        log::debug!(
            "evegl: flushing command queue (write={}, free={})",
            self.write_index,
            self.free_space
        );
        let reopen = self.appending;
        self.commit()?;
        self.flushes = self.flushes.wrapping_add(1);
        if reopen {
            self.begin_append()?;
        }
        Ok(())
    }

    /// Close the append write, publish the write pointer and block until
    /// the device has executed every queued byte.
    pub fn commit(&mut self) -> Result<(), EveError> {
        self.end_append()?;
        self.write16(reg::CMD_WRITE, self.write_index)?;
        self.wait_for_drain()
    }

    /// Spin on REG_CMD_READ until it reaches the write pointer.
    ///
    /// There is no timeout. A device that stops responding keeps this loop
    /// running; a faulted coprocessor is reported.
    pub fn wait_for_drain(&mut self) -> Result<(), EveError> {
        loop {
            let read = self.read16(reg::CMD_READ)? & CMD_QUEUE_MASK;
            if read == val::CMD_FAULT {
                log::warn!("evegl: coprocessor fault at write offset {}", self.write_index);
                return Err(EveError::CoprocessorFault);
            }
            self.read_index = read;
            if read == self.write_index {
                break;
            }
        }
        self.free_space = CMD_QUEUE_CAPACITY;
        log::trace!("evegl: command queue drained at {}", self.read_index);
        Ok(())
    }

    /// Restart the coprocessor after a fault and rewind the ring.
    pub fn reset_coprocessor(&mut self) -> Result<(), EveError> {
        self.end_append()?;
        self.write8(reg::CPURESET, 1)?;
        self.write16(reg::CMD_READ, 0)?;
        self.write16(reg::CMD_WRITE, 0)?;
        self.write8(reg::CPURESET, 0)?;
        self.read_index = 0;
        self.write_index = 0;
        self.free_space = CMD_QUEUE_CAPACITY;
        log::info!("evegl: coprocessor reset");
        Ok(())
    }

    /// Forget the ring position. Used after the device has been reset,
    /// which empties the ring without any bus traffic from us.
    pub fn rewind(&mut self) {
        self.read_index = 0;
        self.write_index = 0;
        self.free_space = CMD_QUEUE_CAPACITY;
        self.appending = false;
    }

    fn advance(&mut self, count: u16) {
        self.write_index = (self.write_index + count) & CMD_QUEUE_MASK;
        self.free_space -= count;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimDevice;
    use crate::transport::TransportError;

    fn queue() -> CommandQueue<SimDevice> {
        CommandQueue::new(SimDevice::new())
    }

    #[test]
    fn test_append_tracks_indices() {
        let mut q = queue();
        q.command(0x1122_3344).unwrap();
        q.append16(0xAABB).unwrap();
        assert_eq!(q.write_index(), 6);
        assert_eq!(q.free_space(), CMD_QUEUE_CAPACITY - 6);

        q.align().unwrap();
        assert_eq!(q.write_index(), 8);
        assert_eq!(q.free_space(), CMD_QUEUE_CAPACITY - 8);
    }

    #[test]
    fn test_ensure_space_flushes_when_short() {
        let mut q = queue();
        for i in 0..(CMD_QUEUE_CAPACITY / 4) {
            q.command(i as u32).unwrap();
        }
        assert_eq!(q.free_space(), 0);
        assert_eq!(q.flushes(), 0);

        q.ensure_space(12).unwrap();
        assert_eq!(q.flushes(), 1);
        assert_eq!(q.free_space(), CMD_QUEUE_CAPACITY);
        assert_eq!(q.write_index() % 4, 0);
        assert!(q.is_appending());
        assert_eq!(q.bus().executed_words().len(), (CMD_QUEUE_CAPACITY / 4) as usize);
    }

    #[test]
    fn test_ensure_space_never_leaves_less_than_requested() {
        let mut q = queue();
        for size in [4usize, 12, 40, 400, 4000, 4092, 8] {
            q.ensure_space(size).unwrap();
            assert!(q.free_space() as usize >= size);
            for _ in 0..size / 4 {
                q.append32(0).unwrap();
            }
        }
    }

    #[test]
    fn test_oversized_command_rejected() {
        let mut q = queue();
        assert_eq!(q.ensure_space(4096), Err(EveError::CommandTooLarge(4096)));
    }

    #[test]
    fn test_write_index_wraps() {
        let mut q = queue();
        for _ in 0..(CMD_QUEUE_CAPACITY / 4) {
            q.command(0xFFFF_FF00).unwrap();
        }
        q.flush().unwrap();
        // 4092 used, the next two words straddle the end of the ring
        q.command(0xDEAD_BEEF).unwrap();
        q.command(0xCAFE_F00D).unwrap();
        assert_eq!(q.write_index(), 4);
        q.commit().unwrap();

        let words = q.bus().executed_words();
        assert_eq!(&words[words.len() - 2..], &[0xDEAD_BEEF, 0xCAFE_F00D]);
    }

    #[test]
    fn test_streamed_payload_flushes_between_chunks() {
        let mut q = queue();
        let data = [0x5Au8; 5000];
        q.append_bytes(&data).unwrap();
        assert_eq!(q.flushes(), 1);
        q.align().unwrap();
        q.commit().unwrap();
        let executed = q.bus_mut().take_executed();
        assert_eq!(executed.len(), 5000);
        assert!(executed.iter().all(|b| *b == 0x5A));
    }

    #[test]
    fn test_commit_drains_and_closes_append() {
        let mut q = queue();
        q.command(7).unwrap();
        q.commit().unwrap();
        assert!(!q.is_appending());
        assert!(!q.bus().is_appending());
        assert_eq!(q.read_index(), 4);
        assert_eq!(q.bus().executed_words(), [7]);
    }

    #[test]
    fn test_fault_is_reported() {
        let mut q = queue();
        q.command(1).unwrap();
        q.bus_mut().inject_fault();
        assert_eq!(q.commit(), Err(EveError::CoprocessorFault));

        q.reset_coprocessor().unwrap();
        assert_eq!(q.write_index(), 0);
        assert_eq!(q.free_space(), CMD_QUEUE_CAPACITY);

        q.bus_mut().clear_executed();
        q.command(2).unwrap();
        q.commit().unwrap();
        assert_eq!(q.bus().executed_words(), [2]);
    }

    #[test]
    fn test_transport_error_propagates() {
        let mut q = queue();
        q.bus_mut().fail_next(TransportError(-3));
        assert_eq!(q.command(1), Err(EveError::Transport(TransportError(-3))));
    }

    #[test]
    fn test_register_round_trip() {
        let mut q = queue();
        q.write32(reg::TOUCH_TRANSFORM_A, 0x0001_2345).unwrap();
        assert_eq!(q.read32(reg::TOUCH_TRANSFORM_A).unwrap(), 0x0001_2345);
        q.write16(reg::HCYCLE, 548).unwrap();
        assert_eq!(q.read16(reg::HCYCLE).unwrap(), 548);
        assert_eq!(q.read8(reg::ID).unwrap(), val::CHIP_ID);
    }
}
