//! Simulated Device
//!
//! An in-memory stand-in for the coprocessor that implements [`Transport`].
//! It keeps a sparse byte map of the device address space, drains the
//! command ring the moment the write pointer is committed, and records what
//! was executed so tests can inspect the exact command stream.

use alloc::collections::BTreeMap;
use alloc::vec::Vec;

use crate::regs::{mem, reg, val};
use crate::transport::{BusSpeed, Transport, TransportError};
use crate::wire;

/// In-memory device.
#[derive(Debug)]
pub struct SimDevice {
    /// Sparse device memory.
    memory: BTreeMap<u32, u8>,
    /// Address of the next appended byte, if an append is open.
    append_at: Option<u32>,
    /// Ring offset consumed so far.
    drained: u16,
    /// Bytes consumed from the command ring, in order.
    executed: Vec<u8>,
    /// Number of write-pointer commits.
    commits: usize,
    /// Report a coprocessor fault on the next commit.
    fault: bool,
    /// Coprocessor held in reset through REG_CPURESET.
    cpu_reset: bool,
    /// Error returned by the next bus call.
    pending_error: Option<TransportError>,
    /// Current bus speed.
    speed: Option<BusSpeed>,
    /// Reset line state.
    in_reset: bool,
    /// Host commands received.
    host_commands: Vec<u8>,
    /// Simulated clock.
    ticks: u32,
}

impl SimDevice {
    /// Create a device that answers with the expected chip id and no touch.
    pub fn new() -> Self {
        let mut dev = Self {
            memory: BTreeMap::new(),
            append_at: None,
            drained: 0,
            executed: Vec::new(),
            commits: 0,
            fault: false,
            cpu_reset: false,
            pending_error: None,
            speed: None,
            in_reset: false,
            host_commands: Vec::new(),
            ticks: 0,
        };
        dev.set_register8(reg::ID, val::CHIP_ID);
        dev.set_register32(reg::TOUCH_SCREEN_XY, val::NO_TOUCH);
        dev
    }

    /// Overwrite a byte register.
    pub fn set_register8(&mut self, address: u32, value: u8) {
        self.memory.insert(address, value);
    }

    /// Overwrite a 32-bit register.
    pub fn set_register32(&mut self, address: u32, value: u32) {
        for (i, b) in wire::encode_u32(value).iter().enumerate() {
            self.memory.insert(address + i as u32, *b);
        }
    }

    /// Read back a 32-bit register.
    pub fn register32(&self, address: u32) -> u32 {
        let mut bytes = [0u8; 4];
        for (i, b) in bytes.iter_mut().enumerate() {
            *b = self.byte(address + i as u32);
        }
        wire::decode_u32(bytes)
    }

    /// Read back a byte register.
    pub fn register8(&self, address: u32) -> u8 {
        self.byte(address)
    }

    /// Place a touch at `(x, y)`, or lift it with `None`.
    pub fn set_touch(&mut self, point: Option<(i16, i16)>) {
        let raw = match point {
            Some((x, y)) => ((x as u16 as u32) << 16) | y as u16 as u32,
            None => val::NO_TOUCH,
        };
        self.set_register32(reg::TOUCH_SCREEN_XY, raw);
    }

    /// Set the tag reported under the touch point.
    pub fn set_touch_tag(&mut self, tag: u8) {
        self.set_register32(reg::TOUCH_TAG, tag as u32);
    }

    /// Fault the coprocessor on the next commit.
    pub fn inject_fault(&mut self) {
        self.fault = true;
    }

    /// Fail the next bus call with `error`.
    pub fn fail_next(&mut self, error: TransportError) {
        self.pending_error = Some(error);
    }

    /// Copy `len` bytes of device memory starting at `address`.
    pub fn memory(&self, address: u32, len: usize) -> Vec<u8> {
        (0..len as u32).map(|i| self.byte(address + i)).collect()
    }

    /// Bytes consumed from the command ring since the last call.
    pub fn take_executed(&mut self) -> Vec<u8> {
        core::mem::take(&mut self.executed)
    }

    /// Executed stream as 32-bit words.
    pub fn executed_words(&self) -> Vec<u32> {
        self.executed
            .chunks(4)
            .map(|c| {
                let mut bytes = [0u8; 4];
                bytes[..c.len()].copy_from_slice(c);
                wire::decode_u32(bytes)
            })
            .collect()
    }

    /// Clear the executed stream.
    pub fn clear_executed(&mut self) {
        self.executed.clear();
    }

    /// Number of write-pointer commits seen.
    pub fn commits(&self) -> usize {
        self.commits
    }

    /// Host commands received, in order.
    pub fn host_commands(&self) -> &[u8] {
        &self.host_commands
    }

    /// Current bus speed.
    pub fn speed(&self) -> Option<BusSpeed> {
        self.speed
    }

    /// Whether the reset line is asserted.
    pub fn in_reset(&self) -> bool {
        self.in_reset
    }

    /// Whether an append write is open.
    pub fn is_appending(&self) -> bool {
        self.append_at.is_some()
    }

    fn byte(&self, address: u32) -> u8 {
        self.memory.get(&address).copied().unwrap_or(0)
    }

    fn in_ring(address: u32) -> bool {
        address >= mem::RAM_CMD && address < mem::RAM_CMD + mem::RAM_CMD_SIZE
    }

    fn next_address(address: u32) -> u32 {
        if Self::in_ring(address) {
            mem::RAM_CMD + ((address - mem::RAM_CMD + 1) & (mem::RAM_CMD_SIZE - 1))
        } else {
            address + 1
        }
    }

    fn store(&mut self, mut address: u32, data: &[u8]) -> u32 {
        for b in data {
            self.memory.insert(address, *b);
            address = Self::next_address(address);
        }
        address
    }

    fn check(&mut self) -> Result<(), TransportError> {
        match self.pending_error.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn commit(&mut self, write_index: u16) {
        let target = write_index & (mem::RAM_CMD_SIZE as u16 - 1);
        while self.drained != target {
            let b = self.byte(mem::RAM_CMD + self.drained as u32);
            self.executed.push(b);
            self.drained = (self.drained + 1) & (mem::RAM_CMD_SIZE as u16 - 1);
        }
        self.commits += 1;

        let read = if core::mem::take(&mut self.fault) {
            val::CMD_FAULT
        } else {
            target
        };
        self.set_register32(reg::CMD_READ, read as u32);
    }
}

impl Default for SimDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for SimDevice {
    fn initialize(&mut self) -> Result<(), TransportError> {
        self.check()
    }

    fn set_speed(&mut self, speed: BusSpeed) -> Result<(), TransportError> {
        self.check()?;
        self.speed = Some(speed);
        Ok(())
    }

    fn set_reset(&mut self, in_reset: bool) -> Result<(), TransportError> {
        self.check()?;
        self.in_reset = in_reset;
        if in_reset {
            self.drained = 0;
        }
        Ok(())
    }

    fn write(&mut self, address: u32, data: &[u8]) -> Result<(), TransportError> {
        self.check()?;
        self.store(address, data);
        if address == reg::CPURESET && !data.is_empty() {
            self.cpu_reset = data[0] & 1 != 0;
            if self.cpu_reset {
                self.drained = 0;
            }
        }
        if address == reg::CMD_WRITE && data.len() >= 2 && !self.cpu_reset {
            self.commit(wire::decode_u16([data[0], data[1]]));
        }
        Ok(())
    }

    fn read(&mut self, address: u32, buf: &mut [u8]) -> Result<(), TransportError> {
        self.check()?;
        for (i, b) in buf.iter_mut().enumerate() {
            *b = self.byte(address + i as u32);
        }
        Ok(())
    }

    fn begin_append(&mut self, address: u32) -> Result<(), TransportError> {
        self.check()?;
        self.append_at = Some(address);
        Ok(())
    }

    fn append(&mut self, data: &[u8]) -> Result<(), TransportError> {
        self.check()?;
        let at = self.append_at.ok_or(TransportError::BUS)?;
        self.append_at = Some(self.store(at, data));
        Ok(())
    }

    fn end_append(&mut self) -> Result<(), TransportError> {
        self.check()?;
        self.append_at = None;
        Ok(())
    }

    fn host_command(&mut self, command: u8) -> Result<(), TransportError> {
        self.check()?;
        self.host_commands.push(command);
        Ok(())
    }

    fn delay_ms(&mut self, ms: u32) {
        self.ticks = self.ticks.wrapping_add(ms);
    }

    fn ticks(&self) -> u32 {
        self.ticks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commit_drains_ring() {
        let mut dev = SimDevice::new();
        dev.begin_append(mem::RAM_CMD).unwrap();
        dev.append(&wire::encode_u32(0xDEAD_BEEF)).unwrap();
        dev.end_append().unwrap();
        dev.write(reg::CMD_WRITE, &wire::encode_u16(4)).unwrap();

        assert_eq!(dev.executed_words(), [0xDEAD_BEEF]);
        assert_eq!(dev.register32(reg::CMD_READ), 4);
        assert_eq!(dev.commits(), 1);
    }

    #[test]
    fn test_cpu_reset_rewinds_ring() {
        let mut dev = SimDevice::new();
        dev.begin_append(mem::RAM_CMD).unwrap();
        dev.append(&wire::encode_u32(1)).unwrap();
        dev.end_append().unwrap();
        dev.write(reg::CMD_WRITE, &wire::encode_u16(4)).unwrap();

        dev.write(reg::CPURESET, &[1]).unwrap();
        dev.write(reg::CMD_WRITE, &wire::encode_u16(0)).unwrap();
        dev.write(reg::CPURESET, &[0]).unwrap();
        assert_eq!(dev.commits(), 1);
        assert_eq!(dev.executed_words(), [1]);
    }

    #[test]
    fn test_append_wraps_inside_ring() {
        let mut dev = SimDevice::new();
        dev.begin_append(mem::RAM_CMD + 4094).unwrap();
        dev.append(&[1, 2, 3, 4]).unwrap();
        assert_eq!(dev.memory(mem::RAM_CMD + 4094, 2), [1, 2]);
        assert_eq!(dev.memory(mem::RAM_CMD, 2), [3, 4]);
    }

    #[test]
    fn test_injected_error_is_one_shot() {
        let mut dev = SimDevice::new();
        dev.fail_next(TransportError(-5));
        assert_eq!(dev.initialize(), Err(TransportError(-5)));
        assert_eq!(dev.initialize(), Ok(()));
    }

    #[test]
    fn test_touch_encoding() {
        let mut dev = SimDevice::new();
        dev.set_touch(Some((100, 20)));
        assert_eq!(dev.register32(reg::TOUCH_SCREEN_XY), (100 << 16) | 20);
        dev.set_touch(None);
        assert_eq!(dev.register32(reg::TOUCH_SCREEN_XY), val::NO_TOUCH);
    }
}
