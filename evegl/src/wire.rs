//! Wire Format
//!
//! The coprocessor is little-endian and its address space is 24 bits wide.
//! Every value that crosses the bus goes through these helpers so that the
//! byte order never depends on the host.

/// Mask for the 22 addressable bits of the device memory map.
pub const ADDRESS_MASK: u32 = 0x3F_FFFF;

/// Bit set in the top address byte of a write transaction.
pub const WRITE_FLAG: u32 = 0x80_0000;

/// Encode a 32-bit value in device byte order.
#[inline]
pub const fn encode_u32(value: u32) -> [u8; 4] {
    value.to_le_bytes()
}

/// Encode a 16-bit value in device byte order.
#[inline]
pub const fn encode_u16(value: u16) -> [u8; 2] {
    value.to_le_bytes()
}

/// Decode a 32-bit value read from the device.
#[inline]
pub const fn decode_u32(bytes: [u8; 4]) -> u32 {
    u32::from_le_bytes(bytes)
}

/// Decode a 16-bit value read from the device.
#[inline]
pub const fn decode_u16(bytes: [u8; 2]) -> u16 {
    u16::from_le_bytes(bytes)
}

/// Address header for a write transaction, most significant byte first.
pub const fn write_header(address: u32) -> [u8; 3] {
    let a = (address & ADDRESS_MASK) | WRITE_FLAG;
    [(a >> 16) as u8, (a >> 8) as u8, a as u8]
}

/// Address header for a read transaction, most significant byte first.
///
/// The transport must clock out one dummy byte after the header before
/// the device starts returning data.
pub const fn read_header(address: u32) -> [u8; 3] {
    let a = address & ADDRESS_MASK;
    [(a >> 16) as u8, (a >> 8) as u8, a as u8]
}

/// Frame for a host command. The device ignores the two trailing bytes.
pub const fn host_command_frame(command: u8) -> [u8; 3] {
    [command, 0, 0]
}

/// Round `size` up to the next multiple of four.
#[inline]
pub const fn align4(size: usize) -> usize {
    (size + 3) & !3
}
