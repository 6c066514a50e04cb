//! Bus Transport
//!
//! The platform-specific half of the driver. An implementation moves raw
//! bytes between the host and the coprocessor over SPI (or anything that
//! behaves like it) and knows nothing about commands or registers.
//!
//! Addresses passed to the transport are device addresses. The transport is
//! responsible for framing them as described in [`crate::wire`]: reads send
//! [`wire::read_header`](crate::wire::read_header) followed by a dummy byte,
//! writes send [`wire::write_header`](crate::wire::write_header).

use core::fmt;

/// Failure reported by a transport primitive.
///
/// Carries the platform's negative status code in `[-128, -1]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportError(pub i8);

impl TransportError {
    /// Generic bus failure.
    pub const BUS: TransportError = TransportError(-1);

    /// Status code reported by the platform.
    pub fn code(&self) -> i8 {
        self.0
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "transport error {}", self.0)
    }
}

/// Bus clock selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusSpeed {
    /// At most 4 MHz, used before the device PLL is running.
    Startup,
    /// As close to 30 MHz as the platform allows.
    Run,
}

/// Raw access to the coprocessor bus.
///
/// All calls are synchronous. The append sequence (`begin_append`,
/// `append`, `end_append`) is one contiguous write starting at the given
/// address; implementations should avoid re-sending the address between
/// `append` calls.
pub trait Transport {
    /// Prepare the bus and control pins.
    fn initialize(&mut self) -> Result<(), TransportError>;

    /// Select the bus clock.
    fn set_speed(&mut self, speed: BusSpeed) -> Result<(), TransportError>;

    /// Drive the power-down line. The device must be fully reinitialized
    /// after leaving reset.
    fn set_reset(&mut self, in_reset: bool) -> Result<(), TransportError>;

    /// Write `data` starting at `address`.
    fn write(&mut self, address: u32, data: &[u8]) -> Result<(), TransportError>;

    /// Fill `buf` with bytes read starting at `address`.
    fn read(&mut self, address: u32, buf: &mut [u8]) -> Result<(), TransportError>;

    /// Open an append write at `address`.
    fn begin_append(&mut self, address: u32) -> Result<(), TransportError>;

    /// Continue the open append write.
    fn append(&mut self, data: &[u8]) -> Result<(), TransportError>;

    /// Close the open append write.
    fn end_append(&mut self) -> Result<(), TransportError>;

    /// Send a host command (see [`crate::regs::host`]).
    fn host_command(&mut self, command: u8) -> Result<(), TransportError>;

    /// Block for `ms` milliseconds.
    fn delay_ms(&mut self, ms: u32);

    /// Free-running millisecond counter.
    fn ticks(&self) -> u32;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn initialize(&mut self) -> Result<(), TransportError> {
        (**self).initialize()
    }

    fn set_speed(&mut self, speed: BusSpeed) -> Result<(), TransportError> {
        (**self).set_speed(speed)
    }

    fn set_reset(&mut self, in_reset: bool) -> Result<(), TransportError> {
        (**self).set_reset(in_reset)
    }

    fn write(&mut self, address: u32, data: &[u8]) -> Result<(), TransportError> {
        (**self).write(address, data)
    }

    fn read(&mut self, address: u32, buf: &mut [u8]) -> Result<(), TransportError> {
        (**self).read(address, buf)
    }

    fn begin_append(&mut self, address: u32) -> Result<(), TransportError> {
        (**self).begin_append(address)
    }

    fn append(&mut self, data: &[u8]) -> Result<(), TransportError> {
        (**self).append(data)
    }

    fn end_append(&mut self) -> Result<(), TransportError> {
        (**self).end_append()
    }

    fn host_command(&mut self, command: u8) -> Result<(), TransportError> {
        (**self).host_command(command)
    }

    fn delay_ms(&mut self, ms: u32) {
        (**self).delay_ms(ms)
    }

    fn ticks(&self) -> u32 {
        (**self).ticks()
    }
}
