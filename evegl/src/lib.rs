//! EVE Graphics Driver
//!
//! This crate drives an FT800-class graphics coprocessor over a narrow
//! serial bus. It turns drawing and widget calls into the device's command
//! stream while keeping bus traffic down, and reports touch input sampled
//! by the device.
//!
//! # Architecture
//!
//! The driver is organized into:
//!
//! - `transport`: Bus access trait implemented by the platform
//! - `wire`: Device byte order and address framing
//! - `regs`: Register map, opcodes and option bits
//! - `dl`: Display list word encoders
//! - `config`: Session configuration and panel timings
//! - `encoder`: Command ring writer with flow control
//! - `context`: Cache of the device drawing state
//! - `coproc`: Coprocessor widget and matrix commands
//! - `bitmap`: Graphics RAM allocation and bitmap handle management
//! - `frame`: Device start-up, frame sequencing and touch sampling
//! - `ui`: Immediate-mode controls and their focus tracking
//!
//! Everything hangs off one [`Eve`] session, which owns the transport.
//! Tables are sized from [`EveConfig`] when the session is created; no
//! allocation happens after that.

#![no_std]

extern crate alloc;

pub mod bitmap;
pub mod config;
pub mod context;
pub mod coproc;
pub mod dl;
pub mod encoder;
pub mod frame;
pub mod regs;
#[cfg(any(test, feature = "sim"))]
pub mod sim;
pub mod transport;
pub mod ui;
pub mod wire;

use core::fmt;

pub use bitmap::{BitmapDescriptor, BitmapId, BitmapManager};
pub use config::{DisplayTimings, EveConfig};
pub use frame::TouchSample;
pub use regs::{
    BitmapFormat, BlendFactor, ClearFlags, ColorMask, Filter, Options, Primitive, StencilOp, TestFunc, Wrap,
};
pub use transport::{BusSpeed, Transport, TransportError};
pub use ui::{ControlId, Focus, Rect, Ui};

use context::{ContextStack, CoprocessorContext, StateGroup};
use encoder::CommandQueue;

/// Driver error types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EveError {
    /// A bus primitive failed.
    Transport(TransportError),
    /// REG_ID did not read back as expected during initialization.
    DeviceUnresponsive {
        /// Value read from REG_ID.
        id: u8,
    },
    /// Configuration rejected.
    InvalidConfig(&'static str),
    /// The coprocessor reported a fault while executing commands.
    CoprocessorFault,
    /// SAVE_CONTEXT beyond the configured depth.
    StackOverflow,
    /// RESTORE_CONTEXT without a matching save.
    StackUnderflow,
    /// No room left in the bitmap table.
    BitmapTableFull,
    /// Graphics RAM exhausted.
    OutOfGraphicsMemory,
    /// Unknown bitmap id.
    InvalidBitmap(BitmapId),
    /// Handle outside the managed range.
    InvalidHandle(u8),
    /// Bitmap dimensions do not fit the layout or size fields.
    BitmapDimensions {
        /// Requested width, or stride for layouts.
        width: u32,
        /// Requested height.
        height: u32,
    },
    /// Write outside the target memory region.
    OutOfBounds {
        /// Device address of the first byte.
        address: u32,
        /// Length of the write in bytes.
        len: usize,
    },
    /// Operation needs an open frame.
    NotInFrame,
    /// Operation cannot run inside a frame.
    AlreadyInFrame,
    /// A single command does not fit the command ring.
    CommandTooLarge(usize),
}

impl fmt::Display for EveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EveError::Transport(err) => write!(f, "{}", err),
            EveError::DeviceUnresponsive { id } => {
                write!(f, "device not responding (REG_ID = {:#04x})", id)
            }
            EveError::InvalidConfig(reason) => write!(f, "invalid configuration: {}", reason),
            EveError::CoprocessorFault => write!(f, "coprocessor fault"),
            EveError::StackOverflow => write!(f, "context stack overflow"),
            EveError::StackUnderflow => write!(f, "context stack underflow"),
            EveError::BitmapTableFull => write!(f, "bitmap table full"),
            EveError::OutOfGraphicsMemory => write!(f, "out of graphics memory"),
            EveError::InvalidBitmap(id) => write!(f, "invalid bitmap {}", id.index()),
            EveError::InvalidHandle(handle) => write!(f, "invalid bitmap handle {}", handle),
            EveError::BitmapDimensions { width, height } => {
                write!(f, "bitmap dimensions {}x{} out of range", width, height)
            }
            EveError::OutOfBounds { address, len } => {
                write!(f, "write of {} bytes at {:#x} out of bounds", len, address)
            }
            EveError::NotInFrame => write!(f, "no frame in progress"),
            EveError::AlreadyInFrame => write!(f, "frame in progress"),
            EveError::CommandTooLarge(size) => write!(f, "command of {} bytes exceeds queue", size),
        }
    }
}

impl From<TransportError> for EveError {
    fn from(err: TransportError) -> Self {
        EveError::Transport(err)
    }
}

/// A driver session.
///
/// Owns the transport and all host-side mirrors of device state. Every
/// operation goes through `&mut self`; there is no shared state between
/// sessions.
pub struct Eve<T: Transport> {
    queue: CommandQueue<T>,
    config: EveConfig,
    context: ContextStack,
    coproc: CoprocessorContext,
    bitmaps: BitmapManager,
    touch: TouchSample,
    in_frame: bool,
}

impl<T: Transport> Eve<T> {
    /// Create a session over `bus`. The device is not touched until
    /// [`initialize`](Self::initialize).
    pub fn new(bus: T, config: EveConfig) -> Result<Self, EveError> {
        config.validate()?;
        Ok(Eve {
            queue: CommandQueue::new(bus),
            context: ContextStack::new(config.context_stack_depth, config.cache_graphics_context),
            coproc: CoprocessorContext::new(),
            bitmaps: BitmapManager::new(config.max_bitmaps, config.bitmap_handles),
            touch: TouchSample::default(),
            in_frame: false,
            config,
        })
    }

    pub fn config(&self) -> &EveConfig {
        &self.config
    }

    pub fn bus(&self) -> &T {
        self.queue.bus()
    }

    pub fn bus_mut(&mut self) -> &mut T {
        self.queue.bus_mut()
    }

    /// End the session and give the transport back.
    pub fn into_inner(self) -> T {
        self.queue.into_inner()
    }

    /// The command ring writer, for commands this crate does not wrap.
    pub fn queue(&mut self) -> &mut CommandQueue<T> {
        &mut self.queue
    }

    /// Current graphics context cache.
    pub fn graphics_context(&self) -> &context::GraphicsContext {
        self.context.current()
    }

    /// Drop all host-side state, as after a device reset.
    fn reset_host_state(&mut self) {
        self.queue.rewind();
        self.context.reset();
        self.coproc = CoprocessorContext::new();
        self.bitmaps = BitmapManager::new(self.config.max_bitmaps, self.config.bitmap_handles);
        self.touch = TouchSample::default();
        self.in_frame = false;
    }

    /// Immediate register writes would interleave with the open append.
    fn require_idle(&self) -> Result<(), EveError> {
        if self.in_frame {
            Err(EveError::AlreadyInFrame)
        } else {
            Ok(())
        }
    }

    /// Send `word` unless the cache shows `group` already holds it. The
    /// cache only records words that reached the ring.
    fn set_state(&mut self, group: StateGroup, word: u32) -> Result<(), EveError> {
        if self.context.is_current(group, word) {
            return Ok(());
        }
        self.queue.command(word)?;
        self.context.update(group, word);
        Ok(())
    }

    // Vertex lists

    pub fn begin(&mut self, primitive: Primitive) -> Result<(), EveError> {
        self.queue.command(dl::begin(primitive))
    }

    pub fn vertex2ii(&mut self, x: u16, y: u16, handle: u8, cell: u8) -> Result<(), EveError> {
        self.queue.command(dl::vertex2ii(x, y, handle, cell))
    }

    /// Vertex in 1/16 pixel units.
    pub fn vertex2f(&mut self, x: i16, y: i16) -> Result<(), EveError> {
        self.queue.command(dl::vertex2f(x, y))
    }

    /// Close a vertex list. The device does not need END between BEGINs,
    /// so nothing is sent.
    pub fn end(&mut self) -> Result<(), EveError> {
        Ok(())
    }

    // Bitmap state

    pub fn bitmap_handle(&mut self, handle: u8) -> Result<(), EveError> {
        self.set_state(StateGroup::BitmapHandle, dl::bitmap_handle(handle))
    }

    pub fn bitmap_source(&mut self, address: u32) -> Result<(), EveError> {
        self.queue.command(dl::bitmap_source(address))
    }

    pub fn bitmap_layout(&mut self, format: BitmapFormat, stride: u32, height: u32) -> Result<(), EveError> {
        self.queue.command(dl::bitmap_layout(format, stride, height))
    }

    /// BITMAP_SIZE for the current handle.
    pub fn bitmap_sampling(&mut self, filter: Filter, wrap_x: Wrap, wrap_y: Wrap, width: u32, height: u32) -> Result<(), EveError> {
        self.queue.command(dl::bitmap_size(filter, wrap_x, wrap_y, width, height))
    }

    pub fn cell(&mut self, cell: u8) -> Result<(), EveError> {
        self.set_state(StateGroup::Cell, dl::cell(cell))
    }

    /// Set coefficient `index` (0 = A .. 5 = F) of the bitmap transform,
    /// signed 8.8 fixed point. Never cached, CMD_SETMATRIX also writes it.
    pub fn bitmap_transform(&mut self, index: u8, value: i32) -> Result<(), EveError> {
        self.queue.command(dl::bitmap_transform(index, value))
    }

    // Tests and blending

    pub fn alpha_func(&mut self, func: TestFunc, reference: u8) -> Result<(), EveError> {
        self.set_state(StateGroup::AlphaFunc, dl::alpha_func(func, reference))
    }

    pub fn blend_func(&mut self, src: BlendFactor, dst: BlendFactor) -> Result<(), EveError> {
        self.set_state(StateGroup::BlendFunc, dl::blend_func(src, dst))
    }

    pub fn stencil_func(&mut self, func: TestFunc, reference: u8, mask: u8) -> Result<(), EveError> {
        self.set_state(StateGroup::StencilFunc, dl::stencil_func(func, reference, mask))
    }

    pub fn stencil_op(&mut self, fail: StencilOp, pass: StencilOp) -> Result<(), EveError> {
        self.set_state(StateGroup::StencilOp, dl::stencil_op(fail, pass))
    }

    // Clear values

    pub fn clear_color_a(&mut self, alpha: u8) -> Result<(), EveError> {
        self.set_state(StateGroup::ClearColorA, dl::clear_color_a(alpha))
    }

    /// Clear color as `0xRRGGBB`.
    pub fn clear_color_rgb(&mut self, color: u32) -> Result<(), EveError> {
        self.set_state(StateGroup::ClearColorRgb, dl::clear_color_rgb(color))
    }

    pub fn clear_color_rgb_components(&mut self, r: u8, g: u8, b: u8) -> Result<(), EveError> {
        self.clear_color_rgb(dl::rgb(r, g, b))
    }

    pub fn clear_stencil(&mut self, value: u8) -> Result<(), EveError> {
        self.set_state(StateGroup::ClearStencil, dl::clear_stencil(value))
    }

    pub fn clear_tag(&mut self, tag: u8) -> Result<(), EveError> {
        self.set_state(StateGroup::ClearTag, dl::clear_tag(tag))
    }

    pub fn clear(&mut self, flags: ClearFlags) -> Result<(), EveError> {
        self.queue.command(dl::clear(flags))
    }

    // Current color

    pub fn color_a(&mut self, alpha: u8) -> Result<(), EveError> {
        self.set_state(StateGroup::ColorA, dl::color_a(alpha))
    }

    /// Drawing color as `0xRRGGBB`.
    pub fn color_rgb(&mut self, color: u32) -> Result<(), EveError> {
        self.set_state(StateGroup::ColorRgb, dl::color_rgb(color))
    }

    pub fn color_rgb_components(&mut self, r: u8, g: u8, b: u8) -> Result<(), EveError> {
        self.color_rgb(dl::rgb(r, g, b))
    }

    pub fn color_mask(&mut self, mask: ColorMask) -> Result<(), EveError> {
        self.queue.command(dl::color_mask(mask))
    }

    // Control flow

    /// End of display list.
    pub fn display(&mut self) -> Result<(), EveError> {
        self.queue.command(dl::display())
    }

    pub fn call(&mut self, dest: u16) -> Result<(), EveError> {
        self.queue.command(dl::call(dest))
    }

    pub fn jump(&mut self, dest: u16) -> Result<(), EveError> {
        self.queue.command(dl::jump(dest))
    }

    pub fn ret(&mut self) -> Result<(), EveError> {
        self.queue.command(dl::ret())
    }

    pub fn macro_(&mut self, register: u8) -> Result<(), EveError> {
        self.queue.command(dl::macro_(register))
    }

    // Context stack

    /// Push the drawing state. Fails once the configured depth is reached.
    pub fn save_context(&mut self) -> Result<(), EveError> {
        if self.context.depth() == self.context.capacity() {
            return Err(EveError::StackOverflow);
        }
        self.queue.command(dl::save_context())?;
        self.context.push()
    }

    /// Pop the drawing state saved by [`save_context`](Self::save_context).
    pub fn restore_context(&mut self) -> Result<(), EveError> {
        if self.context.depth() == 0 {
            return Err(EveError::StackUnderflow);
        }
        self.queue.command(dl::restore_context())?;
        self.context.pop()
    }

    // Primitive parameters

    /// Line width in 1/16 pixel units.
    pub fn line_width(&mut self, width: u16) -> Result<(), EveError> {
        self.set_state(StateGroup::LineWidth, dl::line_width(width))
    }

    /// Point radius in 1/16 pixel units.
    pub fn point_size(&mut self, size: u32) -> Result<(), EveError> {
        self.set_state(StateGroup::PointSize, dl::point_size(size))
    }

    // Scissor and tags

    pub fn scissor_size(&mut self, width: u16, height: u16) -> Result<(), EveError> {
        self.set_state(StateGroup::ScissorSize, dl::scissor_size(width, height))
    }

    pub fn scissor_xy(&mut self, x: u16, y: u16) -> Result<(), EveError> {
        self.set_state(StateGroup::ScissorXy, dl::scissor_xy(x, y))
    }

    pub fn tag(&mut self, tag: u8) -> Result<(), EveError> {
        self.set_state(StateGroup::Tag, dl::tag(tag))
    }

    pub fn tag_mask(&mut self, enabled: bool) -> Result<(), EveError> {
        self.set_state(StateGroup::TagMask, dl::tag_mask(enabled))
    }
}
