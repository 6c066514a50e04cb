//! State cache.
//!
//! Mirrors the rendering engine's persistent drawing state so that commands
//! which would set a register to the value it already holds can be dropped
//! before they reach the bus. Each cached group stores the full encoded
//! display list word last sent for it; comparison is on that word.
//!
//! The bitmap transform matrix and the coprocessor track target are not
//! cached. The matrix is also rewritten by CMD_SETMATRIX and the track
//! target is set too rarely to be worth tracking.

use alloc::vec;
use alloc::vec::Vec;

use crate::dl;
use crate::regs::{defaults, BlendFactor, StencilOp, TestFunc};
use crate::EveError;

/// Cacheable register groups, one per display list command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum StateGroup {
    AlphaFunc,
    StencilFunc,
    BlendFunc,
    Cell,
    ColorA,
    ColorRgb,
    LineWidth,
    PointSize,
    ScissorSize,
    ScissorXy,
    BitmapHandle,
    ClearStencil,
    ClearTag,
    StencilOp,
    Tag,
    TagMask,
    ClearColorA,
    ClearColorRgb,
}

impl StateGroup {
    pub const COUNT: usize = 18;

    pub const ALL: [StateGroup; StateGroup::COUNT] = [
        StateGroup::AlphaFunc,
        StateGroup::StencilFunc,
        StateGroup::BlendFunc,
        StateGroup::Cell,
        StateGroup::ColorA,
        StateGroup::ColorRgb,
        StateGroup::LineWidth,
        StateGroup::PointSize,
        StateGroup::ScissorSize,
        StateGroup::ScissorXy,
        StateGroup::BitmapHandle,
        StateGroup::ClearStencil,
        StateGroup::ClearTag,
        StateGroup::StencilOp,
        StateGroup::Tag,
        StateGroup::TagMask,
        StateGroup::ClearColorA,
        StateGroup::ClearColorRgb,
    ];

    /// Word matching the register's value at the start of a display list.
    pub const fn reset_word(self) -> u32 {
        match self {
            StateGroup::AlphaFunc => dl::alpha_func(TestFunc::Always, 0),
            StateGroup::StencilFunc => dl::stencil_func(TestFunc::Always, 0, 255),
            StateGroup::BlendFunc => dl::blend_func(BlendFactor::SrcAlpha, BlendFactor::OneMinusSrcAlpha),
            StateGroup::Cell => dl::cell(0),
            StateGroup::ColorA => dl::color_a(255),
            StateGroup::ColorRgb => dl::color_rgb(0xFF_FFFF),
            StateGroup::LineWidth => dl::line_width(16),
            StateGroup::PointSize => dl::point_size(16),
            StateGroup::ScissorSize => dl::scissor_size(512, 512),
            StateGroup::ScissorXy => dl::scissor_xy(0, 0),
            StateGroup::BitmapHandle => dl::bitmap_handle(0),
            StateGroup::ClearStencil => dl::clear_stencil(0),
            StateGroup::ClearTag => dl::clear_tag(0),
            StateGroup::StencilOp => dl::stencil_op(StencilOp::Keep, StencilOp::Keep),
            StateGroup::Tag => dl::tag(255),
            StateGroup::TagMask => dl::tag_mask(true),
            StateGroup::ClearColorA => dl::clear_color_a(0),
            StateGroup::ClearColorRgb => dl::clear_color_rgb(0),
        }
    }
}

/// One snapshot of the cached drawing state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GraphicsContext {
    words: [u32; StateGroup::COUNT],
}

impl GraphicsContext {
    /// Context as the rendering engine starts every display list.
    pub const fn new() -> Self {
        let mut words = [0u32; StateGroup::COUNT];
        let mut i = 0;
        while i < StateGroup::COUNT {
            words[i] = StateGroup::ALL[i].reset_word();
            i += 1;
        }
        GraphicsContext { words }
    }

    /// Last word sent for `group`.
    pub fn get(&self, group: StateGroup) -> u32 {
        self.words[group as usize]
    }

    fn set(&mut self, group: StateGroup, word: u32) {
        self.words[group as usize] = word;
    }
}

impl Default for GraphicsContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Live graphics context plus the saved copies behind it.
///
/// Slot 0 is the base context; a save copies the top entry one slot up.
#[derive(Debug, Clone)]
pub struct ContextStack {
    entries: Vec<GraphicsContext>,
    top: usize,
    caching: bool,
}

impl ContextStack {
    /// Stack able to hold `depth` saved contexts.
    pub fn new(depth: usize, caching: bool) -> Self {
        ContextStack {
            entries: vec![GraphicsContext::new(); depth + 1],
            top: 0,
            caching,
        }
    }

    /// Context that mirrors the device right now.
    pub fn current(&self) -> &GraphicsContext {
        &self.entries[self.top]
    }

    /// Number of saved contexts.
    pub fn depth(&self) -> usize {
        self.top
    }

    /// Saved contexts the stack can hold.
    pub fn capacity(&self) -> usize {
        self.entries.len() - 1
    }

    pub fn is_caching(&self) -> bool {
        self.caching
    }

    /// Whether the device already holds `word` for `group`. Always false
    /// with caching off.
    pub fn is_current(&self, group: StateGroup, word: u32) -> bool {
        self.caching && self.entries[self.top].get(group) == word
    }

    /// Record `word` for `group`. Returns whether it has to be sent.
    pub fn update(&mut self, group: StateGroup, word: u32) -> bool {
        if !self.caching {
            return true;
        }
        let current = &mut self.entries[self.top];
        if current.get(group) == word {
            return false;
        }
        current.set(group, word);
        true
    }

    /// Duplicate the live context for a SAVE_CONTEXT.
    pub fn push(&mut self) -> Result<(), EveError> {
        if self.top == self.capacity() {
            return Err(EveError::StackOverflow);
        }
        self.entries[self.top + 1] = self.entries[self.top];
        self.top += 1;
        Ok(())
    }

    /// Return to the previous context for a RESTORE_CONTEXT.
    pub fn pop(&mut self) -> Result<(), EveError> {
        if self.top == 0 {
            return Err(EveError::StackUnderflow);
        }
        self.top -= 1;
        Ok(())
    }

    /// Forget everything, as the device does when a display list starts.
    pub fn reset(&mut self) {
        self.top = 0;
        self.entries[0] = GraphicsContext::new();
    }
}

/// Cached coprocessor widget state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoprocessorContext {
    pub bg_color: u32,
    pub fg_color: u32,
    pub grad_color: u32,
    /// A spinner, screensaver or sketch is running.
    pub continuous_active: bool,
}

impl CoprocessorContext {
    pub const fn new() -> Self {
        CoprocessorContext {
            bg_color: defaults::BG_COLOR,
            fg_color: defaults::FG_COLOR,
            grad_color: defaults::GRAD_COLOR,
            continuous_active: false,
        }
    }

    /// Colors go back to their power-on values after CMD_COLDSTART.
    pub fn reset_colors(&mut self) {
        self.bg_color = defaults::BG_COLOR;
        self.fg_color = defaults::FG_COLOR;
        self.grad_color = defaults::GRAD_COLOR;
    }
}

impl Default for CoprocessorContext {
    fn default() -> Self {
        Self::new()
    }
}
