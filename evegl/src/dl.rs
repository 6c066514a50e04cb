//! Display List Words
//!
//! Encoders for the 32-bit display list instructions. Each function packs
//! its arguments into the bit layout the rendering engine expects; values
//! wider than their field are truncated.

use crate::regs::{
    BitmapFormat, BlendFactor, ClearFlags, ColorMask, Filter, Primitive, StencilOp, TestFunc, Wrap,
};

/// Instruction opcodes (bits 24..31 of the word).
mod op {
    pub const DISPLAY: u32 = 0;
    pub const BITMAP_SOURCE: u32 = 1;
    pub const CLEAR_COLOR_RGB: u32 = 2;
    pub const TAG: u32 = 3;
    pub const COLOR_RGB: u32 = 4;
    pub const BITMAP_HANDLE: u32 = 5;
    pub const CELL: u32 = 6;
    pub const BITMAP_LAYOUT: u32 = 7;
    pub const BITMAP_SIZE: u32 = 8;
    pub const ALPHA_FUNC: u32 = 9;
    pub const STENCIL_FUNC: u32 = 10;
    pub const BLEND_FUNC: u32 = 11;
    pub const STENCIL_OP: u32 = 12;
    pub const POINT_SIZE: u32 = 13;
    pub const LINE_WIDTH: u32 = 14;
    pub const CLEAR_COLOR_A: u32 = 15;
    pub const COLOR_A: u32 = 16;
    pub const CLEAR_STENCIL: u32 = 17;
    pub const CLEAR_TAG: u32 = 18;
    pub const TAG_MASK: u32 = 20;
    pub const BITMAP_TRANSFORM_A: u32 = 21;
    pub const SCISSOR_XY: u32 = 27;
    pub const SCISSOR_SIZE: u32 = 28;
    pub const CALL: u32 = 29;
    pub const JUMP: u32 = 30;
    pub const BEGIN: u32 = 31;
    pub const COLOR_MASK: u32 = 32;
    pub const END: u32 = 33;
    pub const SAVE_CONTEXT: u32 = 34;
    pub const RESTORE_CONTEXT: u32 = 35;
    pub const RETURN: u32 = 36;
    pub const MACRO: u32 = 37;
    pub const CLEAR: u32 = 38;
}

#[inline]
const fn word(opcode: u32, payload: u32) -> u32 {
    (opcode << 24) | (payload & 0x00FF_FFFF)
}

/// Pack an `0xRRGGBB` color from components.
#[inline]
pub const fn rgb(r: u8, g: u8, b: u8) -> u32 {
    ((r as u32) << 16) | ((g as u32) << 8) | b as u32
}

pub const fn display() -> u32 {
    word(op::DISPLAY, 0)
}

pub const fn bitmap_source(address: u32) -> u32 {
    word(op::BITMAP_SOURCE, address & 0xF_FFFF)
}

pub const fn clear_color_rgb(color: u32) -> u32 {
    word(op::CLEAR_COLOR_RGB, color)
}

pub const fn tag(value: u8) -> u32 {
    word(op::TAG, value as u32)
}

pub const fn color_rgb(color: u32) -> u32 {
    word(op::COLOR_RGB, color)
}

pub const fn bitmap_handle(handle: u8) -> u32 {
    word(op::BITMAP_HANDLE, handle as u32 & 31)
}

pub const fn cell(cell: u8) -> u32 {
    word(op::CELL, cell as u32 & 127)
}

/// Largest stride a BITMAP_LAYOUT word can hold.
pub const MAX_LAYOUT_STRIDE: u32 = 1023;
/// Largest height a BITMAP_LAYOUT word can hold.
pub const MAX_LAYOUT_HEIGHT: u32 = 511;
/// Largest width or height a BITMAP_SIZE word can hold.
pub const MAX_SIZE_DIMENSION: u32 = 511;

pub const fn bitmap_layout(format: BitmapFormat, stride: u32, height: u32) -> u32 {
    word(
        op::BITMAP_LAYOUT,
        ((format as u32 & 31) << 19) | ((stride & 1023) << 9) | (height & 511),
    )
}

pub const fn bitmap_size(filter: Filter, wrap_x: Wrap, wrap_y: Wrap, width: u32, height: u32) -> u32 {
    word(
        op::BITMAP_SIZE,
        ((filter as u32 & 1) << 20)
            | ((wrap_x as u32 & 1) << 19)
            | ((wrap_y as u32 & 1) << 18)
            | ((width & 511) << 9)
            | (height & 511),
    )
}

/// Bits of a BITMAP_SIZE word holding the rendered width and height.
pub const BITMAP_SIZE_DIMENSIONS: u32 = 0x3_FFFF;

/// Rendered `(width, height)` stored in a BITMAP_SIZE word.
pub const fn bitmap_size_dimensions(size_word: u32) -> (u32, u32) {
    ((size_word >> 9) & 511, size_word & 511)
}

pub const fn alpha_func(func: TestFunc, reference: u8) -> u32 {
    word(op::ALPHA_FUNC, ((func as u32 & 7) << 8) | reference as u32)
}

pub const fn stencil_func(func: TestFunc, reference: u8, mask: u8) -> u32 {
    word(
        op::STENCIL_FUNC,
        ((func as u32 & 7) << 16) | ((reference as u32) << 8) | mask as u32,
    )
}

pub const fn blend_func(src: BlendFactor, dst: BlendFactor) -> u32 {
    word(op::BLEND_FUNC, ((src as u32 & 7) << 3) | (dst as u32 & 7))
}

pub const fn stencil_op(fail: StencilOp, pass: StencilOp) -> u32 {
    word(op::STENCIL_OP, ((fail as u32 & 7) << 3) | (pass as u32 & 7))
}

/// Point radius in 1/16 pixel units.
pub const fn point_size(size: u32) -> u32 {
    word(op::POINT_SIZE, size & 8191)
}

/// Line width in 1/16 pixel units.
pub const fn line_width(width: u16) -> u32 {
    word(op::LINE_WIDTH, width as u32 & 4095)
}

pub const fn clear_color_a(alpha: u8) -> u32 {
    word(op::CLEAR_COLOR_A, alpha as u32)
}

pub const fn color_a(alpha: u8) -> u32 {
    word(op::COLOR_A, alpha as u32)
}

pub const fn clear_stencil(value: u8) -> u32 {
    word(op::CLEAR_STENCIL, value as u32)
}

pub const fn clear_tag(value: u8) -> u32 {
    word(op::CLEAR_TAG, value as u32)
}

pub const fn tag_mask(enabled: bool) -> u32 {
    word(op::TAG_MASK, enabled as u32)
}

/// One coefficient of the bitmap transform matrix, `index` 0..=5 for A..F.
///
/// Coefficients are signed 8.8 fixed point in a 17-bit field.
pub const fn bitmap_transform(index: u8, value: i32) -> u32 {
    word(op::BITMAP_TRANSFORM_A + (index as u32 % 6), value as u32 & 0x1_FFFF)
}

pub const fn scissor_xy(x: u16, y: u16) -> u32 {
    word(op::SCISSOR_XY, ((x as u32 & 511) << 9) | (y as u32 & 511))
}

pub const fn scissor_size(width: u16, height: u16) -> u32 {
    word(op::SCISSOR_SIZE, ((width as u32 & 1023) << 10) | (height as u32 & 1023))
}

pub const fn call(dest: u16) -> u32 {
    word(op::CALL, dest as u32)
}

pub const fn jump(dest: u16) -> u32 {
    word(op::JUMP, dest as u32)
}

pub const fn begin(primitive: Primitive) -> u32 {
    word(op::BEGIN, primitive as u32 & 15)
}

pub const fn color_mask(mask: ColorMask) -> u32 {
    word(op::COLOR_MASK, mask.bits() as u32)
}

pub const fn end() -> u32 {
    word(op::END, 0)
}

pub const fn save_context() -> u32 {
    word(op::SAVE_CONTEXT, 0)
}

pub const fn restore_context() -> u32 {
    word(op::RESTORE_CONTEXT, 0)
}

pub const fn ret() -> u32 {
    word(op::RETURN, 0)
}

pub const fn macro_(register: u8) -> u32 {
    word(op::MACRO, register as u32 & 1)
}

pub const fn clear(flags: ClearFlags) -> u32 {
    word(op::CLEAR, flags.bits() as u32)
}

/// Vertex in 1/16 pixel units (signed 15-bit fields).
pub const fn vertex2f(x: i16, y: i16) -> u32 {
    (1 << 30) | ((x as u32 & 32767) << 15) | (y as u32 & 32767)
}

/// Vertex in whole pixels with a bitmap handle and cell.
pub const fn vertex2ii(x: u16, y: u16, handle: u8, cell: u8) -> u32 {
    (2 << 30)
        | ((x as u32 & 511) << 21)
        | ((y as u32 & 511) << 12)
        | ((handle as u32 & 31) << 7)
        | (cell as u32 & 127)
}
