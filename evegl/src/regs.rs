//! Device Protocol Table
//!
//! Memory map, register addresses, coprocessor opcodes and option bits of
//! the FT800. These values are fixed by the silicon.

use bitflags::bitflags;

/// Memory map.
pub mod mem {
    /// General purpose graphics RAM (256 KiB).
    pub const RAM_G: u32 = 0x00_0000;
    /// Size of graphics RAM in bytes.
    pub const RAM_G_SIZE: u32 = 256 * 1024;
    /// Display list RAM.
    pub const RAM_DL: u32 = 0x10_0000;
    /// Palette RAM.
    pub const RAM_PAL: u32 = 0x10_2000;
    /// Coprocessor command ring.
    pub const RAM_CMD: u32 = 0x10_8000;
    /// Size of the command ring in bytes.
    pub const RAM_CMD_SIZE: u32 = 4096;
}

/// Register addresses.
pub mod reg {
    pub const ID: u32 = 0x10_2400;
    pub const FRAMES: u32 = 0x10_2404;
    pub const CLOCK: u32 = 0x10_2408;
    pub const FREQUENCY: u32 = 0x10_240C;
    pub const CPURESET: u32 = 0x10_241C;
    pub const HCYCLE: u32 = 0x10_2428;
    pub const HOFFSET: u32 = 0x10_242C;
    pub const HSIZE: u32 = 0x10_2430;
    pub const HSYNC0: u32 = 0x10_2434;
    pub const HSYNC1: u32 = 0x10_2438;
    pub const VCYCLE: u32 = 0x10_243C;
    pub const VOFFSET: u32 = 0x10_2440;
    pub const VSIZE: u32 = 0x10_2444;
    pub const VSYNC0: u32 = 0x10_2448;
    pub const VSYNC1: u32 = 0x10_244C;
    pub const DLSWAP: u32 = 0x10_2450;
    pub const ROTATE: u32 = 0x10_2454;
    pub const OUTBITS: u32 = 0x10_2458;
    pub const DITHER: u32 = 0x10_245C;
    pub const SWIZZLE: u32 = 0x10_2460;
    pub const CSPREAD: u32 = 0x10_2464;
    pub const PCLK_POL: u32 = 0x10_2468;
    pub const PCLK: u32 = 0x10_246C;
    pub const TAG_X: u32 = 0x10_2470;
    pub const TAG_Y: u32 = 0x10_2474;
    pub const TAG: u32 = 0x10_2478;
    pub const VOL_PB: u32 = 0x10_247C;
    pub const VOL_SOUND: u32 = 0x10_2480;
    pub const SOUND: u32 = 0x10_2484;
    pub const PLAY: u32 = 0x10_2488;
    pub const GPIO_DIR: u32 = 0x10_248C;
    pub const GPIO: u32 = 0x10_2490;
    pub const INT_FLAGS: u32 = 0x10_2498;
    pub const INT_EN: u32 = 0x10_249C;
    pub const INT_MASK: u32 = 0x10_24A0;
    pub const PWM_HZ: u32 = 0x10_24C0;
    pub const PWM_DUTY: u32 = 0x10_24C4;
    pub const MACRO_0: u32 = 0x10_24C8;
    pub const MACRO_1: u32 = 0x10_24CC;
    pub const CMD_READ: u32 = 0x10_24E4;
    pub const CMD_WRITE: u32 = 0x10_24E8;
    pub const CMD_DL: u32 = 0x10_24EC;
    pub const TOUCH_MODE: u32 = 0x10_24F0;
    pub const TOUCH_ADC_MODE: u32 = 0x10_24F4;
    pub const TOUCH_CHARGE: u32 = 0x10_24F8;
    pub const TOUCH_SETTLE: u32 = 0x10_24FC;
    pub const TOUCH_OVERSAMPLE: u32 = 0x10_2500;
    pub const TOUCH_RZTHRESH: u32 = 0x10_2504;
    pub const TOUCH_RAW_XY: u32 = 0x10_2508;
    pub const TOUCH_RZ: u32 = 0x10_250C;
    pub const TOUCH_SCREEN_XY: u32 = 0x10_2510;
    pub const TOUCH_TAG_XY: u32 = 0x10_2514;
    pub const TOUCH_TAG: u32 = 0x10_2518;
    pub const TOUCH_TRANSFORM_A: u32 = 0x10_251C;
    pub const TOUCH_TRANSFORM_B: u32 = 0x10_2520;
    pub const TOUCH_TRANSFORM_C: u32 = 0x10_2524;
    pub const TOUCH_TRANSFORM_D: u32 = 0x10_2528;
    pub const TOUCH_TRANSFORM_E: u32 = 0x10_252C;
    pub const TOUCH_TRANSFORM_F: u32 = 0x10_2530;

    /// The six touch transform registers, in A..F order.
    pub const TOUCH_TRANSFORM: [u32; 6] = [
        TOUCH_TRANSFORM_A,
        TOUCH_TRANSFORM_B,
        TOUCH_TRANSFORM_C,
        TOUCH_TRANSFORM_D,
        TOUCH_TRANSFORM_E,
        TOUCH_TRANSFORM_F,
    ];
}

/// Register values.
pub mod val {
    /// Expected contents of REG_ID.
    pub const CHIP_ID: u8 = 0x7C;
    /// Value of REG_TOUCH_SCREEN_XY when nothing touches the panel.
    pub const NO_TOUCH: u32 = 0x8000_8000;
    /// REG_CMD_READ reports this when the coprocessor faulted.
    pub const CMD_FAULT: u16 = 0xFFF;
    pub const DLSWAP_LINE: u8 = 1;
    pub const DLSWAP_FRAME: u8 = 2;
    pub const TOUCHMODE_OFF: u8 = 0;
    pub const TOUCHMODE_ONESHOT: u8 = 1;
    pub const TOUCHMODE_FRAME: u8 = 2;
    pub const TOUCHMODE_CONTINUOUS: u8 = 3;
    /// Display enable bit in REG_GPIO.
    pub const GPIO_DISP: u8 = 0x80;
    /// Silence value for REG_SOUND.
    pub const SOUND_SILENCE: u16 = 0x6000;
    /// Backlight duty cycle at full brightness.
    pub const PWM_DUTY_MAX: u8 = 128;
    /// Tag value meaning "untagged".
    pub const TAG_NONE: u8 = 255;
}

/// Host commands.
pub mod host {
    pub const ACTIVE: u8 = 0x00;
    pub const STANDBY: u8 = 0x41;
    pub const SLEEP: u8 = 0x42;
    pub const PWRDOWN: u8 = 0x50;
    pub const CLKEXT: u8 = 0x44;
    pub const CLK48M: u8 = 0x62;
    pub const CLK36M: u8 = 0x61;
    pub const CORERST: u8 = 0x68;
}

/// Coprocessor opcodes.
pub mod cmd {
    pub const DLSTART: u32 = 0xFFFF_FF00;
    pub const SWAP: u32 = 0xFFFF_FF01;
    pub const INTERRUPT: u32 = 0xFFFF_FF02;
    pub const BGCOLOR: u32 = 0xFFFF_FF09;
    pub const FGCOLOR: u32 = 0xFFFF_FF0A;
    pub const GRADIENT: u32 = 0xFFFF_FF0B;
    pub const TEXT: u32 = 0xFFFF_FF0C;
    pub const BUTTON: u32 = 0xFFFF_FF0D;
    pub const KEYS: u32 = 0xFFFF_FF0E;
    pub const PROGRESS: u32 = 0xFFFF_FF0F;
    pub const SLIDER: u32 = 0xFFFF_FF10;
    pub const SCROLLBAR: u32 = 0xFFFF_FF11;
    pub const TOGGLE: u32 = 0xFFFF_FF12;
    pub const GAUGE: u32 = 0xFFFF_FF13;
    pub const CLOCK: u32 = 0xFFFF_FF14;
    pub const CALIBRATE: u32 = 0xFFFF_FF15;
    pub const SPINNER: u32 = 0xFFFF_FF16;
    pub const STOP: u32 = 0xFFFF_FF17;
    pub const MEMCRC: u32 = 0xFFFF_FF18;
    pub const REGREAD: u32 = 0xFFFF_FF19;
    pub const MEMWRITE: u32 = 0xFFFF_FF1A;
    pub const MEMSET: u32 = 0xFFFF_FF1B;
    pub const MEMZERO: u32 = 0xFFFF_FF1C;
    pub const MEMCPY: u32 = 0xFFFF_FF1D;
    pub const APPEND: u32 = 0xFFFF_FF1E;
    pub const SNAPSHOT: u32 = 0xFFFF_FF1F;
    pub const INFLATE: u32 = 0xFFFF_FF22;
    pub const GETPTR: u32 = 0xFFFF_FF23;
    pub const LOADIMAGE: u32 = 0xFFFF_FF24;
    pub const GETPROPS: u32 = 0xFFFF_FF25;
    pub const LOADIDENTITY: u32 = 0xFFFF_FF26;
    pub const TRANSLATE: u32 = 0xFFFF_FF27;
    pub const SCALE: u32 = 0xFFFF_FF28;
    pub const ROTATE: u32 = 0xFFFF_FF29;
    pub const SETMATRIX: u32 = 0xFFFF_FF2A;
    pub const SETFONT: u32 = 0xFFFF_FF2B;
    pub const TRACK: u32 = 0xFFFF_FF2C;
    pub const DIAL: u32 = 0xFFFF_FF2D;
    pub const NUMBER: u32 = 0xFFFF_FF2E;
    pub const SCREENSAVER: u32 = 0xFFFF_FF2F;
    pub const SKETCH: u32 = 0xFFFF_FF30;
    pub const LOGO: u32 = 0xFFFF_FF31;
    pub const COLDSTART: u32 = 0xFFFF_FF32;
    pub const GETMATRIX: u32 = 0xFFFF_FF33;
    pub const GRADCOLOR: u32 = 0xFFFF_FF34;
}

/// Coprocessor power-on colors, restored by CMD_COLDSTART.
pub mod defaults {
    pub const BG_COLOR: u32 = 0x00_2040;
    pub const FG_COLOR: u32 = 0x00_3870;
    pub const GRAD_COLOR: u32 = 0xFF_FFFF;
}

/// Bitmap pixel formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum BitmapFormat {
    Argb1555 = 0,
    L1 = 1,
    L4 = 2,
    L8 = 3,
    Rgb332 = 4,
    Argb2 = 5,
    Argb4 = 6,
    Rgb565 = 7,
    Paletted = 8,
    Text8x8 = 9,
    TextVga = 10,
    Bargraph = 11,
}

impl BitmapFormat {
    /// Bytes-per-row scaling as `(multiplier, divisor)`.
    ///
    /// Sub-byte formats divide the pixel count, 16-bit formats multiply it.
    pub const fn row_scale(self) -> (u32, u32) {
        match self {
            BitmapFormat::L1 => (1, 8),
            BitmapFormat::L4 => (1, 2),
            BitmapFormat::Argb1555 | BitmapFormat::Argb4 | BitmapFormat::Rgb565 => (2, 1),
            BitmapFormat::L8
            | BitmapFormat::Rgb332
            | BitmapFormat::Argb2
            | BitmapFormat::Paletted
            | BitmapFormat::Text8x8
            | BitmapFormat::TextVga
            | BitmapFormat::Bargraph => (1, 1),
        }
    }

    /// Bytes needed for one row of `width` pixels, rounded up to a whole
    /// byte. `None` if the count does not fit a `u32`.
    pub const fn row_bytes(self, width: u32) -> Option<u32> {
        let (mul, div) = self.row_scale();
        match width.checked_mul(mul) {
            Some(units) => Some(units / div + if units % div == 0 { 0 } else { 1 }),
            None => None,
        }
    }
}

/// Bitmap sampling filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Filter {
    Nearest = 0,
    Bilinear = 1,
}

/// Bitmap wrap mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Wrap {
    Border = 0,
    Repeat = 1,
}

/// Graphics primitives for BEGIN.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Primitive {
    Bitmaps = 1,
    Points = 2,
    Lines = 3,
    LineStrip = 4,
    EdgeStripR = 5,
    EdgeStripL = 6,
    EdgeStripA = 7,
    EdgeStripB = 8,
    Rects = 9,
}

/// Comparison function for the alpha and stencil tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TestFunc {
    Never = 0,
    Less = 1,
    LEqual = 2,
    Greater = 3,
    GEqual = 4,
    Equal = 5,
    NotEqual = 6,
    Always = 7,
}

/// Blend factors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum BlendFactor {
    Zero = 0,
    One = 1,
    SrcAlpha = 2,
    DstAlpha = 3,
    OneMinusSrcAlpha = 4,
    OneMinusDstAlpha = 5,
}

/// Stencil buffer operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum StencilOp {
    Zero = 0,
    Keep = 1,
    Replace = 2,
    Incr = 3,
    Decr = 4,
    Invert = 5,
}

bitflags! {
    /// Buffers affected by CLEAR.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ClearFlags: u8 {
        const COLOR = 4;
        const STENCIL = 2;
        const TAG = 1;
    }
}

bitflags! {
    /// Channels enabled by COLOR_MASK.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ColorMask: u8 {
        const R = 8;
        const G = 4;
        const B = 2;
        const A = 1;
    }
}

bitflags! {
    /// Coprocessor widget options.
    ///
    /// Several names share a bit; the meaning depends on the command.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Options: u16 {
        const MONO = 1;
        const NODL = 2;
        const FLAT = 256;
        const SIGNED = 256;
        const CENTERX = 512;
        const CENTERY = 1024;
        const CENTER = 1536;
        const RIGHTX = 2048;
        const NOBACK = 4096;
        const NOTICKS = 8192;
        const NOHM = 16384;
        const NOPOINTER = 16384;
        const NOSECS = 32768;
        const NOHANDS = 49152;
    }
}
