//! Driver configuration.
//!
//! Values here select which host-side caches are enabled, size the fixed
//! tables allocated when a session is created, and describe the attached
//! panel. A configuration is checked once by [`EveConfig::validate`] when
//! the session is built and never changes afterwards.

use crate::EveError;

/// Hardware bitmap handles usable by the driver (handle 15 is reserved for
/// the coprocessor's scratch use).
pub const MAX_BITMAP_HANDLES: u8 = 15;

/// Default touch resistance threshold.
pub const DEFAULT_TOUCH_SENSITIVITY: u16 = 1200;

/// Deepest context stack the rendering engine supports.
pub const MAX_CONTEXT_STACK_DEPTH: usize = 4;

/// Panel timing parameters, in pixel clocks and lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayTimings {
    pub vsync0: u16,
    pub vsync1: u16,
    pub voffset: u16,
    pub vcycle: u16,
    pub hsync0: u16,
    pub hsync1: u16,
    pub hoffset: u16,
    pub hcycle: u16,
    /// Visible width in pixels.
    pub hsize: u16,
    /// Visible height in lines.
    pub vsize: u16,
    pub pclk_pol: u8,
    pub swizzle: u8,
    /// Pixel clock divisor (48 MHz / pclk).
    pub pclk: u8,
}

impl DisplayTimings {
    /// 480x272 panel.
    pub const WQVGA: DisplayTimings = DisplayTimings {
        vsync0: 0,
        vsync1: 10,
        voffset: 12,
        vcycle: 292,
        hsync0: 0,
        hsync1: 41,
        hoffset: 43,
        hcycle: 548,
        hsize: 480,
        vsize: 272,
        pclk_pol: 1,
        swizzle: 0,
        pclk: 5,
    };

    /// 320x240 panel.
    pub const QVGA: DisplayTimings = DisplayTimings {
        vsync0: 0,
        vsync1: 2,
        voffset: 13,
        vcycle: 263,
        hsync0: 0,
        hsync1: 10,
        hoffset: 70,
        hcycle: 408,
        hsize: 320,
        vsize: 240,
        pclk_pol: 0,
        swizzle: 2,
        pclk: 8,
    };

    /// Visible `(width, height)`.
    pub fn size(&self) -> (u16, u16) {
        (self.hsize, self.vsize)
    }

    fn validate(&self) -> Result<(), EveError> {
        if self.hsize == 0 || self.vsize == 0 {
            return Err(EveError::InvalidConfig("display size is zero"));
        }
        if self.hsize > 512 || self.vsize > 512 {
            return Err(EveError::InvalidConfig("display larger than 512x512"));
        }
        let h_end = u32::from(self.hoffset) + u32::from(self.hsize);
        let v_end = u32::from(self.voffset) + u32::from(self.vsize);
        if h_end > u32::from(self.hcycle) || v_end > u32::from(self.vcycle) {
            return Err(EveError::InvalidConfig("visible area exceeds display cycle"));
        }
        if self.pclk == 0 {
            return Err(EveError::InvalidConfig("pixel clock divisor is zero"));
        }
        Ok(())
    }
}

impl Default for DisplayTimings {
    fn default() -> Self {
        Self::WQVGA
    }
}

/// Session configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EveConfig {
    /// Suppress display list state commands that would not change anything.
    pub cache_graphics_context: bool,
    /// Suppress redundant coprocessor color commands.
    pub cache_coprocessor_context: bool,
    /// Keep bitmaps resident in hardware handles between draws.
    pub cache_bitmap_handles: bool,
    /// Nested SAVE_CONTEXT levels tracked by the cache.
    pub context_stack_depth: usize,
    /// Size of the bitmap descriptor table.
    pub max_bitmaps: usize,
    /// Hardware handles managed by the driver.
    pub bitmap_handles: u8,
    /// Touch resistance threshold written at start-up.
    pub touch_sensitivity: u16,
    /// Panel timings.
    pub display: DisplayTimings,
    /// Fail initialization when the chip id does not match.
    pub strict_identity: bool,
}

impl EveConfig {
    /// Configuration for a 480x272 panel.
    pub const fn wqvga() -> Self {
        Self {
            cache_graphics_context: true,
            cache_coprocessor_context: true,
            cache_bitmap_handles: true,
            context_stack_depth: MAX_CONTEXT_STACK_DEPTH,
            max_bitmaps: 16,
            bitmap_handles: MAX_BITMAP_HANDLES,
            touch_sensitivity: DEFAULT_TOUCH_SENSITIVITY,
            display: DisplayTimings::WQVGA,
            strict_identity: true,
        }
    }

    /// Configuration for a 320x240 panel.
    pub const fn qvga() -> Self {
        Self {
            display: DisplayTimings::QVGA,
            ..Self::wqvga()
        }
    }

    /// Configuration with every host-side cache disabled.
    pub const fn uncached() -> Self {
        Self {
            cache_graphics_context: false,
            cache_coprocessor_context: false,
            cache_bitmap_handles: false,
            ..Self::wqvga()
        }
    }

    /// Check the configuration for values the hardware cannot honor.
    pub fn validate(&self) -> Result<(), EveError> {
        if self.bitmap_handles < 2 || self.bitmap_handles > MAX_BITMAP_HANDLES {
            return Err(EveError::InvalidConfig("bitmap_handles must be in 2..=15"));
        }
        if self.context_stack_depth > MAX_CONTEXT_STACK_DEPTH {
            return Err(EveError::InvalidConfig("context_stack_depth exceeds 4"));
        }
        if self.max_bitmaps == 0 {
            return Err(EveError::InvalidConfig("max_bitmaps is zero"));
        }
        self.display.validate()
    }
}

impl Default for EveConfig {
    fn default() -> Self {
        Self::wqvga()
    }
}
