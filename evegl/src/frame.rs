//! Frames and device control.
//!
//! Brings the device up, brackets each frame's display list, and samples
//! the touch registers once the frame has been rendered. Also holds the
//! immediate register operations (palette, touch calibration, backlight)
//! that must not be interleaved with an open frame.

use crate::dl;
use crate::regs::{host, mem, reg, val, ClearFlags, Options};
use crate::transport::{BusSpeed, Transport};
use crate::{Eve, EveError};

/// Entries in the palette table.
pub const PALETTE_ENTRIES: usize = 256;

/// Touch state sampled at the end of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TouchSample {
    /// Something touches the panel.
    pub present: bool,
    /// Last touched position. Kept from the previous touch while
    /// `present` is false.
    pub x: i16,
    pub y: i16,
    /// Tag under the touch point, one frame behind `present`.
    pub tag: u8,
}

impl TouchSample {
    /// Fold freshly read REG_TOUCH_SCREEN_XY and REG_TOUCH_TAG values into
    /// the previous sample.
    pub fn update(&mut self, screen_xy: u32, tag: u8) {
        self.tag = tag;
        if screen_xy == val::NO_TOUCH {
            self.present = false;
        } else {
            self.present = true;
            self.x = (screen_xy >> 16) as u16 as i16;
            self.y = screen_xy as u16 as i16;
        }
    }
}

impl<T: Transport> Eve<T> {
    /// Reset and configure the device, then light the display.
    ///
    /// All host-side state is discarded, including bitmaps, since the
    /// device memory does not survive the reset.
    pub fn initialize(&mut self) -> Result<(), EveError> {
        log::info!("evegl: initializing device");
        self.reset_host_state();

        let bus = self.queue.bus_mut();
        bus.initialize()?;
        bus.set_speed(BusSpeed::Startup)?;

        bus.delay_ms(20);
        bus.set_reset(true)?;
        bus.delay_ms(20);
        bus.set_reset(false)?;
        bus.delay_ms(20);

        for command in [host::ACTIVE, host::CLKEXT, host::CLK48M] {
            bus.host_command(command)?;
            bus.delay_ms(6);
        }

        let id = self.queue.read8(reg::ID)?;
        if id != val::CHIP_ID {
            if self.config.strict_identity {
                log::error!("evegl: unexpected chip id {:#04x}", id);
                return Err(EveError::DeviceUnresponsive { id });
            }
            log::warn!("evegl: unexpected chip id {:#04x}, continuing", id);
        }

        // Display off and unclocked while it is configured
        self.queue.write8(reg::PCLK, 0)?;
        self.queue.write8(reg::PWM_DUTY, 0)?;

        let timings = self.config.display;
        for (register, value) in [
            (reg::VSYNC0, timings.vsync0),
            (reg::VSYNC1, timings.vsync1),
            (reg::VOFFSET, timings.voffset),
            (reg::VCYCLE, timings.vcycle),
            (reg::HSYNC0, timings.hsync0),
            (reg::HSYNC1, timings.hsync1),
            (reg::HOFFSET, timings.hoffset),
            (reg::HCYCLE, timings.hcycle),
            (reg::HSIZE, timings.hsize),
            (reg::VSIZE, timings.vsize),
        ] {
            self.queue.write16(register, value)?;
        }
        self.queue.write8(reg::SWIZZLE, timings.swizzle)?;
        self.queue.write8(reg::PCLK_POL, timings.pclk_pol)?;

        self.queue.write8(reg::TOUCH_MODE, val::TOUCHMODE_FRAME)?;
        self.queue.write16(reg::TOUCH_RZTHRESH, self.config.touch_sensitivity)?;

        self.queue.write8(reg::VOL_PB, 0)?;
        self.queue.write8(reg::VOL_SOUND, 0)?;
        self.queue.write16(reg::SOUND, val::SOUND_SILENCE)?;

        // Blank first frame
        self.queue.write32(mem::RAM_DL, dl::clear_color_rgb(0))?;
        self.queue.write32(mem::RAM_DL + 4, dl::clear(ClearFlags::all()))?;
        self.queue.write32(mem::RAM_DL + 8, dl::display())?;
        self.queue.write32(reg::DLSWAP, val::DLSWAP_FRAME as u32)?;

        let gpio = self.queue.read8(reg::GPIO)?;
        self.queue.write8(reg::GPIO, gpio | val::GPIO_DISP)?;
        self.queue.write8(reg::PCLK, timings.pclk)?;

        for duty in 0..=val::PWM_DUTY_MAX {
            self.queue.write8(reg::PWM_DUTY, duty)?;
            self.queue.bus_mut().delay_ms(10);
        }

        self.queue.bus_mut().set_speed(BusSpeed::Run)?;
        log::info!(
            "evegl: device ready, {}x{} display",
            timings.hsize,
            timings.vsize
        );
        Ok(())
    }

    /// Start a frame: open the command stream, start a display list and
    /// clear the screen.
    pub fn begin_frame(&mut self) -> Result<(), EveError> {
        if self.in_frame {
            return Err(EveError::AlreadyInFrame);
        }
        log::trace!("evegl: begin frame at {}", self.queue.write_index());
        // A new display list starts from the power-on drawing state
        self.context.reset();
        self.in_frame = true;
        self.queue.begin_append()?;
        self.dlstart()?;
        // Works around stretched output in the first frames after reset
        self.clear(ClearFlags::all())
    }

    /// Finish a frame: terminate and swap the display list, wait for the
    /// device to render it and sample touch.
    pub fn end_frame(&mut self) -> Result<(), EveError> {
        if !self.in_frame {
            return Err(EveError::NotInFrame);
        }
        self.display()?;
        self.swap()?;
        self.queue.commit()?;
        self.in_frame = false;

        let tag = self.queue.read8(reg::TOUCH_TAG)?;
        let xy = self.queue.read32(reg::TOUCH_SCREEN_XY)?;
        self.touch.update(xy, tag);
        log::debug!(
            "evegl: frame done, touch={} ({}, {}) tag={}",
            self.touch.present,
            self.touch.x,
            self.touch.y,
            self.touch.tag
        );
        Ok(())
    }

    pub fn in_frame(&self) -> bool {
        self.in_frame
    }

    /// Touch state of the last completed frame.
    pub fn touch(&self) -> TouchSample {
        self.touch
    }

    pub fn has_touch(&self) -> bool {
        self.touch.present
    }

    pub fn touch_x(&self) -> i16 {
        self.touch.x
    }

    pub fn touch_y(&self) -> i16 {
        self.touch.y
    }

    pub fn touch_tag(&self) -> u8 {
        self.touch.tag
    }

    /// Milliseconds from the platform clock.
    pub fn ticks(&self) -> u32 {
        self.queue.bus().ticks()
    }

    /// Run the touch calibration routine. Blocks until the user has
    /// touched all three dots; returns whether the device accepted the
    /// result.
    pub fn run_calibration(&mut self) -> Result<bool, EveError> {
        self.require_idle()?;
        let (width, height) = self.config.display.size();

        self.begin_frame()?;
        self.text(
            (width / 2) as i16,
            (height / 2) as i16 - 6,
            27,
            Options::CENTER,
            "Calibration: Touch the Dots",
        )?;
        self.queue.ensure_space(8)?;
        self.queue.append32(crate::regs::cmd::CALIBRATE)?;
        // Result word, overwritten by the coprocessor
        self.queue.append32(0)?;
        self.queue.commit()?;
        self.in_frame = false;

        let result_offset = self.queue.write_index().wrapping_sub(4) & crate::encoder::CMD_QUEUE_MASK;
        let result = self.queue.read32(mem::RAM_CMD + result_offset as u32)?;
        log::info!("evegl: touch calibration {}", if result != 0 { "done" } else { "failed" });
        Ok(result != 0)
    }

    /// Read the six touch transform coefficients, A to F.
    pub fn touch_calibration(&mut self) -> Result<[u32; 6], EveError> {
        self.require_idle()?;
        let mut params = [0u32; 6];
        for (param, register) in params.iter_mut().zip(reg::TOUCH_TRANSFORM) {
            *param = self.queue.read32(register)?;
        }
        Ok(params)
    }

    /// Restore touch transform coefficients saved from
    /// [`touch_calibration`](Self::touch_calibration).
    pub fn set_touch_calibration(&mut self, params: &[u32; 6]) -> Result<(), EveError> {
        self.require_idle()?;
        for (param, register) in params.iter().zip(reg::TOUCH_TRANSFORM) {
            self.queue.write32(register, *param)?;
        }
        Ok(())
    }

    /// Resistance threshold below which a touch is reported.
    pub fn set_touch_sensitivity(&mut self, threshold: u16) -> Result<(), EveError> {
        self.require_idle()?;
        self.queue.write16(reg::TOUCH_RZTHRESH, threshold)
    }

    /// Backlight duty cycle, 0 (off) to 128 (full).
    pub fn set_backlight(&mut self, duty: u8) -> Result<(), EveError> {
        self.require_idle()?;
        self.queue.write8(reg::PWM_DUTY, duty.min(val::PWM_DUTY_MAX))
    }

    /// Write `colors` into the palette starting at entry `first`.
    pub fn load_palette(&mut self, first: u8, colors: &[u32]) -> Result<(), EveError> {
        self.require_idle()?;
        let address = mem::RAM_PAL + first as u32 * 4;
        if first as usize + colors.len() > PALETTE_ENTRIES {
            return Err(EveError::OutOfBounds {
                address,
                len: colors.len() * 4,
            });
        }

        let mut buf = [0u8; 64];
        for (i, chunk) in colors.chunks(buf.len() / 4).enumerate() {
            for (bytes, color) in buf.chunks_exact_mut(4).zip(chunk) {
                bytes.copy_from_slice(&crate::wire::encode_u32(*color));
            }
            let offset = (i * buf.len()) as u32;
            self.queue.write_mem(address + offset, &buf[..chunk.len() * 4])?;
        }
        Ok(())
    }

    /// Set one palette entry.
    pub fn set_palette_color(&mut self, index: u8, color: u32) -> Result<(), EveError> {
        self.require_idle()?;
        self.queue.write32(mem::RAM_PAL + index as u32 * 4, color)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EveConfig;
    use crate::regs::cmd;
    use crate::sim::SimDevice;
    use crate::transport::TransportError;

    fn session(config: EveConfig) -> Eve<SimDevice> {
        Eve::new(SimDevice::new(), config).unwrap()
    }

    #[test]
    fn test_touch_decoding() {
        let mut touch = TouchSample::default();
        touch.update(val::NO_TOUCH, 0);
        assert!(!touch.present);

        touch.update((100 << 16) | 20, 3);
        assert_eq!(touch, TouchSample { present: true, x: 100, y: 20, tag: 3 });

        // Negative coordinates come from the signed halves
        touch.update(0xFFFF_FFFE, 0);
        assert_eq!((touch.x, touch.y), (-1, -2));

        // Lifting keeps the last position
        touch.update(val::NO_TOUCH, 0);
        assert!(!touch.present);
        assert_eq!((touch.x, touch.y), (-1, -2));
    }

    #[test]
    fn test_initialize_sequence() {
        let mut eve = session(EveConfig::default());
        eve.initialize().unwrap();

        let dev = eve.bus();
        assert_eq!(dev.host_commands(), &[host::ACTIVE, host::CLKEXT, host::CLK48M]);
        assert_eq!(dev.speed(), Some(BusSpeed::Run));
        assert!(!dev.in_reset());
        assert_eq!(dev.register32(reg::HSIZE) & 0xFFFF, 480);
        assert_eq!(dev.register32(reg::VCYCLE) & 0xFFFF, 292);
        assert_eq!(dev.register8(reg::PCLK), 5);
        assert_eq!(dev.register8(reg::PWM_DUTY), 128);
        assert_eq!(dev.register8(reg::GPIO) & val::GPIO_DISP, val::GPIO_DISP);
        assert_eq!(dev.register8(reg::TOUCH_MODE), val::TOUCHMODE_FRAME);
        assert_eq!(dev.register32(reg::TOUCH_RZTHRESH) & 0xFFFF, 1200);
        assert_eq!(dev.register32(mem::RAM_DL + 8), dl::display());
        // Reset pulses plus the backlight ramp
        assert!(eve.ticks() >= 60 + 18 + 129 * 10);
    }

    #[test]
    fn test_identity_mismatch() {
        let mut dev = SimDevice::new();
        dev.set_register8(reg::ID, 0x00);
        let mut eve = Eve::new(dev, EveConfig::default()).unwrap();
        assert_eq!(eve.initialize(), Err(EveError::DeviceUnresponsive { id: 0 }));

        let mut dev = SimDevice::new();
        dev.set_register8(reg::ID, 0x00);
        let mut config = EveConfig::default();
        config.strict_identity = false;
        let mut eve = Eve::new(dev, config).unwrap();
        assert!(eve.initialize().is_ok());
    }

    #[test]
    fn test_initialize_propagates_bus_failure() {
        let mut dev = SimDevice::new();
        dev.fail_next(TransportError(-7));
        let mut eve = Eve::new(dev, EveConfig::default()).unwrap();
        assert_eq!(eve.initialize(), Err(EveError::Transport(TransportError(-7))));
    }

    #[test]
    fn test_frame_brackets_display_list() {
        let mut eve = session(EveConfig::default());
        eve.begin_frame().unwrap();
        assert_eq!(eve.begin_frame(), Err(EveError::AlreadyInFrame));
        eve.end_frame().unwrap();
        assert_eq!(eve.end_frame(), Err(EveError::NotInFrame));

        let words = eve.bus().executed_words();
        assert_eq!(
            words,
            [cmd::DLSTART, dl::clear(ClearFlags::all()), dl::display(), cmd::SWAP]
        );
        assert_eq!(eve.queue.free_space(), crate::encoder::CMD_QUEUE_CAPACITY);
        assert_eq!(eve.queue.write_index() % 4, 0);
        assert!(!eve.bus().is_appending());
    }

    #[test]
    fn test_end_frame_samples_touch() {
        let mut eve = session(EveConfig::default());
        eve.bus_mut().set_touch(Some((42, 17)));
        eve.bus_mut().set_touch_tag(9);
        eve.begin_frame().unwrap();
        eve.end_frame().unwrap();
        assert!(eve.has_touch());
        assert_eq!((eve.touch_x(), eve.touch_y(), eve.touch_tag()), (42, 17, 9));

        eve.bus_mut().set_touch(None);
        eve.begin_frame().unwrap();
        eve.end_frame().unwrap();
        assert!(!eve.has_touch());
    }

    #[test]
    fn test_frame_resets_graphics_cache() {
        let mut eve = session(EveConfig::default());
        eve.begin_frame().unwrap();
        eve.color_rgb(0x00FF00).unwrap();
        eve.end_frame().unwrap();
        eve.bus_mut().clear_executed();

        eve.begin_frame().unwrap();
        eve.color_rgb(0x00FF00).unwrap();
        eve.end_frame().unwrap();
        assert!(eve.bus().executed_words().contains(&dl::color_rgb(0x00FF00)));
    }

    #[test]
    fn test_calibration_round_trip() {
        let mut eve = session(EveConfig::default());
        let params = [1, 2, 3, 0xFFFF_0000, 5, 6];
        eve.set_touch_calibration(&params).unwrap();
        assert_eq!(eve.touch_calibration().unwrap(), params);
        assert_eq!(eve.bus().register32(reg::TOUCH_TRANSFORM_D), 0xFFFF_0000);
    }

    #[test]
    fn test_run_calibration() {
        let mut eve = session(EveConfig::default());
        // The simulated coprocessor never writes a result
        assert_eq!(eve.run_calibration(), Ok(false));
        let words = eve.bus().executed_words();
        assert_eq!(words[words.len() - 2..], [cmd::CALIBRATE, 0]);
        assert!(!eve.in_frame());
    }

    #[test]
    fn test_failed_end_frame_keeps_frame_open() {
        let mut eve = session(EveConfig::default());
        eve.begin_frame().unwrap();
        eve.bus_mut().fail_next(TransportError(-5));
        assert_eq!(eve.end_frame(), Err(EveError::Transport(TransportError(-5))));
        assert!(eve.in_frame());
        assert_eq!(eve.set_touch_sensitivity(900), Err(EveError::AlreadyInFrame));

        eve.end_frame().unwrap();
        assert!(!eve.in_frame());
        let words = eve.bus().executed_words();
        assert_eq!(words[2..], [dl::display(), cmd::SWAP]);
    }

    #[test]
    fn test_immediate_writes_need_idle() {
        let mut eve = session(EveConfig::default());
        eve.begin_frame().unwrap();
        assert_eq!(eve.set_touch_sensitivity(900), Err(EveError::AlreadyInFrame));
        assert_eq!(eve.set_palette_color(0, 0), Err(EveError::AlreadyInFrame));
        eve.end_frame().unwrap();
        eve.set_touch_sensitivity(900).unwrap();
        assert_eq!(eve.bus().register32(reg::TOUCH_RZTHRESH) & 0xFFFF, 900);
    }

    #[test]
    fn test_palette_writes() {
        let mut eve = session(EveConfig::default());
        let colors: alloc::vec::Vec<u32> = (0..40).map(|i| 0x0100_0000 * i + i).collect();
        eve.load_palette(10, &colors).unwrap();
        assert_eq!(eve.bus().register32(mem::RAM_PAL + 10 * 4), 0);
        assert_eq!(eve.bus().register32(mem::RAM_PAL + 49 * 4), 0x2700_0027);

        eve.set_palette_color(255, 0xAABB_CCDD).unwrap();
        assert_eq!(eve.bus().register32(mem::RAM_PAL + 255 * 4), 0xAABB_CCDD);

        assert!(matches!(
            eve.load_palette(250, &colors),
            Err(EveError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn test_backlight_is_clamped() {
        let mut eve = session(EveConfig::default());
        eve.set_backlight(200).unwrap();
        assert_eq!(eve.bus().register8(reg::PWM_DUTY), 128);
    }
}
