//! Coprocessor commands.
//!
//! Widgets, matrix operations and other commands executed by the graphics
//! coprocessor. Every command computes its full size up front and reserves
//! it with one [`ensure_space`](crate::encoder::CommandQueue::ensure_space)
//! call, so it reaches the ring in one piece. String arguments are sent
//! NUL-terminated and padded to a word boundary.
//!
//! INFLATE and LOADIMAGE are the exception: their payload is consumed as it
//! arrives, so data larger than the ring is streamed through it.

use crate::encoder::CMD_QUEUE_CAPACITY;
use crate::regs::{cmd, Options};
use crate::transport::Transport;
use crate::wire;
use crate::{Eve, EveError};

impl<T: Transport> Eve<T> {
    /// Opcode, `halves` 16-bit fields, then `text` with its terminator.
    fn string_command(&mut self, opcode: u32, halves: &[u16], text: &str) -> Result<(), EveError> {
        let size = wire::align4(4 + 2 * halves.len() + text.len() + 1);
        self.queue.ensure_space(size)?;
        self.queue.append32(opcode)?;
        for half in halves {
            self.queue.append16(*half)?;
        }
        self.queue.append_bytes(text.as_bytes())?;
        self.queue.append_bytes(&[0])?;
        self.queue.align()
    }

    /// Opcode followed by 16-bit fields, padded to a word.
    fn halves_command(&mut self, opcode: u32, halves: &[u16]) -> Result<(), EveError> {
        let size = wire::align4(4 + 2 * halves.len());
        self.queue.ensure_space(size)?;
        self.queue.append32(opcode)?;
        for half in halves {
            self.queue.append16(*half)?;
        }
        self.queue.align()
    }

    /// Opcode followed by 32-bit fields.
    fn words_command(&mut self, opcode: u32, words: &[u32]) -> Result<(), EveError> {
        self.queue.ensure_space(4 + 4 * words.len())?;
        self.queue.append32(opcode)?;
        for word in words {
            self.queue.append32(*word)?;
        }
        Ok(())
    }

    /// Header words followed by a payload the coprocessor consumes as a
    /// stream.
    fn streamed_command(&mut self, header: &[u32], data: &[u8]) -> Result<(), EveError> {
        let header_size = 4 * header.len();
        let total = wire::align4(header_size + data.len());
        if total <= CMD_QUEUE_CAPACITY as usize {
            self.queue.ensure_space(total)?;
        } else {
            self.queue.ensure_space(header_size)?;
        }
        for word in header {
            self.queue.append32(*word)?;
        }
        self.queue.append_bytes(data)?;
        self.queue.align()
    }

    /// Stop a running spinner, screensaver or sketch before starting
    /// another one.
    fn start_continuous(&mut self) -> Result<(), EveError> {
        if self.coproc.continuous_active {
            self.stop()?;
        }
        self.coproc.continuous_active = true;
        Ok(())
    }

    /// Start a new display list.
    pub fn dlstart(&mut self) -> Result<(), EveError> {
        self.queue.command(cmd::DLSTART)
    }

    /// Swap the finished display list in.
    pub fn swap(&mut self) -> Result<(), EveError> {
        self.queue.command(cmd::SWAP)
    }

    /// Return the coprocessor to its power-on state.
    pub fn coldstart(&mut self) -> Result<(), EveError> {
        self.coproc.reset_colors();
        self.coproc.continuous_active = false;
        self.queue.ensure_space(8)?;
        self.queue.append32(cmd::STOP)?;
        self.queue.append32(cmd::COLDSTART)
    }

    /// Decompress zlib `data` into graphics RAM at `ptr`.
    pub fn inflate(&mut self, ptr: u32, data: &[u8]) -> Result<(), EveError> {
        self.streamed_command(&[cmd::INFLATE, ptr], data)
    }

    /// Decode a JPEG into graphics RAM at `ptr`.
    pub fn load_image(&mut self, ptr: u32, options: Options, data: &[u8]) -> Result<(), EveError> {
        self.streamed_command(&[cmd::LOADIMAGE, ptr, options.bits() as u32], data)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn button(&mut self, x: i16, y: i16, w: i16, h: i16, font: u16, options: Options, label: &str) -> Result<(), EveError> {
        self.string_command(
            cmd::BUTTON,
            &[x as u16, y as u16, w as u16, h as u16, font, options.bits()],
            label,
        )
    }

    #[allow(clippy::too_many_arguments)]
    pub fn clock(&mut self, x: i16, y: i16, r: i16, options: Options, h: u16, m: u16, s: u16, ms: u16) -> Result<(), EveError> {
        self.halves_command(
            cmd::CLOCK,
            &[x as u16, y as u16, r as u16, options.bits(), h, m, s, ms],
        )
    }

    /// Widget foreground color. Skipped when it already is `color`.
    pub fn fg_color(&mut self, color: u32) -> Result<(), EveError> {
        let cached = self.config.cache_coprocessor_context;
        if cached && self.coproc.fg_color == color {
            return Ok(());
        }
        self.words_command(cmd::FGCOLOR, &[color])?;
        if cached {
            self.coproc.fg_color = color;
        }
        Ok(())
    }

    /// Widget background color. Skipped when it already is `color`.
    pub fn bg_color(&mut self, color: u32) -> Result<(), EveError> {
        let cached = self.config.cache_coprocessor_context;
        if cached && self.coproc.bg_color == color {
            return Ok(());
        }
        self.words_command(cmd::BGCOLOR, &[color])?;
        if cached {
            self.coproc.bg_color = color;
        }
        Ok(())
    }

    /// 3D highlight color. Skipped when it already is `color`.
    pub fn grad_color(&mut self, color: u32) -> Result<(), EveError> {
        let cached = self.config.cache_coprocessor_context;
        if cached && self.coproc.grad_color == color {
            return Ok(());
        }
        self.words_command(cmd::GRADCOLOR, &[color])?;
        if cached {
            self.coproc.grad_color = color;
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    pub fn gauge(
        &mut self,
        x: i16,
        y: i16,
        r: i16,
        options: Options,
        major: u16,
        minor: u16,
        value: u16,
        range: u16,
    ) -> Result<(), EveError> {
        self.halves_command(
            cmd::GAUGE,
            &[x as u16, y as u16, r as u16, options.bits(), major, minor, value, range],
        )
    }

    pub fn gradient(&mut self, x0: i16, y0: i16, rgb0: u32, x1: i16, y1: i16, rgb1: u32) -> Result<(), EveError> {
        self.queue.ensure_space(20)?;
        self.queue.append32(cmd::GRADIENT)?;
        self.queue.append16(x0 as u16)?;
        self.queue.append16(y0 as u16)?;
        self.queue.append32(rgb0)?;
        self.queue.append16(x1 as u16)?;
        self.queue.append16(y1 as u16)?;
        self.queue.append32(rgb1)
    }

    /// Row of keys, one per character of `keys`. The low byte of `options`
    /// selects the key drawn pressed.
    #[allow(clippy::too_many_arguments)]
    pub fn keys(&mut self, x: i16, y: i16, w: i16, h: i16, font: u16, options: Options, keys: &str) -> Result<(), EveError> {
        self.string_command(
            cmd::KEYS,
            &[x as u16, y as u16, w as u16, h as u16, font, options.bits()],
            keys,
        )
    }

    #[allow(clippy::too_many_arguments)]
    pub fn progress(&mut self, x: i16, y: i16, w: i16, h: i16, options: Options, value: u16, range: u16) -> Result<(), EveError> {
        self.halves_command(
            cmd::PROGRESS,
            &[x as u16, y as u16, w as u16, h as u16, options.bits(), value, range],
        )
    }

    #[allow(clippy::too_many_arguments)]
    pub fn scrollbar(
        &mut self,
        x: i16,
        y: i16,
        w: i16,
        h: i16,
        options: Options,
        value: u16,
        size: u16,
        range: u16,
    ) -> Result<(), EveError> {
        self.halves_command(
            cmd::SCROLLBAR,
            &[x as u16, y as u16, w as u16, h as u16, options.bits(), value, size, range],
        )
    }

    #[allow(clippy::too_many_arguments)]
    pub fn slider(&mut self, x: i16, y: i16, w: i16, h: i16, options: Options, value: u16, range: u16) -> Result<(), EveError> {
        self.halves_command(
            cmd::SLIDER,
            &[x as u16, y as u16, w as u16, h as u16, options.bits(), value, range],
        )
    }

    pub fn dial(&mut self, x: i16, y: i16, r: i16, options: Options, value: u16) -> Result<(), EveError> {
        self.halves_command(cmd::DIAL, &[x as u16, y as u16, r as u16, options.bits(), value])
    }

    /// Toggle switch labelled `off` and `on`.
    #[allow(clippy::too_many_arguments)]
    pub fn toggle(
        &mut self,
        x: i16,
        y: i16,
        w: i16,
        font: u16,
        options: Options,
        state: u16,
        off: &str,
        on: &str,
    ) -> Result<(), EveError> {
        // The device separates the two labels with a 0xFF byte
        let size = wire::align4(16 + off.len() + 1 + on.len() + 1);
        self.queue.ensure_space(size)?;
        self.queue.append32(cmd::TOGGLE)?;
        for half in [x as u16, y as u16, w as u16, font, options.bits(), state] {
            self.queue.append16(half)?;
        }
        self.queue.append_bytes(off.as_bytes())?;
        self.queue.append_bytes(&[0xFF])?;
        self.queue.append_bytes(on.as_bytes())?;
        self.queue.append_bytes(&[0])?;
        self.queue.align()
    }

    pub fn text(&mut self, x: i16, y: i16, font: u16, options: Options, text: &str) -> Result<(), EveError> {
        self.string_command(cmd::TEXT, &[x as u16, y as u16, font, options.bits()], text)
    }

    pub fn number(&mut self, x: i16, y: i16, font: u16, options: Options, n: i32) -> Result<(), EveError> {
        self.queue.ensure_space(16)?;
        self.queue.append32(cmd::NUMBER)?;
        self.queue.append16(x as u16)?;
        self.queue.append16(y as u16)?;
        self.queue.append16(font)?;
        self.queue.append16(options.bits())?;
        self.queue.append32(n as u32)
    }

    pub fn load_identity(&mut self) -> Result<(), EveError> {
        self.queue.command(cmd::LOADIDENTITY)
    }

    /// Translate the current matrix by 16.16 fixed point offsets.
    pub fn translate(&mut self, tx: i32, ty: i32) -> Result<(), EveError> {
        self.words_command(cmd::TRANSLATE, &[tx as u32, ty as u32])
    }

    /// Scale the current matrix by 16.16 fixed point factors.
    pub fn scale(&mut self, sx: i32, sy: i32) -> Result<(), EveError> {
        self.words_command(cmd::SCALE, &[sx as u32, sy as u32])
    }

    /// Rotate the current matrix, `angle` in units of 1/65536 turn.
    pub fn rotate(&mut self, angle: i32) -> Result<(), EveError> {
        self.words_command(cmd::ROTATE, &[angle as u32])
    }

    /// Write the current matrix into the bitmap transform registers.
    pub fn set_matrix(&mut self) -> Result<(), EveError> {
        self.queue.command(cmd::SETMATRIX)
    }

    pub fn spinner(&mut self, x: i16, y: i16, style: u16, scale: u16) -> Result<(), EveError> {
        self.start_continuous()?;
        self.halves_command(cmd::SPINNER, &[x as u16, y as u16, style, scale])
    }

    pub fn screensaver(&mut self) -> Result<(), EveError> {
        self.start_continuous()?;
        self.queue.command(cmd::SCREENSAVER)
    }

    /// Sample touch into an L1 or L8 bitmap at `ptr`.
    pub fn sketch(&mut self, x: i16, y: i16, w: u16, h: u16, ptr: u32, format: u16) -> Result<(), EveError> {
        self.start_continuous()?;
        self.queue.ensure_space(20)?;
        self.queue.append32(cmd::SKETCH)?;
        self.queue.append16(x as u16)?;
        self.queue.append16(y as u16)?;
        self.queue.append16(w)?;
        self.queue.append16(h)?;
        self.queue.append32(ptr)?;
        self.queue.append16(format)?;
        self.queue.align()
    }

    /// Stop the running spinner, screensaver or sketch.
    pub fn stop(&mut self) -> Result<(), EveError> {
        self.coproc.continuous_active = false;
        self.queue.command(cmd::STOP)
    }

    /// Register a custom font at `ptr` as `font`.
    pub fn set_font(&mut self, font: u32, ptr: u32) -> Result<(), EveError> {
        self.words_command(cmd::SETFONT, &[font, ptr])
    }

    /// Track touches on the area tagged `tag`.
    pub fn track(&mut self, x: i16, y: i16, w: i16, h: i16, tag: i16) -> Result<(), EveError> {
        self.halves_command(
            cmd::TRACK,
            &[x as u16, y as u16, w as u16, h as u16, tag as u16],
        )
    }

    /// Render the screen into graphics RAM at `ptr`.
    pub fn snapshot(&mut self, ptr: u32) -> Result<(), EveError> {
        self.words_command(cmd::SNAPSHOT, &[ptr])
    }

    pub fn logo(&mut self) -> Result<(), EveError> {
        self.queue.command(cmd::LOGO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EveConfig;
    use crate::sim::SimDevice;
    use crate::transport::TransportError;

    fn session(config: EveConfig) -> Eve<SimDevice> {
        Eve::new(SimDevice::new(), config).unwrap()
    }

    /// Commit and return everything executed so far.
    fn executed(eve: &mut Eve<SimDevice>) -> alloc::vec::Vec<u8> {
        eve.queue.commit().unwrap();
        eve.bus_mut().take_executed()
    }

    #[test]
    fn test_text_is_terminated_and_padded() {
        let mut eve = session(EveConfig::default());
        eve.text(10, 20, 28, Options::CENTER, "Hi").unwrap();
        let bytes = executed(&mut eve);
        assert_eq!(bytes.len(), 16);
        assert_eq!(&bytes[..4], &wire::encode_u32(cmd::TEXT));
        assert_eq!(&bytes[4..12], &[10, 0, 20, 0, 28, 0, 0x00, 0x06]);
        assert_eq!(&bytes[12..], b"Hi\0\0");
        assert_eq!(eve.queue.write_index() % 4, 0);
    }

    #[test]
    fn test_button_layout() {
        let mut eve = session(EveConfig::default());
        eve.button(-1, 2, 3, 4, 31, Options::FLAT, "").unwrap();
        let bytes = executed(&mut eve);
        assert_eq!(bytes.len(), 20);
        assert_eq!(&bytes[4..6], &[0xFF, 0xFF]);
        assert_eq!(&bytes[12..16], &[31, 0, 0x00, 0x01]);
        assert_eq!(&bytes[16..], &[0, 0, 0, 0]);
    }

    #[test]
    fn test_fixed_sizes() {
        let mut eve = session(EveConfig::default());
        let cases: [(usize, &dyn Fn(&mut Eve<SimDevice>) -> Result<(), EveError>); 9] = [
            (20, &|e| e.clock(1, 2, 3, Options::empty(), 4, 5, 6, 7)),
            (20, &|e| e.gauge(1, 2, 3, Options::empty(), 4, 5, 6, 7)),
            (20, &|e| e.gradient(0, 0, 0, 1, 1, 1)),
            (20, &|e| e.progress(1, 2, 3, 4, Options::empty(), 5, 6)),
            (20, &|e| e.scrollbar(1, 2, 3, 4, Options::empty(), 5, 6, 7)),
            (20, &|e| e.slider(1, 2, 3, 4, Options::empty(), 5, 6)),
            (16, &|e| e.dial(1, 2, 3, Options::empty(), 4)),
            (16, &|e| e.number(1, 2, 3, Options::SIGNED, -5)),
            (16, &|e| e.track(1, 2, 3, 4, 5)),
        ];
        for (size, emit) in cases.iter() {
            emit(&mut eve).unwrap();
            assert_eq!(executed(&mut eve).len(), *size);
        }
    }

    #[test]
    fn test_toggle_sends_state() {
        let mut eve = session(EveConfig::default());
        eve.toggle(0, 0, 40, 27, Options::empty(), 0xFFFF, "no", "yes").unwrap();
        let bytes = executed(&mut eve);
        assert_eq!(&bytes[14..16], &[0xFF, 0xFF]);
        assert_eq!(&bytes[16..23], b"no\xffyes\0");
        assert_eq!(bytes.len(), 24);
    }

    #[test]
    fn test_color_commands_are_cached() {
        let mut eve = session(EveConfig::default());
        eve.fg_color(0x003870).unwrap();
        eve.fg_color(0x112233).unwrap();
        eve.fg_color(0x112233).unwrap();
        eve.bg_color(0x002040).unwrap();
        eve.grad_color(0x000000).unwrap();
        let bytes = executed(&mut eve);
        assert_eq!(bytes.len(), 16);

        eve.coldstart().unwrap();
        eve.fg_color(0x112233).unwrap();
        assert_eq!(executed(&mut eve).len(), 16);
    }

    #[test]
    fn test_failed_color_command_is_retried() {
        let mut eve = session(EveConfig::default());
        eve.bus_mut().fail_next(TransportError(-5));
        assert!(eve.fg_color(0x112233).is_err());
        eve.fg_color(0x112233).unwrap();
        let words = {
            eve.queue.commit().unwrap();
            eve.bus().executed_words()
        };
        assert_eq!(words, [cmd::FGCOLOR, 0x112233]);
    }

    #[test]
    fn test_color_commands_uncached() {
        let mut eve = session(EveConfig::uncached());
        eve.fg_color(0x003870).unwrap();
        eve.fg_color(0x003870).unwrap();
        assert_eq!(executed(&mut eve).len(), 16);
    }

    #[test]
    fn test_continuous_commands_stop_previous() {
        let mut eve = session(EveConfig::default());
        eve.spinner(100, 100, 0, 0).unwrap();
        eve.screensaver().unwrap();
        eve.bus_mut().clear_executed();
        eve.stop().unwrap();
        eve.sketch(0, 0, 10, 10, 0, 1).unwrap();
        let words = {
            eve.queue.commit().unwrap();
            eve.bus().executed_words()
        };
        // The first 12 bytes are the spinner, then STOP, SCREENSAVER
        assert_eq!(words[3], cmd::STOP);
        assert_eq!(words[4], cmd::SCREENSAVER);
        assert_eq!(words[5], cmd::STOP);
        assert_eq!(words[6], cmd::SKETCH);
        assert_eq!(words.len(), 11);
    }

    #[test]
    fn test_small_inflate_is_contiguous() {
        let mut eve = session(EveConfig::default());
        for _ in 0..1020 {
            eve.queue.command(0).unwrap();
        }
        eve.inflate(0x100, &[1, 2, 3, 4, 5]).unwrap();
        // 16 bytes did not fit, so the queue flushed before the header
        assert_eq!(eve.queue.flushes(), 1);
        assert_eq!(eve.queue.write_index(), (1020 * 4 + 16) & 0xFFF);
    }

    #[test]
    fn test_large_load_image_streams() {
        let mut eve = session(EveConfig::default());
        let data = alloc::vec![7u8; 6000];
        eve.load_image(0, Options::empty(), &data).unwrap();
        let bytes = executed(&mut eve);
        assert_eq!(bytes.len(), 12 + 6000);
        assert_eq!(&bytes[..4], &wire::encode_u32(cmd::LOADIMAGE));
    }

    #[test]
    fn test_oversized_string_rejected() {
        let mut eve = session(EveConfig::default());
        let long = "x".repeat(5000);
        assert!(matches!(
            eve.text(0, 0, 26, Options::empty(), &long),
            Err(EveError::CommandTooLarge(_))
        ));
    }
}
