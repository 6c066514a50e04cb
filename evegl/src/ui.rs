//! Immediate-mode controls.
//!
//! Controls keep no state of their own. Each frame the application redraws
//! every control and, while drawing, asks [`Focus`] whether it was pressed.
//! Focus follows a control id from touch-down to release:
//!
//! ```text
//! Idle --touch starts inside--> Active(hover) --touch lifts--> Idle
//!                                                 (pressed if inside)
//! ```
//!
//! Controls made of several tagged keys key their transitions on the tag
//! register instead of touch presence. The device computes the tag one frame
//! after the touch, so the tagged path compares the current tag with the
//! previous frame's.

use crate::bitmap::BitmapId;
use crate::frame::TouchSample;
use crate::regs::{val, Options};
use crate::transport::Transport;
use crate::{Eve, EveError};

/// Font used for background panels.
const BACKGROUND_FONT: u16 = 31;

/// Vertical gap between key rows.
const KEY_ROW_SPACING: i16 = 3;

/// Screen rectangle. Both edges are inclusive, so a touch on `x + w` is
/// still inside.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: i16,
    pub y: i16,
    pub w: i16,
    pub h: i16,
}

impl Rect {
    pub const fn new(x: i16, y: i16, w: i16, h: i16) -> Self {
        Rect { x, y, w, h }
    }

    pub fn contains(&self, x: i16, y: i16) -> bool {
        let (x, y) = (x as i32, y as i32);
        let (left, top) = (self.x as i32, self.y as i32);
        x >= left && x <= left + self.w as i32 && y >= top && y <= top + self.h as i32
    }
}

/// Application-chosen identity of a control, stable across frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ControlId(pub u16);

/// Outcome of evaluating a plain control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Response {
    /// The control holds focus and the touch is over it.
    pub hover: bool,
    /// Touch was released over the control this frame.
    pub pressed: bool,
}

/// Outcome of evaluating a tagged control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KeyResponse {
    pub hover: bool,
    /// Tag of the key released this frame.
    pub pressed: Option<u8>,
}

/// Touch history and the control holding focus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Focus {
    had_touch: bool,
    has_touch: bool,
    x: i16,
    y: i16,
    tag: u8,
    last_tag: u8,
    active: Option<ControlId>,
    active_tag: Option<u8>,
}

impl Focus {
    pub const fn new() -> Self {
        Focus {
            had_touch: false,
            has_touch: false,
            x: 0,
            y: 0,
            tag: 0,
            last_tag: 0,
            active: None,
            active_tag: None,
        }
    }

    /// Fold in the sample taken at the end of a frame.
    pub fn advance(&mut self, sample: &TouchSample) {
        self.had_touch = self.has_touch;
        self.has_touch = sample.present;
        if sample.present {
            self.x = sample.x;
            self.y = sample.y;
        }
        self.last_tag = self.tag;
        self.tag = sample.tag;
    }

    pub fn has_touch(&self) -> bool {
        self.has_touch
    }

    /// Touch began between the last two samples.
    pub fn touched(&self) -> bool {
        self.has_touch && !self.had_touch
    }

    /// Last known touch point.
    pub fn point(&self) -> (i16, i16) {
        (self.x, self.y)
    }

    pub fn tag(&self) -> u8 {
        self.tag
    }

    pub fn last_tag(&self) -> u8 {
        self.last_tag
    }

    pub fn active(&self) -> Option<ControlId> {
        self.active
    }

    pub fn active_tag(&self) -> Option<u8> {
        self.active_tag
    }

    pub fn set_active(&mut self, id: ControlId) {
        self.active = Some(id);
    }

    pub fn clear_active(&mut self) {
        self.active = None;
        self.active_tag = None;
    }

    pub fn in_rect(&self, rect: Rect) -> bool {
        rect.contains(self.x, self.y)
    }

    /// Evaluate a plain control covering `rect`.
    pub fn control(&mut self, id: ControlId, rect: Rect) -> Response {
        let mut response = Response::default();
        if self.active == Some(id) {
            if !self.has_touch {
                response.pressed = self.in_rect(rect);
                self.active = None;
            } else {
                response.hover = self.in_rect(rect);
            }
        } else if self.touched() && self.in_rect(rect) {
            self.active = Some(id);
            response.hover = true;
        }
        response
    }

    /// Evaluate a control made of tagged keys covering `rect`.
    pub fn tagged_control(&mut self, id: ControlId, rect: Rect) -> KeyResponse {
        let mut response = KeyResponse::default();
        if self.active == Some(id) {
            if self.tag == 0 {
                if self.active_tag == Some(self.last_tag) {
                    response.pressed = self.active_tag;
                }
                self.clear_active();
            } else if self.active_tag == Some(self.tag) {
                response.hover = true;
            }
        } else if self.last_tag == 0
            && self.tag != 0
            && self.tag != val::TAG_NONE
            && self.in_rect(rect)
        {
            self.active = Some(id);
            self.active_tag = Some(self.tag);
            response.hover = true;
        }
        response
    }
}

/// Session wrapper pairing the driver with focus tracking.
pub struct Ui<T: Transport> {
    eve: Eve<T>,
    focus: Focus,
}

impl<T: Transport> Ui<T> {
    pub fn new(eve: Eve<T>) -> Self {
        Ui {
            eve,
            focus: Focus::new(),
        }
    }

    /// Bring the device up and forget any focus.
    pub fn initialize(&mut self) -> Result<(), EveError> {
        self.eve.initialize()?;
        self.focus = Focus::new();
        Ok(())
    }

    pub fn eve(&self) -> &Eve<T> {
        &self.eve
    }

    pub fn eve_mut(&mut self) -> &mut Eve<T> {
        &mut self.eve
    }

    pub fn focus(&self) -> &Focus {
        &self.focus
    }

    pub fn focus_mut(&mut self) -> &mut Focus {
        &mut self.focus
    }

    pub fn into_inner(self) -> Eve<T> {
        self.eve
    }

    pub fn begin(&mut self) -> Result<(), EveError> {
        self.eve.begin_frame()
    }

    /// Present the frame and pick up the touch state for the next one.
    pub fn end(&mut self) -> Result<(), EveError> {
        self.eve.end_frame()?;
        self.focus.advance(&self.eve.touch());
        Ok(())
    }

    /// Push button. Returns true on the frame it is released over.
    pub fn button(&mut self, id: ControlId, rect: Rect, font: u16, label: &str) -> Result<bool, EveError> {
        let response = self.focus.control(id, rect);
        self.eve
            .button(rect.x, rect.y, rect.w, rect.h, font, flat_if(response.hover), label)?;
        Ok(response.pressed)
    }

    /// Button face with a bitmap centered on it.
    pub fn bitmap_button(&mut self, id: ControlId, rect: Rect, font: u16, bitmap: BitmapId) -> Result<bool, EveError> {
        let response = self.focus.control(id, rect);
        let (width, height) = self.eve.bitmap_size(bitmap)?;
        self.eve
            .button(rect.x, rect.y, rect.w, rect.h, font, flat_if(response.hover), "")?;

        let x = rect.x as i32 + rect.w as i32 / 2 - width as i32 / 2;
        let y = rect.y as i32 + rect.h as i32 / 2 - height as i32 / 2;
        self.eve.draw_bitmap(bitmap, x.max(0) as u16, y.max(0) as u16)?;
        Ok(response.pressed)
    }

    /// One row of keys, one per character of `row`. Returns the tag of the
    /// key released this frame.
    pub fn key_row(&mut self, id: ControlId, rect: Rect, font: u16, options: Options, row: &str) -> Result<Option<u8>, EveError> {
        let response = self.focus.tagged_control(id, rect);
        let options = if response.hover {
            with_pressed_key(options, self.focus.tag())
        } else {
            options
        };
        self.eve.keys(rect.x, rect.y, rect.w, rect.h, font, options, row)?;
        Ok(response.pressed)
    }

    /// Stacked key rows. `rows` holds each row's keys separated by NUL.
    #[allow(clippy::too_many_arguments)]
    pub fn key_rows(&mut self, id: ControlId, x: i16, y: i16, w: i16, row_height: i16, font: u16, rows: &str) -> Result<Option<u8>, EveError> {
        let count = rows.split_terminator('\0').count();
        if count == 0 {
            return Ok(None);
        }
        let pitch = i32::from(row_height) + i32::from(KEY_ROW_SPACING);
        let h = pitch.saturating_mul(count as i32) - i32::from(KEY_ROW_SPACING);
        let h = i16::try_from(h).unwrap_or(i16::MAX);
        let response = self.focus.tagged_control(id, Rect::new(x, y, w, h));
        let options = if response.hover {
            with_pressed_key(Options::empty(), self.focus.tag())
        } else {
            Options::empty()
        };

        let mut row_y = y;
        for row in rows.split_terminator('\0') {
            self.eve.keys(x, row_y, w, row_height, font, options, row)?;
            row_y = row_y.saturating_add(row_height).saturating_add(KEY_ROW_SPACING);
        }
        Ok(response.pressed)
    }

    pub fn text(&mut self, x: i16, y: i16, font: u16, options: Options, text: &str) -> Result<(), EveError> {
        self.eve.text(x, y, font, options, text)
    }

    /// Decimal number, always signed.
    pub fn number(&mut self, x: i16, y: i16, font: u16, options: Options, n: i32) -> Result<(), EveError> {
        self.eve.number(x, y, font, options | Options::SIGNED, n)
    }

    /// Solid panel drawn as an unlabeled button face. Leaves the
    /// coprocessor colors at their defaults.
    pub fn background_rect(&mut self, rect: Rect, color: u32) -> Result<(), EveError> {
        self.eve.fg_color(color)?;
        self.eve
            .button(rect.x, rect.y, rect.w, rect.h, BACKGROUND_FONT, Options::empty(), "")?;
        self.eve.coldstart()
    }

    pub fn ticks(&self) -> u32 {
        self.eve.ticks()
    }
}

fn flat_if(hover: bool) -> Options {
    if hover {
        Options::FLAT
    } else {
        Options::empty()
    }
}

/// CMD_KEYS takes the highlighted key's character in the low option byte.
fn with_pressed_key(options: Options, tag: u8) -> Options {
    Options::from_bits_retain(options.bits() | tag as u16)
}
