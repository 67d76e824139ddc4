//! Status LED: the state-to-pattern table and the GPIO driver that
//! blinks it from the main loop.

use std::time::{Duration, Instant};

use esp_idf_svc::hal::gpio::{Level, Output, OutputPin, PinDriver};

use crate::status::LedState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Color {
    Blue,
    Green,
    Red,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlinkPattern {
    pub color: Color,
    /// Full on/off cycle; `None` means solid on.
    pub period: Option<Duration>,
}

pub fn pattern(state: LedState) -> BlinkPattern {
    let (color, period_ms) = match state {
        LedState::Startup => (Color::Blue, Some(1000)),
        LedState::Connecting => (Color::Blue, Some(200)),
        LedState::Connected => (Color::Green, None),
        LedState::Error => (Color::Red, Some(500)),
        LedState::DataActive => (Color::Green, Some(100)),
    };
    BlinkPattern {
        color,
        period: period_ms.map(Duration::from_millis),
    }
}

/// Common-cathode RGB LED on three output pins.
pub struct StatusLed<'d, R: OutputPin, G: OutputPin, B: OutputPin> {
    red: PinDriver<'d, R, Output>,
    green: PinDriver<'d, G, Output>,
    blue: PinDriver<'d, B, Output>,
    lit: bool,
    last_toggle: Instant,
}

impl<'d, R: OutputPin, G: OutputPin, B: OutputPin> StatusLed<'d, R, G, B> {
    pub fn new(red: R, green: G, blue: B) -> anyhow::Result<Self> {
        Ok(Self {
            red: PinDriver::output(red)?,
            green: PinDriver::output(green)?,
            blue: PinDriver::output(blue)?,
            lit: false,
            last_toggle: Instant::now(),
        })
    }

    /// Non-blocking; call on every pass of the main loop.
    pub fn tick(&mut self, state: LedState) {
        let p = pattern(state);
        let lit = match p.period {
            None => true,
            Some(period) => {
                if self.last_toggle.elapsed() >= period / 2 {
                    self.last_toggle = Instant::now();
                    self.lit = !self.lit;
                }
                self.lit
            }
        };
        self.apply(p.color, lit);
    }

    fn apply(&mut self, color: Color, lit: bool) {
        let _ = self.red.set_level(Level::from(lit && color == Color::Red));
        let _ = self
            .green
            .set_level(Level::from(lit && color == Color::Green));
        let _ = self.blue.set_level(Level::from(lit && color == Color::Blue));
    }
}
