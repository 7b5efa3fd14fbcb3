use embassy_time::Duration;
use measurements::Frequency;

/// MIDI 1.0 runs its serial lines at 31.25 kbaud.
pub const MIDI_BAUD_HZ: f64 = 31_250.0;

/// The main tick rate of the reference firmware: four ticks per MIDI bit.
pub const DEFAULT_TICK_HZ: f64 = 125_000.0;

/// Relationship between the main tick, which drives every state machine, and the slower baud tick, which
/// clocks bits on and off the MIDI lines.
///
/// The baud tick is derived by integer division of the main tick, so the tick rate should be a whole multiple
/// of the baud rate; otherwise the divisor is rounded to the nearest integer and the line runs slightly off
/// nominal speed.
#[derive(Clone, Copy, Debug)]
pub struct SerialTiming {
    tick_rate: Frequency,
    baud_rate: Frequency,
}

impl SerialTiming {
    /// Constructs a [`SerialTiming`].
    ///
    /// # Panics
    ///
    /// Panics when the tick rate is slower than the baud rate, as the line could not be sampled once per bit.
    pub fn new(tick_rate: Frequency, baud_rate: Frequency) -> Self {
        if tick_rate.as_hertz() < baud_rate.as_hertz() || baud_rate.as_hertz() <= 0.0 {
            panic!("Invalid serial timing: the main tick must be at least as fast as the baud rate.")
        }

        Self {
            tick_rate,
            baud_rate,
        }
    }

    /// Getter.
    pub fn tick_rate(&self) -> Frequency {
        self.tick_rate
    }

    /// Getter.
    pub fn baud_rate(&self) -> Frequency {
        self.baud_rate
    }

    /// Number of main ticks per baud tick.
    pub fn divisor(&self) -> u32 {
        // adding one half before truncating rounds to nearest, which `core` can't do for floats on its own
        let divisor = (self.tick_rate.as_hertz() / self.baud_rate.as_hertz() + 0.5) as u32;
        divisor.max(1)
    }

    /// The period of the main tick in a format compatible with Embassy's timekeeping API.
    pub fn tick_period(&self) -> Duration {
        Duration::from_hz(self.tick_rate.as_hertz() as u64)
    }
}

impl Default for SerialTiming {
    fn default() -> Self {
        Self::new(
            Frequency::from_hertz(DEFAULT_TICK_HZ),
            Frequency::from_hertz(MIDI_BAUD_HZ),
        )
    }
}

/// Divides the main tick down to the baud tick.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BaudClock {
    divisor: u32,
    count: u32,
}

impl BaudClock {
    /// Constructs a [`BaudClock`] which fires once every `divisor` main ticks.
    pub fn new(divisor: u32) -> Self {
        Self {
            divisor: divisor.max(1),
            count: 0,
        }
    }

    /// Advances by one main tick, returning `true` when this tick is also a baud tick.
    ///
    /// The first baud tick lands on the last main tick of the first period, so a bit held for `divisor` main
    /// ticks starting at tick zero is sampled exactly once.
    pub fn tick(&mut self) -> bool {
        self.count += 1;
        if self.count >= self.divisor {
            self.count = 0;
            true
        } else {
            false
        }
    }
}

impl From<SerialTiming> for BaudClock {
    fn from(timing: SerialTiming) -> Self {
        Self::new(timing.divisor())
    }
}
