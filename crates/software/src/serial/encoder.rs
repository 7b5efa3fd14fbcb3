use super::{BITS_PER_FRAME, IDLE_LEVEL};

/// Returned by [`SerialLineEncoder::load`] when a byte is already waiting its turn.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EncoderBusy;

#[derive(Clone, Copy, Debug, PartialEq)]
enum EncoderState {
    Idle,
    /// `position` 0 is the start bit, 1 through 8 are data bits, 9 is the stop bit.
    Sending { byte: u8, position: u8 },
}

const STOP_POSITION: u8 = BITS_PER_FRAME - 1;

/// Serializes bytes onto the MIDI-out line, one bit per baud tick.
///
/// The encoder holds one byte on the wire and one staged behind it. A staged byte begins on the baud tick after
/// the current byte's stop bit, so consecutive bytes leave no gap and a byte, once started, is never cut short.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SerialLineEncoder {
    state: EncoderState,
    staged: Option<u8>,
}

impl Default for SerialLineEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl SerialLineEncoder {
    /// Constructs an idle [`SerialLineEncoder`].
    pub fn new() -> Self {
        Self {
            state: EncoderState::Idle,
            staged: None,
        }
    }

    /// Stages `byte` for transmission. It goes out as soon as the line is free.
    pub fn load(&mut self, byte: u8) -> Result<(), EncoderBusy> {
        if self.staged.is_some() {
            return Err(EncoderBusy);
        }
        self.staged = Some(byte);
        Ok(())
    }

    /// Returns `true` when nothing is staged, i.e., [`load`][Self::load] would succeed.
    pub fn can_accept(&self) -> bool {
        self.staged.is_none()
    }

    /// Returns `true` while a byte is staged or still on the wire.
    pub fn is_busy(&self) -> bool {
        self.staged.is_some() || self.state != EncoderState::Idle
    }

    /// Advances the line by one bit and returns the new line level.
    pub fn on_baud_tick(&mut self) -> bool {
        self.state = match self.state {
            EncoderState::Idle
            | EncoderState::Sending {
                position: STOP_POSITION,
                ..
            } => match self.staged.take() {
                Some(byte) => EncoderState::Sending { byte, position: 0 },
                None => EncoderState::Idle,
            },
            EncoderState::Sending { byte, position } => EncoderState::Sending {
                byte,
                position: position + 1,
            },
        };
        self.level()
    }

    /// The level currently driven onto the line.
    pub fn level(&self) -> bool {
        match self.state {
            EncoderState::Idle => IDLE_LEVEL,
            EncoderState::Sending { position: 0, .. } => !IDLE_LEVEL,
            EncoderState::Sending {
                position: STOP_POSITION,
                ..
            } => IDLE_LEVEL,
            EncoderState::Sending { byte, position } => byte & (1 << (position - 1)) != 0,
        }
    }
}
