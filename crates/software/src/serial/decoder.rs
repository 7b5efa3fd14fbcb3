use super::{DATA_BITS, IDLE_LEVEL};

/// The outcome of a completed frame.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Received {
    /// A byte framed by a valid start and stop bit.
    Byte(u8),
    /// The stop bit was low. Whatever had been shifted in is discarded.
    FrameError,
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum DecoderState {
    /// Waiting for a falling edge.
    Idle,
    /// Shifting in data bits; `count` of them have arrived so far.
    Data { shift: u8, count: u8 },
    /// All eight data bits are in; the next sample must be the stop bit.
    Stop { byte: u8 },
}

/// Recovers bytes from the MIDI-in line, sampling it once per baud tick.
///
/// Line noise or plugging a cable in mid-stream can leave the decoder out of step with the sender. Rather than
/// report an error upward it simply drops the frame and waits for the next falling edge, which is where the
/// sender's next start bit will be.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SerialLineDecoder {
    state: DecoderState,
    last_level: bool,
}

impl Default for SerialLineDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl SerialLineDecoder {
    /// Constructs a [`SerialLineDecoder`] which assumes the line has been idle.
    pub fn new() -> Self {
        Self {
            state: DecoderState::Idle,
            last_level: IDLE_LEVEL,
        }
    }

    /// Samples the line for one baud tick, returning the outcome of a frame when this sample was its stop bit.
    pub fn on_baud_tick(&mut self, level: bool) -> Option<Received> {
        let mut outcome = None;

        self.state = match self.state {
            // a falling edge, not merely a low line, marks a start bit; after a frame error the line may still be
            // low and must return high before the decoder will trust it again
            DecoderState::Idle if self.last_level && !level => {
                DecoderState::Data { shift: 0, count: 0 }
            }
            DecoderState::Idle => DecoderState::Idle,
            DecoderState::Data { shift, count } => {
                let shift = shift | (u8::from(level) << count);
                if count + 1 == DATA_BITS {
                    DecoderState::Stop { byte: shift }
                } else {
                    DecoderState::Data {
                        shift,
                        count: count + 1,
                    }
                }
            }
            DecoderState::Stop { byte } => {
                if level == IDLE_LEVEL {
                    outcome = Some(Received::Byte(byte));
                } else {
                    warn!("Frame error: stop bit missing, discarding {=u8:#x}", byte);
                    outcome = Some(Received::FrameError);
                }
                DecoderState::Idle
            }
        };

        self.last_level = level;
        outcome
    }

    /// Returns `true` when no frame is in progress and the line is resting high.
    pub fn is_idle(&self) -> bool {
        self.state == DecoderState::Idle && self.last_level == IDLE_LEVEL
    }
}
