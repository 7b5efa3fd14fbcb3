use crate::serial::BITS_PER_FRAME;
use num_derive::{FromPrimitive, ToPrimitive};

/// Determines how long the MIDI-in line must remain idle before the message being assembled is considered
/// complete, expressed in byte periods (one byte period is ten baud ticks).
///
/// MIDI has no end-of-message marker, so some window has to be chosen. One byte period is enough for a sender
/// that transmits a message's bytes back to back; slower or bursty senders may need more room, at the cost of
/// a little latency before the status light comes on.
#[derive(Debug, Default, Clone, Copy, ToPrimitive, FromPrimitive, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum IdleWindow {
    /// A single byte period of silence ends the message.
    #[default]
    OneByte,
    /// Two byte periods of silence end the message.
    TwoBytes,
    /// Four byte periods of silence end the message.
    FourBytes,
}

impl IdleWindow {
    /// Returns the window length in byte periods.
    pub fn byte_periods(&self) -> u8 {
        match self {
            Self::OneByte => 1,
            Self::TwoBytes => 2,
            Self::FourBytes => 4,
        }
    }

    /// Returns the window length in baud ticks.
    pub fn baud_ticks(&self) -> u16 {
        u16::from(self.byte_periods()) * u16::from(BITS_PER_FRAME)
    }
}

impl super::CycleConfig for IdleWindow {}
