mod assembler;
pub use assembler::*;

use wmidi::U7;

/// The most bytes a message can hold: a status byte and two data bytes.
pub const MAX_MESSAGE_LEN: usize = 3;

/// Returns `true` when `byte` is a status byte, i.e., its top bit is set.
pub fn is_status(byte: u8) -> bool {
    byte & 0x80 != 0
}

/// A channel message as received from the MIDI-in line: a status byte followed by up to two data bytes.
///
/// Data bytes are held as [`U7`], which makes a data byte with its top bit set unrepresentable. Data bytes which
/// have not (yet) been received read as zero.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MidiMessage {
    status: u8,
    data: [U7; 2],
    /// Number of bytes received so far, counting the status byte.
    byte_count: u8,
}

#[cfg(feature = "defmt")]
impl defmt::Format for MidiMessage {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(
            fmt,
            "MidiMessage {{ status: {=u8:#x}, data1: {=u8:#x}, data2: {=u8:#x}, byte_count: {} }}",
            self.status,
            u8::from(self.data[0]),
            u8::from(self.data[1]),
            self.byte_count
        );
    }
}

impl MidiMessage {
    /// Begins a message with the given status byte, or returns `None` if `status` is a data byte.
    pub fn new(status: u8) -> Option<Self> {
        is_status(status).then_some(Self {
            status,
            data: [U7::default(); 2],
            byte_count: 1,
        })
    }

    /// Appends a data byte, returning `false` (and leaving the message untouched) if it is already full.
    pub fn push_data(&mut self, data: U7) -> bool {
        match self.byte_count {
            1 | 2 => {
                self.data[usize::from(self.byte_count) - 1] = data;
                self.byte_count += 1;
                true
            }
            _ => false,
        }
    }

    /// Getter.
    pub fn status(&self) -> u8 {
        self.status
    }

    /// The first data byte, or zero if it was never received.
    pub fn data1(&self) -> U7 {
        self.data[0]
    }

    /// The second data byte, or zero if it was never received.
    pub fn data2(&self) -> U7 {
        self.data[1]
    }

    /// Number of bytes actually received, from 1 to 3.
    pub fn byte_count(&self) -> u8 {
        self.byte_count
    }

    /// All three bytes, zero-padded.
    pub fn to_bytes(&self) -> [u8; MAX_MESSAGE_LEN] {
        [self.status, u8::from(self.data[0]), u8::from(self.data[1])]
    }

    /// Returns `true` if the received bytes form a complete MIDI message on their own.
    ///
    /// The footswitch has no notion of message length (completion is a matter of line silence), so this is only
    /// ever used to warn the performer that what they're about to learn looks truncated.
    pub fn is_well_formed(&self) -> bool {
        let bytes = self.to_bytes();
        wmidi::MidiMessage::from_bytes(&bytes[..usize::from(self.byte_count)]).is_ok()
    }
}
