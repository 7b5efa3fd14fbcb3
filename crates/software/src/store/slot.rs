//! Provides [`MappingSlot`], the per-button record of what to play, along with its durable byte layout.

use crate::{message::MidiMessage, serial::BITS_PER_FRAME};
use wmidi::U7;

/// Bits sent on playback for every slot: three whole frames. See [`MappingSlot::bit_length`].
pub const SLOT_BIT_LENGTH: u8 = 3 * BITS_PER_FRAME;

/// Bytes occupied by one slot on the durable medium.
pub const RECORD_LEN: usize = 4;

/// The durable layout of a slot: `[status, data1, data2, bit_length]`.
pub type Record = [u8; RECORD_LEN];

/// Status byte of the factory mappings: Control Change on channel 1.
pub const FACTORY_STATUS: u8 = 0xB0;
/// Controller number assigned to the first button at the factory; each further button takes the next number.
pub const FACTORY_FIRST_CONTROLLER: u8 = 0x2E;
/// Control value of the factory mappings.
pub const FACTORY_CONTROL_VALUE: u8 = 0x7F;

/// Reasons a [`Record`] read back from the medium can't be trusted.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RecordError {
    /// Every byte reads `0xFF`: the medium was erased and never written.
    Erased,
    /// The first byte is not a status byte.
    InvalidStatus(u8),
    /// A data byte has its top bit set.
    InvalidData(u8),
    /// The bit length is something other than [`SLOT_BIT_LENGTH`].
    InvalidBitLength(u8),
}

/// What a single button plays.
///
/// A slot always replays a full three-byte message, no matter how many bytes the learned message had; missing
/// data bytes go out as zero. That matches the hardware this device replaces, but it does mean a learned
/// single-byte message such as Tune Request is followed by two spurious zero bytes.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MappingSlot {
    status: u8,
    data1: U7,
    data2: U7,
    bit_length: u8,
}

#[cfg(feature = "defmt")]
impl defmt::Format for MappingSlot {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(
            fmt,
            "MappingSlot {{ status: {=u8:#x}, data1: {=u8:#x}, data2: {=u8:#x}, bit_length: {} }}",
            self.status,
            u8::from(self.data1),
            u8::from(self.data2),
            self.bit_length
        );
    }
}

impl From<MidiMessage> for MappingSlot {
    fn from(message: MidiMessage) -> Self {
        Self {
            status: message.status(),
            data1: message.data1(),
            data2: message.data2(),
            bit_length: SLOT_BIT_LENGTH,
        }
    }
}

impl MappingSlot {
    /// The mapping a button ships with: Control Change, sequential controller numbers, full value.
    pub fn factory_default(index: usize) -> Self {
        // the controller number wraps within the seven data bits should there ever be a great many buttons
        let controller = FACTORY_FIRST_CONTROLLER.wrapping_add(index as u8);
        Self {
            status: FACTORY_STATUS,
            data1: U7::from_u8_lossy(controller),
            data2: U7::from_u8_lossy(FACTORY_CONTROL_VALUE),
            bit_length: SLOT_BIT_LENGTH,
        }
    }

    /// Getter.
    pub fn status(&self) -> u8 {
        self.status
    }

    /// Getter.
    pub fn data1(&self) -> U7 {
        self.data1
    }

    /// Getter.
    pub fn data2(&self) -> U7 {
        self.data2
    }

    /// Number of bits to transmit on playback. Always [`SLOT_BIT_LENGTH`].
    pub fn bit_length(&self) -> u8 {
        self.bit_length
    }

    /// The bytes to transmit on playback, in order.
    pub fn bytes(&self) -> impl Iterator<Item = u8> {
        let bytes = [self.status, u8::from(self.data1), u8::from(self.data2)];
        let len = usize::from(self.bit_length / BITS_PER_FRAME).min(bytes.len());
        bytes.into_iter().take(len)
    }

    /// Serializes the slot into its durable layout.
    pub fn to_record(&self) -> Record {
        [
            self.status,
            u8::from(self.data1),
            u8::from(self.data2),
            self.bit_length,
        ]
    }

    /// Deserializes a slot from its durable layout, rejecting anything the device could not have written.
    pub fn from_record(record: Record) -> Result<Self, RecordError> {
        let [status, data1, data2, bit_length] = record;
        if record == [0xFF; RECORD_LEN] {
            return Err(RecordError::Erased);
        }
        if status & 0x80 == 0 {
            return Err(RecordError::InvalidStatus(status));
        }
        let data1 = U7::try_from(data1).map_err(|_| RecordError::InvalidData(data1))?;
        let data2 = U7::try_from(data2).map_err(|_| RecordError::InvalidData(data2))?;
        if bit_length != SLOT_BIT_LENGTH {
            return Err(RecordError::InvalidBitLength(bit_length));
        }

        Ok(Self {
            status,
            data1,
            data2,
            bit_length,
        })
    }
}

/// The default region of a freshly provisioned medium: one factory record per button.
pub fn factory_image<const N: usize>() -> [Record; N] {
    core::array::from_fn(|index| MappingSlot::factory_default(index).to_record())
}
