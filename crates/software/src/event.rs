use bitmask_enum::bitmask;

/// Things that may happen during a single step of the device.
///
/// Several components report into the same set, so a caller can inspect one value per tick rather than poll
/// each component.
#[bitmask(u16)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Event {
    /// A byte was recovered from the MIDI-in line.
    ByteReceived,
    /// A frame was received without a valid stop bit and discarded.
    FrameError,
    /// The line went quiet long enough for the in-flight message to be considered complete.
    MessageCompleted,
    /// A mapping slot finished loading from the durable medium.
    SlotLoaded,
    /// Every mapping slot has been loaded.
    BootLoadComplete,
    /// A learned message was written to a button's mapping slot.
    SlotAssigned,
    /// The durable medium acknowledged a commit.
    CommitAcknowledged,
    /// A button press began a transmission.
    PlaybackStarted,
    /// The last stop bit of a transmission went out.
    PlaybackFinished,
    /// A button press was dropped: its slot was not loaded yet, a transmission was underway, or a lower-numbered
    /// button was pressed on the same tick.
    PressIgnored,
}
