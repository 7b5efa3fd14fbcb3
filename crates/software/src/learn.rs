//! The learn/assign state machine: copies the most recently completed MIDI message into whichever button the
//! performer raises.

use crate::{
    BUTTON_COUNT,
    button::RisingEdges,
    event::Event,
    message::MidiMessage,
    store::{MappingSlot, MappingStore, Medium},
};

/// Where the [`LearnController`] is in the learn cycle.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum LearnState {
    /// No completed message is available to learn.
    Idle,
    /// A completed message is held and will be assigned to the next raised button.
    MessageReady(MidiMessage),
    /// The held message was just written to this button's slot.
    Assigning {
        /// Index of the button being assigned.
        button: usize,
    },
}

#[cfg(feature = "defmt")]
impl defmt::Format for LearnState {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            Self::Idle => defmt::write!(fmt, "Idle"),
            Self::MessageReady(message) => defmt::write!(fmt, "MessageReady({})", message),
            Self::Assigning { button } => defmt::write!(fmt, "Assigning {{ button: {} }}", button),
        }
    }
}

/// Assigns completed messages to buttons.
///
/// The controller is the store's only writer. It holds whatever the assembler currently reports as ready, so a
/// newer message always replaces an older one, and a message superseded by a fresh status byte is no longer
/// learnable.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LearnController<const N: usize = BUTTON_COUNT> {
    state: LearnState,
    raise: RisingEdges<N>,
}

impl<const N: usize> Default for LearnController<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> LearnController<N> {
    /// Constructs an idle [`LearnController`].
    pub fn new() -> Self {
        Self {
            state: LearnState::Idle,
            raise: RisingEdges::new(),
        }
    }

    /// Advances the state machine by one tick.
    ///
    /// `ready` is the assembler's completed message, if any; `raise` holds the current level of each button's
    /// learn signal. When this returns [`Event::SlotAssigned`] the caller should consume the assembler's message.
    pub fn step<M: Medium>(
        &mut self,
        ready: Option<MidiMessage>,
        raise: &[bool; N],
        store: &mut MappingStore<M, N>,
    ) -> Event {
        let rising = self.raise.update(raise);
        if rising.passed_over > 0 {
            debug!("Ignoring {} raises which landed alongside another", rising.passed_over);
        }

        self.state = match ready {
            Some(message) => LearnState::MessageReady(message),
            None => LearnState::Idle,
        };

        let (LearnState::MessageReady(message), Some(button)) = (self.state, rising.first) else {
            return Event::none();
        };

        if !store.is_loaded(button) {
            debug!("Ignoring raise of button {}, its slot has not loaded", button);
            return Event::none();
        }

        if !message.is_well_formed() {
            warn!("Button {} is learning a message MIDI would consider incomplete: {}", button, message);
        }

        match store.write(button, MappingSlot::from(message)) {
            Ok(()) => {
                info!("Button {} learned {}", button, message);
                self.state = LearnState::Assigning { button };
                Event::SlotAssigned
            }
            Err(e) => {
                warn!("Button {} could not learn: {}", button, e);
                Event::none()
            }
        }
    }

    /// Getter.
    pub fn state(&self) -> LearnState {
        self.state
    }

    /// The save signal: asserted for the tick in which a slot is assigned.
    pub fn is_saving(&self) -> bool {
        matches!(self.state, LearnState::Assigning { .. })
    }

    /// Returns `true` while a message is held and waiting for a button.
    pub fn is_message_ready(&self) -> bool {
        matches!(self.state, LearnState::MessageReady(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryMedium;
    use wmidi::U7;

    type Store = MappingStore<MemoryMedium<4>, 4>;

    fn loaded_store() -> Store {
        let mut store = Store::new(MemoryMedium::provisioned());
        while !store.is_boot_complete() {
            store.tick();
        }
        store
    }

    fn message(bytes: &[u8]) -> MidiMessage {
        let mut message = MidiMessage::new(bytes[0]).unwrap();
        for &data in &bytes[1..] {
            message.push_data(U7::from_u8_lossy(data));
        }
        message
    }

    fn raised(button: usize) -> [bool; 4] {
        let mut levels = [false; 4];
        levels[button] = true;
        levels
    }

    #[test]
    fn holds_ready_message() {
        let mut store = loaded_store();
        let mut learn = LearnController::<4>::new();
        assert_eq!(LearnState::Idle, learn.state());

        let msg = message(&[0xB0, 0x10, 0x7F]);
        learn.step(Some(msg), &[false; 4], &mut store);
        assert_eq!(LearnState::MessageReady(msg), learn.state(), "Expected left but got right");
        assert!(learn.is_message_ready());
    }

    #[test]
    fn newer_message_replaces_held_one() {
        let mut store = loaded_store();
        let mut learn = LearnController::<4>::new();
        learn.step(Some(message(&[0xB0, 0x10, 0x7F])), &[false; 4], &mut store);
        let newer = message(&[0x90, 0x3C, 0x40]);
        learn.step(Some(newer), &[false; 4], &mut store);
        assert_eq!(LearnState::MessageReady(newer), learn.state());
    }

    #[test]
    fn assigns_on_raise_then_returns_to_idle() {
        let mut store = loaded_store();
        let mut learn = LearnController::<4>::new();
        let msg = message(&[0xB0, 0x10, 0x7F]);

        learn.step(Some(msg), &[false; 4], &mut store);
        let event = learn.step(Some(msg), &raised(0), &mut store);
        assert!(event.contains(Event::SlotAssigned));
        assert_eq!(LearnState::Assigning { button: 0 }, learn.state());
        assert!(learn.is_saving());
        assert_eq!(
            [0xB0, 0x10, 0x7F, 30],
            store.read(0).unwrap().to_record(),
            "Expected left but got right"
        );

        // the caller consumes the assembler's message on assignment
        learn.step(None, &raised(0), &mut store);
        assert_eq!(LearnState::Idle, learn.state());
        assert!(!learn.is_saving());
    }

    #[test]
    fn raise_without_message_does_nothing() {
        let mut store = loaded_store();
        let mut learn = LearnController::<4>::new();
        let event = learn.step(None, &raised(2), &mut store);
        assert_eq!(Event::none(), event);
        assert_eq!(Some(MappingSlot::factory_default(2)), store.read(2));
    }

    #[test]
    fn held_raise_does_not_assign_later_message() {
        let mut store = loaded_store();
        let mut learn = LearnController::<4>::new();
        learn.step(None, &raised(1), &mut store);
        let event = learn.step(Some(message(&[0xC0, 0x05])), &raised(1), &mut store);
        assert!(
            !event.contains(Event::SlotAssigned),
            "Only a rising edge should assign"
        );
    }

    #[test]
    fn simultaneous_raises_assign_lowest_only() {
        let mut store = loaded_store();
        let mut learn = LearnController::<4>::new();
        let msg = message(&[0x90, 0x40, 0x7F]);
        learn.step(Some(msg), &[false; 4], &mut store);
        learn.step(Some(msg), &[false, true, true, false], &mut store);
        assert_eq!(Some(MappingSlot::from(msg)), store.read(1));
        assert_eq!(Some(MappingSlot::factory_default(2)), store.read(2));
    }

    #[test]
    fn learn_isolation() {
        for button in 0..4 {
            let mut store = loaded_store();
            let before: [_; 4] = core::array::from_fn(|i| store.read(i));
            let mut learn = LearnController::<4>::new();
            let msg = message(&[0x90, 0x40, 0x7F]);
            learn.step(Some(msg), &[false; 4], &mut store);
            learn.step(Some(msg), &raised(button), &mut store);

            for other in (0..4).filter(|&other| other != button) {
                assert_eq!(
                    before[other],
                    store.read(other),
                    "Learning button {button} should leave slot {other} untouched"
                );
            }
            assert_eq!(Some(MappingSlot::from(msg)), store.read(button));
        }
    }

    #[test]
    fn raise_on_unloaded_slot_keeps_message() {
        let mut store = Store::new(MemoryMedium::provisioned().with_latency(50, 0));
        let mut learn = LearnController::<4>::new();
        let msg = message(&[0xB0, 0x10, 0x7F]);

        learn.step(Some(msg), &[false; 4], &mut store);
        let event = learn.step(Some(msg), &raised(0), &mut store);
        assert_eq!(Event::none(), event);
        assert_eq!(LearnState::MessageReady(msg), learn.state(), "Expected left but got right");
        assert!(!store.is_loaded(0));
    }
}
