//! Replays a button's stored message out of the MIDI port when the button is pressed.

use crate::{
    BUTTON_COUNT,
    button::RisingEdges,
    event::Event,
    message::MAX_MESSAGE_LEN,
    serial::SerialLineEncoder,
    store::{MappingStore, Medium},
};
use tinyvec::ArrayVec;

/// Whether a transmission is underway.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PlaybackState {
    /// The trigger is low; a press will start a transmission.
    Idle,
    /// This button's message is going out.
    Triggered {
        /// Index of the pressed button.
        button: usize,
    },
}

/// Turns button presses into transmissions.
///
/// The controller only ever reads the store. A press is served only once its slot has loaded; before then (and
/// while another transmission is going out) presses are dropped rather than deferred, so a performer never gets
/// a message they didn't expect at a moment they didn't choose.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PlaybackController<const N: usize = BUTTON_COUNT> {
    state: PlaybackState,
    press: RisingEdges<N>,
    /// Transmit registers, copied from the slot when the press lands.
    transmit: ArrayVec<[u8; MAX_MESSAGE_LEN]>,
    /// How many bytes of `transmit` have been handed to the encoder.
    sent: usize,
}

impl<const N: usize> Default for PlaybackController<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> PlaybackController<N> {
    /// Constructs an idle [`PlaybackController`].
    pub fn new() -> Self {
        Self {
            state: PlaybackState::Idle,
            press: RisingEdges::new(),
            transmit: ArrayVec::new(),
            sent: 0,
        }
    }

    /// Advances by one tick: finishes or feeds the current transmission, then handles any new press.
    ///
    /// Must run before the encoder's baud tick so a freshly loaded byte starts on that very tick.
    pub fn step<M: Medium>(
        &mut self,
        press: &[bool; N],
        store: &MappingStore<M, N>,
        encoder: &mut SerialLineEncoder,
    ) -> Event {
        let rising = self.press.update(press);
        let mut events = Event::none();

        if rising.passed_over > 0 {
            debug!("Ignoring {} presses which landed alongside another", rising.passed_over);
            events |= Event::PressIgnored;
        }

        if let PlaybackState::Triggered { button } = self.state {
            self.feed(encoder);
            if self.sent == self.transmit.len() && !encoder.is_busy() {
                trace!("Button {} finished transmitting", button);
                self.state = PlaybackState::Idle;
                events |= Event::PlaybackFinished;
            }
        }

        let Some(button) = rising.first else {
            return events;
        };

        if let PlaybackState::Triggered { button: current } = self.state {
            debug!("Ignoring press of button {} while button {} transmits", button, current);
            return events | Event::PressIgnored;
        }

        let Some(slot) = store.read(button) else {
            debug!("Ignoring press of button {}, its slot has not loaded", button);
            return events | Event::PressIgnored;
        };

        debug!("Button {} plays {}", button, slot);
        self.transmit = slot.bytes().collect();
        self.sent = 0;
        self.state = PlaybackState::Triggered { button };
        self.feed(encoder);
        events | Event::PlaybackStarted
    }

    /// Stages the next transmit byte if the encoder has room for it.
    fn feed(&mut self, encoder: &mut SerialLineEncoder) {
        if let Some(&byte) = self.transmit.get(self.sent) {
            if encoder.load(byte).is_ok() {
                self.sent += 1;
            }
        }
    }

    /// Getter.
    pub fn state(&self) -> PlaybackState {
        self.state
    }

    /// The trigger signal, which stays high until the last stop bit has gone out.
    pub fn is_triggered(&self) -> bool {
        matches!(self.state, PlaybackState::Triggered { .. })
    }
}
