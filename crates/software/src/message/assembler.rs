use super::{MidiMessage, is_status};
use crate::{configuration::IdleWindow, event::Event, serial::Received};
use wmidi::U7;

#[derive(Clone, Copy, Debug, PartialEq)]
enum Assembly {
    /// Nothing received yet, or the last completed message has been consumed.
    Empty,
    /// A status byte has arrived and data bytes may follow. `idle_ticks` counts baud ticks of uninterrupted
    /// line silence since the last byte.
    Open { message: MidiMessage, idle_ticks: u16 },
    /// The line went quiet for a full idle window; the message is finished and waiting to be consumed.
    Complete(MidiMessage),
}

/// Groups the decoder's bytes into [`MidiMessage`]s.
///
/// MIDI offers no end-of-message marker, so a message is considered finished once the line has stayed idle for
/// an [`IdleWindow`]. A new status byte always starts over, abandoning whatever came before it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MessageAssembler {
    assembly: Assembly,
    window: u16,
}

impl Default for MessageAssembler {
    fn default() -> Self {
        Self::new(IdleWindow::default())
    }
}

impl MessageAssembler {
    /// Constructs a [`MessageAssembler`].
    pub fn new(window: IdleWindow) -> Self {
        Self {
            assembly: Assembly::Empty,
            window: window.baud_ticks(),
        }
    }

    /// Changes the idle window. A message already open is judged against the new window from here on.
    pub fn set_idle_window(&mut self, window: IdleWindow) {
        self.window = window.baud_ticks();
    }

    /// Consumes one baud tick's worth of decoder output.
    ///
    /// `line_idle` should be true when the decoder is between frames with the line held high; only then does the
    /// idle window advance.
    pub fn on_baud_tick(&mut self, received: Option<Received>, line_idle: bool) -> Event {
        match received {
            Some(Received::Byte(byte)) => self.push(byte) | Event::ByteReceived,
            Some(Received::FrameError) => {
                // line activity, even garbled, means the sender isn't done
                if let Assembly::Open { idle_ticks, .. } = &mut self.assembly {
                    *idle_ticks = 0;
                }
                Event::FrameError
            }
            None if line_idle => self.wait(),
            None => {
                if let Assembly::Open { idle_ticks, .. } = &mut self.assembly {
                    *idle_ticks = 0;
                }
                Event::none()
            }
        }
    }

    /// Incorporates a single byte.
    pub fn push(&mut self, byte: u8) -> Event {
        if is_status(byte) {
            if let Assembly::Open { message, .. } | Assembly::Complete(message) = self.assembly {
                debug!(
                    "Status {=u8:#x} abandons message with status {=u8:#x}",
                    byte,
                    message.status()
                );
            }
            if let Some(message) = MidiMessage::new(byte) {
                self.assembly = Assembly::Open {
                    message,
                    idle_ticks: 0,
                };
            }
            return Event::none();
        }

        match &mut self.assembly {
            Assembly::Open {
                message,
                idle_ticks,
            } => {
                *idle_ticks = 0;
                if !message.push_data(U7::from_u8_lossy(byte)) {
                    debug!("Ignoring data byte {=u8:#x} beyond the third byte", byte);
                }
            }
            Assembly::Empty | Assembly::Complete(_) => {
                debug!("Ignoring data byte {=u8:#x} with no open message", byte);
            }
        }
        Event::none()
    }

    /// Counts a baud tick of line silence, completing the open message once the window is reached.
    fn wait(&mut self) -> Event {
        let Assembly::Open {
            message,
            idle_ticks,
        } = &mut self.assembly
        else {
            return Event::none();
        };

        *idle_ticks = idle_ticks.saturating_add(1);
        if *idle_ticks < self.window {
            return Event::none();
        }

        let message = *message;
        trace!("Message complete: {}", message);
        self.assembly = Assembly::Complete(message);
        Event::MessageCompleted
    }

    /// The completed message, if there is one which has been neither consumed nor superseded.
    pub fn ready(&self) -> Option<MidiMessage> {
        match self.assembly {
            Assembly::Complete(message) => Some(message),
            _ => None,
        }
    }

    /// Returns `true` while a completed message is waiting; this drives the status light.
    pub fn is_ready(&self) -> bool {
        self.ready().is_some()
    }

    /// The message still being received, if any.
    pub fn current(&self) -> Option<MidiMessage> {
        match self.assembly {
            Assembly::Open { message, .. } => Some(message),
            _ => None,
        }
    }

    /// Takes the completed message, leaving nothing ready.
    pub fn consume(&mut self) -> Option<MidiMessage> {
        let message = self.ready();
        if message.is_some() {
            self.assembly = Assembly::Empty;
        }
        message
    }
}
