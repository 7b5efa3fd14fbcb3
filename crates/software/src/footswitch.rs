use crate::{
    BUTTON_COUNT,
    configuration::{BaudClock, Config, IdleWindow},
    event::Event,
    learn::{LearnController, LearnState},
    message::MessageAssembler,
    playback::{PlaybackController, PlaybackState},
    serial::{IDLE_LEVEL, SerialLineDecoder, SerialLineEncoder},
    store::{MappingStore, Medium},
};

/// Everything the device samples on a main tick.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Inputs<const N: usize = BUTTON_COUNT> {
    /// Level of the MIDI-in line.
    pub midi_rx: bool,
    /// Per-button learn signal, already debounced.
    pub raise: [bool; N],
    /// Per-button playback signal, already debounced.
    pub press: [bool; N],
}

impl<const N: usize> Default for Inputs<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> Inputs<N> {
    /// An idle MIDI line and no buttons held.
    pub fn new() -> Self {
        Self {
            midi_rx: IDLE_LEVEL,
            raise: [false; N],
            press: [false; N],
        }
    }
}

/// Everything the device drives on a main tick.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Outputs {
    /// Level of the MIDI-out line.
    pub midi_tx: bool,
    /// The status light: a learned message is waiting for a button.
    pub message_ready: bool,
    /// A slot was just assigned.
    pub save: bool,
    /// A transmission is underway.
    pub trigger: bool,
    /// A mapping has yet to reach durable storage.
    pub committing: bool,
    /// Whether this main tick was also a baud tick.
    pub baud_tick: bool,
    /// What happened during the tick.
    pub events: Event,
}

/// The complete footswitch: MIDI in and out, the learn cycle, playback, and the mapping store.
///
/// Every component advances inside [`step`][Self::step], in a fixed order, so no component ever sees another
/// half-way through a tick. The store is written only by learning and read only by playback.
#[derive(Debug)]
pub struct Footswitch<M, const N: usize = BUTTON_COUNT> {
    clock: BaudClock,
    decoder: SerialLineDecoder,
    assembler: MessageAssembler,
    encoder: SerialLineEncoder,
    store: MappingStore<M, N>,
    learn: LearnController<N>,
    playback: PlaybackController<N>,
}

impl<M: Medium, const N: usize> Footswitch<M, N> {
    /// Constructs a [`Footswitch`]. Mappings load from `medium` over the first few ticks.
    pub fn new(config: Config, medium: M) -> Self {
        Self {
            clock: BaudClock::from(config.timing),
            decoder: SerialLineDecoder::new(),
            assembler: MessageAssembler::new(config.idle_window),
            encoder: SerialLineEncoder::new(),
            store: MappingStore::new(medium),
            learn: LearnController::new(),
            playback: PlaybackController::new(),
        }
    }

    /// Advances the whole device by one main tick.
    pub fn step(&mut self, inputs: &Inputs<N>) -> Outputs {
        let baud_tick = self.clock.tick();
        let mut events = Event::none();

        if baud_tick {
            let received = self.decoder.on_baud_tick(inputs.midi_rx);
            events |= self
                .assembler
                .on_baud_tick(received, self.decoder.is_idle());
        }

        events |= self.store.tick();

        let learned = self
            .learn
            .step(self.assembler.ready(), &inputs.raise, &mut self.store);
        if learned.contains(Event::SlotAssigned) {
            self.assembler.consume();
        }
        events |= learned;

        events |= self
            .playback
            .step(&inputs.press, &self.store, &mut self.encoder);

        if baud_tick {
            self.encoder.on_baud_tick();
        }

        Outputs {
            midi_tx: self.encoder.level(),
            message_ready: self.learn.is_message_ready(),
            save: self.learn.is_saving(),
            trigger: self.playback.is_triggered(),
            committing: self.store.is_committing(),
            baud_tick,
            events,
        }
    }

    /// Changes how long the MIDI-in line must stay quiet before a message counts as complete.
    pub fn set_idle_window(&mut self, window: IdleWindow) {
        info!("Idle window is now {} baud ticks", window.baud_ticks());
        self.assembler.set_idle_window(window);
    }

    /// Getter.
    pub fn store(&self) -> &MappingStore<M, N> {
        &self.store
    }

    /// Getter.
    pub fn learn_state(&self) -> LearnState {
        self.learn.state()
    }

    /// Getter.
    pub fn playback_state(&self) -> PlaybackState {
        self.playback.state()
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use crate::serial::{BITS_PER_FRAME, Received};
    use crate::store::{MappingSlot, MemoryMedium};
    use std::vec::Vec;

    /// Drives a [`Footswitch`] the way the firmware would, with a decoder listening on MIDI-out.
    struct Bench {
        footswitch: Footswitch<MemoryMedium<4>, 4>,
        inputs: Inputs<4>,
        listener: SerialLineDecoder,
        sent: Vec<u8>,
        events: Event,
        last: Option<Outputs>,
    }

    impl Bench {
        fn new(medium: MemoryMedium<4>) -> Self {
            Self {
                footswitch: Footswitch::new(Config::default(), medium),
                inputs: Inputs::new(),
                listener: SerialLineDecoder::new(),
                sent: Vec::new(),
                events: Event::none(),
                last: None,
            }
        }

        /// A bench whose slots have all loaded.
        fn booted() -> Self {
            let mut bench = Self::new(MemoryMedium::provisioned());
            while !bench.footswitch.store().is_boot_complete() {
                bench.step();
            }
            bench
        }

        fn step(&mut self) -> Outputs {
            let outputs = self.footswitch.step(&self.inputs);
            if outputs.baud_tick {
                if let Some(Received::Byte(byte)) = self.listener.on_baud_tick(outputs.midi_tx) {
                    self.sent.push(byte);
                }
            }
            self.events |= outputs.events;
            self.last = Some(outputs);
            outputs
        }

        /// Steps through the rest of the current baud period.
        fn baud(&mut self) {
            while !self.step().baud_tick {}
        }

        fn idle(&mut self, baud_ticks: u16) {
            self.inputs.midi_rx = IDLE_LEVEL;
            for _ in 0..baud_ticks {
                self.baud();
            }
        }

        fn send_frame(&mut self, byte: u8, stop: bool) {
            self.inputs.midi_rx = false;
            self.baud();
            for bit in 0..8 {
                self.inputs.midi_rx = byte & (1 << bit) != 0;
                self.baud();
            }
            self.inputs.midi_rx = stop;
            self.baud();
            self.inputs.midi_rx = IDLE_LEVEL;
        }

        fn send(&mut self, bytes: &[u8]) {
            for &byte in bytes {
                self.send_frame(byte, true);
            }
        }

        /// Holds the learn signal for one main tick, returning what the device did on that tick.
        fn raise(&mut self, button: usize) -> Outputs {
            self.inputs.raise[button] = true;
            let outputs = self.step();
            self.inputs.raise[button] = false;
            outputs
        }

        /// Taps a button, lets the transmission play out, and returns the bytes seen on MIDI-out.
        fn press(&mut self, button: usize) -> Vec<u8> {
            self.sent.clear();
            self.inputs.press[button] = true;
            self.step();
            self.inputs.press[button] = false;
            self.idle(4 * u16::from(BITS_PER_FRAME));
            self.sent.clone()
        }
    }

    #[test]
    fn message_ready_light() {
        let mut bench = Bench::booted();
        bench.send(&[0xB0, 0x10, 0x7F]);
        bench.idle(9);
        assert!(!bench.last.unwrap().message_ready);
        bench.idle(1);
        assert!(bench.last.unwrap().message_ready);
        assert!(bench.events.contains(Event::MessageCompleted));
    }

    #[test]
    fn learn_from_the_line() {
        let mut bench = Bench::booted();
        bench.send(&[0xB0, 0x10, 0x7F]);
        bench.idle(30);

        let outputs = bench.raise(0);
        assert!(outputs.events.contains(Event::SlotAssigned));
        assert!(outputs.save, "The save signal should be asserted on assignment");
        assert!(!outputs.message_ready);
        assert_eq!(
            [0xB0, 0x10, 0x7F, 30],
            bench.footswitch.store().read(0).unwrap().to_record(),
            "Expected left but got right"
        );

        let outputs = bench.step();
        assert!(!outputs.save);
        assert_eq!(LearnState::Idle, bench.footswitch.learn_state());
    }

    #[test]
    fn learned_message_is_committed() {
        let mut bench = Bench::booted();
        bench.send(&[0x90, 0x3C, 0x64]);
        bench.idle(10);
        bench.raise(2);
        while bench.step().committing {}
        assert!(bench.events.contains(Event::CommitAcknowledged));
        assert_eq!(
            [0x90, 0x3C, 0x64, 30],
            bench.footswitch.store().medium().records()[2]
        );
    }

    #[test]
    fn replay_learned_message() {
        let mut bench = Bench::booted();
        bench.send(&[0xB0, 0x10, 0x7F]);
        bench.idle(30);
        bench.raise(0);
        assert_eq!(
            [0xB0, 0x10, 0x7F],
            bench.press(0).as_slice(),
            "Expected left but got right"
        );
    }

    #[test]
    fn replay_is_idempotent() {
        let mut bench = Bench::booted();
        let first = bench.press(1);
        let second = bench.press(1);
        assert_eq!(first, second);
        assert_eq!([0xB0, 0x2F, 0x7F], first.as_slice());
    }

    #[test]
    fn factory_mapping_before_any_learn() {
        let bench = Bench::booted();
        assert_eq!(
            Some(MappingSlot::from_record([0xB0, 0x2E, 0x7F, 0x1E]).unwrap()),
            bench.footswitch.store().read(0)
        );
    }

    #[test]
    fn press_during_boot_sends_nothing() {
        let mut bench = Bench::new(MemoryMedium::provisioned().with_latency(500, 0));
        assert!(bench.press(3).is_empty(), "No bytes should go out for an unloaded slot");
        assert!(bench.events.contains(Event::PressIgnored));
        assert!(!bench.footswitch.store().is_loaded(3));

        while !bench.footswitch.store().is_boot_complete() {
            bench.step();
        }
        assert!(
            bench.sent.is_empty(),
            "The ignored press should not be replayed once loading finishes"
        );
        assert_eq!([0xB0, 0x31, 0x7F], bench.press(3).as_slice());
    }

    #[test]
    fn trigger_covers_whole_transmission() {
        let mut bench = Bench::booted();
        bench.inputs.press[0] = true;
        let mut high = 0;
        while bench.step().trigger {
            bench.inputs.press[0] = false;
            high += 1;
        }
        // three frames at four main ticks per baud tick
        assert!(
            high >= 3 * u32::from(BITS_PER_FRAME) * 4,
            "Trigger dropped after {high} main ticks"
        );
        assert_eq!(PlaybackState::Idle, bench.footswitch.playback_state());
    }

    #[test]
    fn simultaneous_presses_are_reported() {
        let mut bench = Bench::booted();
        bench.inputs.press = [true, true, false, false];
        let outputs = bench.step();
        assert!(outputs.events.contains(Event::PlaybackStarted));
        assert!(
            outputs.events.contains(Event::PressIgnored),
            "Button 1's press should not vanish silently"
        );
        bench.inputs.press = [false; 4];
        bench.idle(4 * u16::from(BITS_PER_FRAME));
        assert_eq!([0xB0, 0x2E, 0x7F], bench.sent.as_slice(), "Expected left but got right");
    }

    #[test]
    fn learning_while_playing() {
        let mut bench = Bench::booted();
        bench.send(&[0xC0, 0x07]);
        bench.idle(10);
        bench.inputs.press[3] = true;
        bench.step();
        bench.inputs.press[3] = false;
        assert!(bench.raise(3).events.contains(Event::SlotAssigned));

        // the transmission already under way keeps its original bytes
        bench.idle(4 * u16::from(BITS_PER_FRAME));
        assert_eq!([0xB0, 0x31, 0x7F], bench.sent.as_slice());
        assert_eq!([0xC0, 0x07, 0x00], bench.press(3).as_slice());
    }

    #[test]
    fn frame_error_is_reported() {
        let mut bench = Bench::booted();
        bench.send_frame(0x90, false);
        assert!(bench.events.contains(Event::FrameError));
        bench.idle(2);
        bench.send(&[0xB0, 0x01, 0x02]);
        bench.idle(10);
        assert!(bench.last.unwrap().message_ready, "The decoder should resync after a frame error");
    }

    #[test]
    fn longer_idle_window() {
        let mut bench = Bench::booted();
        bench.footswitch.set_idle_window(IdleWindow::TwoBytes);
        bench.send(&[0xB0, 0x10, 0x7F]);
        bench.idle(19);
        assert!(!bench.last.unwrap().message_ready);
        bench.idle(1);
        assert!(bench.last.unwrap().message_ready);
    }
}
