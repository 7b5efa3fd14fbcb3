//! [Embassy](https://embassy.dev)-based firmware for a MIDI footswitch running on the [Nucleo-F767ZI development
//! board](https://www.st.com/en/evaluation-tools/nucleo-f767zi.html), which is powered by an F7-series STM32
//! microcontroller.
//!
//! The device listens to a MIDI-in line. Once a message has arrived the green LED lights, and raising any of
//! the four learn buttons assigns that message to the matching footswitch. Pressing a footswitch sends its
//! message out of the MIDI-out line. Assignments survive power cycles; until a button has been taught it plays
//! a Control Change on controller 46 and up.
//!
//! Both MIDI lines are bit-banged on plain GPIO by the architecture-agnostic logic in `midi_footswitch_lib`,
//! clocked by a 125 kHz ticker running at interrupt priority. The chip runs in dual-bank mode: code executes
//! from bank 1 while mappings are logged to bank 2, so programming flash does not hold up instruction fetch.

#![no_std]
#![no_main]

mod flash;
mod idle_window;

use crate::{
    flash::{FlashMedium, flash_task},
    idle_window::{IDLE_WINDOW, IdleWindowReceiver, cycle_idle_window, show_idle_window},
};
use defmt::*;
use embassy_executor::{InterruptExecutor, Spawner};
use embassy_stm32::{
    Config,
    exti::ExtiInput,
    flash::Flash,
    gpio::{Input, Level, Output, Pull, Speed},
    interrupt,
    interrupt::{InterruptExt, Priority},
    time::Hertz,
};
use embassy_time::Ticker;
use midi_footswitch_lib::{
    BUTTON_COUNT,
    configuration::Config as FootswitchConfig,
    event::Event,
    footswitch::{Footswitch, Inputs},
};

use {defmt_rtt as _, panic_probe as _};

/// Runs the footswitch above the thread-mode executor, where flash access and the settings tasks live.
static EXECUTOR_HIGH: InterruptExecutor = InterruptExecutor::new();

#[interrupt]
unsafe fn UART4() {
    unsafe { EXECUTOR_HIGH.on_interrupt() }
}

/// The GPIO the footswitch samples and drives on every tick.
///
/// Buttons are expected to be debounced in hardware and read high while held.
struct Pins {
    midi_rx: Input<'static>,
    midi_tx: Output<'static>,
    raise: [Input<'static>; BUTTON_COUNT],
    press: [Input<'static>; BUTTON_COUNT],
    message_ready_led: Output<'static>,
    trigger_led: Output<'static>,
    committing: Output<'static>,
}

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("Initializing MIDI footswitch");

    let mut config = Config::default();
    {
        use embassy_stm32::rcc::*;
        // hse: high-speed external clock
        config.rcc.hse = Some(Hse {
            freq: Hertz(8_000_000),
            mode: HseMode::Bypass,
        });

        // pll: phase-locked loop, crucial for dividing clock
        config.rcc.pll_src = PllSource::HSE;
        config.rcc.pll = Some(Pll {
            prediv: PllPreDiv::DIV4,
            mul: PllMul::MUL216,
            divp: Some(PllPDiv::DIV2), // 8mhz / 4 * 216 / 2 = 216Mhz
            divq: None,
            divr: None,
        });
        config.rcc.ahb_pre = AHBPrescaler::DIV1;
        config.rcc.apb1_pre = APBPrescaler::DIV4;
        config.rcc.apb2_pre = APBPrescaler::DIV2;
        config.rcc.sys = Sysclk::PLL1_P;
    }
    let p = embassy_stm32::init(config);

    unwrap!(spawner.spawn(flash_task(Flash::new_blocking(p.FLASH))));

    // the user button cycles the idle window; the blue LED pulses its length in byte periods
    let button = ExtiInput::new(p.PC13, p.EXTI13, Pull::None);
    unwrap!(spawner.spawn(cycle_idle_window(button, IDLE_WINDOW.sender())));

    let blue_led = Output::new(p.PB7, Level::Low, Speed::Low);
    unwrap!(spawner.spawn(show_idle_window(blue_led, unwrap!(IDLE_WINDOW.receiver()))));

    // MIDI on the Zio connector's USART6 pins, driven as plain GPIO
    let pins = Pins {
        midi_rx: Input::new(p.PG9, Pull::Up),
        midi_tx: Output::new(p.PG14, Level::High, Speed::Medium),
        raise: [
            Input::new(p.PF13, Pull::Down),
            Input::new(p.PE9, Pull::Down),
            Input::new(p.PE11, Pull::Down),
            Input::new(p.PF14, Pull::Down),
        ],
        press: [
            Input::new(p.PE13, Pull::Down),
            Input::new(p.PF15, Pull::Down),
            Input::new(p.PG0, Pull::Down),
            Input::new(p.PG1, Pull::Down),
        ],
        message_ready_led: Output::new(p.PB0, Level::Low, Speed::Low),
        trigger_led: Output::new(p.PB14, Level::Low, Speed::Low),
        committing: Output::new(p.PG2, Level::Low, Speed::Low),
    };

    interrupt::UART4.set_priority(Priority::P6);
    let high_priority = EXECUTOR_HIGH.start(interrupt::UART4);
    let idle_window = unwrap!(IDLE_WINDOW.receiver());
    unwrap!(high_priority.spawn(footswitch_task(pins, idle_window)));
}

/// Task which owns the [`Footswitch`] and steps it once per main tick.
#[embassy_executor::task]
async fn footswitch_task(mut pins: Pins, mut idle_window: IdleWindowReceiver<'static>) -> ! {
    let config = FootswitchConfig::default();
    let mut footswitch = Footswitch::<_, BUTTON_COUNT>::new(config, FlashMedium::new());
    let mut inputs = Inputs::new();
    let mut ticker = Ticker::every(config.timing.tick_period());

    loop {
        if let Some(window) = idle_window.try_changed() {
            footswitch.set_idle_window(window);
        }

        inputs.midi_rx = pins.midi_rx.is_high();
        for (level, pin) in inputs.raise.iter_mut().zip(&pins.raise) {
            *level = pin.is_high();
        }
        for (level, pin) in inputs.press.iter_mut().zip(&pins.press) {
            *level = pin.is_high();
        }

        let outputs = footswitch.step(&inputs);

        pins.midi_tx.set_level(Level::from(outputs.midi_tx));
        pins.message_ready_led
            .set_level(Level::from(outputs.message_ready));
        pins.trigger_led.set_level(Level::from(outputs.trigger));
        pins.committing.set_level(Level::from(outputs.committing));

        if outputs.events.contains(Event::BootLoadComplete) {
            info!("Mappings loaded");
        }
        if outputs.events.contains(Event::FrameError) {
            warn!("MIDI-in frame error");
        }

        ticker.next().await;
    }
}
