//! The user button and blue LED, which pick and show the [`IdleWindow`] the footswitch assembles messages with.

use defmt::*;
use embassy_stm32::{exti::ExtiInput, gpio::Output};
use embassy_sync::{
    blocking_mutex::raw::CriticalSectionRawMutex,
    watch::{Receiver, Sender, Watch},
};
use embassy_time::{Duration, Timer};
use midi_footswitch_lib::configuration::{CycleConfig, IdleWindow};

/// One reader in the footswitch task, one behind the LED.
const LISTENERS: usize = 2;

/// The idle window currently in force.
pub static IDLE_WINDOW: Watch<CriticalSectionRawMutex, IdleWindow, LISTENERS> =
    Watch::new_with(IdleWindow::OneByte);

pub type IdleWindowSender<'a> = Sender<'a, CriticalSectionRawMutex, IdleWindow, LISTENERS>;
pub type IdleWindowReceiver<'a> = Receiver<'a, CriticalSectionRawMutex, IdleWindow, LISTENERS>;

/// Length of one LED pulse, and of the gap after it.
const PULSE: Duration = Duration::from_millis(150);

/// Steps to the next [`IdleWindow`] on every press of the user button.
#[embassy_executor::task]
pub async fn cycle_idle_window(mut button: ExtiInput<'static>, setting: IdleWindowSender<'static>) -> ! {
    let mut window = IdleWindow::OneByte;
    loop {
        button.wait_for_rising_edge().await;
        window = window.cycle();
        info!("Idle window set to {} byte periods", window.byte_periods());
        setting.send(window);
    }
}

/// Pulses the LED once per byte period of silence the [`IdleWindow`] asks for, each time the setting changes.
///
/// The LED is otherwise dark, so a pulse train always reads as a complete count.
#[embassy_executor::task]
pub async fn show_idle_window(mut led: Output<'static>, mut setting: IdleWindowReceiver<'static>) -> ! {
    let mut window = setting.get().await;
    loop {
        for _ in 0..window.byte_periods() {
            led.set_high();
            Timer::after(PULSE).await;
            led.set_low();
            Timer::after(PULSE).await;
        }
        window = setting.changed().await;
    }
}
