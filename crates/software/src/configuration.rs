//! This module contains both user-configurable settings and traits to make them easier to work with in code.

mod idle_window;
pub use idle_window::*;

mod timing;
pub use timing::*;

use num_traits::{FromPrimitive, ToPrimitive};

/// A trait which allows infinite cycling of an enum's variants.
///
/// The footswitch has a single spare pushbutton for settings; each press advances from the current to the next
/// variant, cycling back to the beginning when all variants have been exhausted.
pub trait CycleConfig {
    /// Return the next variant, cycling back to the beginning as needed.
    fn cycle(self) -> Self
    where
        Self: FromPrimitive + ToPrimitive + Sized,
    {
        let index = self
            .to_u8()
            .expect("enum variants should be castable to u8");
        match <Self as FromPrimitive>::from_u8(index + 1) {
            Some(next) => next,
            None => FromPrimitive::from_u8(0).expect("enum should not be empty"),
        }
    }
}

/// Everything the [`Footswitch`][crate::footswitch::Footswitch] needs to know up front.
#[derive(Clone, Copy, Debug, Default)]
pub struct Config {
    /// Relationship between the main tick and the MIDI bit rate.
    pub timing: SerialTiming,
    /// How long the MIDI-in line must stay quiet before a message counts as complete.
    pub idle_window: IdleWindow,
}
