//! This crate contains architecture-agnostic logic for a MIDI footswitch: a device which listens to a serial
//! [MIDI](https://midi.org/midi-1-0) stream, lets the performer "teach" any of its buttons the most recently
//! received message, persists those mappings, and replays a button's message out of its MIDI port whenever the
//! button is pressed.
//!
//! Everything here is driven by a single synchronous clock: see [`footswitch::Footswitch::step`]. The firmware
//! crate calls it from a fixed-rate ticker; the tests call it from a loop.

#![deny(missing_docs)]
#![no_std]

#[macro_use]
mod fmt;

mod button;

pub mod configuration;

/// Flags describing what happened during a single step of the device.
pub mod event;

/// The device as a whole: every component wired together behind a single `step()`.
pub mod footswitch;

pub mod learn;

/// Data structures for MIDI messages and their assembly from a byte stream.
pub mod message;

pub mod playback;

/// Bit-level framing of the MIDI serial lines.
pub mod serial;

pub mod store;

/// Number of footswitch buttons on the reference hardware, which is also the number of mapping slots.
pub const BUTTON_COUNT: usize = 4;
