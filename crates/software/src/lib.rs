//! This crate contains architecture-agnostic logic for a serial-to-USB MIDI bridge: a device which receives
//! [MIDI](https://midi.org/midi-1-0) over a classic 5-pin DIN serial connection and presents it to a computer as a
//! USB-MIDI device, alongside a pushbutton which plays a fixed note.
//!
//! The data path is made of three pieces:
//! - a [`RingBuffer`](ring_buffer::RingBuffer) carrying raw bytes from the serial receive interrupt to the bridge
//!   loop without locks,
//! - a [`MidiStreamParser`](parser::MidiStreamParser) assembling those bytes into complete messages,
//! - a [`Debouncer`](debounce::Debouncer) turning pushbutton samples into press and release events.
//!
//! The [`Bridge`](bridge::Bridge) ties them together and forwards the results to a [`Transport`](bridge::Transport).

#![deny(missing_docs)]
#![no_std]

#[macro_use]
mod fmt;

pub mod bridge;
pub mod configuration;
pub mod debounce;
pub mod message;
pub mod parser;
pub mod ring_buffer;
