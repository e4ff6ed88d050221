//! Compile-time configuration of the bridge. Nothing here can be changed at runtime.

use crate::{debounce::DebouncePattern, message::Message, message::MessageCategory};
use wmidi::{Channel, Note, U7};

/// Number of slots in the queue between the serial receive interrupt and the bridge. Must be a power of two; one
/// slot is always kept free, so at most `QUEUE_CAPACITY - 1` bytes are buffered before new bytes are dropped.
pub const QUEUE_CAPACITY: usize = 128;

/// Categories of messages forwarded from the serial input to the host.
pub const ACCEPTED_CATEGORIES: MessageCategory = MessageCategory::CHANNEL_VOICE;

/// How the pushbutton is debounced; see [`DebouncePattern::DEFAULT`].
pub const DEBOUNCE_PATTERN: DebouncePattern = DebouncePattern::DEFAULT;

/// Period of the bridge loop, which is also the period at which the pushbutton is sampled. With the default
/// pattern a press is reported after 2 ticks and a release after 7.
pub const TICK_PERIOD_MICROS: u64 = 1_000;

/// The note played when the pushbutton is pressed.
pub const BUTTON_NOTE: ButtonNote = ButtonNote {
    channel: Channel::Ch1,
    note: Note::B3,
    velocity: U7::from_u8_lossy(64),
};

/// Bit rate of the serial MIDI input. Frames are 8 data bits, no parity, 1 stop bit.
pub const SERIAL_BAUD_RATE: u32 = 31_250;

/// USB-MIDI virtual cable all messages are sent on.
pub const USB_CABLE_NUMBER: u8 = 0;

/// A fixed note synthesized in response to the pushbutton: Note On when pressed, Note Off when released.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ButtonNote {
    /// Channel both messages are sent on.
    pub channel: Channel,
    /// Pitch of the note.
    pub note: Note,
    /// Velocity used for both Note On and Note Off.
    pub velocity: U7,
}

impl ButtonNote {
    /// The message sent when the button is pressed.
    pub fn note_on(&self) -> Message {
        Message::note_on(self.channel, self.note, self.velocity)
    }

    /// The message sent when the button is released.
    pub fn note_off(&self) -> Message {
        Message::note_off(self.channel, self.note, self.velocity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_capacity_is_power_of_two() {
        assert!(QUEUE_CAPACITY.is_power_of_two());
    }

    #[test]
    fn button_note_messages() {
        assert_eq!(
            &[0x90, 0x3B, 0x40],
            BUTTON_NOTE.note_on().as_bytes(),
            "Expected left but got right"
        );
        assert_eq!(
            &[0x80, 0x3B, 0x40],
            BUTTON_NOTE.note_off().as_bytes(),
            "Expected left but got right"
        );
    }
}
