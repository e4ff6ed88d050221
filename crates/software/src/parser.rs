//! Provides [`MidiStreamParser`], which assembles complete [`Message`]s from a stream of bytes received one at a
//! time over a serial MIDI connection.
//!
//! The parser holds at most one message in flight. Any status byte, accepted or not, abandons the message being
//! assembled; data bytes which don't belong to an accepted status byte are discarded. This makes the parser
//! resynchronize on its own after noise, dropped bytes or filtered messages. Running status and real-time bytes
//! interleaved within another message are not supported: the former is discarded like any stray data byte, the
//! latter aborts the message it interrupts.

use crate::message::{Message, MessageCategory, StatusKind, is_status_byte};
use tinyvec::ArrayVec;

/// Stateful byte-to-[`Message`] assembler with category filtering.
#[derive(Clone, Debug, PartialEq)]
pub struct MidiStreamParser {
    /// Categories of messages to accept; everything else is discarded.
    filter: MessageCategory,
    /// Bytes of the message being assembled, status byte first. Empty when idle.
    buffer: ArrayVec<[u8; 3]>,
    /// Total length of the message being assembled.
    expected_len: usize,
}

impl Default for MidiStreamParser {
    fn default() -> Self {
        Self {
            filter: MessageCategory::none(),
            buffer: ArrayVec::new(),
            expected_len: 0,
        }
    }
}

impl MidiStreamParser {
    /// Constructs a [`MidiStreamParser`] accepting the given categories.
    ///
    /// [`MidiStreamParser::default`] accepts nothing until [`set_filter`](Self::set_filter) is called.
    pub fn new(filter: MessageCategory) -> Self {
        Self {
            filter,
            ..Default::default()
        }
    }

    /// Returns the categories currently accepted.
    pub fn filter(&self) -> MessageCategory {
        self.filter
    }

    /// Replaces the accepted categories. Any partially assembled message is abandoned.
    pub fn set_filter(&mut self, filter: MessageCategory) {
        self.filter = filter;
        self.reset();
    }

    /// Abandons any partially assembled message.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.expected_len = 0;
    }

    /// Returns `true` if no message is being assembled.
    pub fn is_idle(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Consumes a single byte. Returns a [`Message`] when the byte completes one, otherwise `None`.
    pub fn parse(&mut self, byte: u8) -> Option<Message> {
        if is_status_byte(byte) {
            return self.start(byte);
        }

        if self.is_idle() {
            // no accepted status byte to attach to
            return None;
        }

        self.buffer.push(byte);
        if self.buffer.len() == self.expected_len {
            let message = Message::from_parts(self.buffer);
            self.reset();
            Some(message)
        } else {
            None
        }
    }

    fn start(&mut self, status: u8) -> Option<Message> {
        self.reset();

        let kind = StatusKind::from_status_byte(status)?;
        if !self.filter.contains(kind.category()) {
            return None;
        }

        self.buffer.push(status);
        let len = kind.message_len();
        if len == 1 {
            let message = Message::from_parts(self.buffer);
            self.reset();
            Some(message)
        } else {
            self.expected_len = len;
            None
        }
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use std::vec::Vec;

    fn parse_all(parser: &mut MidiStreamParser, bytes: &[u8]) -> Vec<Message> {
        bytes.iter().filter_map(|&byte| parser.parse(byte)).collect()
    }

    fn msg(bytes: &[u8]) -> Message {
        Message::from_slice(bytes).expect("test message should be valid")
    }

    #[test]
    fn completes_note_on_on_last_byte() {
        let mut parser = MidiStreamParser::new(MessageCategory::CHANNEL_VOICE);
        assert_eq!(None, parser.parse(0x90));
        assert_eq!(None, parser.parse(0x40));
        assert_eq!(Some(msg(&[0x90, 0x40, 0x7F])), parser.parse(0x7F));
        assert!(parser.is_idle());
    }

    #[test]
    fn filtered_status_and_its_data_are_discarded() {
        let mut parser = MidiStreamParser::new(MessageCategory::CHANNEL_VOICE);
        assert_eq!(
            std::vec![msg(&[0x90, 0x40, 0x7F])],
            parse_all(&mut parser, &[0xF8, 0x90, 0x40, 0x7F]),
            "Expected left but got right"
        );

        // Song Position is filtered; its two data bytes must not be mistaken for anything
        assert_eq!(
            std::vec![msg(&[0x80, 0x40, 0x00])],
            parse_all(&mut parser, &[0xF2, 0x10, 0x20, 0x80, 0x40, 0x00]),
            "Expected left but got right"
        );
    }

    #[test]
    fn state_persists_across_calls() {
        let mut parser = MidiStreamParser::new(MessageCategory::CHANNEL_VOICE);
        assert!(parse_all(&mut parser, &[0x90, 0x40]).is_empty());
        assert!(!parser.is_idle());
        assert_eq!(
            std::vec![msg(&[0x90, 0x40, 0x7F])],
            parse_all(&mut parser, &[0x7F]),
            "Expected left but got right"
        );
    }

    #[test]
    fn two_byte_messages() {
        let mut parser = MidiStreamParser::new(MessageCategory::CHANNEL_VOICE);
        assert_eq!(
            std::vec![msg(&[0xC5, 0x0A]), msg(&[0xD0, 0x33])],
            parse_all(&mut parser, &[0xC5, 0x0A, 0xD0, 0x33]),
            "Expected left but got right"
        );
    }

    #[test]
    fn back_to_back_messages_without_gaps() {
        let mut parser = MidiStreamParser::new(MessageCategory::CHANNEL_VOICE);
        let stream = [0x90, 0x3C, 0x64, 0xB0, 0x07, 0x50, 0xE0, 0x00, 0x40];
        assert_eq!(
            std::vec![
                msg(&[0x90, 0x3C, 0x64]),
                msg(&[0xB0, 0x07, 0x50]),
                msg(&[0xE0, 0x00, 0x40])
            ],
            parse_all(&mut parser, &stream),
            "Expected left but got right"
        );
    }

    #[test]
    fn status_byte_mid_message_restarts() {
        let mut parser = MidiStreamParser::new(MessageCategory::CHANNEL_VOICE);
        assert_eq!(
            std::vec![msg(&[0x80, 0x3C, 0x00])],
            parse_all(&mut parser, &[0x90, 0x3C, 0x80, 0x3C, 0x00]),
            "Expected left but got right"
        );
    }

    #[test]
    fn filtered_status_mid_message_abandons_it() {
        let mut parser = MidiStreamParser::new(MessageCategory::CHANNEL_VOICE);
        assert!(parse_all(&mut parser, &[0x90, 0x3C, 0xF8, 0x64]).is_empty());
        assert!(parser.is_idle());
    }

    #[test]
    fn stray_data_bytes_are_discarded() {
        let mut parser = MidiStreamParser::new(MessageCategory::CHANNEL_VOICE);
        assert!(parse_all(&mut parser, &[0x00, 0x40, 0x7F]).is_empty());
        assert!(parser.is_idle());
    }

    #[test]
    fn running_status_is_not_supported() {
        let mut parser = MidiStreamParser::new(MessageCategory::CHANNEL_VOICE);
        assert_eq!(
            std::vec![msg(&[0x90, 0x3C, 0x64])],
            parse_all(&mut parser, &[0x90, 0x3C, 0x64, 0x3E, 0x64]),
            "Data following a completed message should be discarded"
        );
    }

    #[test]
    fn category_filter_is_selective() {
        let mut parser = MidiStreamParser::new(MessageCategory::NoteOn);
        assert_eq!(
            std::vec![msg(&[0x91, 0x30, 0x10])],
            parse_all(&mut parser, &[0x81, 0x30, 0x00, 0x91, 0x30, 0x10, 0xB1, 0x40, 0x7F]),
            "Only Note On should be accepted"
        );
    }

    #[test]
    fn default_discards_everything() {
        let mut parser = MidiStreamParser::default();
        assert!(parse_all(&mut parser, &[0x90, 0x40, 0x7F, 0xF8, 0xC0, 0x01]).is_empty());

        parser.set_filter(MessageCategory::CHANNEL_VOICE);
        assert_eq!(
            std::vec![msg(&[0x90, 0x40, 0x7F])],
            parse_all(&mut parser, &[0x90, 0x40, 0x7F]),
            "Expected left but got right"
        );
    }

    #[test]
    fn set_filter_abandons_partial_message() {
        let mut parser = MidiStreamParser::new(MessageCategory::CHANNEL_VOICE);
        parse_all(&mut parser, &[0x90, 0x40]);
        parser.set_filter(MessageCategory::CHANNEL_VOICE);
        assert_eq!(None, parser.parse(0x7F));
    }

    #[test]
    fn system_messages_when_accepted() {
        let mut parser = MidiStreamParser::new(
            MessageCategory::SystemCommon | MessageCategory::RealTime,
        );
        assert_eq!(
            std::vec![msg(&[0xF8]), msg(&[0xF3, 0x05]), msg(&[0xF6]), msg(&[0xFA])],
            parse_all(&mut parser, &[0xF8, 0xF3, 0x05, 0xF6, 0x90, 0x40, 0x7F, 0xFA]),
            "Expected left but got right"
        );
    }

    #[test]
    fn system_exclusive_is_discarded() {
        let mut parser = MidiStreamParser::new(
            MessageCategory::CHANNEL_VOICE | MessageCategory::SystemCommon | MessageCategory::RealTime,
        );
        assert_eq!(
            std::vec![msg(&[0xC0, 0x01])],
            parse_all(&mut parser, &[0xF0, 0x7E, 0x00, 0x06, 0x01, 0xF7, 0xC0, 0x01]),
            "Expected left but got right"
        );
    }
}
