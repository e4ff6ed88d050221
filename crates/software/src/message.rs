//! Types describing complete MIDI messages as assembled from a serial byte stream, and their translation into
//! [USB-MIDI Event Packets](https://www.usb.org/sites/default/files/midi10.pdf) for the host.

use bitmask_enum::bitmask;
use num_derive::{FromPrimitive, ToPrimitive};
use num_traits::FromPrimitive;
use tinyvec::ArrayVec;
use wmidi::{Channel, MidiMessage, Note, U7};

/// Returns `true` if the byte has its high bit set, i.e., it is a status byte rather than a data byte.
pub const fn is_status_byte(byte: u8) -> bool {
    byte & 0x80 != 0
}

/// Categories of MIDI messages, combined into a filter which decides which messages are accepted from the stream.
#[bitmask(u16)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MessageCategory {
    /// Note Off (`0x8n`).
    NoteOff,
    /// Note On (`0x9n`).
    NoteOn,
    /// Polyphonic Key Pressure (`0xAn`).
    PolyPressure,
    /// Control Change (`0xBn`).
    ControlChange,
    /// Program Change (`0xCn`).
    ProgramChange,
    /// Channel Pressure (`0xDn`).
    ChannelPressure,
    /// Pitch Bend (`0xEn`).
    PitchBend,
    /// System Common messages other than System Exclusive: MTC Quarter Frame, Song Position, Song Select and
    /// Tune Request.
    SystemCommon,
    /// System Real-Time messages: Timing Clock, Start, Continue, Stop, Active Sensing and Reset.
    RealTime,
}

impl MessageCategory {
    /// All channel voice categories, i.e., the messages addressed to a specific channel.
    pub const CHANNEL_VOICE: Self = Self::NoteOff
        .or(Self::NoteOn)
        .or(Self::PolyPressure)
        .or(Self::ControlChange)
        .or(Self::ProgramChange)
        .or(Self::ChannelPressure)
        .or(Self::PitchBend);
}

/// The kinds of status bytes the parser recognizes.
///
/// Channel voice kinds are keyed by the high nibble of the status byte (the low nibble being the channel);
/// system kinds by the complete byte. System Exclusive and the undefined system bytes (`0xF4`, `0xF5`, `0xF9`,
/// `0xFD`) have no kind and are never accepted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, FromPrimitive, ToPrimitive)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[allow(missing_docs)]
pub enum StatusKind {
    NoteOff = 0x80,
    NoteOn = 0x90,
    PolyPressure = 0xA0,
    ControlChange = 0xB0,
    ProgramChange = 0xC0,
    ChannelPressure = 0xD0,
    PitchBend = 0xE0,
    /// MIDI Time Code Quarter Frame.
    TimeCodeQuarterFrame = 0xF1,
    /// Song Position Pointer.
    SongPosition = 0xF2,
    SongSelect = 0xF3,
    TuneRequest = 0xF6,
    TimingClock = 0xF8,
    Start = 0xFA,
    Continue = 0xFB,
    Stop = 0xFC,
    ActiveSensing = 0xFE,
    Reset = 0xFF,
}

impl StatusKind {
    /// Identifies the kind of a status byte. Returns `None` for data bytes and for unsupported status bytes.
    pub fn from_status_byte(byte: u8) -> Option<Self> {
        match byte {
            0x00..=0x7F => None,
            0x80..=0xEF => Self::from_u8(byte & 0xF0),
            _ => Self::from_u8(byte),
        }
    }

    /// The [`MessageCategory`] this kind belongs to.
    pub fn category(self) -> MessageCategory {
        match self {
            Self::NoteOff => MessageCategory::NoteOff,
            Self::NoteOn => MessageCategory::NoteOn,
            Self::PolyPressure => MessageCategory::PolyPressure,
            Self::ControlChange => MessageCategory::ControlChange,
            Self::ProgramChange => MessageCategory::ProgramChange,
            Self::ChannelPressure => MessageCategory::ChannelPressure,
            Self::PitchBend => MessageCategory::PitchBend,
            Self::TimeCodeQuarterFrame | Self::SongPosition | Self::SongSelect | Self::TuneRequest => {
                MessageCategory::SystemCommon
            }
            Self::TimingClock
            | Self::Start
            | Self::Continue
            | Self::Stop
            | Self::ActiveSensing
            | Self::Reset => MessageCategory::RealTime,
        }
    }

    /// Total length of a message of this kind, status byte included.
    pub fn message_len(self) -> usize {
        match self {
            Self::NoteOff
            | Self::NoteOn
            | Self::PolyPressure
            | Self::ControlChange
            | Self::PitchBend
            | Self::SongPosition => 3,
            Self::ProgramChange
            | Self::ChannelPressure
            | Self::TimeCodeQuarterFrame
            | Self::SongSelect => 2,
            Self::TuneRequest
            | Self::TimingClock
            | Self::Start
            | Self::Continue
            | Self::Stop
            | Self::ActiveSensing
            | Self::Reset => 1,
        }
    }

    /// Code Index Number used in the header of a USB-MIDI Event Packet; see table 4-1 of the USB MIDI 1.0
    /// device class specification.
    pub fn code_index_number(self) -> u8 {
        match self {
            Self::TimeCodeQuarterFrame | Self::SongSelect => 0x2,
            Self::SongPosition => 0x3,
            Self::TuneRequest => 0x5,
            Self::TimingClock
            | Self::Start
            | Self::Continue
            | Self::Stop
            | Self::ActiveSensing
            | Self::Reset => 0xF,
            channel_voice => (channel_voice as u8) >> 4,
        }
    }
}

/// A complete MIDI message: a status byte followed by as many data bytes as its [`StatusKind`] requires.
///
/// Messages are always well formed; the only ways to obtain one are the parser, [`Message::from_slice`], which
/// validates its input, and the note constructors.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Message {
    bytes: ArrayVec<[u8; 3]>,
}

#[cfg(feature = "defmt")]
impl defmt::Format for Message {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "Message {{ {=[u8]:#x} }}", self.as_bytes());
    }
}

impl Message {
    /// Builds a [`Message`] from raw bytes, returning `None` unless they form exactly one supported message.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let (&status, data) = bytes.split_first()?;
        let kind = StatusKind::from_status_byte(status)?;
        if bytes.len() != kind.message_len() || data.iter().any(|&byte| is_status_byte(byte)) {
            return None;
        }

        let mut message = ArrayVec::new();
        message.extend_from_slice(bytes);
        Some(Self { bytes: message })
    }

    /// Wraps bytes already known to form a complete message.
    pub(crate) fn from_parts(bytes: ArrayVec<[u8; 3]>) -> Self {
        debug_assert!(Self::from_slice(&bytes).is_some());
        Self { bytes }
    }

    /// Constructs a Note On message.
    pub fn note_on(channel: Channel, note: Note, velocity: U7) -> Self {
        Self::channel_voice(StatusKind::NoteOn, channel, note, velocity)
    }

    /// Constructs a Note Off message.
    pub fn note_off(channel: Channel, note: Note, velocity: U7) -> Self {
        Self::channel_voice(StatusKind::NoteOff, channel, note, velocity)
    }

    fn channel_voice(kind: StatusKind, channel: Channel, note: Note, value: U7) -> Self {
        Self::from_parts(ArrayVec::from([
            kind as u8 | channel.index(),
            u8::from(note),
            u8::from(value),
        ]))
    }

    /// The raw bytes of the message, status byte first.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// The status byte.
    pub fn status(&self) -> u8 {
        self.bytes[0]
    }

    /// The [`StatusKind`] of the status byte.
    pub fn kind(&self) -> StatusKind {
        StatusKind::from_status_byte(self.status())
            .expect("Message should only ever hold a supported status byte")
    }

    /// The channel a channel voice message is addressed to; `None` for system messages.
    pub fn channel(&self) -> Option<Channel> {
        if MessageCategory::CHANNEL_VOICE.contains(self.kind().category()) {
            Channel::from_index(self.status() & 0x0F).ok()
        } else {
            None
        }
    }

    /// Encodes the message as a 32-bit USB-MIDI Event Packet addressed to the given virtual cable (0-15). Unused
    /// data bytes are zero.
    pub fn to_usb_packet(&self, cable: u8) -> [u8; 4] {
        let mut packet = [0; 4];
        packet[0] = ((cable & 0x0F) << 4) | self.kind().code_index_number();
        packet[1..=self.bytes.len()].copy_from_slice(&self.bytes);
        packet
    }

    /// Interprets the message with [`wmidi`], mostly for the sake of readable logs.
    pub fn to_midi(&self) -> Option<MidiMessage<'_>> {
        MidiMessage::from_bytes(self.as_bytes()).ok()
    }
}
