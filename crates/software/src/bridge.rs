//! Glue between the serial input queue, the pushbutton and the transport carrying messages to the host.

use crate::{
    configuration::{ACCEPTED_CATEGORIES, BUTTON_NOTE, ButtonNote, DEBOUNCE_PATTERN},
    debounce::Debouncer,
    message::Message,
    parser::MidiStreamParser,
    ring_buffer::Consumer,
};
use wmidi::MidiMessage;

/// Destination for finished [`Message`]s.
///
/// Implementations decide how messages are batched; [`flush`](Self::flush) forces delivery of anything sent so
/// far. The bridge neither retries nor buffers on behalf of a failing transport: errors are handed straight back
/// to its caller.
#[allow(async_fn_in_trait)]
pub trait Transport {
    /// Error returned when a message can't be sent or flushed.
    type Error;

    /// Queues a message for delivery.
    async fn send(&mut self, message: Message) -> Result<(), Self::Error>;

    /// Delivers any queued messages immediately.
    async fn flush(&mut self) -> Result<(), Self::Error>;
}

/// Owns everything the bridge loop works with other than the transport: the consuming end of the serial input
/// queue, the parser assembling messages from it and the pushbutton's debouncer.
pub struct Bridge<'a, const N: usize> {
    input: Consumer<'a, u8, N>,
    parser: MidiStreamParser,
    button: Debouncer,
    button_note: ButtonNote,
}

impl<'a, const N: usize> Bridge<'a, N> {
    /// Constructs a [`Bridge`] reading from `input`, configured per the [`configuration`](crate::configuration)
    /// constants.
    pub fn new(input: Consumer<'a, u8, N>) -> Self {
        Self::with_parts(
            input,
            MidiStreamParser::new(ACCEPTED_CATEGORIES),
            Debouncer::new(DEBOUNCE_PATTERN),
            BUTTON_NOTE,
        )
    }

    /// Constructs a [`Bridge`] from explicitly configured parts.
    pub fn with_parts(
        input: Consumer<'a, u8, N>,
        parser: MidiStreamParser,
        button: Debouncer,
        button_note: ButtonNote,
    ) -> Self {
        Self {
            input,
            parser,
            button,
            button_note,
        }
    }

    /// Performs one iteration of the bridge loop:
    ///
    /// 1. Every byte queued when the call begins is run through the parser; each completed message is sent and
    ///    flushed right away, as MIDI is sensitive to latency.
    /// 2. The pushbutton is sampled once. A press sends [`ButtonNote::note_on`], a release [`ButtonNote::note_off`].
    ///
    /// Bytes arriving while the queue is drained are left for the next iteration. If the transport fails, the error
    /// is returned immediately and the remaining work is skipped; bytes not yet consumed stay queued.
    pub async fn poll<T: Transport>(
        &mut self,
        transport: &mut T,
        button_pressed: bool,
    ) -> Result<(), T::Error> {
        let pending = self.input.size();
        for _ in 0..pending {
            let Some(byte) = self.input.pop() else {
                break;
            };
            if let Some(message) = self.parser.parse(byte) {
                log_forwarded(&message);
                forward(transport, message).await?;
            }
        }

        self.button.sample(button_pressed);
        if self.button.take_pressed() {
            info!("Button pressed");
            forward(transport, self.button_note.note_on()).await?;
        }
        if self.button.take_released() {
            info!("Button released");
            forward(transport, self.button_note.note_off()).await?;
        }

        Ok(())
    }

    /// Drops every queued byte and abandons any partially assembled message, e.g. so input received while the host
    /// was disconnected isn't replayed on reconnection. Returns the number of bytes dropped.
    pub fn discard_pending(&mut self) -> usize {
        let dropped = self.input.drain().count();
        self.parser.reset();
        if dropped > 0 {
            warn!("Discarded {} pending bytes", dropped);
        }
        dropped
    }
}

fn log_forwarded(message: &Message) {
    match message.to_midi() {
        Some(MidiMessage::NoteOn(channel, note, velocity)) => debug!(
            "Forwarding NoteOn: channel {}, note {}, velocity: {}",
            channel.number(),
            note.to_str(),
            u8::from(velocity)
        ),
        Some(MidiMessage::NoteOff(channel, note, velocity)) => debug!(
            "Forwarding NoteOff: channel {}, note {}, velocity: {}",
            channel.number(),
            note.to_str(),
            u8::from(velocity)
        ),
        _ => debug!("Forwarding {}", message),
    }
}

async fn forward<T: Transport>(transport: &mut T, message: Message) -> Result<(), T::Error> {
    transport.send(message).await?;
    transport.flush().await
}
