//! Carries messages to the host as USB-MIDI Event Packets.

use defmt::{debug, panic};
use embassy_usb::{
    class::midi::{Receiver, Sender},
    driver::{Driver, EndpointError},
};
use serial_midi_bridge_lib::{bridge::Transport, configuration::USB_CABLE_NUMBER, message::Message};
use tinyvec::ArrayVec;

/// Maximum packet size of the MIDI class's bulk endpoints.
pub const MAX_PACKET_SIZE: u16 = 64;

#[doc(hidden)]
#[derive(defmt::Format)]
pub struct Disconnected {}

impl From<EndpointError> for Disconnected {
    fn from(val: EndpointError) -> Self {
        match val {
            EndpointError::BufferOverflow => panic!("Buffer overflow"),
            EndpointError::Disabled => Disconnected {},
        }
    }
}

/// A [`Transport`] writing to the MIDI class's IN endpoint.
///
/// Sent messages are collected into a single endpoint-sized packet, which is written out on [`flush`](Transport::flush)
/// or when it can't hold another message.
pub struct UsbMidiTransport<'d, D: Driver<'d>> {
    sender: Sender<'d, D>,
    packet: ArrayVec<[u8; MAX_PACKET_SIZE as usize]>,
}

impl<'d, D: Driver<'d>> UsbMidiTransport<'d, D> {
    pub fn new(sender: Sender<'d, D>) -> Self {
        Self {
            sender,
            packet: ArrayVec::new(),
        }
    }

    /// Waits until the host has configured the device.
    pub async fn wait_connection(&mut self) {
        self.sender.wait_connection().await;
    }

    /// Forgets messages sent but not yet flushed.
    pub fn clear(&mut self) {
        self.packet.clear();
    }
}

impl<'d, D: Driver<'d>> Transport for UsbMidiTransport<'d, D> {
    type Error = Disconnected;

    async fn send(&mut self, message: Message) -> Result<(), Disconnected> {
        let event = message.to_usb_packet(USB_CABLE_NUMBER);
        if self.packet.len() + event.len() > self.packet.capacity() {
            self.flush().await?;
        }
        self.packet.extend_from_slice(&event);
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), Disconnected> {
        if self.packet.is_empty() {
            return Ok(());
        }
        let result = self.sender.write_packet(&self.packet).await;
        self.packet.clear();
        result?;
        Ok(())
    }
}

/// Reads and discards whatever the host sends; the bridge only ever talks to the host, never the other way round.
pub async fn discard_host_packets<'d, D: Driver<'d>>(
    receiver: &mut Receiver<'d, D>,
) -> Result<(), Disconnected> {
    let mut buf = [0; MAX_PACKET_SIZE as usize];
    loop {
        let n = receiver.read_packet(&mut buf).await?;
        debug!("Ignoring {} bytes from host", n);
    }
}
