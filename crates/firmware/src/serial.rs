//! Receives the serial MIDI input. Bytes are taken off the USART in its receive interrupt and pushed onto the queue
//! drained by the bridge task.

use core::cell::RefCell;
use defmt::info;
use embassy_stm32::{
    Peri,
    interrupt::{self, InterruptExt, typelevel},
    mode::Blocking,
    pac,
    peripherals::{PD6, USART2},
    usart::{self, DataBits, Parity, StopBits, UartRx},
};
use embassy_sync::blocking_mutex::{Mutex, raw::CriticalSectionRawMutex};
use serial_midi_bridge_lib::{
    configuration::{QUEUE_CAPACITY, SERIAL_BAUD_RATE},
    ring_buffer::Producer,
};

pub type SerialProducer = Producer<'static, u8, QUEUE_CAPACITY>;

/// The producing end of the serial input queue, handed over once at startup by [`start`].
///
/// Only the interrupt handler uses it afterwards; the mutex merely gives it a place to live.
static PRODUCER: Mutex<CriticalSectionRawMutex, RefCell<Option<SerialProducer>>> =
    Mutex::new(RefCell::new(None));

/// USART2 receive interrupt handler, bound in `main`.
pub struct ReceiveHandler;

impl typelevel::Handler<typelevel::USART2> for ReceiveHandler {
    unsafe fn on_interrupt() {
        let regs = pac::USART2;
        let isr = regs.isr().read();

        if isr.ore() || isr.fe() || isr.ne() {
            // a byte was lost or garbled; the parser will resynchronize on the next status byte
            regs.icr().write(|w| {
                w.set_ore(true);
                w.set_fe(true);
                w.set_ne(true);
            });
        }

        if isr.rxne() {
            let byte = regs.rdr().read().dr() as u8;
            PRODUCER.lock(|producer| {
                if let Some(producer) = producer.borrow_mut().as_mut() {
                    producer.enqueue(byte);
                }
            });
        }
    }
}

/// Configures USART2 for MIDI (31250 baud, 8N1), registers the queue's producer and enables the receive interrupt.
///
/// The returned receiver must be kept alive, as dropping it disables the peripheral.
pub fn start(
    usart: Peri<'static, USART2>,
    rx: Peri<'static, PD6>,
    producer: SerialProducer,
) -> Result<UartRx<'static, Blocking>, usart::ConfigError> {
    let mut config = usart::Config::default();
    config.baudrate = SERIAL_BAUD_RATE;
    config.data_bits = DataBits::DataBits8;
    config.parity = Parity::ParityNone;
    config.stop_bits = StopBits::STOP1;

    let uart = UartRx::new_blocking(usart, rx, config)?;

    PRODUCER.lock(|cell| cell.replace(Some(producer)));

    pac::USART2.cr1().modify(|w| w.set_rxneie(true));
    interrupt::USART2.unpend();
    // SAFETY: the handler only touches the USART2 registers and the producer registered above.
    unsafe { interrupt::USART2.enable() };

    info!("Listening for MIDI on USART2 at {} baud", SERIAL_BAUD_RATE);
    Ok(uart)
}
