//! [Embassy](https://embassy.dev)-based firmware for a serial-to-USB MIDI bridge. MIDI received on a 5-pin DIN input
//! is forwarded to a computer over USB, which sees the device as an ordinary USB-MIDI interface. The board's user
//! button doubles as a one-key keyboard. The firmware runs on the [Nucleo-F767ZI development
//! board](https://www.st.com/en/evaluation-tools/nucleo-f767zi.html), which is powered by an F7-series STM32
//! microcontroller.
//!
//! Bytes arrive in the USART receive interrupt, which pushes them onto a lock-free queue. A single task drains the
//! queue through the MIDI parser, samples the button and hands the results to the USB transport, once per tick.
//!
//! For the data path itself, see `serial_midi_bridge_lib`.

#![no_std]
#![no_main]

mod serial;
mod transport;

use crate::transport::{MAX_PACKET_SIZE, UsbMidiTransport};
use defmt::*;
use embassy_executor::Spawner;
use embassy_stm32::{
    Config, bind_interrupts,
    gpio::{Input, Pull},
    mode::Blocking,
    peripherals,
    time::Hertz,
    usart::UartRx,
    usb,
};
use embassy_time::{Duration, Ticker};
use embassy_usb::{
    Builder, UsbDevice,
    class::midi::{MidiClass, Receiver},
};
use serial_midi_bridge_lib::{
    bridge::Bridge,
    configuration::{QUEUE_CAPACITY, TICK_PERIOD_MICROS},
    ring_buffer::RingBuffer,
};
use static_cell::StaticCell;

use {defmt_rtt as _, panic_probe as _};

bind_interrupts!(
    #[doc(hidden)]
    struct Irqs {
        OTG_FS => usb::InterruptHandler<peripherals::USB_OTG_FS>;
        USART2 => serial::ReceiveHandler;
    }
);

type UsbDriver = usb::Driver<'static, peripherals::USB_OTG_FS>;

/// Bytes received over serial, waiting to be parsed. Lives for as long as the device is powered.
static SERIAL_QUEUE: StaticCell<RingBuffer<u8, QUEUE_CAPACITY>> = StaticCell::new();

/// Keeps the USART configured; it is never read from directly, as the interrupt handler reads its registers.
static SERIAL_RX: StaticCell<UartRx<'static, Blocking>> = StaticCell::new();

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("Initializing serial MIDI bridge");

    let mut config = Config::default();
    {
        use embassy_stm32::rcc::*;
        // hse: high-speed external clock
        config.rcc.hse = Some(Hse {
            freq: Hertz(8_000_000),
            mode: HseMode::Bypass,
        });

        // pll: phase-locked loop, crucial for dividing clock
        config.rcc.pll_src = PllSource::HSE;
        config.rcc.pll = Some(Pll {
            prediv: PllPreDiv::DIV4,
            mul: PllMul::MUL216,
            divp: Some(PllPDiv::DIV2), // 8mhz / 4 * 216 / 2 = 216Mhz
            // per section 5.2 of RM0410: most peripheral clocks are derived from their bus clock, but the 48MHz clock used for USB OTG FS
            // is derived from main PLL VCO (PLLQ clock) or PLLSAI VCO (PLLSAI clock)
            divq: Some(PllQDiv::DIV9), // 8mhz / 4 * 216 / 9 = 48Mhz
            divr: None,
        });
        config.rcc.ahb_pre = AHBPrescaler::DIV1;
        config.rcc.apb1_pre = APBPrescaler::DIV4;
        config.rcc.apb2_pre = APBPrescaler::DIV2;
        config.rcc.sys = Sysclk::PLL1_P;
        config.rcc.mux.clk48sel = mux::Clk48sel::PLL1_Q;
    }
    let p = embassy_stm32::init(config);

    let (producer, consumer) = SERIAL_QUEUE.init(RingBuffer::new()).split();
    let bridge = Bridge::new(consumer);

    // MIDI IN is wired to PD6 (USART2 RX, pin 4 of CN9 on the Nucleo-144 board) through the usual optocoupler
    let serial_rx = unwrap!(serial::start(p.USART2, p.PD6, producer));
    SERIAL_RX.init(serial_rx);

    // the blue user button (B1) reads high while pressed
    let button = Input::new(p.PC13, Pull::None);

    // Create the driver, from the HAL.
    static ENDPOINT_OUT_BUFFER: StaticCell<[u8; 256]> = StaticCell::new();
    let mut config = embassy_stm32::usb::Config::default();

    // USB devices which are self-powered (i.e., that can stay powered on if unplugged from the host)
    // need to enable vbus_detection to comply with the USB spec. Per section 6.10 of the Nucleo board
    // manual (UM1974), CN13 (the USB port) cannot power the board; external power is necessary.
    // See docs on `vbus_detection` for details.
    config.vbus_detection = true;

    let driver = usb::Driver::new_fs(
        p.USB_OTG_FS,
        Irqs,
        p.PA12,
        p.PA11,
        ENDPOINT_OUT_BUFFER.init([0; 256]),
        config,
    );

    // per https://pid.codes, FOSS projects can apply to be listed under the vendor ID owned by InterBiometrics;
    // 0x0001 is the product ID reserved there for testing
    let vendor_id = 0x1209;
    let product_id = 0x0001;

    let mut config = embassy_usb::Config::new(vendor_id, product_id);
    config.manufacturer = Some("Pawpaw Works");
    config.product = Some("Serial MIDI Bridge");
    config.self_powered = true;
    config.max_power = 0;

    // Create embassy-usb DeviceBuilder using the driver and config.
    // It needs some buffers for building the descriptors.
    static CONFIG_DESCRIPTOR: StaticCell<[u8; 256]> = StaticCell::new();
    static BOS_DESCRIPTOR: StaticCell<[u8; 256]> = StaticCell::new();
    static CONTROL_BUFFER: StaticCell<[u8; 64]> = StaticCell::new();

    let mut builder = Builder::new(
        driver,
        config,
        CONFIG_DESCRIPTOR.init([0; 256]),
        BOS_DESCRIPTOR.init([0; 256]),
        &mut [], // no msos descriptors
        CONTROL_BUFFER.init([0; 64]),
    );

    // one MIDI IN jack (towards the host) and one MIDI OUT jack, whose input is ignored
    let class = MidiClass::new(&mut builder, 1, 1, MAX_PACKET_SIZE);
    let (sender, receiver) = class.split();

    let usb = builder.build();

    unwrap!(spawner.spawn(usb_task(usb)));
    unwrap!(spawner.spawn(host_input_task(receiver)));
    unwrap!(spawner.spawn(bridge_task(
        bridge,
        button,
        UsbMidiTransport::new(sender)
    )));
}

#[embassy_executor::task]
async fn usb_task(mut usb: UsbDevice<'static, UsbDriver>) -> ! {
    usb.run().await
}

/// Runs the bridge loop once per tick while the host is connected.
///
/// The loop never blocks on anything but the transport; the USB stack's own housekeeping happens in [`usb_task`]
/// while this task waits for the next tick. When the host goes away, whatever arrived in the meantime is dropped
/// rather than replayed on reconnection.
#[embassy_executor::task]
async fn bridge_task(
    mut bridge: Bridge<'static, QUEUE_CAPACITY>,
    button: Input<'static>,
    mut transport: UsbMidiTransport<'static, UsbDriver>,
) -> ! {
    let mut ticker = Ticker::every(Duration::from_micros(TICK_PERIOD_MICROS));
    loop {
        transport.wait_connection().await;
        info!("USB connected");
        bridge.discard_pending();
        ticker.reset();

        while bridge.poll(&mut transport, button.is_high()).await.is_ok() {
            ticker.next().await;
        }

        transport.clear();
        info!("USB disconnected");
    }
}

/// Keeps the OUT endpoint drained so the host never stalls writing to it.
#[embassy_executor::task]
async fn host_input_task(mut receiver: Receiver<'static, UsbDriver>) -> ! {
    loop {
        receiver.wait_connection().await;
        let _ = transport::discard_host_packets(&mut receiver).await;
    }
}
