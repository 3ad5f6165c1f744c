#![no_std]
#![no_main]

use core::future::pending;

use defmt::{error, info};
use defmt_rtt as _;
use embassy_embedded_hal::shared_bus::asynch::spi::SpiDevice;
use embassy_executor::Spawner;
use embassy_rp::bind_interrupts;
use embassy_rp::gpio::{Level, Output};
use embassy_rp::peripherals::{SPI0, USB};
use embassy_rp::spi::{Async, Config as SpiConfig, Spi};
use embassy_rp::usb::Driver;
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embassy_sync::mutex::Mutex;
use embassy_time::Delay;
use embassy_usb::class::hid::State;
use embassy_usb::{Builder, Config as UsbConfig};
use sixdof_to_gamepad::{
    configure_usb_hid, Bridge, DefmtDiagnostics, GamepadRequestHandler, Max3421e,
    SpaceMouseDriver, UsbHidOutput, UsbStateHandler,
};
use static_cell::StaticCell;

#[cfg(feature = "dev-panic")]
use panic_probe as _;
#[cfg(feature = "prod-panic")]
use panic_reset as _;

bind_interrupts!(struct Irqs {
    USBCTRL_IRQ => embassy_rp::usb::InterruptHandler<USB>;
});

/// MAX3421E SPI clock (the chip accepts up to 26 MHz).
const SPI_FREQUENCY: u32 = 12_000_000;

type HostSpi = Spi<'static, SPI0, Async>;

/// SPI bus shared with the MAX3421E chip select.
static SPI_BUS: StaticCell<Mutex<NoopRawMutex, HostSpi>> = StaticCell::new();

/// USB device configuration buffer.
static CONFIG_DESCRIPTOR: StaticCell<[u8; 256]> = StaticCell::new();
static BOS_DESCRIPTOR: StaticCell<[u8; 256]> = StaticCell::new();
static MSOS_DESCRIPTOR: StaticCell<[u8; 256]> = StaticCell::new();
static CONTROL_BUF: StaticCell<[u8; 64]> = StaticCell::new();

/// HID state and class request handling.
static HID_STATE: StaticCell<State> = StaticCell::new();
static REQUEST_HANDLER: StaticCell<GamepadRequestHandler> = StaticCell::new();
static USB_STATE_HANDLER: StaticCell<UsbStateHandler> = StaticCell::new();

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("SpaceMouse-to-Gamepad starting...");

    let p = embassy_rp::init(embassy_rp::config::Config::default());

    // --- USB host (MAX3421E on SPI0) ---
    let mut spi_config = SpiConfig::default();
    spi_config.frequency = SPI_FREQUENCY;
    let spi = Spi::new(
        p.SPI0,
        p.PIN_18, // SCK
        p.PIN_19, // MOSI
        p.PIN_16, // MISO
        p.DMA_CH0,
        p.DMA_CH1,
        spi_config,
    );
    let spi_bus = SPI_BUS.init(Mutex::new(spi));
    let cs = Output::new(p.PIN_17, Level::High);
    let mut host = Max3421e::new(SpiDevice::new(spi_bus, cs));

    // --- USB device (gamepad) ---
    let usb_driver = Driver::new(p.USB, Irqs);

    let mut usb_config = UsbConfig::new(0x1209, 0x0001); // pid.codes test VID/PID
    usb_config.manufacturer = Some("Rust Gamepad");
    usb_config.product = Some("SpaceMouse-to-Gamepad Bridge");
    usb_config.serial_number = Some("001");
    usb_config.max_power = 100;
    usb_config.max_packet_size_0 = 64;

    let config_descriptor = CONFIG_DESCRIPTOR.init([0; 256]);
    let bos_descriptor = BOS_DESCRIPTOR.init([0; 256]);
    let msos_descriptor = MSOS_DESCRIPTOR.init([0; 256]);
    let control_buf = CONTROL_BUF.init([0; 64]);

    let mut builder = Builder::new(
        usb_driver,
        usb_config,
        config_descriptor,
        bos_descriptor,
        msos_descriptor,
        control_buf,
    );
    builder.handler(USB_STATE_HANDLER.init(UsbStateHandler));

    // Configure HID class
    let hid_state = HID_STATE.init(State::new());
    let request_handler = REQUEST_HANDLER.init(GamepadRequestHandler::new());
    let hid_writer = configure_usb_hid(&mut builder, hid_state, request_handler);

    // Build the USB device
    let usb_device = builder.build();
    spawner.spawn(usb_task(usb_device).unwrap());

    if let Err(e) = host.init().await {
        // Without the host controller there is nothing to forward; the
        // gamepad stays enumerated and centered.
        error!("USB host controller did not start: {:?}", e);
        pending::<()>().await;
    }

    let mut bridge = Bridge::with_diagnostics(
        host,
        Delay,
        SpaceMouseDriver::with_diagnostics(DefmtDiagnostics),
        UsbHidOutput::new(hid_writer),
        DefmtDiagnostics,
    );

    info!("SpaceMouse-to-Gamepad initialized, waiting for controller...");
    bridge.run().await
}

/// USB device task - runs the USB stack.
#[embassy_executor::task]
async fn usb_task(mut device: embassy_usb::UsbDevice<'static, Driver<'static, USB>>) {
    device.run().await;
}
