#![no_std]
#![no_main]
#![deny(
    clippy::mem_forget,
    reason = "mem::forget is generally not safe to do with esp_hal types, especially those \
    holding buffers for the duration of a data transfer."
)]
#![deny(clippy::large_stack_frames)]

use baro_link_core::config::NodeConfig;
use baro_link_core::TelemetryNode;
use bt_hci::controller::ExternalController;
use embassy_executor::Spawner;
use embassy_sync::mutex::Mutex as AsyncMutex;
use embassy_time::{Duration, Timer};
use esp_hal::clock::CpuClock;
use esp_hal::timer::timg::TimerGroup;
use esp_radio::ble::controller::BleConnector;
use log::{error, info};
use static_cell::StaticCell;

use baro_link_firmware::app_state::{
    CLOCK, NodeMutex, SAMPLE_QUEUE, baked_config, create_i2c_bus, init_i2c_hardware,
};
use baro_link_firmware::ble::FrameOutbox;
use baro_link_firmware::sensors::Bmp388Sensor;
use baro_link_firmware::tasks::{
    BleController, ble_task, clock_task, sample_timer_task, sample_worker_task,
};

#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    rtt_target::rprintln!("PANIC: {}", info);
    loop {}
}

extern crate alloc;

// This creates a default app-descriptor required by the esp-idf bootloader.
// For more information see: <https://docs.espressif.com/projects/esp-idf/en/stable/esp32/api-reference/system/app_image_format.html#application-description>
esp_bootloader_esp_idf::esp_app_desc!();

static CONFIG: StaticCell<NodeConfig> = StaticCell::new();
static NODE: StaticCell<NodeMutex> = StaticCell::new();
static RADIO: StaticCell<esp_radio::Controller<'static>> = StaticCell::new();

#[allow(
    clippy::large_stack_frames,
    reason = "it's not unusual to allocate larger buffers etc. in main"
)]
#[esp_rtos::main]
async fn main(spawner: Spawner) -> ! {
    rtt_target::rtt_init_log!();

    let hal_config = esp_hal::Config::default().with_cpu_clock(CpuClock::max());
    let peripherals = esp_hal::init(hal_config);

    esp_alloc::heap_allocator!(#[esp_hal::ram(reclaimed)] size: 73744);

    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_rtos::start(timg0.timer0);

    info!("Embassy initialized!");

    let config: &'static NodeConfig = CONFIG.init(baked_config());
    info!(
        "Node {} (id {}), sampling every {} ms",
        config.device_name,
        config.device_id.get(),
        config.sampling.period_ms
    );

    // Barometer on the shared I2C0 bus
    let i2c0 = create_i2c_bus(peripherals.I2C0, peripherals.GPIO12, peripherals.GPIO11)
        .expect("Failed to configure I2C0");
    let sensor_i2c = init_i2c_hardware(i2c0).await;

    let node: &'static NodeMutex = NODE.init(AsyncMutex::new(TelemetryNode::new(
        &CLOCK,
        config,
        Bmp388Sensor::new(sensor_i2c),
        FrameOutbox,
    )));

    // A broken sensor still leaves the node advertising and syncing time
    if let Err(e) = node.lock().await.start().await {
        error!("Sensor bring-up failed: {}", e);
    }

    let radio = RADIO.init(esp_radio::init().expect("Failed to initialize radio"));
    let connector = BleConnector::new(radio, peripherals.BT, Default::default())
        .expect("Failed to initialize BLE connector");
    let controller: BleController = ExternalController::new(connector);

    spawner.spawn(clock_task(&CLOCK, config.sampling.tick_period()).expect("clock task"));
    spawner.spawn(sample_worker_task(node, &SAMPLE_QUEUE).expect("sample worker task"));
    spawner.spawn(
        sample_timer_task(&SAMPLE_QUEUE, config.sampling.period()).expect("sample timer task"),
    );
    spawner.spawn(ble_task(controller, node, config).expect("BLE task"));

    loop {
        Timer::after(Duration::from_secs(60)).await;
        info!("Uptime clock at {} ms", CLOCK.now_ms());
    }
}
