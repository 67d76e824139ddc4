use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::hal::gpio::PinDriver;
use esp_idf_svc::hal::prelude::*;
use esp_idf_svc::hal::uart;

mod config;
mod dns;
mod led;
mod modem;
mod portal;
mod status;
mod supervisor;

use crate::config::{ApConfig, CellularConfig};
use crate::dns::CaptiveDns;
use crate::led::StatusLed;
use crate::modem::{Modem, UartLink};
use crate::portal::GatewayPortal;
use crate::status::{LedState, Status};
use crate::supervisor::{derive_led_state, Supervisor};

/// NVS key for the persisted cumulative usage counter.
const DATA_USED_KEY: &str = "data_used";

const MODEM_BAUD: u32 = 115_200;

fn main() -> anyhow::Result<()> {
    esp_idf_svc::sys::link_patches();
    esp_idf_svc::log::EspLogger::initialize_default();

    log::info!("cellgate starting");

    let peripherals = Peripherals::take()?;
    let sysloop = EspSystemEventLoop::take()?;
    let partition = esp_idf_svc::nvs::EspDefaultNvsPartition::take()?;
    let nvs = esp_idf_svc::nvs::EspDefaultNvs::new(partition, "gateway", true)?;

    let cellular = CellularConfig::load(&nvs);
    let ap = ApConfig::load(&nvs);
    log::info!("APN: {:?}", cellular.apn);
    log::info!("AP SSID: {:?}", ap.ssid);

    let status = Arc::new(Mutex::new(Status::default()));
    {
        let mut status = status.lock().unwrap();
        status.data_used = nvs.get_u64(DATA_USED_KEY).ok().flatten().unwrap_or(0);
        log::info!("restored data_used: {} bytes", status.data_used);
    }

    let mut led = StatusLed::new(
        peripherals.pins.gpio12,
        peripherals.pins.gpio13,
        peripherals.pins.gpio14,
    )?;
    led.tick(LedState::Startup);

    let uart_config = uart::config::Config::new().baudrate(Hertz(MODEM_BAUD));
    let link = UartLink::new(
        peripherals.uart1,
        peripherals.pins.gpio17,
        peripherals.pins.gpio18,
        &uart_config,
    )?;

    let mut power_key = PinDriver::output(peripherals.pins.gpio4)?;

    let modem = Arc::new(Mutex::new(Modem::new(link, cellular)));

    // Bring-up is the one deliberately blocking stretch: nothing is being
    // served yet, so stalling here (up to the 30 s activation call) is
    // harmless. On failure we keep going and serve the status page with
    // last_error filled in; recovery is an external /restart.
    {
        let mut modem = modem.lock().unwrap();
        let mut st = status.lock().unwrap();
        st.led = LedState::Connecting;

        modem.power_on(|on| {
            let _ = if on {
                power_key.set_high()
            } else {
                power_key.set_low()
            };
        });

        if let Err(e) = modem.connect(&mut st) {
            log::error!("bring-up failed, serving status page anyway: {}", e);
        }
        st.led = derive_led_state(modem.phase(), 0);
    }

    let _portal = GatewayPortal::start(
        peripherals.modem,
        sysloop,
        &ap.ssid,
        &ap.passphrase,
        status.clone(),
        modem.clone(),
    )?;
    status.lock().unwrap().wifi_ap_active = true;

    let mut dns = CaptiveDns::new(portal::AP_IP)?;

    let started = Instant::now();
    let mut supervisor = Supervisor::default();
    let mut next_tick = Instant::now() + supervisor::TICK_INTERVAL;

    log::info!("entering main loop");
    loop {
        dns.service();

        if Instant::now() >= next_tick {
            next_tick += supervisor::TICK_INTERVAL;

            let clients = portal::station_count();
            let persist_due = {
                let mut modem = modem.lock().unwrap();
                let mut st = status.lock().unwrap();
                supervisor.tick(&mut modem, &mut st, clients)
            };

            if persist_due {
                let data_used = {
                    let mut st = status.lock().unwrap();
                    st.uptime = started.elapsed().as_secs();
                    st.data_used
                };
                if let Err(e) = nvs.set_u64(DATA_USED_KEY, data_used) {
                    log::warn!("failed to persist data_used: {:?}", e);
                }
            }
        }

        let led_state = status.lock().unwrap().led;
        led.tick(led_state);

        std::thread::sleep(Duration::from_millis(50));
    }
}
