//! Serial AT link: one command out, accumulated raw response back.

use std::time::{Duration, Instant};

use esp_idf_svc::hal::delay::NON_BLOCK;
use esp_idf_svc::hal::gpio::{self, InputPin, OutputPin};
use esp_idf_svc::hal::peripheral::Peripheral;
use esp_idf_svc::hal::uart::{self, UartDriver};

use super::parse;

/// Seam between the bring-up state machine and the serial hardware.
///
/// `send` returns whatever text accumulated before a terminator or the
/// deadline. A timeout yields a partial (possibly empty) response, never
/// an error; retry policy belongs to the caller.
pub trait AtLink {
    fn send(&mut self, cmd: &str, timeout: Duration) -> String;
}

/// Per-read wait while accumulating a response, in UART driver ticks.
const READ_SLICE: u32 = 20;

pub struct UartLink<'d> {
    uart: UartDriver<'d>,
}

impl<'d> UartLink<'d> {
    pub fn new(
        uart: impl Peripheral<P = impl uart::Uart> + 'd,
        tx: impl Peripheral<P = impl OutputPin> + 'd,
        rx: impl Peripheral<P = impl InputPin> + 'd,
        config: &uart::config::Config,
    ) -> anyhow::Result<Self> {
        let uart = UartDriver::new(
            uart,
            tx,
            rx,
            Option::<gpio::Gpio0>::None,
            Option::<gpio::Gpio1>::None,
            config,
        )?;
        Ok(Self { uart })
    }

    /// Discards unread RX bytes so a stale byte sequence cannot
    /// contaminate the next response.
    fn drain(&mut self) {
        let mut buf = [0u8; 64];
        while matches!(self.uart.read(&mut buf, NON_BLOCK), Ok(n) if n > 0) {}
    }
}

impl AtLink for UartLink<'_> {
    fn send(&mut self, cmd: &str, timeout: Duration) -> String {
        self.drain();

        log::info!("AT >> {}", cmd);
        if let Err(e) = self
            .uart
            .write(cmd.as_bytes())
            .and_then(|_| self.uart.write(b"\r\n"))
        {
            log::warn!("uart write failed: {:?}", e);
            return String::new();
        }

        let deadline = Instant::now() + timeout;
        let mut response = String::new();
        let mut buf = [0u8; 128];
        loop {
            match self.uart.read(&mut buf, READ_SLICE) {
                Ok(n) if n > 0 => {
                    response.push_str(&String::from_utf8_lossy(&buf[..n]));
                    if parse::response_complete(&response) {
                        break;
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    log::warn!("uart read failed: {:?}", e);
                    std::thread::sleep(Duration::from_millis(10));
                }
            }
            if Instant::now() >= deadline {
                log::warn!("AT timeout after {:?}: {}", timeout, cmd);
                break;
            }
        }

        log::info!("AT << {}", response.trim());
        response
    }
}
