//! SoftAP bring-up and HTTP server wiring.

use std::sync::{Arc, Mutex};

use esp_idf_svc::{
    eventloop::EspSystemEventLoop,
    hal::modem::Modem as WifiModem,
    http::server::{Configuration, EspHttpServer},
    ipv4::{self, Mask, Subnet},
    netif::{EspNetif, NetifConfiguration, NetifStack},
    wifi::{
        AccessPointConfiguration, AuthMethod, BlockingWifi, Configuration as WifiConfig, EspWifi,
        WifiDriver,
    },
};

use super::handlers;
use crate::modem::{Modem, UartLink};
use crate::status::SharedStatus;

/// Fixed AP addressing. DHCP hands this address out as the DNS server
/// too, so the captive responder sees every client lookup.
pub const AP_IP: ipv4::Ipv4Addr = ipv4::Ipv4Addr::new(192, 168, 4, 1);
const AP_GATEWAY: ipv4::Ipv4Addr = ipv4::Ipv4Addr::new(192, 168, 4, 1);
const AP_NETMASK: Mask = Mask(24);

pub struct GatewayPortal<'a> {
    _wifi: BlockingWifi<EspWifi<'a>>,
    _server: EspHttpServer<'a>,
}

impl<'a> GatewayPortal<'a> {
    pub fn start(
        wifi_modem: WifiModem,
        sysloop: EspSystemEventLoop,
        ssid: &str,
        passphrase: &str,
        status: SharedStatus,
        modem: Arc<Mutex<Modem<UartLink<'static>>>>,
    ) -> anyhow::Result<Self> {
        let wifi = Self::start_ap(wifi_modem, sysloop, ssid, passphrase)?;
        log::info!("SoftAP started: {} ({})", ssid, AP_IP);

        let server = Self::start_http_server(status, modem)?;
        log::info!("HTTP server started on {}:80", AP_IP);

        Ok(Self {
            _wifi: wifi,
            _server: server,
        })
    }

    fn start_ap(
        wifi_modem: WifiModem,
        sysloop: EspSystemEventLoop,
        ssid: &str,
        passphrase: &str,
    ) -> anyhow::Result<BlockingWifi<EspWifi<'a>>> {
        // AP netif with a fixed address; clients get DHCP leases that
        // point DNS at the gateway itself
        let ap_netif_config = NetifConfiguration {
            ip_configuration: Some(ipv4::Configuration::Router(ipv4::RouterConfiguration {
                subnet: Subnet {
                    gateway: AP_GATEWAY,
                    mask: AP_NETMASK,
                },
                dhcp_enabled: true,
                dns: Some(AP_IP),
                secondary_dns: None,
            })),
            ..NetifConfiguration::wifi_default_router()
        };

        let ap_netif = EspNetif::new_with_conf(&ap_netif_config)?;

        let driver = WifiDriver::new(wifi_modem, sysloop.clone(), None)?;

        // STA netif is unused in AP mode but the wrap API wants one
        let sta_netif = EspNetif::new(NetifStack::Sta)?;

        let mut wifi = BlockingWifi::wrap(EspWifi::wrap_all(driver, sta_netif, ap_netif)?, sysloop)?;

        let auth_method = if passphrase.is_empty() {
            AuthMethod::None
        } else {
            AuthMethod::WPA2Personal
        };
        let ap_config = AccessPointConfiguration {
            ssid: ssid
                .try_into()
                .map_err(|_| anyhow::anyhow!("AP SSID too long: {}", ssid))?,
            password: passphrase
                .try_into()
                .map_err(|_| anyhow::anyhow!("AP passphrase too long"))?,
            ssid_hidden: false,
            channel: 1,
            auth_method,
            max_connections: 8,
            ..Default::default()
        };

        wifi.set_configuration(&WifiConfig::AccessPoint(ap_config))?;
        wifi.start()?;

        Ok(wifi)
    }

    fn start_http_server(
        status: SharedStatus,
        modem: Arc<Mutex<Modem<UartLink<'static>>>>,
    ) -> anyhow::Result<EspHttpServer<'a>> {
        let config = Configuration {
            stack_size: 10240,
            max_uri_handlers: 8,
            uri_match_wildcard: true,
            ..Default::default()
        };

        let mut server = EspHttpServer::new(&config)?;

        handlers::register_routes(&mut server, status, modem)?;

        Ok(server)
    }
}

/// AP client count straight from the WiFi driver. Returns 0 when the
/// driver has nothing to report.
pub fn station_count() -> i32 {
    let mut list = esp_idf_svc::sys::wifi_sta_list_t::default();
    let err = unsafe { esp_idf_svc::sys::esp_wifi_ap_get_sta_list(&mut list) };
    if err == esp_idf_svc::sys::ESP_OK {
        list.num
    } else {
        0
    }
}
