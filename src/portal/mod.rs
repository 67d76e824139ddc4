//! WiFi access point and the HTTP status/control surface.

mod handlers;
mod html;
mod server;

pub use server::{station_count, GatewayPortal, AP_IP};
