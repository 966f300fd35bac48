use crate::interface_adapters::clients::WsTransportConfig;
pub use crate::interface_adapters::net::client::JOIN_HANDSHAKE_TIMEOUT;
use std::{env, net::IpAddr, time::Duration};

// Runtime/server settings (not gameplay tuning).

pub fn host() -> IpAddr {
    env::var("KFC_HOST")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(IpAddr::from([127, 0, 0, 1]))
}

pub fn http_port() -> u16 {
    env::var("KFC_PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(8765)
}

/// Ticks per second; 0 means the ticker only yields between ticks.
pub fn tick_hz() -> u32 {
    env::var("KFC_TICK_HZ")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(60)
}

pub fn tick_interval() -> Duration {
    match tick_hz() {
        0 => Duration::ZERO,
        hz => Duration::from_secs(1) / hz,
    }
}

/// Whether accepted commands are acknowledged with a `command_result`.
pub fn acks_enabled() -> bool {
    env::var("KFC_ACKS")
        .ok()
        .and_then(|v| parse_flag(&v))
        .unwrap_or(true)
}

pub fn ping_interval() -> Duration {
    millis_var("KFC_PING_INTERVAL_MS", 10_000)
}

pub fn ping_timeout() -> Duration {
    millis_var("KFC_PING_TIMEOUT_MS", 5_000)
}

/// Client transport settings for `url` with env-provided heartbeat timings.
pub fn transport_config(url: impl Into<String>) -> WsTransportConfig {
    WsTransportConfig {
        ping_interval: ping_interval(),
        ping_timeout: ping_timeout(),
        ..WsTransportConfig::new(url)
    }
}

fn millis_var(key: &str, default: u64) -> Duration {
    let millis = env::var(key)
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .unwrap_or(default);
    Duration::from_millis(millis)
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

pub const COMMAND_CHANNEL_CAPACITY: usize = 1024;
pub const EVENT_FEED_CAPACITY: usize = 1024;
pub const BROADCAST_CAPACITY: usize = 256;
