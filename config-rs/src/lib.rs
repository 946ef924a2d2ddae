//! config-rs/lib.rs
//! Shared configuration utilities for the gateway binaries
//! Provides `.env` loading and standardized bind address resolution

use std::env;
use std::net::{Ipv4Addr, SocketAddr};

/// Load a `.env` file from the working directory or its parents, if any.
///
/// Variables already set in the process environment win.
pub fn load_env() {
    match dotenv::dotenv() {
        Ok(path) => log::debug!("Loaded environment from {}", path.display()),
        Err(e) if e.not_found() => {}
        Err(e) => log::warn!("Ignoring unreadable .env file: {}", e),
    }
}

/// Get service port from environment variables with proper fallback
///
/// # Arguments
/// * `service_name` - The name of the service (e.g., "GATEWAY")
/// * `default_port` - The default port to use if not specified in environment
///
/// # Returns
/// The port number to use for the service
pub fn get_service_port(service_name: &str, default_port: u16) -> u16 {
    let var_name = format!("{}_SERVICE_PORT", service_name.to_uppercase());
    match env::var(&var_name) {
        Ok(value) => value.trim().parse::<u16>().unwrap_or_else(|_| {
            log::warn!("Invalid port in {}, using default {}", var_name, default_port);
            default_port
        }),
        Err(_) => default_port,
    }
}

/// Create a SocketAddr for binding a service
///
/// `<SERVICE>_SERVICE_ADDR` may hold `host:port` or `http://host:port`;
/// otherwise the service binds every interface on `<SERVICE>_SERVICE_PORT`.
pub fn get_bind_address(service_name: &str, default_port: u16) -> SocketAddr {
    let var_name = format!("{}_SERVICE_ADDR", service_name.to_uppercase());

    if let Ok(addr_str) = env::var(&var_name) {
        let trimmed = addr_str
            .trim()
            .trim_start_matches("http://")
            .trim_start_matches("https://")
            .trim_end_matches('/');

        match trimmed.parse::<SocketAddr>() {
            Ok(addr) => return addr,
            Err(_) => log::warn!("Invalid address format in {}, using default", var_name),
        }
    }

    let port = get_service_port(service_name, default_port);
    SocketAddr::from((Ipv4Addr::UNSPECIFIED, port))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_service_port() {
        // Test with environment variable
        std::env::set_var("PORTTEST_SERVICE_PORT", "9000");
        assert_eq!(get_service_port("PORTTEST", 8000), 9000);

        // Test with garbage
        std::env::set_var("PORTTEST_SERVICE_PORT", "ninety");
        assert_eq!(get_service_port("PORTTEST", 8000), 8000);

        // Test with default
        std::env::remove_var("UNKNOWN_SERVICE_PORT");
        assert_eq!(get_service_port("UNKNOWN", 8000), 8000);
    }

    #[test]
    fn test_get_bind_address() {
        // Full address override, with and without scheme
        std::env::set_var("BINDTEST_SERVICE_ADDR", "http://127.0.0.1:9100");
        assert_eq!(get_bind_address("BINDTEST", 8000), "127.0.0.1:9100".parse().unwrap());

        std::env::set_var("BINDTEST_SERVICE_ADDR", "127.0.0.1:9101");
        assert_eq!(get_bind_address("BINDTEST", 8000), "127.0.0.1:9101".parse().unwrap());

        // Default port on all interfaces
        std::env::remove_var("DEFAULTBIND_SERVICE_ADDR");
        std::env::remove_var("DEFAULTBIND_SERVICE_PORT");
        assert_eq!(get_bind_address("DEFAULTBIND", 8000), "0.0.0.0:8000".parse().unwrap());
    }
}
