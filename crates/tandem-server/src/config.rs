//! Runtime configuration.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use crate::{driver::DriverConfig, error::ServerError};

/// Default listening port.
pub const DEFAULT_PORT: u16 = 8888;

/// Deployment mode. Selects the default bind address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum RuntimeMode {
    /// Loopback only
    #[default]
    Development,
    /// All interfaces
    Production,
}

impl RuntimeMode {
    /// Address to bind to when none is given explicitly.
    pub fn default_bind_ip(self) -> IpAddr {
        match self {
            Self::Development => IpAddr::V4(Ipv4Addr::LOCALHOST),
            Self::Production => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        }
    }
}

/// Server configuration for the production runtime.
#[derive(Debug, Clone)]
pub struct ServerRuntimeConfig {
    /// Address to bind to
    pub bind_address: SocketAddr,
    /// Driver configuration (limits)
    pub driver: DriverConfig,
}

impl ServerRuntimeConfig {
    /// Configuration for a mode and port with default driver limits.
    pub fn for_mode(mode: RuntimeMode, port: u16) -> Self {
        Self {
            bind_address: SocketAddr::new(mode.default_bind_ip(), port),
            driver: DriverConfig::default(),
        }
    }

    /// Reject settings the runtime cannot serve with.
    pub fn validate(&self) -> Result<(), ServerError> {
        if self.driver.max_connections == 0 {
            return Err(ServerError::Config("max_connections must be at least 1".to_string()));
        }
        Ok(())
    }
}

impl Default for ServerRuntimeConfig {
    fn default() -> Self {
        Self::for_mode(RuntimeMode::default(), DEFAULT_PORT)
    }
}
