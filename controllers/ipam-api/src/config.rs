//! Service configuration
//!
//! Read from environment variables. `IPAM_CONFIG_FILE` may name a YAML file
//! holding the engine settings; `IPAM_*` variables override it.

use crate::error::ServiceError;
use ipam_core::IpamConfig;
use std::net::SocketAddr;

const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8080";

/// Backing store selected by `IPAM_STORE`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreConfig {
    Memory,
    NetBox { url: String, token: String },
}

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub listen_addr: SocketAddr,
    pub store: StoreConfig,
    pub ipam: IpamConfig,
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, ServiceError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ServiceError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let listen_addr = lookup("IPAM_LISTEN_ADDR")
            .unwrap_or_else(|| DEFAULT_LISTEN_ADDR.to_string())
            .parse::<SocketAddr>()
            .map_err(|e| ServiceError::InvalidConfig(format!("IPAM_LISTEN_ADDR: {}", e)))?;

        let store = match lookup("IPAM_STORE").as_deref().map(str::trim) {
            None | Some("") | Some("memory") => StoreConfig::Memory,
            Some("netbox") => {
                let url = required(&lookup, "NETBOX_URL")?;
                let token = required(&lookup, "NETBOX_TOKEN")?;
                StoreConfig::NetBox { url, token }
            }
            Some(other) => {
                return Err(ServiceError::InvalidConfig(format!(
                    "IPAM_STORE must be 'memory' or 'netbox', got '{}'",
                    other
                )))
            }
        };

        let base = match lookup("IPAM_CONFIG_FILE") {
            Some(path) => load_ipam_file(&path)?,
            None => IpamConfig::default(),
        };
        let ipam = base.with_overrides(&lookup)?;

        Ok(Self {
            listen_addr,
            store,
            ipam,
        })
    }
}

fn required<F>(lookup: &F, key: &str) -> Result<String, ServiceError>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| {
            ServiceError::InvalidConfig(format!(
                "{} environment variable is required when IPAM_STORE=netbox",
                key
            ))
        })
}

fn load_ipam_file(path: &str) -> Result<IpamConfig, ServiceError> {
    let content = std::fs::read_to_string(path)?;
    parse_ipam_yaml(&content).map_err(|e| ServiceError::InvalidConfig(format!("{}: {}", path, e)))
}

/// Engine settings from YAML; omitted keys keep their defaults
pub fn parse_ipam_yaml(content: &str) -> Result<IpamConfig, serde_yaml::Error> {
    serde_yaml::from_str(content)
}
