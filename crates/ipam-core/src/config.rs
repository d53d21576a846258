//! Engine configuration
//!
//! Bounds for pool CIDRs and names, plus search pagination defaults. Values
//! come from defaults, an optional deserialized file and `IPAM_*`
//! environment variables, in that order of precedence (last wins).

use crate::cidr::MAX_PREFIX_LEN;
use crate::error::IpamError;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IpamConfig {
    /// Shortest prefix length accepted for a pool (observed: /8)
    pub min_prefix_len: u8,
    /// Longest prefix length accepted for a pool (observed: /30)
    pub max_prefix_len: u8,
    pub max_name_len: usize,
    pub default_page_size: usize,
    pub max_page_size: usize,
}

impl Default for IpamConfig {
    fn default() -> Self {
        Self {
            min_prefix_len: 8,
            max_prefix_len: 30,
            max_name_len: 128,
            default_page_size: 20,
            max_page_size: 100,
        }
    }
}

impl IpamConfig {
    /// Defaults overridden by `IPAM_*` environment variables
    pub fn from_env() -> Result<Self, IpamError> {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply `IPAM_*` overrides from an arbitrary lookup (the environment in production)
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self, IpamError>
    where
        F: Fn(&str) -> Option<String>,
    {
        override_from(&lookup, "IPAM_MIN_PREFIX_LEN", &mut self.min_prefix_len)?;
        override_from(&lookup, "IPAM_MAX_PREFIX_LEN", &mut self.max_prefix_len)?;
        override_from(&lookup, "IPAM_MAX_NAME_LEN", &mut self.max_name_len)?;
        override_from(&lookup, "IPAM_DEFAULT_PAGE_SIZE", &mut self.default_page_size)?;
        override_from(&lookup, "IPAM_MAX_PAGE_SIZE", &mut self.max_page_size)?;
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), IpamError> {
        if self.max_prefix_len > MAX_PREFIX_LEN {
            return Err(IpamError::Validation(format!(
                "max_prefix_len /{} exceeds /{}",
                self.max_prefix_len, MAX_PREFIX_LEN
            )));
        }
        if self.min_prefix_len > self.max_prefix_len {
            return Err(IpamError::Validation(format!(
                "min_prefix_len /{} is greater than max_prefix_len /{}",
                self.min_prefix_len, self.max_prefix_len
            )));
        }
        if self.max_name_len == 0 {
            return Err(IpamError::Validation("max_name_len must be positive".to_string()));
        }
        if self.default_page_size == 0 || self.max_page_size == 0 {
            return Err(IpamError::Validation("page sizes must be positive".to_string()));
        }
        if self.default_page_size > self.max_page_size {
            return Err(IpamError::Validation(format!(
                "default_page_size {} is greater than max_page_size {}",
                self.default_page_size, self.max_page_size
            )));
        }
        Ok(())
    }
}

fn override_from<F, T>(lookup: &F, key: &str, target: &mut T) -> Result<(), IpamError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: Display,
{
    if let Some(raw) = lookup(key) {
        *target = raw.trim().parse().map_err(|e| {
            IpamError::Validation(format!("{} has invalid value '{}': {}", key, raw, e))
        })?;
    }
    Ok(())
}
