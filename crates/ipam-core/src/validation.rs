//! Input validation shared by direct pool creation, the conflict check and
//! the schema planner

use crate::cidr::{self, Prefix};
use crate::config::IpamConfig;
use crate::error::IpamError;

/// Trimmed, non-empty, bounded, free of control characters
pub fn validate_name(name: &str, config: &IpamConfig) -> Result<String, IpamError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(IpamError::Validation("pool name must not be empty".to_string()));
    }
    let length = trimmed.chars().count();
    if length > config.max_name_len {
        return Err(IpamError::Validation(format!(
            "pool name is {} characters, maximum is {}",
            length, config.max_name_len
        )));
    }
    if trimmed.chars().any(char::is_control) {
        return Err(IpamError::Validation(format!(
            "pool name '{}' contains control characters",
            trimmed.escape_default()
        )));
    }
    Ok(trimmed.to_string())
}

/// Parse a pool CIDR and enforce the configured prefix-length bounds
pub fn validate_pool_cidr(text: &str, config: &IpamConfig) -> Result<Prefix, IpamError> {
    let prefix = cidr::parse(text)?;
    let len = prefix.prefix_len();
    if len < config.min_prefix_len || len > config.max_prefix_len {
        return Err(IpamError::Validation(format!(
            "CIDR {} has prefix length /{}, allowed range is /{} to /{}",
            prefix, len, config.min_prefix_len, config.max_prefix_len
        )));
    }
    Ok(prefix)
}

/// Prefix a validation or containment message with the entry it came from
pub(crate) fn for_entry(label: &str, err: IpamError) -> IpamError {
    match err {
        IpamError::Validation(msg) => IpamError::Validation(format!("{}: {}", label, msg)),
        IpamError::Containment(msg) => IpamError::Containment(format!("{}: {}", label, msg)),
        other => other,
    }
}
