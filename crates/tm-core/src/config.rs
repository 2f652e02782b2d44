use anyhow::{anyhow, Context, Result};
use std::env;
use std::net::SocketAddr;
use std::str::FromStr;

pub fn required_env(name: &str) -> Result<String> {
    let value = env::var(name).with_context(|| format!("missing env: {name}"))?;
    if value.trim().is_empty() {
        return Err(anyhow!("empty env: {name}"));
    }
    Ok(value)
}

pub fn env_or(name: &str, default: &str) -> String {
    env::var(name)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

pub fn socket_addr_from_env(name: &str, default: &str) -> Result<SocketAddr> {
    let value = env_or(name, default);
    SocketAddr::from_str(&value).map_err(|err| anyhow!("invalid socket addr for {name}: {err}"))
}

/// Reads a positive integer, falling back to `default` when unset.
/// A value that is set but unparsable is an error rather than a silent default.
pub fn u64_from_env(name: &str, default: u64) -> Result<u64> {
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => {
            let value = raw
                .trim()
                .parse::<u64>()
                .map_err(|err| anyhow!("invalid integer for {name}: {err}"))?;
            if value == 0 {
                return Err(anyhow!("{name} must be greater than zero"));
            }
            Ok(value)
        }
        _ => Ok(default),
    }
}
