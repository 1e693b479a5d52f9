//! Runtime configuration read from the environment.
//!
//! | variable               | default        |
//! |------------------------|----------------|
//! | `REALTY_BIND_ADDR`     | `0.0.0.0:8080` |
//! | `REALTY_TAX_ROUNDING`  | `per_line`     |
//! | `REALTY_COMMISSION_BP` | `600`          |
//! | `REALTY_ADMIN_FEE`     | `10000`        |

use std::net::SocketAddr;

use realty_estate_account::BillingPolicy;
use realty_invoicing::RoundingMethod;

pub const BIND_ADDR_ENV: &str = "REALTY_BIND_ADDR";
pub const TAX_ROUNDING_ENV: &str = "REALTY_TAX_ROUNDING";
pub const COMMISSION_BP_ENV: &str = "REALTY_COMMISSION_BP";
pub const ADMIN_FEE_ENV: &str = "REALTY_ADMIN_FEE";

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{key}={value:?} is invalid: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    pub bind_addr: SocketAddr,
    pub rounding: RoundingMethod,
    pub billing: BillingPolicy,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            rounding: RoundingMethod::default(),
            billing: BillingPolicy::default(),
        }
    }
}

impl ApiConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = BillingPolicy::default();

        let bind_addr = parse(&lookup, BIND_ADDR_ENV, DEFAULT_BIND_ADDR.parse().ok(), |v| {
            v.parse::<SocketAddr>().map_err(|e| e.to_string())
        })?;
        let rounding = parse(&lookup, TAX_ROUNDING_ENV, Some(RoundingMethod::default()), |v| {
            v.parse::<RoundingMethod>().map_err(|e| e.to_string())
        })?;
        let commission_bp = parse(&lookup, COMMISSION_BP_ENV, Some(defaults.commission_bp), |v| {
            v.parse::<u32>().map_err(|e| e.to_string())
        })?;
        let administrative_fee =
            parse(&lookup, ADMIN_FEE_ENV, Some(defaults.administrative_fee), |v| {
                v.parse::<u64>().map_err(|e| e.to_string())
            })?;

        Ok(Self {
            bind_addr,
            rounding,
            billing: BillingPolicy {
                commission_bp,
                administrative_fee,
            },
        })
    }
}

fn parse<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: Option<T>,
    parse_value: impl Fn(&str) -> Result<T, String>,
) -> Result<T, ConfigError> {
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => {
            parse_value(raw.trim()).map_err(|reason| ConfigError::Invalid {
                key,
                value: raw,
                reason,
            })
        }
        _ => default.ok_or_else(|| ConfigError::Invalid {
            key,
            value: String::new(),
            reason: "no default".to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let config = ApiConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, ApiConfig::default());
        assert_eq!(config.billing.commission_bp, 600);
        assert_eq!(config.billing.administrative_fee, 10_000);
        assert_eq!(config.rounding, RoundingMethod::PerLine);
    }

    #[test]
    fn values_are_read_from_the_source() {
        let config = ApiConfig::from_lookup(lookup(&[
            (BIND_ADDR_ENV, "127.0.0.1:9000"),
            (TAX_ROUNDING_ENV, "round_globally"),
            (COMMISSION_BP_ENV, "250"),
            (ADMIN_FEE_ENV, "0"),
        ]))
        .unwrap();

        assert_eq!(config.bind_addr, SocketAddr::from(([127, 0, 0, 1], 9000)));
        assert_eq!(config.rounding, RoundingMethod::Globally);
        assert_eq!(config.billing.commission_bp, 250);
        assert_eq!(config.billing.administrative_fee, 0);
    }

    #[test]
    fn invalid_value_names_the_variable() {
        let err = ApiConfig::from_lookup(lookup(&[(COMMISSION_BP_ENV, "six")])).unwrap_err();
        let ConfigError::Invalid { key, value, .. } = err;
        assert_eq!(key, COMMISSION_BP_ENV);
        assert_eq!(value, "six");
    }
}
