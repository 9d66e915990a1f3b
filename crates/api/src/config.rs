//! Environment configuration.
//!
//! Every setting has a default; unparsable values fall back to it with a warning.

use core::str::FromStr;
use std::time::Duration;

use tracing::warn;

use relation_auth::TokenValidatorConfig;
use relation_core::CompanyId;
use relation_infra::{AuditDispatcherConfig, AuditPolicy, RateLimiterConfig, TierLimit};
use relation_observability::{LogFormat, LoggingConfig};

pub const DEFAULT_INSTANCE_URL: &str = "https://login.microsoftonline.com/";

#[derive(Clone, PartialEq, Eq)]
pub struct AuthConfig {
    pub tenant_id: String,
    pub client_id: String,
    pub instance_url: String,
    pub required_scopes: Vec<String>,
    /// Overrides the key endpoint derived from instance and tenant.
    pub jwks_url: Option<String>,
    pub default_company: CompanyId,
    pub keyset_ttl: Duration,
    pub keyset_fetch_timeout: Duration,
    pub leeway_secs: u64,
    /// Empty disables API-key authentication.
    pub api_key: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            tenant_id: String::new(),
            client_id: String::new(),
            instance_url: DEFAULT_INSTANCE_URL.to_string(),
            required_scopes: Vec::new(),
            jwks_url: None,
            default_company: CompanyId::Gruppen,
            keyset_ttl: Duration::from_secs(24 * 60 * 60),
            keyset_fetch_timeout: Duration::from_secs(10),
            leeway_secs: 60,
            api_key: String::new(),
        }
    }
}

impl AuthConfig {
    pub fn jwks_url(&self) -> String {
        self.jwks_url.clone().unwrap_or_else(|| {
            relation_infra::HttpKeySetSource::azure_ad_url(&self.instance_url, &self.tenant_id)
        })
    }

    pub fn token_validator_config(&self) -> TokenValidatorConfig {
        TokenValidatorConfig {
            client_id: self.client_id.clone(),
            tenant_id: self.tenant_id.clone(),
            required_scopes: self.required_scopes.clone(),
            default_company: self.default_company,
            leeway_secs: self.leeway_secs,
        }
    }
}

impl core::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field("jwks_url", &self.jwks_url())
            .field("required_scopes", &self.required_scopes)
            .field("default_company", &self.default_company)
            .field("api_key_enabled", &!self.api_key.is_empty())
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditConfig {
    pub policy: AuditPolicy,
    pub dispatcher: AuditDispatcherConfig,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub bind_addr: String,
    pub logging: LoggingConfig,
    pub auth: AuthConfig,
    pub rate_limit: RateLimiterConfig,
    pub audit: AuditConfig,
    /// Enables the Postgres audit sink; the in-memory sink is used otherwise.
    pub database_url: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
            logging: LoggingConfig::default(),
            auth: AuthConfig::default(),
            rate_limit: RateLimiterConfig::default(),
            audit: AuditConfig::default(),
            database_url: None,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (the process environment in production).
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(lookup);
        let defaults = AppConfig::default();

        let auth = AuthConfig {
            tenant_id: env.string("AZURE_AD_TENANT_ID", ""),
            client_id: env.string("AZURE_AD_CLIENT_ID", ""),
            instance_url: env.string("AZURE_AD_INSTANCE_URL", DEFAULT_INSTANCE_URL),
            required_scopes: env.list("AZURE_AD_REQUIRED_SCOPES", &[]),
            jwks_url: env.optional("AZURE_AD_JWKS_URL"),
            default_company: env.parse("AUTH_DEFAULT_COMPANY", CompanyId::Gruppen),
            keyset_ttl: env.secs("AUTH_KEYSET_TTL_SECS", defaults.auth.keyset_ttl),
            keyset_fetch_timeout: env.secs(
                "AUTH_KEYSET_FETCH_TIMEOUT_SECS",
                defaults.auth.keyset_fetch_timeout,
            ),
            leeway_secs: env.parse("AUTH_LEEWAY_SECS", defaults.auth.leeway_secs),
            api_key: env.string("API_KEY", ""),
        };

        let limits = defaults.rate_limit;
        let burst = env.parse("RATE_LIMIT_BURST_SIZE", limits.anonymous.burst);
        let rate_limit = RateLimiterConfig {
            enabled: env.flag("RATE_LIMIT_ENABLED", limits.enabled),
            anonymous: TierLimit::new(
                env.parse(
                    "RATE_LIMIT_REQUESTS_PER_MINUTE",
                    limits.anonymous.requests_per_minute,
                ),
                burst,
            ),
            authenticated: TierLimit::new(
                env.parse(
                    "RATE_LIMIT_REQUESTS_PER_MINUTE_AUTH",
                    limits.authenticated.requests_per_minute,
                ),
                burst,
            ),
            whitelist_ips: env.list("RATE_LIMIT_WHITELIST_IPS", &[]),
            whitelist_paths: env.list("RATE_LIMIT_WHITELIST_PATHS", &["/health", "/health/*"]),
            idle_expiry: env.secs("RATE_LIMIT_IDLE_EXPIRY_SECS", limits.idle_expiry),
        };

        let policy = defaults.audit.policy;
        let dispatcher = defaults.audit.dispatcher;
        let audit = AuditConfig {
            policy: AuditPolicy {
                enabled: env.flag("AUDIT_ENABLED", policy.enabled),
                audit_reads: env.flag("AUDIT_READS", policy.audit_reads),
                audit_failed_attempts: env.flag("AUDIT_FAILED_ATTEMPTS", policy.audit_failed_attempts),
                skip_paths: env.list("AUDIT_SKIP_PATHS", &["/health", "/swagger"]),
                skip_methods: env
                    .list("AUDIT_SKIP_METHODS", &["OPTIONS", "HEAD"])
                    .into_iter()
                    .map(|m| m.to_ascii_uppercase())
                    .collect(),
            },
            dispatcher: AuditDispatcherConfig {
                queue_capacity: env.parse("AUDIT_QUEUE_CAPACITY", dispatcher.queue_capacity),
                workers: env.parse("AUDIT_WORKERS", dispatcher.workers),
                write_timeout: env.secs("AUDIT_WRITE_TIMEOUT_SECS", dispatcher.write_timeout),
            },
        };

        Self {
            bind_addr: env.string("BIND_ADDR", &defaults.bind_addr),
            logging: LoggingConfig {
                level: env.string("LOG_LEVEL", &defaults.logging.level),
                format: env.parse::<LogFormat>("LOG_FORMAT", defaults.logging.format),
            },
            auth,
            rate_limit,
            audit,
            database_url: env.optional("DATABASE_URL"),
        }
    }
}

struct Env<F>(F);

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn optional(&self, key: &str) -> Option<String> {
        (self.0)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn string(&self, key: &str, default: &str) -> String {
        self.optional(key).unwrap_or_else(|| default.to_string())
    }

    fn parse<T: FromStr>(&self, key: &str, default: T) -> T {
        match self.optional(key) {
            None => default,
            Some(raw) => raw.parse().unwrap_or_else(|_| {
                warn!(key, value = %raw, "invalid configuration value, using default");
                default
            }),
        }
    }

    fn flag(&self, key: &str, default: bool) -> bool {
        match self.optional(key).map(|v| v.to_ascii_lowercase()) {
            None => default,
            Some(v) if matches!(v.as_str(), "true" | "1" | "yes" | "on") => true,
            Some(v) if matches!(v.as_str(), "false" | "0" | "no" | "off") => false,
            Some(v) => {
                warn!(key, value = %v, "invalid boolean value, using default");
                default
            }
        }
    }

    fn secs(&self, key: &str, default: Duration) -> Duration {
        Duration::from_secs(self.parse(key, default.as_secs()))
    }

    fn list(&self, key: &str, default: &[&str]) -> Vec<String> {
        match self.optional(key) {
            None => default.iter().map(|s| s.to_string()).collect(),
            Some(raw) => raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> AppConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(move |key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let cfg = config(&[]);
        assert_eq!(cfg, AppConfig::default());
        assert_eq!(cfg.rate_limit.anonymous, TierLimit::new(100, 20));
        assert_eq!(cfg.rate_limit.authenticated, TierLimit::new(300, 20));
        assert_eq!(cfg.auth.default_company, CompanyId::Gruppen);
        assert!(cfg.database_url.is_none());
    }

    #[test]
    fn key_endpoint_is_derived_from_tenant() {
        let cfg = config(&[("AZURE_AD_TENANT_ID", "tenant-1")]);
        assert_eq!(
            cfg.auth.jwks_url(),
            "https://login.microsoftonline.com/tenant-1/discovery/v2.0/keys"
        );

        let overridden = config(&[("AZURE_AD_JWKS_URL", "http://127.0.0.1:9999/keys")]);
        assert_eq!(overridden.auth.jwks_url(), "http://127.0.0.1:9999/keys");
    }

    #[test]
    fn values_are_read_from_the_environment() {
        let cfg = config(&[
            ("AZURE_AD_REQUIRED_SCOPES", "access_as_user, admin"),
            ("RATE_LIMIT_REQUESTS_PER_MINUTE", "30"),
            ("RATE_LIMIT_BURST_SIZE", "5"),
            ("RATE_LIMIT_WHITELIST_IPS", "10.0.0.1,10.0.0.2"),
            ("AUDIT_READS", "yes"),
            ("AUDIT_SKIP_METHODS", "options"),
            ("LOG_FORMAT", "pretty"),
            ("AUTH_DEFAULT_COMPANY", "tak"),
        ]);
        assert_eq!(cfg.auth.required_scopes, vec!["access_as_user", "admin"]);
        assert_eq!(cfg.rate_limit.anonymous, TierLimit::new(30, 5));
        assert_eq!(cfg.rate_limit.authenticated.burst, 5);
        assert_eq!(cfg.rate_limit.whitelist_ips.len(), 2);
        assert!(cfg.audit.policy.audit_reads);
        assert_eq!(cfg.audit.policy.skip_methods, vec!["OPTIONS"]);
        assert_eq!(cfg.logging.format, LogFormat::Pretty);
        assert_eq!(cfg.auth.default_company, CompanyId::Tak);
    }

    #[test]
    fn invalid_values_fall_back_to_defaults() {
        let cfg = config(&[
            ("RATE_LIMIT_REQUESTS_PER_MINUTE", "lots"),
            ("RATE_LIMIT_ENABLED", "maybe"),
            ("AUTH_DEFAULT_COMPANY", "acme"),
        ]);
        assert_eq!(cfg.rate_limit.anonymous.requests_per_minute, 100);
        assert!(cfg.rate_limit.enabled);
        assert_eq!(cfg.auth.default_company, CompanyId::Gruppen);
    }

    #[test]
    fn debug_hides_api_key() {
        let cfg = config(&[("API_KEY", "super-secret")]);
        assert!(!format!("{:?}", cfg.auth).contains("super-secret"));
    }
}
