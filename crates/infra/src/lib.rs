//! Infrastructure layer: key-set fetching, rate-limit state, audit persistence.

pub mod audit;
pub mod keyset;
pub mod rate_limit;

pub use audit::{
    AuditAction, AuditDispatcher, AuditDispatcherConfig, AuditError, AuditPolicy, AuditRecord,
    AuditSink, InMemoryAuditSink, PostgresAuditSink,
};
pub use keyset::HttpKeySetSource;
pub use rate_limit::{Decision, RateKey, RateLimiter, RateLimiterConfig, TierLimit, path_matches};
