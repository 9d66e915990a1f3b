use serde::{Deserialize, Serialize};

/// Which requests and outcomes produce audit records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditPolicy {
    pub enabled: bool,
    /// Record `GET` requests as well as mutations.
    pub audit_reads: bool,
    /// Record non-2xx outcomes of mutation attempts, with their status.
    pub audit_failed_attempts: bool,
    /// Path prefixes never audited.
    pub skip_paths: Vec<String>,
    /// Methods never audited (upper-case).
    pub skip_methods: Vec<String>,
}

impl Default for AuditPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            audit_reads: false,
            audit_failed_attempts: false,
            skip_paths: vec!["/health".to_string(), "/swagger".to_string()],
            skip_methods: vec!["OPTIONS".to_string(), "HEAD".to_string()],
        }
    }
}

impl AuditPolicy {
    /// Decided before the handler runs; a `false` skips body buffering too.
    pub fn should_capture(&self, method: &str, path: &str) -> bool {
        if !self.enabled {
            return false;
        }
        if self
            .skip_methods
            .iter()
            .any(|m| m.eq_ignore_ascii_case(method))
        {
            return false;
        }
        if method.eq_ignore_ascii_case("GET") && !self.audit_reads {
            return false;
        }
        !self
            .skip_paths
            .iter()
            .any(|prefix| path.starts_with(prefix.as_str()))
    }

    /// Decided after the response status is known.
    pub fn should_record(&self, status: u16) -> bool {
        (200..300).contains(&status) || self.audit_failed_attempts
    }

    /// Whether the request body should be buffered for a payload snapshot.
    pub fn captures_body(method: &str) -> bool {
        ["POST", "PUT", "PATCH"]
            .iter()
            .any(|m| m.eq_ignore_ascii_case(method))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mutations_are_captured_reads_are_not_by_default() {
        let policy = AuditPolicy::default();
        assert!(policy.should_capture("POST", "/customers"));
        assert!(policy.should_capture("DELETE", "/customers/1"));
        assert!(!policy.should_capture("GET", "/customers"));
        assert!(!policy.should_capture("OPTIONS", "/customers"));
        assert!(!policy.should_capture("HEAD", "/customers"));
    }

    #[test]
    fn reads_are_captured_when_configured() {
        let policy = AuditPolicy {
            audit_reads: true,
            ..AuditPolicy::default()
        };
        assert!(policy.should_capture("GET", "/customers"));
        assert!(!policy.should_capture("GET", "/health/ready"));
    }

    #[test]
    fn skip_paths_match_by_prefix() {
        let policy = AuditPolicy::default();
        assert!(!policy.should_capture("POST", "/health"));
        assert!(!policy.should_capture("POST", "/swagger/index.html"));
    }

    #[test]
    fn disabled_policy_captures_nothing() {
        let policy = AuditPolicy {
            enabled: false,
            ..AuditPolicy::default()
        };
        assert!(!policy.should_capture("POST", "/customers"));
    }

    #[test]
    fn failed_attempts_follow_policy() {
        let policy = AuditPolicy::default();
        assert!(policy.should_record(201));
        assert!(!policy.should_record(403));

        let strict = AuditPolicy {
            audit_failed_attempts: true,
            ..AuditPolicy::default()
        };
        assert!(strict.should_record(403));
    }

    #[test]
    fn only_bodies_of_writes_are_buffered() {
        assert!(AuditPolicy::captures_body("POST"));
        assert!(AuditPolicy::captures_body("patch"));
        assert!(!AuditPolicy::captures_body("DELETE"));
    }
}
