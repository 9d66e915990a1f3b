//! UUID-backed identifiers.

use core::str::FromStr;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Fresh time-ordered (v7) id.
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                core::fmt::Display::fmt(&self.0, f)
            }
        }

        impl FromStr for $name {
            type Err = DomainError;

            fn from_str(raw: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(raw).map(Self).map_err(|err| {
                    DomainError::invalid_id(format!("{}: {err}", stringify!($name)))
                })
            }
        }
    };
}

uuid_id!(
    /// Primary key of a stored audit record.
    AuditRecordId
);
uuid_id!(
    /// Business entity addressed by a route, e.g. the `{id}` in `/customers/{id}`.
    EntityId
);
uuid_id!(
    /// Correlates log lines and audit records of one inbound request.
    RequestId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_id_parses_uuid() {
        let raw = "0190f3a4-7b7e-7c2a-9a51-3c1f0e2d4b6a";
        let id: EntityId = raw.parse().unwrap();
        assert_eq!(id.to_string(), raw);
    }

    #[test]
    fn parse_failure_names_the_type() {
        let err = "not-a-uuid".parse::<RequestId>().unwrap_err();
        assert!(matches!(err, DomainError::InvalidId(msg) if msg.starts_with("RequestId")));
    }

    #[test]
    fn new_ids_are_v7() {
        assert_eq!(RequestId::new().as_uuid().get_version_num(), 7);
    }
}
