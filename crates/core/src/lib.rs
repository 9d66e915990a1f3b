//! `relation-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! the fixed company (tenant) set and strongly-typed identifiers.

pub mod company;
pub mod error;
pub mod id;

pub use company::CompanyId;
pub use error::DomainError;
pub use id::{AuditRecordId, EntityId, RequestId};
