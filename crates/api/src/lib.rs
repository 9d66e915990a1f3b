//! HTTP surface: configuration, the request pipeline, and routes.

pub mod app;
pub mod authz;
pub mod config;
pub mod context;
pub mod middleware;
