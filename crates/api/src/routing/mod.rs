//! Host-based resolution
//!
//! This module answers "which site does this request belong to?":
//! - `expand` turns a hostname into ordered candidate patterns, with
//!   wildcard fallbacks (`www.example.com`, `*.example.com`, `*.com`, `*`)
//! - `resolver` matches candidates against stored aliases in one batched
//!   lookup, fronted by a TTL cache
//! - `middleware` wires resolution into the request path and handles
//!   redirect-to-canonical

mod cache;
mod expand;
pub mod middleware;
mod resolver;

pub use cache::{CacheStats, DomainCache};
pub use expand::expand_netloc;
pub use middleware::{resolve_site, ResolvedSite};
pub use resolver::HostResolver;
