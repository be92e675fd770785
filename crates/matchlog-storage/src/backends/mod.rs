//! Storage backend implementations
//!
//! Both backends run the same portable SQL from [`sql`] and convert rows
//! through [`rows`]. At least one backend must be enabled via feature flags.

#[cfg(any(feature = "sqlite", feature = "duckdb"))]
mod rows;
#[cfg(any(feature = "sqlite", feature = "duckdb"))]
mod sql;

#[cfg(feature = "duckdb")]
pub mod duckdb;

#[cfg(feature = "sqlite")]
pub mod sqlite;
