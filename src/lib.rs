//! dirbase - secondary-index engine for an embedded directory store
//!
//! Four tightly coupled pieces:
//! - [`idset`] - compact identifier sets with an entry-limit collapse
//! - [`index`] - per-transaction buffered read-modify-write cache
//! - [`builder`] - external sort-merge bulk index construction
//! - [`sort`] - composite comparator and virtual-list-view windowing
//!
//! The transactional key-value store, the record store and the schema's
//! matching rules are external collaborators, reached through the
//! traits each module exposes.

pub mod builder;
pub mod cli;
pub mod config;
pub mod idset;
pub mod index;
pub mod observability;
pub mod sort;
