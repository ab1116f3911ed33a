#![doc = "webhoist-core: core publishing and DNS reconciliation logic for webhoist."]

//! This crate contains the provider-agnostic deployment pipeline: file
//! collection, incremental revision construction, the publisher and
//! reconciler capability contracts, and the orchestrator that sequences
//! them. Concrete provider transports live in the CLI crate.
//!
//! # Usage
//! Implement the traits in [`contract`] for your backends and drive them
//! with [`deploy::deploy`].

pub mod bucket;
pub mod collect;
pub mod config;
pub mod contract;
pub mod deploy;
pub mod dns;
pub mod error;
pub mod pages;
pub mod revision;
