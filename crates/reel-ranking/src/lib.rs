//! Client for the external segment ranking service.
//!
//! The ranking service receives validated segments with an advisory target
//! duration and returns an ordered subset. This crate provides the
//! `RankingService` trait the pipeline depends on and an HTTP implementation
//! with retry and backoff.

pub mod client;
pub mod error;
pub mod types;

pub use client::{RankingClient, RankingClientConfig, RankingService};
pub use error::{RankingError, RankingResult};
pub use types::{extract_json, RankingRequest, RankingResponse};
