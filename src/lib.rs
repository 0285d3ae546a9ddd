//! Windowguard - HTTP demo server behind a fixed window rate limiter
//!
//! This crate implements an in-process, concurrency-safe fixed window rate
//! limiter keyed by caller identity, and a small HTTP service that answers
//! its one route with a greeting or, once the caller's quota for the current
//! window is spent, a 429 telling them when to retry.

pub mod config;
pub mod error;
pub mod http;
pub mod ratelimit;
