//! Farm advisor HTTP service
//!
//! Serves yield, crop and fertilizer predictions over HTTP, proxies
//! current-weather lookups, and exposes health and Prometheus endpoints.

pub mod api;
pub mod config;
