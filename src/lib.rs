//! Differential-testing reverse proxy.
//!
//! Every inbound request is replayed against a Primary and a Candidate backend, and optionally a
//! Secondary used to detect noise, and the proxy reports whether Candidate behaves like Primary.

pub mod handlers;
pub mod models;
pub mod services;
pub mod utils;
