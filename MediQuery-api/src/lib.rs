// MediQuery-api lib.rs
//
// HTTP API and command line front ends for MediQuery.

// Public modules
pub mod api;
pub mod cli;
pub mod entities;
pub mod openapi;
