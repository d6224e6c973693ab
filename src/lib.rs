//! `crimson` - in-memory Redis-compatible key-value server
//!
//! The library holds the RESP2 codec, command decoding, the typed keyspace
//! and its handlers, append-only persistence and the TCP front end. The
//! `crimson` binary is a thin CLI over it.

pub mod aof;
pub mod cli;
pub mod command;
pub mod config;
pub mod connection;
pub mod db;
pub mod error;
pub mod expiration;
pub mod handlers;
pub mod observability;
pub mod resp;
pub mod server;
pub mod store;
