// Chat Completion Load Tester - Library root for testing

pub mod bench;
pub mod config;
pub mod error;
pub mod http_client;
pub mod models;
pub mod samples;
pub mod streaming;
