//! Chat relay: one chat request in, one narrated event stream out

pub mod ports;
pub mod service;

pub use service::ChatRelayService;
