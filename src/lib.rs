//! A TCP server that simulates a payment-processing endpoint.
//!
//! Clients send one `PAYMENT|<amount>` request per line and get one
//! `RESPONSE|<STATUS>|<reason>` line back, after a delay that grows with the
//! amount. Each connection is served by its own task. Stopping the server
//! drains in-flight requests for a grace period and cancels the rest.

pub mod config;
pub mod error;
pub mod net;
pub mod payment;
pub mod registry;
pub mod response;
pub mod server;
pub mod telemetry;

pub use config::Config;
pub use error::{Error, Result};
pub use payment::{PaymentProcessor, Processor};
pub use response::Response;
pub use server::{Server, Shutdown};
