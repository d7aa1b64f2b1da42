//! Request parsing and simulated payment processing.
//!
//! A request is a single line of the form `PAYMENT|<amount>`. Valid payments
//! are accepted after a delay that grows with the amount:
//! - up to 100: no delay
//! - 101 to 10000: `amount` milliseconds
//! - above 10000: capped at 10 seconds

use crate::response::Response;
use async_std::task;
use async_trait::async_trait;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

const PAYMENT_TAG: &str = "PAYMENT";
const FIELD_SEPARATOR: char = '|';

/// Amounts at or below this are processed immediately.
pub const INSTANT_AMOUNT_LIMIT: u64 = 100;

/// Upper bound on the simulated processing time, in milliseconds.
pub const MAX_PROCESSING_MS: u64 = 10_000;

/// Why a request line was rejected. The `Display` text is the wire reason.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestError {
    #[error("Invalid request")]
    InvalidRequest,

    #[error("Invalid amount")]
    InvalidAmount,
}

impl From<RequestError> for Response {
    fn from(err: RequestError) -> Self {
        Response::rejected(err.to_string())
    }
}

/// A well-formed payment request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Payment {
    pub amount: u64,
}

impl Payment {
    /// How long processing this payment takes.
    pub fn processing_delay(&self) -> Duration {
        if self.amount <= INSTANT_AMOUNT_LIMIT {
            return Duration::ZERO;
        }
        Duration::from_millis(self.amount.min(MAX_PROCESSING_MS))
    }
}

impl FromStr for Payment {
    type Err = RequestError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut fields = line.split(FIELD_SEPARATOR);
        let (tag, amount) = match (fields.next(), fields.next(), fields.next()) {
            (Some(tag), Some(amount), None) => (tag, amount),
            _ => return Err(RequestError::InvalidRequest),
        };
        if tag != PAYMENT_TAG {
            return Err(RequestError::InvalidRequest);
        }

        // u64::from_str takes a leading '+', plain decimal digits only here
        if !amount.bytes().all(|b| b.is_ascii_digit()) {
            return Err(RequestError::InvalidAmount);
        }
        let amount = amount.parse().map_err(|_| RequestError::InvalidAmount)?;
        Ok(Payment { amount })
    }
}

/// Turns one request line into one response.
///
/// Implementations may take as long as they like; the connection handler
/// waits for the response before reading the next line.
#[async_trait]
pub trait Processor: Send + Sync + 'static {
    async fn process(&self, request: &str) -> Response;
}

/// The default processor: parses payments and sleeps for their simulated
/// processing time.
#[derive(Debug, Default, Clone, Copy)]
pub struct PaymentProcessor;

#[async_trait]
impl Processor for PaymentProcessor {
    async fn process(&self, request: &str) -> Response {
        let payment = match request.parse::<Payment>() {
            Ok(payment) => payment,
            Err(err) => return err.into(),
        };

        let delay = payment.processing_delay();
        if !delay.is_zero() {
            task::sleep(delay).await;
        }
        Response::accepted()
    }
}
