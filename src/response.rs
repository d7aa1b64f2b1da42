//! Response lines written back to clients.

use std::fmt;

/// Reason sent with every accepted payment.
pub const TRANSACTION_PROCESSED: &str = "Transaction processed";

/// Reason sent to connections still open when the grace period runs out.
pub const CANCELLED: &str = "Cancelled";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Accepted,
    Rejected,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Accepted => "ACCEPTED",
            Status::Rejected => "REJECTED",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single `RESPONSE|<STATUS>|<reason>` line, without the trailing newline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: Status,
    pub reason: String,
}

impl Response {
    pub fn accepted() -> Self {
        Self {
            status: Status::Accepted,
            reason: TRANSACTION_PROCESSED.to_owned(),
        }
    }

    pub fn rejected(reason: impl Into<String>) -> Self {
        Self {
            status: Status::Rejected,
            reason: reason.into(),
        }
    }

    pub fn cancelled() -> Self {
        Self::rejected(CANCELLED)
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RESPONSE|{}|{}", self.status, self.reason)
    }
}
