use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The closed set of platform event kinds.
///
/// Every payload carries a numeric `timestamp` (wall-clock ms) and the owning
/// user id; the per-kind required fields are enforced by the payload
/// validator before anything is enqueued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    #[serde(rename = "app.created")]
    AppCreated,
    #[serde(rename = "app.deployed")]
    AppDeployed,
    #[serde(rename = "app.exported")]
    AppExported,
    #[serde(rename = "app.error")]
    AppError,
    #[serde(rename = "generation.complete")]
    GenerationComplete,
    #[serde(rename = "deployment.complete")]
    DeploymentComplete,
    #[serde(rename = "user.registered")]
    UserRegistered,
    #[serde(rename = "user.verified")]
    UserVerified,
    #[serde(rename = "payment.success")]
    PaymentSuccess,
    #[serde(rename = "payment.failed")]
    PaymentFailed,
}

impl EventKind {
    pub const ALL: [EventKind; 10] = [
        EventKind::AppCreated,
        EventKind::AppDeployed,
        EventKind::AppExported,
        EventKind::AppError,
        EventKind::GenerationComplete,
        EventKind::DeploymentComplete,
        EventKind::UserRegistered,
        EventKind::UserVerified,
        EventKind::PaymentSuccess,
        EventKind::PaymentFailed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::AppCreated => "app.created",
            EventKind::AppDeployed => "app.deployed",
            EventKind::AppExported => "app.exported",
            EventKind::AppError => "app.error",
            EventKind::GenerationComplete => "generation.complete",
            EventKind::DeploymentComplete => "deployment.complete",
            EventKind::UserRegistered => "user.registered",
            EventKind::UserVerified => "user.verified",
            EventKind::PaymentSuccess => "payment.success",
            EventKind::PaymentFailed => "payment.failed",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventKind::ALL
            .iter()
            .find(|k| k.as_str() == s)
            .copied()
            .ok_or_else(|| format!("unknown event kind: {s}"))
    }
}
