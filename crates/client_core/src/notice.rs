//! Human-readable outcomes for the presentation layer.

use shared::error::{ApiException, ErrorCode};

use crate::{
    error::{Action, ControllerError, ErrorKind},
    ControllerSnapshot, DepositState, StatusReport, UploadRecord,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone)]
pub struct Notice {
    severity: Severity,
    action: Option<Action>,
    message: String,
}

impl Notice {
    fn info(action: Action, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Info,
            action: Some(action),
            message: message.into(),
        }
    }

    pub fn stored(record: &UploadRecord) -> Self {
        Self::info(Action::Upload, format!("IPFS CID:\n{}", record.cid))
    }

    pub fn deal_status(report: &StatusReport) -> Self {
        Self::info(
            Action::QueryStatus,
            format!("Filecoin deal status: \"{}\"!", report.label()),
        )
    }

    pub fn deposit_added() -> Self {
        Self::info(Action::SubmitDeposit, "Deposit added")
    }

    pub fn released() -> Self {
        Self::info(
            Action::ReleaseDeposit,
            "check your wallet in case of released funds",
        )
    }

    /// Precondition failures are warnings the user can act on; the rest are errors.
    pub fn from_error(action: Action, err: &ControllerError) -> Self {
        let severity = match err.kind() {
            ErrorKind::Precondition | ErrorKind::Stale => Severity::Warning,
            ErrorKind::Gateway | ErrorKind::ContractViolation => Severity::Error,
        };
        let message = match err {
            ControllerError::Gateway { source, .. } => match gateway_code(source) {
                Some(ErrorCode::InsufficientFunds) => {
                    format!("{action} failed: wallet has insufficient funds ({source})")
                }
                Some(ErrorCode::Unauthorized) => {
                    format!("{action} failed: wallet signature rejected, reconnect and retry ({source})")
                }
                _ => err.to_string(),
            },
            _ => err.to_string(),
        };
        Self {
            severity,
            action: Some(action),
            message,
        }
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn action(&self) -> Option<Action> {
        self.action
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

fn gateway_code(source: &anyhow::Error) -> Option<ErrorCode> {
    source.downcast_ref::<ApiException>().map(|api| api.code)
}

/// Greeting line shown above the actions.
pub fn deposit_banner(snapshot: &ControllerSnapshot) -> String {
    match (&snapshot.address, snapshot.deposit) {
        (None, _) => "Connect a wallet to get started".to_string(),
        (Some(_), DepositState::Funded) => "You got Ξ in here!".to_string(),
        (Some(address), _) => format!("Deposit some funds, {address}!"),
    }
}
