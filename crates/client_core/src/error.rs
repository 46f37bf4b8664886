//! Error taxonomy for controller actions.

use std::fmt;

use shared::domain::RequestId;
use thiserror::Error;

use crate::DepositState;

/// Controller action an error or notice relates to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    RefreshDeposit,
    SubmitDeposit,
    Upload,
    QueryStatus,
    ReleaseDeposit,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::RefreshDeposit => "deposit check",
            Self::SubmitDeposit => "deposit",
            Self::Upload => "upload",
            Self::QueryStatus => "status query",
            Self::ReleaseDeposit => "deposit release",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A local guard was not satisfied; the gateway was never called.
    Precondition,
    /// The gateway (or the signer behind it) reported a failure.
    Gateway,
    /// The gateway answered with something outside the agreed shape.
    ContractViolation,
    /// The session moved on while the call was pending and the result was dropped.
    Stale,
}

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("no wallet session is connected")]
    NoSession,
    #[error("deposit is not funded (state: {state:?})")]
    DepositNotFunded { state: DepositState },
    #[error("an upload is already in progress")]
    UploadInFlight,
    #[error("no active record, upload a file first")]
    NoActiveRecord,
    #[error("request {0} is not among this session's uploads")]
    UnknownRecord(RequestId),
    #[error("{action} failed: {source}")]
    Gateway {
        action: Action,
        source: anyhow::Error,
    },
    #[error("gateway returned unknown deal status code {code} for request {request_id}")]
    UnknownStatusCode { request_id: RequestId, code: i64 },
    #[error("malformed gateway response to {action}: {detail}")]
    ContractViolation { action: Action, detail: String },
    #[error("session changed while {action} was pending; result discarded")]
    SessionChanged { action: Action },
}

impl ControllerError {
    pub(crate) fn gateway(action: Action, source: anyhow::Error) -> Self {
        Self::Gateway { action, source }
    }

    pub(crate) fn contract(action: Action, detail: impl Into<String>) -> Self {
        Self::ContractViolation {
            action,
            detail: detail.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NoSession
            | Self::DepositNotFunded { .. }
            | Self::UploadInFlight
            | Self::NoActiveRecord
            | Self::UnknownRecord(_) => ErrorKind::Precondition,
            Self::Gateway { .. } => ErrorKind::Gateway,
            Self::UnknownStatusCode { .. } | Self::ContractViolation { .. } => {
                ErrorKind::ContractViolation
            }
            Self::SessionChanged { .. } => ErrorKind::Stale,
        }
    }

    pub fn is_precondition(&self) -> bool {
        self.kind() == ErrorKind::Precondition
    }
}
