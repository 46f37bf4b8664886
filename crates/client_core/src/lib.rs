use std::{fmt, sync::Arc};

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared::{
    domain::{ContentId, DealStatus, RequestId},
    protocol::{StatusResponse, StoredRequest},
};
use tokio::sync::{watch, Mutex};
use tracing::debug;

pub mod error;
pub mod notice;
pub mod signer;
pub mod transport;

pub use error::{Action, ControllerError, ErrorKind};
pub use notice::{Notice, Severity};
pub use signer::{Ed25519Signer, Signer, SignerError};
pub use transport::HttpStorageGateway;

/// Connected wallet: an address plus the capability to sign for it.
#[derive(Clone)]
pub struct Session {
    address: String,
    signer: Arc<dyn Signer>,
}

impl Session {
    pub fn new(address: impl Into<String>, signer: Arc<dyn Signer>) -> Self {
        Self {
            address: address.into(),
            signer,
        }
    }

    /// Session whose address is the signer's own identity.
    pub fn from_signer(signer: Arc<dyn Signer>) -> Self {
        let address = signer.identity().to_string();
        Self { address, signer }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn signer(&self) -> &Arc<dyn Signer> {
        &self.signer
    }

    pub fn signer_identity(&self) -> &str {
        self.signer.identity()
    }

    fn same_as(&self, other: &Session) -> bool {
        self.address == other.address && self.signer_identity() == other.signer_identity()
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("address", &self.address)
            .field("signer", &self.signer_identity())
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct FileUpload {
    pub name: String,
    pub mime_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// Storage backend: deposit accounting, file storage and deal tracking.
#[async_trait]
pub trait StorageGateway: Send + Sync {
    async fn has_deposit(&self, session: &Session) -> Result<bool>;
    async fn add_deposit(&self, session: &Session) -> Result<()>;
    async fn store(&self, session: &Session, file: FileUpload) -> Result<StoredRequest>;
    async fn status(&self, session: &Session, request_id: &RequestId) -> Result<StatusResponse>;
    async fn release_deposits(&self, session: &Session) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DepositState {
    #[default]
    Unknown,
    NotFunded,
    Funded,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRecord {
    pub id: RequestId,
    pub cid: ContentId,
    /// Code reported alongside the store result, if any. Status queries never rewrite it.
    pub status_code: Option<i64>,
    pub file_name: String,
    pub size_bytes: usize,
    pub stored_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusReport {
    pub request_id: RequestId,
    pub status: DealStatus,
}

impl StatusReport {
    pub fn label(&self) -> &'static str {
        self.status.label()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReleaseOutcome {
    /// Whether deposit state and ledger were cleared in-process.
    pub state_reset: bool,
}

/// What `observe_session` saw when comparing the provider's session to the held one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionTransition {
    Unchanged,
    Started,
    Changed,
    Ended,
}

impl SessionTransition {
    fn between(current: Option<&Session>, next: Option<&Session>) -> Self {
        match (current, next) {
            (None, None) => Self::Unchanged,
            (None, Some(_)) => Self::Started,
            (Some(_), None) => Self::Ended,
            (Some(current), Some(next)) if current.same_as(next) => Self::Unchanged,
            (Some(_), Some(_)) => Self::Changed,
        }
    }

    pub fn requires_refresh(self) -> bool {
        matches!(self, Self::Started | Self::Changed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReleasePolicy {
    /// A successful release clears deposit state and ledger immediately.
    #[default]
    ResetInProcess,
    /// State is left as-is; the caller restarts the controller afterwards.
    RequireRestart,
}

#[derive(Debug, Clone, Default)]
pub struct ControllerConfig {
    pub release_policy: ReleasePolicy,
}

/// Read-only view for the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ControllerSnapshot {
    pub session_present: bool,
    pub address: Option<String>,
    pub deposit: DepositState,
    pub in_flight: bool,
    pub ledger: Vec<UploadRecord>,
}

struct ControllerState {
    session: Option<Session>,
    /// Bumped only when the session itself changes; owns the in-flight flag.
    session_epoch: u64,
    /// Bumped on every reset; guards deposit results.
    generation: u64,
    deposit: DepositState,
    in_flight: bool,
    ledger: Vec<UploadRecord>,
}

impl ControllerState {
    fn new() -> Self {
        Self {
            session: None,
            session_epoch: 0,
            generation: 0,
            deposit: DepositState::Unknown,
            in_flight: false,
            ledger: Vec::new(),
        }
    }

    /// Drops deposit state and the ledger, and invalidates pending deposit results.
    ///
    /// A pending upload keeps the in-flight flag: it belongs to the same
    /// session and clears the flag itself when the store call resolves.
    fn reset(&mut self) {
        self.generation += 1;
        self.deposit = DepositState::Unknown;
        self.ledger.clear();
    }

    /// Installs a different session. Uploads started under the old one no longer count.
    fn begin_session(&mut self, session: Option<Session>) {
        self.reset();
        self.session_epoch += 1;
        self.in_flight = false;
        self.session = session;
    }

    fn active_session(&self) -> Result<(Session, u64), ControllerError> {
        let session = self.session.clone().ok_or(ControllerError::NoSession)?;
        Ok((session, self.generation))
    }

    fn ensure_generation(&self, generation: u64, action: Action) -> Result<(), ControllerError> {
        if self.generation == generation {
            Ok(())
        } else {
            Err(ControllerError::SessionChanged { action })
        }
    }

    fn snapshot(&self) -> ControllerSnapshot {
        ControllerSnapshot {
            session_present: self.session.is_some(),
            address: self.session.as_ref().map(|s| s.address().to_string()),
            deposit: self.deposit,
            in_flight: self.in_flight,
            ledger: self.ledger.clone(),
        }
    }
}

/// Gates storage behind a funded deposit and tracks the session's uploads.
///
/// The state lock is never held across a gateway call: each action checks its
/// guards, releases the lock, awaits the gateway, then re-locks to fold the
/// result in. Results that come back after the session changed are discarded.
pub struct UploadController {
    gateway: Arc<dyn StorageGateway>,
    config: ControllerConfig,
    inner: Mutex<ControllerState>,
    snapshots: watch::Sender<ControllerSnapshot>,
}

impl UploadController {
    pub fn new(gateway: Arc<dyn StorageGateway>) -> Arc<Self> {
        Self::new_with_config(gateway, ControllerConfig::default())
    }

    pub fn new_with_config(gateway: Arc<dyn StorageGateway>, config: ControllerConfig) -> Arc<Self> {
        let (snapshots, _) = watch::channel(ControllerSnapshot::default());
        Arc::new(Self {
            gateway,
            config,
            inner: Mutex::new(ControllerState::new()),
            snapshots,
        })
    }

    pub fn subscribe(&self) -> watch::Receiver<ControllerSnapshot> {
        self.snapshots.subscribe()
    }

    pub async fn snapshot(&self) -> ControllerSnapshot {
        self.inner.lock().await.snapshot()
    }

    fn publish(&self, state: &ControllerState) {
        self.snapshots.send_replace(state.snapshot());
    }

    /// Session provider hook; refreshes the deposit once per new session.
    ///
    /// The transition is applied before the refresh runs. If the refresh then
    /// fails, the error is returned but the new session stays installed with
    /// an `Unknown` deposit; read [`UploadController::snapshot`] to see it.
    pub async fn observe_session(
        &self,
        session: Option<Session>,
    ) -> Result<SessionTransition, ControllerError> {
        let transition = {
            let mut guard = self.inner.lock().await;
            let transition = SessionTransition::between(guard.session.as_ref(), session.as_ref());
            if transition == SessionTransition::Unchanged {
                return Ok(transition);
            }
            guard.begin_session(session);
            debug!(
                ?transition,
                session_epoch = guard.session_epoch,
                address = guard.session.as_ref().map(|s| s.address()),
                "controller: session transition"
            );
            self.publish(&guard);
            transition
        };

        if transition.requires_refresh() {
            self.refresh_deposit().await?;
        }
        Ok(transition)
    }

    pub async fn refresh_deposit(&self) -> Result<DepositState, ControllerError> {
        let (session, generation) = self.inner.lock().await.active_session()?;

        let funded = self
            .gateway
            .has_deposit(&session)
            .await
            .map_err(|source| ControllerError::gateway(Action::RefreshDeposit, source))?;

        let mut guard = self.inner.lock().await;
        guard.ensure_generation(generation, Action::RefreshDeposit)?;
        guard.deposit = if funded {
            DepositState::Funded
        } else {
            DepositState::NotFunded
        };
        debug!(deposit = ?guard.deposit, "controller: deposit refreshed");
        self.publish(&guard);
        Ok(guard.deposit)
    }

    /// Adds a deposit. A redundant submission while funded is left to the gateway to reject.
    pub async fn submit_deposit(&self) -> Result<(), ControllerError> {
        let (session, generation) = self.inner.lock().await.active_session()?;

        self.gateway
            .add_deposit(&session)
            .await
            .map_err(|source| ControllerError::gateway(Action::SubmitDeposit, source))?;

        let mut guard = self.inner.lock().await;
        guard.ensure_generation(generation, Action::SubmitDeposit)?;
        guard.deposit = DepositState::Funded;
        debug!("controller: deposit funded");
        self.publish(&guard);
        Ok(())
    }

    /// Stores one file. At most one upload is outstanding at a time.
    pub async fn upload(&self, file: FileUpload) -> Result<UploadRecord, ControllerError> {
        let (session, session_epoch) = {
            let mut guard = self.inner.lock().await;
            let (session, _) = guard.active_session()?;
            if guard.in_flight {
                return Err(ControllerError::UploadInFlight);
            }
            if guard.deposit != DepositState::Funded {
                return Err(ControllerError::DepositNotFunded {
                    state: guard.deposit,
                });
            }
            guard.in_flight = true;
            self.publish(&guard);
            (session, guard.session_epoch)
        };

        let file_name = file.name.clone();
        let size_bytes = file.bytes.len();
        debug!(file_name = %file_name, size_bytes, session_epoch, "controller: store started");
        let result = self.gateway.store(&session, file).await;

        let mut guard = self.inner.lock().await;
        // A newer session owns the flag once the epoch has moved. Restart and
        // release keep the epoch, so a file stored across them is still recorded.
        if guard.session_epoch != session_epoch {
            return match result {
                Ok(_) => Err(ControllerError::SessionChanged {
                    action: Action::Upload,
                }),
                Err(source) => Err(ControllerError::gateway(Action::Upload, source)),
            };
        }
        guard.in_flight = false;
        self.publish(&guard);

        let stored = result.map_err(|source| ControllerError::gateway(Action::Upload, source))?;

        if stored.id.is_empty() {
            return Err(ControllerError::contract(
                Action::Upload,
                "store result carries an empty request id",
            ));
        }
        if stored.content_id().is_empty() {
            return Err(ControllerError::contract(
                Action::Upload,
                "store result carries an empty content identifier",
            ));
        }

        let record = UploadRecord {
            cid: stored.content_id().clone(),
            id: stored.id,
            status_code: stored.status_code,
            file_name,
            size_bytes,
            stored_at: Utc::now(),
        };
        guard.ledger.push(record.clone());
        debug!(
            request_id = %record.id,
            cid = %record.cid,
            ledger_len = guard.ledger.len(),
            "controller: upload recorded"
        );
        self.publish(&guard);
        Ok(record)
    }

    /// Fetches the current deal status of a ledger record. Nothing is cached.
    pub async fn query_status(
        &self,
        request_id: &RequestId,
    ) -> Result<StatusReport, ControllerError> {
        if request_id.is_empty() {
            return Err(ControllerError::NoActiveRecord);
        }
        let session = {
            let guard = self.inner.lock().await;
            let (session, _) = guard.active_session()?;
            if !guard.ledger.iter().any(|record| &record.id == request_id) {
                return Err(ControllerError::UnknownRecord(request_id.clone()));
            }
            session
        };

        let response = self
            .gateway
            .status(&session, request_id)
            .await
            .map_err(|source| ControllerError::gateway(Action::QueryStatus, source))?;

        if &response.request.id != request_id {
            return Err(ControllerError::contract(
                Action::QueryStatus,
                format!(
                    "asked for request {request_id}, got {}",
                    response.request.id
                ),
            ));
        }
        let code = response.request.status_code;
        let status =
            DealStatus::from_code(code).ok_or_else(|| ControllerError::UnknownStatusCode {
                request_id: request_id.clone(),
                code,
            })?;

        Ok(StatusReport {
            request_id: request_id.clone(),
            status,
        })
    }

    pub async fn release_deposit(&self) -> Result<ReleaseOutcome, ControllerError> {
        let (session, generation) = self.inner.lock().await.active_session()?;

        self.gateway
            .release_deposits(&session)
            .await
            .map_err(|source| ControllerError::gateway(Action::ReleaseDeposit, source))?;

        match self.config.release_policy {
            ReleasePolicy::RequireRestart => Ok(ReleaseOutcome { state_reset: false }),
            ReleasePolicy::ResetInProcess => {
                let mut guard = self.inner.lock().await;
                guard.ensure_generation(generation, Action::ReleaseDeposit)?;
                guard.reset();
                guard.deposit = DepositState::NotFunded;
                debug!(
                    generation = guard.generation,
                    "controller: deposit released, session state cleared"
                );
                self.publish(&guard);
                Ok(ReleaseOutcome { state_reset: true })
            }
        }
    }

    /// Full in-process restart: clears derived state and re-checks the deposit.
    pub async fn restart(&self) -> Result<DepositState, ControllerError> {
        let has_session = {
            let mut guard = self.inner.lock().await;
            guard.reset();
            debug!(generation = guard.generation, "controller: restarted");
            self.publish(&guard);
            guard.session.is_some()
        };

        if has_session {
            self.refresh_deposit().await
        } else {
            Ok(DepositState::Unknown)
        }
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
