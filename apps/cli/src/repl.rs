//! Line-oriented front end: plays session provider and presentation layer.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{Context, Result};
use client_core::{
    notice::{deposit_banner, Notice},
    Action, ControllerError, ControllerSnapshot, FileUpload, Session, Severity, Signer,
    UploadController,
};
use shared::domain::RequestId;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::info;

const HELP: &str = "\
commands:
  connect            connect the configured wallet
  disconnect         drop the wallet session
  deposit            add a deposit
  upload <path>      store a file (requires a funded deposit)
  status [id]        deal status of an upload (defaults to the latest one)
  release            release deposits
  restart            clear local state and re-check the deposit
  list               show this session's uploads
  quit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Connect,
    Disconnect,
    Deposit,
    Upload(PathBuf),
    Status(Option<String>),
    Release,
    Restart,
    List,
    Help,
    Quit,
}

pub fn parse_command(line: &str) -> Result<Option<Command>, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let (verb, rest) = match line.split_once(char::is_whitespace) {
        Some((verb, rest)) => (verb, rest.trim()),
        None => (line, ""),
    };

    let command = match verb.to_ascii_lowercase().as_str() {
        "connect" => Command::Connect,
        "disconnect" => Command::Disconnect,
        "deposit" => Command::Deposit,
        "upload" if rest.is_empty() => return Err("usage: upload <path>".to_string()),
        "upload" => Command::Upload(PathBuf::from(rest)),
        "status" => Command::Status((!rest.is_empty()).then(|| rest.to_string())),
        "release" => Command::Release,
        "restart" => Command::Restart,
        "list" | "ls" => Command::List,
        "help" | "?" => Command::Help,
        "quit" | "exit" => Command::Quit,
        other => return Err(format!("unknown command '{other}', try 'help'")),
    };
    Ok(Some(command))
}

pub struct Repl {
    controller: Arc<UploadController>,
    signer: Option<Arc<dyn Signer>>,
    address: Option<String>,
}

impl Repl {
    pub fn new(
        controller: Arc<UploadController>,
        signer: Option<Arc<dyn Signer>>,
        address: Option<String>,
    ) -> Self {
        Self {
            controller,
            signer,
            address,
        }
    }

    fn session(&self) -> Option<Session> {
        let signer = Arc::clone(self.signer.as_ref()?);
        Some(match &self.address {
            Some(address) => Session::new(address.clone(), signer),
            None => Session::from_signer(signer),
        })
    }

    pub async fn run<R>(&self, input: R) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
    {
        println!("{HELP}");
        if self.signer.is_some() {
            self.execute(Command::Connect).await?;
        } else {
            println!("no signer configured; set SIGNER_SEED to connect a wallet");
        }

        let mut lines = input.lines();
        while let Some(line) = lines.next_line().await.context("failed to read command")? {
            match parse_command(&line) {
                Ok(Some(Command::Quit)) => break,
                Ok(Some(command)) => self.execute(command).await?,
                Ok(None) => {}
                Err(usage) => println!("{usage}"),
            }
        }
        Ok(())
    }

    async fn execute(&self, command: Command) -> Result<()> {
        match command {
            Command::Connect => {
                let Some(session) = self.session() else {
                    println!("no signer configured");
                    return Ok(());
                };
                info!(address = session.address(), "wallet connected");
                let result = self.controller.observe_session(Some(session)).await;
                self.report(Action::RefreshDeposit, result.map(|_| None));
            }
            Command::Disconnect => {
                let result = self.controller.observe_session(None).await;
                self.report(Action::RefreshDeposit, result.map(|_| None));
            }
            Command::Deposit => {
                let result = self.controller.submit_deposit().await;
                self.report(
                    Action::SubmitDeposit,
                    result.map(|()| Some(Notice::deposit_added())),
                );
            }
            Command::Upload(path) => {
                let snapshot = self.controller.snapshot().await;
                if snapshot.in_flight {
                    println!("an upload is already in progress");
                    return Ok(());
                }
                let file = match read_upload(&path).await {
                    Ok(file) => file,
                    Err(err) => {
                        println!("error: {err:#}");
                        return Ok(());
                    }
                };
                let result = self.controller.upload(file).await;
                self.report(Action::Upload, result.map(|record| Some(Notice::stored(&record))));
            }
            Command::Status(id) => {
                let request_id = match id {
                    Some(id) => RequestId::new(id),
                    None => latest_request(&self.controller.snapshot().await),
                };
                let result = self.controller.query_status(&request_id).await;
                self.report(
                    Action::QueryStatus,
                    result.map(|report| Some(Notice::deal_status(&report))),
                );
            }
            Command::Release => {
                let result = self.controller.release_deposit().await;
                if let Ok(outcome) = &result {
                    if !outcome.state_reset {
                        println!("run 'restart' to refresh local state");
                    }
                }
                self.report(
                    Action::ReleaseDeposit,
                    result.map(|_| Some(Notice::released())),
                );
            }
            Command::Restart => {
                let result = self.controller.restart().await;
                self.report(Action::RefreshDeposit, result.map(|_| None));
            }
            Command::List => print_ledger(&self.controller.snapshot().await),
            Command::Help => println!("{HELP}"),
            Command::Quit => {}
        }

        println!("{}", deposit_banner(&self.controller.snapshot().await));
        Ok(())
    }

    fn report(&self, action: Action, result: Result<Option<Notice>, ControllerError>) {
        let notice = match result {
            Ok(Some(notice)) => notice,
            Ok(None) => return,
            Err(err) => Notice::from_error(action, &err),
        };
        match notice.severity() {
            Severity::Info => println!("{}", notice.message()),
            Severity::Warning => println!("warning: {}", notice.message()),
            Severity::Error => println!("error: {}", notice.message()),
        }
    }
}

/// The most recent upload stands in for the "active" record.
fn latest_request(snapshot: &ControllerSnapshot) -> RequestId {
    snapshot
        .ledger
        .last()
        .map(|record| record.id.clone())
        .unwrap_or_else(|| RequestId::new(""))
}

async fn read_upload(path: &Path) -> Result<FileUpload> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let mime_type = mime_guess::from_path(path)
        .first()
        .map(|mime| mime.essence_str().to_string());
    Ok(FileUpload {
        name,
        mime_type,
        bytes,
    })
}

fn print_ledger(snapshot: &ControllerSnapshot) {
    if snapshot.ledger.is_empty() {
        println!("no uploads yet");
        return;
    }
    println!("Your uploads");
    for record in &snapshot.ledger {
        println!(
            "  {}  {}  {} ({} bytes, {})",
            record.id,
            record.cid,
            record.file_name,
            record.size_bytes,
            record.stored_at.format("%Y-%m-%d %H:%M:%S")
        );
    }
}
