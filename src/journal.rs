//! The journal's front door for exporting and importing.
//!
//! A [`Journal`] owns the store and the config, and makes sure only one
//! export or import runs at a time. The UI calls into it and polls
//! [`Journal::state`] for progress.

use std::sync::{Mutex, MutexGuard, PoisonError};

use camino::{Utf8Path, Utf8PathBuf};

use crate::{
    archive::{ArchiveReader, ArchiveWriter, CancelFlag, ImportResult},
    config::Config,
    database::Store,
    error::ArchiveError,
};

/// Which kind of run is happening.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize)]
pub enum Exchange {
    Export,
    Import,
}

/// Where the journal is in an export or import.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize)]
pub enum ExchangeState {
    #[default]
    Idle,
    Running(Exchange),
    /// The archive is ready to be shared.
    ExportReady(Utf8PathBuf),
    /// Counts and soft failures of the last import.
    ImportDone(ImportResult),
    /// The last run failed. Holds a message for the user.
    Failed(String),
}

impl ExchangeState {
    pub fn is_running(&self) -> bool {
        matches!(self, ExchangeState::Running(_))
    }
}

/// The whisky journal, as the UI sees it.
pub struct Journal<S: Store> {
    store: S,
    config: Config,
    state: Mutex<ExchangeState>,
    cancel: CancelFlag,
}

impl<S: Store> Journal<S> {
    pub fn new(store: S, config: Config) -> Self {
        Self {
            store,
            config,
            state: Mutex::new(ExchangeState::Idle),
            cancel: CancelFlag::new(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// A snapshot of the current state.
    pub fn state(&self) -> ExchangeState {
        lock(&self.state).clone()
    }

    /// Forgets the last run's outcome. Does nothing while a run is going.
    pub fn clear_state(&self) {
        let mut state = lock(&self.state);
        if !state.is_running() {
            *state = ExchangeState::Idle;
        }
    }

    /// Asks the current run to stop at its next whisky.
    pub fn cancel(&self) {
        if lock(&self.state).is_running() {
            tracing::info!("Cancelling the running export or import.");
            self.cancel.cancel();
        }
    }

    /// Exports the whole collection to a new archive in the backup directory.
    #[tracing::instrument(skip(self))]
    pub async fn export_collection(&self) -> Result<Utf8PathBuf, ArchiveError> {
        let run = self.begin(Exchange::Export)?;

        let res = ArchiveWriter::new(&self.store, &self.config)
            .with_cancel(self.cancel.clone())
            .export()
            .await;

        run.finish(match &res {
            Ok(path) => ExchangeState::ExportReady(path.clone()),
            Err(e) => ExchangeState::Failed(e.to_string()),
        });
        res
    }

    /// Merges the archive at the given path into the collection.
    #[tracing::instrument(skip(self))]
    pub async fn import_collection(&self, archive: &Utf8Path) -> ImportResult {
        let run = match self.begin(Exchange::Import) {
            Ok(run) => run,
            Err(e) => return ImportResult::failed(e.to_string()),
        };

        let result = ArchiveReader::new(&self.store, &self.config)
            .with_cancel(self.cancel.clone())
            .import(archive)
            .await;

        run.finish(ExchangeState::ImportDone(result.clone()));
        result
    }

    /// Marks a run as started, unless one already is.
    fn begin(&self, exchange: Exchange) -> Result<Run<'_>, ArchiveError> {
        let mut state = lock(&self.state);

        if let ExchangeState::Running(running) = *state {
            tracing::warn!("Asked to {exchange:?}, but an {running:?} is still running.");
            return Err(ArchiveError::Busy);
        }

        *state = ExchangeState::Running(exchange);
        self.cancel.reset();

        Ok(Run {
            state: &self.state,
            finished: false,
        })
    }
}

/// A started run. If it's dropped before finishing (the future was dropped,
/// or something panicked), the state says so.
struct Run<'a> {
    state: &'a Mutex<ExchangeState>,
    finished: bool,
}

impl Run<'_> {
    fn finish(mut self, outcome: ExchangeState) {
        *lock(self.state) = outcome;
        self.finished = true;
    }
}

impl Drop for Run<'_> {
    fn drop(&mut self) {
        if !self.finished {
            tracing::warn!("An export or import was abandoned before it finished.");
            *lock(self.state) =
                ExchangeState::Failed("The export or import stopped before it finished.".into());
        }
    }
}

// the state is always valid on its own, so a panic elsewhere doesn't spoil it
fn lock(state: &Mutex<ExchangeState>) -> MutexGuard<'_, ExchangeState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}
