use chrono::NaiveDateTime;
use fapiao_core::{AppConfig, ExtractedRecord, NamingParams, ReimbursementStatus};
use serde::Serialize;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::hash::content_digest;
use crate::store::DocumentStore;

#[derive(Debug, Error)]
pub enum NamingError {
    #[error("IO error on {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
}

fn io_err(path: &Path) -> impl FnOnce(io::Error) -> NamingError + '_ {
    move |source| NamingError::Io { path: path.to_path_buf(), source }
}

/// Source of "today" and the time-of-day disambiguation suffix.
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        chrono::Local::now().naive_local()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDateTime);

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreOutcome {
    /// Nothing was at the canonical path; the document was written there.
    Written,
    /// Identical bytes were already at the canonical path; nothing written.
    Reused,
    /// Different bytes held the canonical path; written under a time suffix.
    Disambiguated,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NamedDocument {
    pub path: PathBuf,
    pub outcome: StoreOutcome,
    /// SHA-256 hex of the stored bytes.
    pub digest: String,
}

/// Derives canonical file names and stores documents under them.
pub struct CanonicalNamer<S: DocumentStore, C: Clock = SystemClock> {
    config: AppConfig,
    store: S,
    clock: C,
}

impl<S: DocumentStore> CanonicalNamer<S, SystemClock> {
    pub fn new(config: AppConfig, store: S) -> Self {
        Self { config, store, clock: SystemClock }
    }
}

impl<S: DocumentStore, C: Clock> CanonicalNamer<S, C> {
    pub fn with_clock(config: AppConfig, store: S, clock: C) -> Self {
        Self { config, store, clock }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// `{date}[_{category}]_{type}_{total}_{number}`; a pure function of the
    /// record, the params and the clock's date.
    pub fn stem(&self, record: &ExtractedRecord, params: &NamingParams) -> String {
        let date = record
            .issue_date
            .unwrap_or_else(|| self.clock.now().date())
            .format("%Y%m%d")
            .to_string();
        let total = record
            .tax_inclusive_total()
            .map(|m| m.to_string())
            .unwrap_or_else(|| self.config.amount_placeholder.clone());
        let number = record
            .document_number
            .as_deref()
            .unwrap_or(self.config.number_placeholder.as_str());

        let mut parts = vec![date];
        if let Some(category) = params.category.as_deref().filter(|c| !c.trim().is_empty()) {
            parts.push(sanitize(category.trim()));
        }
        parts.push(record.document_type.to_string());
        parts.push(total);
        parts.push(sanitize(number));
        parts.join("_")
    }

    /// Where the document would be stored before any dedup decision.
    pub fn candidate_path(
        &self,
        record: &ExtractedRecord,
        status: ReimbursementStatus,
        params: &NamingParams,
        extension: &str,
    ) -> PathBuf {
        self.config
            .folder_for(status)
            .join(file_name(&self.stem(record, params), extension))
    }

    /// Store `bytes` under the canonical name for `record` in the folder for
    /// `status`, reusing an identical existing file.
    ///
    /// Two different documents with the same stem stored within the same
    /// wall-clock second still collide on the suffixed name; the later one
    /// overwrites.
    pub fn store_document(
        &self,
        record: &ExtractedRecord,
        status: ReimbursementStatus,
        params: &NamingParams,
        bytes: &[u8],
        extension: &str,
    ) -> Result<NamedDocument, NamingError> {
        let folder = self.config.folder_for(status);
        self.store.create_dir_all(&folder).map_err(io_err(&folder))?;

        let stem = self.stem(record, params);
        let candidate = folder.join(file_name(&stem, extension));

        let (path, outcome) = if self.store.exists(&candidate) {
            self.resolve_existing(&folder, &stem, extension, candidate, bytes)?
        } else {
            match self.store.create_new(&candidate, bytes) {
                Ok(()) => (candidate, StoreOutcome::Written),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    tracing::debug!("{} appeared while importing; comparing", candidate.display());
                    self.resolve_existing(&folder, &stem, extension, candidate, bytes)?
                }
                Err(e) => return Err(io_err(&candidate)(e)),
            }
        };

        tracing::info!(path = %path.display(), ?outcome, "stored document");
        Ok(NamedDocument { path, outcome, digest: content_digest(bytes) })
    }

    fn resolve_existing(
        &self,
        folder: &Path,
        stem: &str,
        extension: &str,
        candidate: PathBuf,
        bytes: &[u8],
    ) -> Result<(PathBuf, StoreOutcome), NamingError> {
        if self.store.same_content(&candidate, bytes).map_err(io_err(&candidate))? {
            return Ok((candidate, StoreOutcome::Reused));
        }

        let suffix = self.clock.now().format("%H%M%S");
        let path = folder.join(file_name(&format!("{stem}_{suffix}"), extension));
        if self.store.exists(&path) {
            if self.store.same_content(&path, bytes).map_err(io_err(&path))? {
                return Ok((path, StoreOutcome::Reused));
            }
            tracing::warn!("{} already holds different content; overwriting", path.display());
        }
        self.store.write(&path, bytes).map_err(io_err(&path))?;
        Ok((path, StoreOutcome::Disambiguated))
    }
}

fn file_name(stem: &str, extension: &str) -> String {
    let ext = extension.trim_start_matches('.');
    if ext.is_empty() {
        stem.to_string()
    } else {
        format!("{stem}.{ext}")
    }
}

/// Replace characters that cannot appear in a file name component.
fn sanitize(component: &str) -> String {
    component
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect()
}
