use fapiao_core::{ExtractedRecord, NamingParams, ReimbursementStatus};
use fapiao_extract::{is_text_document, sidecar_path, Extractor, TextSource};
use fapiao_storage::{CanonicalNamer, Clock, DocumentStore, NamedDocument, NamingError, SystemClock};
use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Stored copy not found: {0}")]
    MissingCopy(PathBuf),
    #[error(transparent)]
    Naming(#[from] NamingError),
}

/// The result of importing one document.
#[derive(Debug, Clone, Serialize)]
pub struct ImportedDocument {
    pub source: PathBuf,
    /// Full extracted text, kept for audit and search.
    pub raw_text: String,
    pub record: ExtractedRecord,
    pub stored: NamedDocument,
    pub params: NamingParams,
}

/// The result of moving a document to the other reimbursement folder.
#[derive(Debug, Clone, Serialize)]
pub struct ToggledDocument {
    pub status: ReimbursementStatus,
    pub record: ExtractedRecord,
    pub stored: NamedDocument,
    /// The copy that was toggled from. It is left on disk.
    pub previous: PathBuf,
}

#[derive(Debug, Default, Serialize)]
pub struct BatchReport {
    pub imported: Vec<ImportedDocument>,
    pub failures: Vec<BatchFailure>,
}

#[derive(Debug, Serialize)]
pub struct BatchFailure {
    pub source: PathBuf,
    pub error: String,
}

/// Orchestrates: read → text → extract + classify → name → dedup/store.
pub struct InvoicePipeline<T: TextSource, S: DocumentStore, C: Clock = SystemClock> {
    source: T,
    namer: CanonicalNamer<S, C>,
}

impl<T: TextSource, S: DocumentStore, C: Clock> InvoicePipeline<T, S, C> {
    pub fn new(source: T, namer: CanonicalNamer<S, C>) -> Self {
        Self { source, namer }
    }

    pub fn namer(&self) -> &CanonicalNamer<S, C> {
        &self.namer
    }

    /// Import a document from disk into the not-reimbursed folder.
    pub fn import_file(
        &self,
        path: &Path,
        params: &NamingParams,
    ) -> Result<ImportedDocument, PipelineError> {
        let bytes = std::fs::read(path).map_err(|source| PipelineError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let raw_text = self.source.text_or_empty(path);
        let record = Extractor::extract(&raw_text);
        let stored = self.namer.store_document(
            &record,
            ReimbursementStatus::NotReimbursed,
            params,
            &bytes,
            extension_of(path),
        )?;
        self.keep_text(&stored.path, &raw_text);

        Ok(ImportedDocument {
            source: path.to_path_buf(),
            raw_text,
            record,
            stored,
            params: params.clone(),
        })
    }

    /// Import each file independently; a failing file is recorded and the
    /// rest of the batch continues.
    pub fn import_batch(&self, paths: &[PathBuf], params: &NamingParams) -> BatchReport {
        let mut report = BatchReport::default();
        for path in paths {
            tracing::info!("Importing: {}", path.display());
            match self.import_file(path, params) {
                Ok(doc) => report.imported.push(doc),
                Err(e) => {
                    tracing::warn!("Import failed for {}: {e}", path.display());
                    report.failures.push(BatchFailure {
                        source: path.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }
        report
    }

    /// Copy a stored document into the folder for `status` under a freshly
    /// derived name. The previous copy is not removed.
    ///
    /// With `rederive_on_toggle` the text is read and parsed again from the
    /// stored copy; otherwise `persisted` is used as-is. When re-reading
    /// recovers no fields, `persisted` is used and a warning is logged.
    pub fn toggle_reimbursement(
        &self,
        stored_path: &Path,
        persisted: &ExtractedRecord,
        status: ReimbursementStatus,
        params: &NamingParams,
    ) -> Result<ToggledDocument, PipelineError> {
        let store = self.namer.store();
        if !store.exists(stored_path) {
            return Err(PipelineError::MissingCopy(stored_path.to_path_buf()));
        }
        let bytes = store.read(stored_path).map_err(|source| PipelineError::Read {
            path: stored_path.to_path_buf(),
            source,
        })?;
        let text = self.source.text_or_empty(stored_path);

        let record = if self.namer.config().rederive_on_toggle {
            let fresh = Extractor::extract(&text);
            if fresh.is_empty() {
                tracing::warn!(
                    "No fields recovered from {}; toggling with the stored record instead",
                    stored_path.display()
                );
                persisted.clone()
            } else {
                fresh
            }
        } else {
            persisted.clone()
        };

        let stored = self.namer.store_document(
            &record,
            status,
            params,
            &bytes,
            extension_of(stored_path),
        )?;
        self.keep_text(&stored.path, &text);
        tracing::info!(
            "Toggled to {status}: {} (previous copy kept at {})",
            stored.path.display(),
            stored_path.display()
        );

        Ok(ToggledDocument {
            status,
            record,
            stored,
            previous: stored_path.to_path_buf(),
        })
    }

    /// Write `text` to the sidecar of a stored copy so later re-derivation
    /// can read it. Failure only costs the sidecar.
    fn keep_text(&self, stored: &Path, text: &str) {
        if !self.namer.config().keep_text_sidecar || text.is_empty() || is_text_document(stored) {
            return;
        }
        let sidecar = sidecar_path(stored);
        if let Err(e) = self.namer.store().write(&sidecar, text.as_bytes()) {
            tracing::warn!("Failed to write text sidecar {}: {e}", sidecar.display());
        }
    }
}

fn extension_of(path: &Path) -> &str {
    path.extension().and_then(|e| e.to_str()).unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use fapiao_core::{AppConfig, DocumentType, Money};
    use fapiao_extract::{PlainTextSource, StaticText};
    use fapiao_storage::{FixedClock, FsStore, MemoryStore, StoreOutcome};

    const DIDI_TEXT: &str = "滴滴出行 电子发票\n\
                             订单号：ABC123\n\
                             开票日期：2025-08-14\n\
                             价税合计：¥258.00\n\
                             税额：18.00元\n";

    fn clock() -> FixedClock {
        FixedClock(
            NaiveDate::from_ymd_opt(2025, 9, 1)
                .unwrap()
                .and_hms_opt(10, 30, 0)
                .unwrap(),
        )
    }

    fn pipeline(
        text: &str,
        config: AppConfig,
    ) -> InvoicePipeline<StaticText, MemoryStore, FixedClock> {
        InvoicePipeline::new(
            StaticText::new(text),
            CanonicalNamer::with_clock(config, MemoryStore::new(), clock()),
        )
    }

    fn source_file(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, bytes).unwrap();
        path
    }

    #[test]
    fn import_extracts_and_names_document() {
        let dir = tempfile::tempdir().unwrap();
        let src = source_file(dir.path(), "scan.pdf", b"%PDF-didi");
        let p = pipeline(DIDI_TEXT, AppConfig::default());

        let doc = p.import_file(&src, &NamingParams::default()).unwrap();

        assert_eq!(doc.record.document_number.as_deref(), Some("ABC123"));
        assert_eq!(doc.record.amount, Money::parse("258.00"));
        assert_eq!(doc.record.tax_amount, Money::parse("18.00"));
        assert_eq!(doc.record.issue_date, NaiveDate::from_ymd_opt(2025, 8, 14));
        assert_eq!(doc.record.document_type, DocumentType::DidiInvoice);
        assert_eq!(doc.raw_text, DIDI_TEXT);
        assert_eq!(
            doc.stored.path,
            PathBuf::from("invoices/未报销/20250814_滴滴电子发票_258.00_ABC123.pdf")
        );
        assert_eq!(doc.stored.outcome, StoreOutcome::Written);
    }

    #[test]
    fn reimport_of_same_bytes_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let src = source_file(dir.path(), "scan.pdf", b"%PDF-didi");
        let p = pipeline(DIDI_TEXT, AppConfig::default());

        let first = p.import_file(&src, &NamingParams::default()).unwrap();
        let second = p.import_file(&src, &NamingParams::default()).unwrap();
        assert_eq!(first.stored.path, second.stored.path);
        assert_eq!(second.stored.outcome, StoreOutcome::Reused);
        // The copy and its text sidecar.
        assert_eq!(
            p.namer().store().paths(),
            vec![first.stored.path.clone(), sidecar_path(&first.stored.path)]
        );
    }

    #[test]
    fn sidecar_can_be_disabled() {
        let dir = tempfile::tempdir().unwrap();
        let src = source_file(dir.path(), "scan.pdf", b"%PDF-didi");
        let config = AppConfig { keep_text_sidecar: false, ..AppConfig::default() };
        let p = pipeline(DIDI_TEXT, config);

        let doc = p.import_file(&src, &NamingParams::default()).unwrap();
        assert_eq!(p.namer().store().paths(), vec![doc.stored.path]);
    }

    #[test]
    fn toggle_rederives_through_plain_text_sidecar() {
        let inbox = tempfile::tempdir().unwrap();
        let root = tempfile::tempdir().unwrap();
        let src = source_file(inbox.path(), "scan.pdf", b"%PDF-didi");
        std::fs::write(sidecar_path(&src), DIDI_TEXT).unwrap();
        let config = AppConfig { invoices_root: root.path().to_path_buf(), ..AppConfig::default() };
        let p = InvoicePipeline::new(
            PlainTextSource,
            CanonicalNamer::with_clock(config, FsStore, clock()),
        );

        let doc = p.import_file(&src, &NamingParams::default()).unwrap();
        assert_eq!(
            std::fs::read_to_string(sidecar_path(&doc.stored.path)).unwrap(),
            DIDI_TEXT
        );

        let toggled = p
            .toggle_reimbursement(
                &doc.stored.path,
                &ExtractedRecord::default(),
                ReimbursementStatus::Reimbursed,
                &NamingParams::default(),
            )
            .unwrap();
        assert_eq!(toggled.record, doc.record);
        assert_eq!(
            toggled.stored.path,
            root.path().join("已报销").join("20250814_滴滴电子发票_258.00_ABC123.pdf")
        );
        assert!(sidecar_path(&toggled.stored.path).is_file());
    }

    #[test]
    fn toggle_without_text_keeps_persisted_record() {
        let dir = tempfile::tempdir().unwrap();
        let src = source_file(dir.path(), "scan.pdf", b"%PDF-didi");
        let p = pipeline("", AppConfig::default());
        let doc = p.import_file(&src, &NamingParams::default()).unwrap();

        let persisted = ExtractedRecord {
            document_number: Some("KEPT1".into()),
            ..ExtractedRecord::default()
        };
        let toggled = p
            .toggle_reimbursement(
                &doc.stored.path,
                &persisted,
                ReimbursementStatus::Reimbursed,
                &NamingParams::default(),
            )
            .unwrap();
        assert_eq!(toggled.record, persisted);
    }

    #[test]
    fn empty_text_still_imports_with_placeholders() {
        let dir = tempfile::tempdir().unwrap();
        let src = source_file(dir.path(), "blank.pdf", b"%PDF-blank");
        let p = pipeline("", AppConfig::default());

        let doc = p.import_file(&src, &NamingParams::default()).unwrap();
        assert!(doc.record.is_empty());
        assert_eq!(doc.record.document_type, DocumentType::Other);
        assert_eq!(
            doc.stored.path,
            PathBuf::from("invoices/未报销/20250901_其他票据_未知金额_未知编号.pdf")
        );
    }

    #[test]
    fn batch_continues_past_failing_document() {
        let dir = tempfile::tempdir().unwrap();
        let good = source_file(dir.path(), "a.pdf", b"%PDF-a");
        let missing = dir.path().join("gone.pdf");
        let also_good = source_file(dir.path(), "b.pdf", b"%PDF-b");
        let p = pipeline(DIDI_TEXT, AppConfig::default());

        let report = p.import_batch(
            &[good, missing.clone(), also_good],
            &NamingParams::with_category("交通费"),
        );

        assert_eq!(report.imported.len(), 2);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].source, missing);
        // Same stem, different bytes: the second one is disambiguated.
        assert_ne!(report.imported[0].stored.path, report.imported[1].stored.path);
        assert_eq!(report.imported[1].stored.outcome, StoreOutcome::Disambiguated);
        assert!(report.imported[0]
            .stored
            .path
            .to_string_lossy()
            .contains("20250814_交通费_滴滴电子发票"));
    }

    #[test]
    fn toggle_copies_into_other_folder_and_keeps_previous() {
        let dir = tempfile::tempdir().unwrap();
        let src = source_file(dir.path(), "scan.pdf", b"%PDF-didi");
        let p = pipeline(DIDI_TEXT, AppConfig::default());
        let doc = p.import_file(&src, &NamingParams::default()).unwrap();

        let toggled = p
            .toggle_reimbursement(
                &doc.stored.path,
                &doc.record,
                ReimbursementStatus::Reimbursed,
                &NamingParams::default(),
            )
            .unwrap();

        assert_eq!(
            toggled.stored.path,
            PathBuf::from("invoices/已报销/20250814_滴滴电子发票_258.00_ABC123.pdf")
        );
        let store = p.namer().store();
        assert!(store.exists(&doc.stored.path));
        assert!(store.exists(&toggled.stored.path));
        assert_eq!(toggled.previous, doc.stored.path);
    }

    #[test]
    fn toggle_rederives_from_text_by_default() {
        let dir = tempfile::tempdir().unwrap();
        let src = source_file(dir.path(), "scan.pdf", b"%PDF-didi");
        let p = pipeline(DIDI_TEXT, AppConfig::default());
        let doc = p.import_file(&src, &NamingParams::default()).unwrap();

        let stale = ExtractedRecord::default();
        let toggled = p
            .toggle_reimbursement(
                &doc.stored.path,
                &stale,
                ReimbursementStatus::Reimbursed,
                &NamingParams::default(),
            )
            .unwrap();
        assert_eq!(toggled.record, doc.record);
    }

    #[test]
    fn toggle_reuses_persisted_record_when_configured() {
        let dir = tempfile::tempdir().unwrap();
        let src = source_file(dir.path(), "scan.pdf", b"%PDF-didi");
        let config = AppConfig { rederive_on_toggle: false, ..AppConfig::default() };
        let p = pipeline(DIDI_TEXT, config);
        let doc = p.import_file(&src, &NamingParams::default()).unwrap();

        let persisted = ExtractedRecord {
            document_number: Some("FIXED9".into()),
            ..doc.record.clone()
        };
        let toggled = p
            .toggle_reimbursement(
                &doc.stored.path,
                &persisted,
                ReimbursementStatus::Reimbursed,
                &NamingParams::default(),
            )
            .unwrap();
        assert_eq!(toggled.record.document_number.as_deref(), Some("FIXED9"));
        assert!(toggled.stored.path.ends_with("20250814_滴滴电子发票_258.00_FIXED9.pdf"));
    }

    #[test]
    fn toggle_missing_copy_is_an_error() {
        let p = pipeline(DIDI_TEXT, AppConfig::default());
        let err = p
            .toggle_reimbursement(
                Path::new("invoices/未报销/nope.pdf"),
                &ExtractedRecord::default(),
                ReimbursementStatus::Reimbursed,
                &NamingParams::default(),
            )
            .unwrap_err();
        assert!(matches!(err, PipelineError::MissingCopy(_)));
    }
}
