use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Args, ValueEnum};
use serde::Serialize;
use serde_json::json;

use fapiao::InvoicePipeline;
use fapiao_core::{AppConfig, ExtractedRecord, NamingParams, ReimbursementStatus};
use fapiao_extract::{default_source, Classifier, Extractor};
use fapiao_storage::{CanonicalNamer, FsStore};

#[derive(Args)]
pub struct ExtractArgs {
    /// Documents to read
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Include the full extracted text in the output
    #[arg(long)]
    with_text: bool,
}

#[derive(Args)]
pub struct ImportArgs {
    /// Documents to import
    #[arg(required = true)]
    files: Vec<PathBuf>,

    #[command(flatten)]
    naming: NamingArgs,
}

#[derive(Args)]
pub struct ToggleArgs {
    /// A previously stored copy
    path: PathBuf,

    /// Folder to move the document into
    #[arg(long, value_enum)]
    to: Folder,

    /// JSON file holding the record saved at import time
    #[arg(long)]
    record: Option<PathBuf>,

    #[command(flatten)]
    naming: NamingArgs,
}

#[derive(Args)]
struct NamingArgs {
    /// Category inserted into the file name after the date
    #[arg(long)]
    category: Option<String>,

    /// Display colour for the category
    #[arg(long)]
    color: Option<String>,
}

impl NamingArgs {
    fn params(self) -> NamingParams {
        NamingParams { category: self.category, category_color: self.color }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum Folder {
    Reimbursed,
    Pending,
}

impl From<Folder> for ReimbursementStatus {
    fn from(folder: Folder) -> Self {
        ReimbursementStatus::from_flag(matches!(folder, Folder::Reimbursed))
    }
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<AppConfig> {
    match path {
        Some(path) => Ok(AppConfig::from_file(path)?),
        None => Ok(AppConfig::default()),
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn extract(args: ExtractArgs) -> anyhow::Result<()> {
    let source = default_source();
    let mut out = Vec::with_capacity(args.files.len());
    for path in &args.files {
        let text = source.text_or_empty(path);
        let record = Extractor::extract(&text);
        let rule = Classifier::classify_with_rule(&text).map(|(_, name)| name);
        let total = record.tax_inclusive_total().map(|m| m.to_string());
        let mut entry = json!({
            "source": path,
            "record": record,
            "total": total,
            "matched_rule": rule,
        });
        if args.with_text {
            entry["raw_text"] = json!(text);
        }
        out.push(entry);
    }
    print_json(&out)
}

pub fn import(args: ImportArgs, config: AppConfig) -> anyhow::Result<()> {
    let pipeline = InvoicePipeline::new(default_source(), CanonicalNamer::new(config, FsStore));
    let report = pipeline.import_batch(&args.files, &args.naming.params());
    print_json(&report)?;

    if !report.failures.is_empty() {
        for failure in &report.failures {
            eprintln!("{}: {}", failure.source.display(), failure.error);
        }
        anyhow::bail!(
            "{} of {} documents failed to import",
            report.failures.len(),
            args.files.len()
        );
    }
    Ok(())
}

pub fn toggle(args: ToggleArgs, config: AppConfig) -> anyhow::Result<()> {
    let source = default_source();
    let persisted = match &args.record {
        Some(path) => read_record(path)?,
        None => Extractor::extract(&source.text_or_empty(&args.path)),
    };

    let pipeline = InvoicePipeline::new(source, CanonicalNamer::new(config, FsStore));
    let toggled = pipeline
        .toggle_reimbursement(&args.path, &persisted, args.to.into(), &args.naming.params())
        .with_context(|| format!("Failed to toggle {}", args.path.display()))?;
    print_json(&toggled)
}

fn read_record(path: &Path) -> anyhow::Result<ExtractedRecord> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read record {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Invalid record JSON in {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use fapiao_core::{DocumentType, Money};

    #[test]
    fn missing_config_flag_uses_defaults() {
        assert_eq!(load_config(None).unwrap(), AppConfig::default());
    }

    #[test]
    fn config_file_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fapiao.toml");
        std::fs::write(&path, "invoices_root = \"/srv/receipts\"\n").unwrap();
        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.invoices_root, PathBuf::from("/srv/receipts"));
    }

    #[test]
    fn unreadable_config_is_an_error() {
        assert!(load_config(Some(Path::new("/nonexistent/fapiao.toml"))).is_err());
    }

    #[test]
    fn record_file_round_trips_labels() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("record.json");
        std::fs::write(
            &path,
            r#"{"document_number":"ABC123","amount":"258.00","tax_amount":null,
                "issue_date":"2025-08-14","document_type":"滴滴电子发票"}"#,
        )
        .unwrap();
        let record = read_record(&path).unwrap();
        assert_eq!(record.document_type, DocumentType::DidiInvoice);
        assert_eq!(record.amount, Money::parse("258"));
        assert!(!record.amount_includes_tax);
    }

    #[test]
    fn record_file_with_negative_amount_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("record.json");
        std::fs::write(&path, r#"{"amount":"-5","document_type":"其他票据"}"#).unwrap();
        assert!(read_record(&path).is_err());
    }

    #[test]
    fn folder_maps_to_status() {
        assert_eq!(ReimbursementStatus::from(Folder::Reimbursed), ReimbursementStatus::Reimbursed);
        assert_eq!(ReimbursementStatus::from(Folder::Pending), ReimbursementStatus::NotReimbursed);
    }

    #[test]
    fn naming_args_become_params() {
        let params = NamingArgs { category: Some("交通费".into()), color: Some("#3366ff".into()) }.params();
        assert_eq!(params.category.as_deref(), Some("交通费"));
        assert_eq!(params.category_color.as_deref(), Some("#3366ff"));
    }
}
