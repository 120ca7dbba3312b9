use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::money::Money;

/// Closed taxonomy of document labels. The Chinese label is what ends up in
/// canonical file names and in the persisted record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum DocumentType {
    DidiItinerary,
    DidiInvoice,
    DidiTicket,
    TaxiInvoice,
    TaxiItinerary,
    Food,
    Transport,
    Lodging,
    Office,
    BusinessTravel,
    Entertainment,
    Itinerary,
    ElectronicInvoice,
    #[default]
    Other,
}

impl DocumentType {
    pub const ALL: [DocumentType; 14] = [
        DocumentType::DidiItinerary,
        DocumentType::DidiInvoice,
        DocumentType::DidiTicket,
        DocumentType::TaxiInvoice,
        DocumentType::TaxiItinerary,
        DocumentType::Food,
        DocumentType::Transport,
        DocumentType::Lodging,
        DocumentType::Office,
        DocumentType::BusinessTravel,
        DocumentType::Entertainment,
        DocumentType::Itinerary,
        DocumentType::ElectronicInvoice,
        DocumentType::Other,
    ];

    pub fn label(self) -> &'static str {
        match self {
            DocumentType::DidiItinerary => "滴滴行程单",
            DocumentType::DidiInvoice => "滴滴电子发票",
            DocumentType::DidiTicket => "滴滴票据",
            DocumentType::TaxiInvoice => "出租车发票",
            DocumentType::TaxiItinerary => "出租车行程单",
            DocumentType::Food => "餐饮发票",
            DocumentType::Transport => "交通发票",
            DocumentType::Lodging => "住宿发票",
            DocumentType::Office => "办公发票",
            DocumentType::BusinessTravel => "差旅发票",
            DocumentType::Entertainment => "娱乐发票",
            DocumentType::Itinerary => "行程单",
            DocumentType::ElectronicInvoice => "电子发票",
            DocumentType::Other => "其他票据",
        }
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl std::str::FromStr for DocumentType {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DocumentType::ALL
            .into_iter()
            .find(|t| t.label() == s)
            .ok_or_else(|| format!("Unknown document type: '{s}'"))
    }
}

impl From<DocumentType> for String {
    fn from(t: DocumentType) -> Self {
        t.label().to_string()
    }
}

impl TryFrom<String> for DocumentType {
    type Error = String;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// Which folder a stored copy belongs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReimbursementStatus {
    NotReimbursed,
    Reimbursed,
}

impl ReimbursementStatus {
    pub fn from_flag(is_reimbursed: bool) -> Self {
        if is_reimbursed {
            ReimbursementStatus::Reimbursed
        } else {
            ReimbursementStatus::NotReimbursed
        }
    }

    pub fn is_reimbursed(self) -> bool {
        self == ReimbursementStatus::Reimbursed
    }

    pub fn toggled(self) -> Self {
        Self::from_flag(!self.is_reimbursed())
    }
}

impl fmt::Display for ReimbursementStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReimbursementStatus::NotReimbursed => write!(f, "not_reimbursed"),
            ReimbursementStatus::Reimbursed => write!(f, "reimbursed"),
        }
    }
}

/// Structured fields recovered from one document's text.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ExtractedRecord {
    pub document_number: Option<String>,
    pub amount: Option<Money>,
    pub tax_amount: Option<Money>,
    pub issue_date: Option<NaiveDate>,
    pub document_type: DocumentType,
    /// Set when `amount` was read from a grand-total label that already includes tax.
    #[serde(default)]
    pub amount_includes_tax: bool,
}

impl ExtractedRecord {
    /// Amount plus tax, unless the amount is already a tax-inclusive total.
    pub fn tax_inclusive_total(&self) -> Option<Money> {
        match (self.amount, self.tax_amount) {
            (Some(amount), _) if self.amount_includes_tax => Some(amount),
            // An overflowing sum is treated as unknown.
            (Some(amount), tax) => amount.checked_add(tax.unwrap_or_else(Money::zero)),
            (None, tax) => tax,
        }
    }

    /// True when none of the four optional fields were recovered.
    pub fn is_empty(&self) -> bool {
        self.document_number.is_none()
            && self.amount.is_none()
            && self.tax_amount.is_none()
            && self.issue_date.is_none()
    }
}

/// Per-import choices made by the user, passed explicitly into naming.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamingParams {
    /// Optional user category, inserted into the file stem after the date.
    pub category: Option<String>,
    /// Display colour for the category; stored with the record, never used in names.
    pub category_color: Option<String>,
}

impl NamingParams {
    pub fn with_category(category: impl Into<String>) -> Self {
        Self {
            category: Some(category.into()),
            category_color: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn money(s: &str) -> Option<Money> {
        Money::parse(s)
    }

    #[test]
    fn document_type_label_roundtrip() {
        for t in DocumentType::ALL {
            assert_eq!(DocumentType::from_str(&t.to_string()).unwrap(), t);
        }
        assert!(DocumentType::from_str("发票?").is_err());
    }

    #[test]
    fn default_type_is_other() {
        assert_eq!(DocumentType::default(), DocumentType::Other);
        assert_eq!(ExtractedRecord::default().document_type.label(), "其他票据");
    }

    #[test]
    fn document_type_serializes_as_label() {
        let json = serde_json::to_string(&DocumentType::DidiInvoice).unwrap();
        assert_eq!(json, "\"滴滴电子发票\"");
        let back: DocumentType = serde_json::from_str(&json).unwrap();
        assert_eq!(back, DocumentType::DidiInvoice);
    }

    #[test]
    fn total_adds_tax_to_net_amount() {
        let r = ExtractedRecord {
            amount: money("100.00"),
            tax_amount: money("6.00"),
            ..Default::default()
        };
        assert_eq!(r.tax_inclusive_total().unwrap().to_string(), "106.00");
    }

    #[test]
    fn total_does_not_double_count_grand_total() {
        let r = ExtractedRecord {
            amount: money("258.00"),
            tax_amount: money("18.00"),
            amount_includes_tax: true,
            ..Default::default()
        };
        assert_eq!(r.tax_inclusive_total().unwrap().to_string(), "258.00");
    }

    #[test]
    fn total_missing_tax_counts_as_zero() {
        let r = ExtractedRecord { amount: money("42.5"), ..Default::default() };
        assert_eq!(r.tax_inclusive_total().unwrap().to_string(), "42.50");
        assert_eq!(ExtractedRecord::default().tax_inclusive_total(), None);
    }

    #[test]
    fn total_overflow_is_unknown() {
        let r = ExtractedRecord {
            amount: money("79228162514264337593543950335"),
            tax_amount: money("79228162514264337593543950335"),
            ..Default::default()
        };
        assert_eq!(r.tax_inclusive_total(), None);
    }

    #[test]
    fn status_toggles() {
        assert_eq!(
            ReimbursementStatus::NotReimbursed.toggled(),
            ReimbursementStatus::Reimbursed
        );
        assert!(ReimbursementStatus::from_flag(true).is_reimbursed());
    }
}
