use std::sync::OnceLock;

use chrono::NaiveDate;
use fapiao_core::{ExtractedRecord, Money};

use crate::classify::Classifier;
use crate::pattern::{first_match, tier, PatternRule};

// ── Rule tables ───────────────────────────────────────────────────────────────
//
// Order is significant everywhere below: earlier rules win over later ones no
// matter where in the text they match.

/// Amounts read from these labels already include tax.
const GRAND_TOTAL: &str = "grand_total";

macro_rules! table {
    ($name:ident, $ty:ty, $build:expr) => {
        fn $name() -> &'static [PatternRule<$ty>] {
            static T: OnceLock<Vec<PatternRule<$ty>>> = OnceLock::new();
            T.get_or_init($build)
        }
    };
}

table!(number_rules, String, || {
    tier(
        "number",
        &[
            r"订单号[:：]\s*([A-Za-z0-9]+)",
            r"发票号码[:：]\s*([A-Z0-9]+)",
            r"发票代码[:：]\s*([A-Z0-9]+)\s*发票号码[:：]\s*([A-Z0-9]+)",
            r"票据号码[:：]\s*([A-Z0-9]+)",
            r"行程单号[:：]\s*([A-Z0-9]+)",
            r"订单编号[:：]\s*([A-Z0-9]+)",
            r"发票号[:：]\s*([A-Z0-9]+)",
            r"票号[:：]\s*([A-Z0-9]+)",
            r"单据号[:：]\s*([A-Z0-9]+)",
            r"编号[:：]\s*([A-Z0-9]+)",
            // First row of a trip-detail table.
            r"序号\s+车型\s+上车时间.*?\n1\s+.*?\s+([A-Z0-9]+)",
            r"订单[\s:：]*([A-Za-z0-9]+)",
            r"共\d+笔行程.*?订单[\s:：]*([A-Za-z0-9]+)",
        ],
        |s: &str| Some(s.to_string()),
    )
});

table!(amount_rules, Money, || {
    let mut rules = tier(
        GRAND_TOTAL,
        &[
            r"价税合计[:：]\s*¥?\s*([0-9,.]+)",
            r"价税合计[:：]\s*([0-9,.]+)\s*元",
            r"总\s*计[:：]\s*¥?\s*([0-9,.]+)",
            r"总\s*计[:：]\s*([0-9,.]+)\s*元",
            r"合计金额[:：]\s*¥?\s*([0-9,.]+)",
            r"合计金额[:：]\s*([0-9,.]+)\s*元",
            r"总金额[:：]\s*¥?\s*([0-9,.]+)",
            r"总金额[:：]\s*([0-9,.]+)",
        ],
        Money::parse,
    );
    rules.extend(tier(
        "paid",
        &[
            r"实付金额[:：]\s*¥?\s*([0-9,.]+)",
            r"实付金额[:：]\s*([0-9,.]+)\s*元",
            r"实付\s*¥?\s*([0-9,.]+)",
            r"实付\s*([0-9,.]+)\s*元",
        ],
        Money::parse,
    ));
    rules.extend(tier(
        "trip_summary",
        &[
            r"共\d+笔行程，\s*合计\s*¥?\s*([0-9,.]+)\s*元",
            r"共\d+笔行程，\s*合计\s*([0-9,.]+)\s*元",
            r"支付金额[:：]\s*¥?\s*([0-9,.]+)",
            r"支付金额[:：]\s*([0-9,.]+)\s*元",
            r"费用[:：]\s*¥?\s*([0-9,.]+)",
            r"费用[:：]\s*([0-9,.]+)\s*元",
        ],
        Money::parse,
    ));
    rules.extend(tier(
        "generic",
        &[
            r"金额[:：]\s*¥?\s*([0-9,.]+)",
            r"金额[:：]\s*([0-9,.]+)",
            r"小写金额[:：]\s*¥?\s*([0-9,.]+)",
            r"小写金额[:：]\s*([0-9,.]+)",
            r"合计[:：]\s*¥?\s*([0-9,.]+)",
            r"合计[:：]\s*([0-9,.]+)\s*元",
            r"总价款[:：]\s*¥?\s*([0-9,.]+)",
            r"总价款[:：]\s*([0-9,.]+)\s*元",
            r"应付[:：]\s*¥?\s*([0-9,.]+)",
            r"应付[:：]\s*([0-9,.]+)\s*元",
            r"结算金额[:：]\s*¥?\s*([0-9,.]+)",
            r"结算金额[:：]\s*([0-9,.]+)\s*元",
            r"消费金额[:：]\s*¥?\s*([0-9,.]+)",
            r"消费金额[:：]\s*([0-9,.]+)\s*元",
            r"金额\s*\(小写\)[:：]\s*¥?\s*([0-9,.]+)",
            r"金额\s*\(小写\)[:：]\s*([0-9,.]+)",
        ],
        Money::parse,
    ));
    rules.extend(tier(
        "currency_prefix",
        &[r"¥\s*([0-9,.]+)", r"￥\s*([0-9,.]+)"],
        Money::parse,
    ));
    rules.extend(tier(
        "currency_suffix",
        &[
            r"\s*([0-9,.]+)\s*元\s*$",
            r"\s*([0-9,.]+)\s*元\s*\*",
            r"\*\s*([0-9,.]+)\s*元",
        ],
        Money::parse,
    ));
    rules.extend(tier("table_column", &[r"金额\[元\]\s+([0-9,.]+)"], Money::parse));
    rules
});

table!(tax_rules, Money, || {
    let mut rules = tier(
        "tax_labeled",
        &[
            r"税额[:：]\s*([0-9,.]+)\s*(?:元|¥|￥)",
            r"税率[:：]\s*\d+%\s*税额[:：]\s*([0-9,.]+)\s*(?:元|¥|￥)",
            r"税额\(\d+%\):\s*([0-9,.]+)\s*(?:元|¥|￥)",
            r"增值税额[:：]\s*([0-9,.]+)\s*(?:元|¥|￥)",
            r"增值税\s*([0-9,.]+)\s*(?:元|¥|￥)",
            r"税额\s*=\s*([0-9,.]+)",
            r"税\s*金[:：]\s*([0-9,.]+)\s*(?:元|¥|￥)",
            r"税额\s*\(小写\)[:：]\s*([0-9,.]+)",
            // A value and the 税 after it must sit on the same line.
            r"(?:¥|￥)\s*([0-9,.]+)[ \t]*\(税\)",
            r"(?:¥|￥)\s*([0-9,.]+)[ \t]*税",
        ],
        Money::parse,
    );
    rules.extend(tier(
        "tax_itinerary",
        &[
            r"税额\[元?\]\s*[:：]?\s*([0-9,.]+)",
            r"税费\s*(?:¥|￥)?\s*([0-9,.]+)",
            r"含税\s*([0-9,.]+)\s*不含税",
        ],
        Money::parse,
    ));
    rules.extend(tier(
        "tax_from_total",
        &[
            r"(?:价税合计|总计)[:：]\s*(?:¥|￥)?\s*[0-9,.]+\s*[,，]\s*税额\s*[:：]?\s*(?:¥|￥)?\s*([0-9,.]+)",
            r"(?:价税合计|总计)[:：]\s*(?:¥|￥)?\s*[0-9,.]+\s*[,，]\s*其中税额\s*[:：]?\s*(?:¥|￥)?\s*([0-9,.]+)",
            r"税额\s*(?:¥|￥)?\s*([0-9,.]+)\s*[,，]?\s*(?:价税合计|不含税)",
            r"(?:其中|其中税额)[:：]?\s*(?:¥|￥)?\s*([0-9,.]+)[ \t]*(?:元|¥|￥)?[ \t]*税",
        ],
        Money::parse,
    ));
    rules.extend(tier(
        "tax_fallback",
        &[
            r"税额[:：]\s*(?:¥|￥)?\s*([0-9,.]+)",
            r"(?:税|增值税)[:：]?\s*(?:¥|￥)?\s*([0-9,.]+)",
        ],
        Money::parse,
    ));
    rules
});

table!(date_rules, NaiveDate, || {
    let mut rules = tier("date_cjk", &[r"开票日期[:：]\s*(\d{4}年\d{1,2}月\d{1,2}日)"], parse_cjk_date);
    rules.extend(tier("date_iso", &[r"日期[:：]\s*(\d{4}-\d{2}-\d{2})"], parse_iso_date));
    rules.extend(tier("date_cjk", &[r"(\d{4}年\d{1,2}月\d{1,2}日)"], parse_cjk_date));
    rules.extend(tier(
        "date_trip",
        &[
            r"出行日期[:：]\s*(\d{4}-\d{2}-\d{2})",
            r"乘车日期[:：]\s*(\d{4}-\d{2}-\d{2})",
            r"订单时间[:：]\s*(\d{4}-\d{2}-\d{2})",
        ],
        parse_iso_date,
    ));
    rules.extend(tier(
        "date_iso",
        &[
            r"日期\s*\(DATE\):\s*(\d{4}-\d{2}-\d{2})",
            r"制单日期[:：]\s*(\d{4}-\d{2}-\d{2})",
            r"发生日期[:：]\s*(\d{4}-\d{2}-\d{2})",
            r"交易日期[:：]\s*(\d{4}-\d{2}-\d{2})",
            r"(\d{4}-\d{2}-\d{2})",
        ],
        parse_iso_date,
    ));
    rules.extend(tier("date_compact", &[r"(\d{8})"], parse_compact_date));
    rules.extend(tier(
        "date_slash",
        &[r"(\d{4}/\d{2}/\d{2})", r"(\d{2}/\d{2}/\d{4})"],
        parse_slash_date,
    ));
    rules
});

// ── Public extraction API ─────────────────────────────────────────────────────

pub struct Extractor;

impl Extractor {
    /// Extract structured fields from raw document text. Never fails: fields
    /// that cannot be recovered are left empty.
    pub fn extract(text: &str) -> ExtractedRecord {
        let (amount, amount_includes_tax) = match Self::extract_amount(text) {
            Some((value, tier)) => (Some(value), tier == GRAND_TOTAL),
            None => (None, false),
        };

        let record = ExtractedRecord {
            document_number: Self::extract_number(text),
            amount,
            tax_amount: Self::extract_tax(text),
            issue_date: Self::extract_date(text),
            document_type: Classifier::classify(text),
            amount_includes_tax,
        };
        tracing::debug!(
            number = ?record.document_number,
            amount = ?record.amount,
            tax = ?record.tax_amount,
            date = ?record.issue_date,
            kind = %record.document_type,
            "extracted document fields"
        );
        record
    }

    pub fn extract_number(text: &str) -> Option<String> {
        first_match(number_rules(), text).map(|(_, v)| v)
    }

    /// Returns the amount together with the tier it was found in.
    pub fn extract_amount(text: &str) -> Option<(Money, &'static str)> {
        first_match(amount_rules(), text).map(|(rule, v)| (v, rule.tier))
    }

    pub fn extract_tax(text: &str) -> Option<Money> {
        first_match(tax_rules(), text).map(|(_, v)| v)
    }

    pub fn extract_date(text: &str) -> Option<NaiveDate> {
        first_match(date_rules(), text).map(|(_, v)| v)
    }
}

// ── Date helpers ──────────────────────────────────────────────────────────────

fn ymd(y: &str, m: &str, d: &str) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(y.parse().ok()?, m.parse().ok()?, d.parse().ok()?)
}

/// `2025年08月14日`
fn parse_cjk_date(s: &str) -> Option<NaiveDate> {
    let (y, rest) = s.split_once('年')?;
    let (m, rest) = rest.split_once('月')?;
    let d = rest.strip_suffix('日')?;
    ymd(y, m, d)
}

/// `2025-08-14`
fn parse_iso_date(s: &str) -> Option<NaiveDate> {
    let mut parts = s.splitn(3, '-');
    ymd(parts.next()?, parts.next()?, parts.next()?)
}

/// `20250814`
fn parse_compact_date(s: &str) -> Option<NaiveDate> {
    if s.len() != 8 || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    ymd(&s[..4], &s[4..6], &s[6..])
}

/// `2025/08/14`, else `08/14/2025`.
fn parse_slash_date(s: &str) -> Option<NaiveDate> {
    let parts: Vec<&str> = s.split('/').collect();
    let [a, b, c] = parts.as_slice() else {
        return None;
    };
    let year_month_day = if a.len() == 4 { ymd(a, b, c) } else { None };
    year_month_day.or_else(|| if c.len() == 4 { ymd(c, a, b) } else { None })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
