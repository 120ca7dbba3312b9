use fapiao_core::DocumentType;

const ITINERARY_WORDS: &[&str] = &["行程单", "乘车记录", "出行明细", "行程详情", "乘车凭证", "行程信息"];
const INVOICE_WORDS: &[&str] = &["电子发票", "发票", "增值税电子普通发票", "增值税专用发票", "普通发票"];

/// What a satisfied keyword group resolves to.
enum Outcome {
    Label(DocumentType),
    /// The first vocabulary present picks the label; otherwise `fallback`.
    /// A `None` fallback leaves the rule unsatisfied so evaluation continues.
    Split {
        branches: &'static [(&'static [&'static str], DocumentType)],
        fallback: Option<DocumentType>,
    },
}

pub struct ClassificationRule {
    pub name: &'static str,
    keywords: &'static [&'static str],
    case_insensitive: bool,
    outcome: Outcome,
}

const fn label(name: &'static str, keywords: &'static [&'static str], kind: DocumentType) -> ClassificationRule {
    ClassificationRule {
        name,
        keywords,
        case_insensitive: false,
        outcome: Outcome::Label(kind),
    }
}

/// Evaluated top to bottom; the first satisfied rule decides the label.
const RULES: &[ClassificationRule] = &[
    ClassificationRule {
        name: "didi",
        keywords: &["滴滴", "DiDi", "didi"],
        case_insensitive: true,
        outcome: Outcome::Split {
            branches: &[
                (ITINERARY_WORDS, DocumentType::DidiItinerary),
                (INVOICE_WORDS, DocumentType::DidiInvoice),
            ],
            fallback: Some(DocumentType::DidiTicket),
        },
    },
    ClassificationRule {
        name: "taxi",
        keywords: &["出租车", "Taxi", "TAXI"],
        case_insensitive: false,
        outcome: Outcome::Split {
            branches: &[
                (INVOICE_WORDS, DocumentType::TaxiInvoice),
                (ITINERARY_WORDS, DocumentType::TaxiItinerary),
            ],
            fallback: None,
        },
    },
    label("food", &["餐饮", "餐费", "美食", "饭店", "餐厅", "快餐"], DocumentType::Food),
    label(
        "transport",
        &["交通", "公交", "地铁", "高铁", "火车", "飞机", "机票", "动车"],
        DocumentType::Transport,
    ),
    label("lodging", &["酒店", "宾馆", "住宿", "旅店"], DocumentType::Lodging),
    label("office", &["办公用品", "办公", "文具", "打印", "复印"], DocumentType::Office),
    label("business_travel", &["差旅费", "差旅", "出差"], DocumentType::BusinessTravel),
    label("entertainment", &["娱乐", "KTV", "电影", "演出"], DocumentType::Entertainment),
    label("itinerary", ITINERARY_WORDS, DocumentType::Itinerary),
    label("invoice", INVOICE_WORDS, DocumentType::ElectronicInvoice),
];

fn contains_any(text: &str, words: &[&str]) -> bool {
    words.iter().any(|w| text.contains(w))
}

impl ClassificationRule {
    fn evaluate(&self, text: &str, lowered: &str) -> Option<DocumentType> {
        let hit = if self.case_insensitive {
            self.keywords.iter().any(|k| lowered.contains(&k.to_lowercase()))
        } else {
            contains_any(text, self.keywords)
        };
        if !hit {
            return None;
        }
        match &self.outcome {
            Outcome::Label(kind) => Some(*kind),
            Outcome::Split { branches, fallback } => branches
                .iter()
                .find(|(words, _)| contains_any(text, words))
                .map(|(_, kind)| *kind)
                .or(*fallback),
        }
    }
}

pub struct Classifier;

impl Classifier {
    /// Map keyword evidence to exactly one document type, `Other` when nothing matches.
    pub fn classify(text: &str) -> DocumentType {
        Self::classify_with_rule(text).map_or(DocumentType::Other, |(kind, _)| kind)
    }

    /// Like [`Classifier::classify`], also naming the rule that fired.
    pub fn classify_with_rule(text: &str) -> Option<(DocumentType, &'static str)> {
        let lowered = text.to_lowercase();
        RULES
            .iter()
            .find_map(|rule| rule.evaluate(text, &lowered).map(|kind| (kind, rule.name)))
    }
}
