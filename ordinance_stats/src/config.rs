// ********* Input data structures ***********

use std::collections::{BTreeMap, BTreeSet};
use std::error::Error;
use std::fmt::Display;

use chrono::NaiveDate;

/// Ordinal given to records whose council term is explicitly unclassifiable.
pub const UNCLASSIFIABLE_TERM_ORDINAL: u32 = 0;

/// Ordinal given to term labels that carry no number. They sort after every real term.
pub const UNPARSABLE_TERM_ORDINAL: u32 = 999;

/// Key used by the enactment-year dimension when a record has no date.
pub const UNKNOWN_YEAR_LABEL: &str = "unknown";

/// A cell of the input table, as handed over by the loading collaborator.
///
/// The variants follow what spreadsheet readers commonly produce. Categorical
/// columns accept any variant and turn it into text; the delegation column
/// interprets the variant itself (see the classification rules).
#[derive(PartialEq, Debug, Clone)]
pub enum RawValue {
    Empty,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Date(NaiveDate),
}

impl RawValue {
    pub fn is_empty(&self) -> bool {
        match self {
            RawValue::Empty => true,
            RawValue::Float(f) => f.is_nan(),
            _ => false,
        }
    }

    /// The textual form of the value, as used for categorical columns.
    /// Integral floats lose their fractional part (`3.0` -> `"3"`).
    pub fn to_category(&self) -> Option<String> {
        match self {
            RawValue::Empty => None,
            RawValue::Bool(b) => Some(b.to_string()),
            RawValue::Int(i) => Some(i.to_string()),
            RawValue::Float(f) if f.is_nan() => None,
            RawValue::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => {
                Some(format!("{}", *f as i64))
            }
            RawValue::Float(f) => Some(f.to_string()),
            RawValue::Text(s) => Some(s.clone()),
            RawValue::Date(d) => Some(d.format("%Y-%m-%d").to_string()),
        }
    }
}

impl From<&str> for RawValue {
    fn from(s: &str) -> Self {
        RawValue::Text(s.to_string())
    }
}

impl From<bool> for RawValue {
    fn from(b: bool) -> Self {
        RawValue::Bool(b)
    }
}

impl From<i64> for RawValue {
    fn from(i: i64) -> Self {
        RawValue::Int(i)
    }
}

impl From<f64> for RawValue {
    fn from(f: f64) -> Self {
        RawValue::Float(f)
    }
}

/// An in-memory table: a header and rows of raw cells.
#[derive(PartialEq, Debug, Clone, Default)]
pub struct RawTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<RawValue>>,
}

impl RawTable {
    pub fn new(columns: Vec<String>) -> RawTable {
        RawTable {
            columns,
            rows: Vec::new(),
        }
    }

    /// Position of the column with exactly this name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

// ******** Records *********

/// One ordinance after normalization.
#[derive(PartialEq, Debug, Clone)]
pub struct Record {
    pub province: String,
    pub municipality: String,
    pub subject_field: String,
    pub council_term: String,
    pub enactment_date: Option<NaiveDate>,
    /// The municipality label equals the province label: the ordinance was
    /// enacted by the province itself.
    pub is_top_level: bool,
    /// Sort key extracted from the council term label. Never used for arithmetic.
    pub term_ordinal: u32,
    /// Zero-based row index in the raw table.
    pub source_row: usize,
}

/// The two outcomes of the classification of the delegation flag.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Ord, PartialOrd)]
pub enum DelegationKind {
    Delegated,
    Autonomous,
}

impl DelegationKind {
    pub fn label(&self) -> &'static str {
        match self {
            DelegationKind::Delegated => "delegated",
            DelegationKind::Autonomous => "autonomous",
        }
    }
}

impl Display for DelegationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

#[derive(PartialEq, Debug, Clone)]
pub struct DerivedRecord {
    pub record: Record,
    pub delegation_raw: RawValue,
    pub is_delegated: bool,
}

impl DerivedRecord {
    pub fn delegation_kind(&self) -> DelegationKind {
        if self.is_delegated {
            DelegationKind::Delegated
        } else {
            DelegationKind::Autonomous
        }
    }
}

/// Counters for the non-fatal conditions met while normalizing.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct NormalizeDiagnostics {
    /// Term labels without any digit, which received the sentinel ordinal.
    pub unparsable_terms: usize,
    /// Non-empty enactment dates that could not be read. The record keeps no date.
    pub unparsable_dates: usize,
    /// Rows dropped because a required field was blank (only under `BlankFieldPolicy::Drop`).
    pub dropped_blank_rows: usize,
}

/// Counters for the classification of the delegation flag.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct ClassificationDiagnostics {
    pub delegated: usize,
    pub autonomous: usize,
    /// Empty cells, classified as autonomous.
    pub missing: usize,
    /// Text values present in neither token set, silently classified as autonomous.
    pub defaulted: usize,
    /// The normalized defaulted tokens and how often each was seen.
    pub defaulted_tokens: BTreeMap<String, usize>,
}

#[derive(PartialEq, Debug, Clone, Default)]
pub struct NormalizedTable {
    pub records: Vec<Record>,
    pub diagnostics: NormalizeDiagnostics,
}

/// The normalized and classified table. It is never modified after construction.
#[derive(PartialEq, Debug, Clone, Default)]
pub struct DerivedTable {
    pub records: Vec<DerivedRecord>,
    /// Name of the column the delegation flag was read from.
    pub delegation_column: String,
    pub normalize_diagnostics: NormalizeDiagnostics,
    pub classification_diagnostics: ClassificationDiagnostics,
}

impl DerivedTable {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn overview(&self) -> Overview {
        let provinces: BTreeSet<&str> = self
            .records
            .iter()
            .map(|r| r.record.province.as_str())
            .collect();
        let municipalities: BTreeSet<&str> = self
            .records
            .iter()
            .map(|r| r.record.municipality.as_str())
            .collect();
        Overview {
            records: self.records.len(),
            provinces: provinces.len(),
            municipalities: municipalities.len(),
            top_level_records: self.records.iter().filter(|r| r.record.is_top_level).count(),
            delegated_records: self.records.iter().filter(|r| r.is_delegated).count(),
        }
    }
}

// ******** Output data structures *********

/// Headline numbers about a derived table.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Overview {
    pub records: usize,
    pub provinces: usize,
    pub municipalities: usize,
    pub top_level_records: usize,
    pub delegated_records: usize,
}

#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum SyntheticKind {
    /// Column-wise arithmetic mean of the real rows.
    Average,
    /// Column-wise sum of the real rows.
    Total,
}

/// A row appended after the real rows. It never takes part in derived metrics.
#[derive(PartialEq, Debug, Clone)]
pub struct SyntheticRow {
    pub kind: SyntheticKind,
    pub label: String,
    pub values: Vec<f64>,
    pub total: f64,
}

/// Dense count matrix over two dimensions.
///
/// Invariants: `counts` has one vector per row key, each with one entry per
/// column key; `row_totals[r]` is the sum of `counts[r]`.
#[derive(PartialEq, Debug, Clone)]
pub struct CrossTab {
    pub row_dimension: Dimension,
    pub column_dimension: Dimension,
    pub row_keys: Vec<String>,
    pub column_keys: Vec<String>,
    pub counts: Vec<Vec<u64>>,
    pub row_totals: Vec<u64>,
    /// Natural sequence key of every row: (ordinal, position of the key among
    /// the keys in lexical order), or the canonical position after reindexing.
    /// Growth is always computed along this sequence, whatever the display order.
    pub row_sequence: Vec<(u32, usize)>,
    pub synthetic_rows: Vec<SyntheticRow>,
}

impl CrossTab {
    pub fn row_index(&self, key: &str) -> Option<usize> {
        self.row_keys.iter().position(|k| k == key)
    }

    pub fn column_index(&self, key: &str) -> Option<usize> {
        self.column_keys.iter().position(|k| k == key)
    }

    pub fn count(&self, row: &str, column: &str) -> Option<u64> {
        let r = self.row_index(row)?;
        let c = self.column_index(column)?;
        Some(self.counts[r][c])
    }

    pub fn row_total(&self, row: &str) -> Option<u64> {
        self.row_index(row).map(|r| self.row_totals[r])
    }

    /// Sum of every real cell.
    pub fn grand_total(&self) -> u64 {
        self.row_totals.iter().sum()
    }

    pub fn column_totals(&self) -> Vec<u64> {
        let mut res = vec![0; self.column_keys.len()];
        for row in self.counts.iter() {
            for (acc, c) in res.iter_mut().zip(row.iter()) {
                *acc += c;
            }
        }
        res
    }
}

/// Derived metrics for one real row of a cross-tab.
#[derive(PartialEq, Debug, Clone)]
pub struct RowMetrics {
    pub key: String,
    pub total: u64,
    pub percentage: Vec<f64>,
    /// Percentage-point change from the previous row in natural sequence.
    /// Absent for the first row.
    pub growth: Option<Vec<f64>>,
    /// Mean of `growth` across columns.
    pub average_growth: Option<f64>,
    /// Relative change of the row total from the previous row, in percent.
    /// Absent for the first row and when the previous total is zero.
    pub total_growth: Option<f64>,
    /// Population standard deviation of `percentage`.
    pub concentration: f64,
}

#[derive(PartialEq, Debug, Clone)]
pub struct DerivedMetrics {
    pub column_keys: Vec<String>,
    /// One entry per real row, in the display order of the cross-tab.
    pub rows: Vec<RowMetrics>,
    /// Mean of the defined `total_growth` values, 0 when there are none.
    pub mean_total_growth: f64,
}

impl DerivedMetrics {
    pub fn row(&self, key: &str) -> Option<&RowMetrics> {
        self.rows.iter().find(|r| r.key == key)
    }
}

#[derive(PartialEq, Debug, Clone)]
pub struct ConcentrationEntry {
    pub rank: u32,
    pub key: String,
    pub concentration: f64,
    pub total: u64,
}

/// Level of a ranked entity.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Ord, PartialOrd)]
pub enum EntityKind {
    SubUnit,
    TopLevel,
}

impl EntityKind {
    pub fn label(&self) -> &'static str {
        match self {
            EntityKind::SubUnit => "sub-unit",
            EntityKind::TopLevel => "top-level",
        }
    }
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct RankedEntry {
    pub rank: u32,
    pub province: String,
    pub municipality: String,
    pub kind: EntityKind,
    pub total: u64,
}

/// A cell of a rectangular output table.
#[derive(PartialEq, Debug, Clone)]
pub enum Cell {
    Empty,
    Text(String),
    Count(u64),
    Number(f64),
}

/// Header row plus one row per key. This is what rendering and export consume.
#[derive(PartialEq, Debug, Clone, Default)]
pub struct Table {
    pub header: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

/// Errors that stop the computation before any output is produced.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum OrdinanceError {
    /// Required columns absent from the schema.
    MissingColumns { columns: Vec<String> },
    /// No column looks like the delegation flag.
    UnresolvedClassificationColumn {
        expected: String,
        keywords: Vec<String>,
    },
    /// A required field is blank after trimming (under `BlankFieldPolicy::Reject`).
    EmptyRequiredField { row: usize, column: String },
    /// A row does not have as many cells as the header.
    RaggedRow {
        row: usize,
        expected: usize,
        found: usize,
    },
    InvalidOption { message: String },
}

impl Error for OrdinanceError {}

impl Display for OrdinanceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrdinanceError::MissingColumns { columns } => {
                write!(f, "missing required columns: {}", columns.join(", "))
            }
            OrdinanceError::UnresolvedClassificationColumn { expected, keywords } => write!(
                f,
                "no delegation column found (expected header {:?} or a header containing one of {:?})",
                expected, keywords
            ),
            OrdinanceError::EmptyRequiredField { row, column } => {
                write!(f, "row {}: required field {:?} is empty", row + 1, column)
            }
            OrdinanceError::RaggedRow {
                row,
                expected,
                found,
            } => write!(
                f,
                "row {}: expected {} cells, found {}",
                row + 1,
                expected,
                found
            ),
            OrdinanceError::InvalidOption { message } => write!(f, "invalid option: {}", message),
        }
    }
}

pub type OrdinanceResult<T> = Result<T, OrdinanceError>;

// ********* Configuration **********

/// Canonical names of the columns read by the normalizer.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ColumnNames {
    pub province: String,
    pub municipality: String,
    pub subject_field: String,
    pub council_term: String,
    /// Optional column. Its absence is not an error.
    pub enactment_date: String,
}

impl ColumnNames {
    /// Headers of the Korean ordinance spreadsheets.
    pub fn korean() -> ColumnNames {
        ColumnNames {
            province: "광역".to_string(),
            municipality: "기초".to_string(),
            subject_field: "최종분야".to_string(),
            council_term: "지방의회_기수".to_string(),
            enactment_date: "의결일자".to_string(),
        }
    }

    pub fn required(&self) -> [&str; 4] {
        [
            self.province.as_str(),
            self.municipality.as_str(),
            self.subject_field.as_str(),
            self.council_term.as_str(),
        ]
    }
}

impl Default for ColumnNames {
    fn default() -> Self {
        ColumnNames {
            province: "province".to_string(),
            municipality: "municipality".to_string(),
            subject_field: "subjectField".to_string(),
            council_term: "councilTerm".to_string(),
            enactment_date: "enactmentDate".to_string(),
        }
    }
}

/// How council term labels are written, and which labels mean "unclassifiable".
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct TermScheme {
    pub label_prefix: String,
    pub label_suffix: String,
    /// Number of terms in the canonical sequence.
    pub count: u32,
    /// Case-insensitive markers; a label containing one of them gets ordinal 0.
    pub unclassifiable_markers: Vec<String>,
}

impl TermScheme {
    pub fn korean() -> TermScheme {
        TermScheme {
            label_prefix: "지방의회 ".to_string(),
            label_suffix: "기".to_string(),
            count: 9,
            unclassifiable_markers: vec!["분류불가".to_string(), "미분류".to_string()],
        }
    }

    pub fn label(&self, term: u32) -> String {
        format!("{}{}{}", self.label_prefix, term, self.label_suffix)
    }

    /// The canonical ordered term labels, first term first.
    pub fn sequence(&self) -> Vec<String> {
        (1..=self.count).map(|t| self.label(t)).collect()
    }
}

impl Default for TermScheme {
    fn default() -> Self {
        TermScheme {
            label_prefix: "Council Term ".to_string(),
            label_suffix: "".to_string(),
            count: 9,
            unclassifiable_markers: vec!["unclassifiable".to_string(), "분류불가".to_string()],
        }
    }
}

/// What to do with a record whose required field is blank after trimming.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum BlankFieldPolicy {
    /// Fail the whole ingest.
    Reject,
    /// Skip the record and count it in the diagnostics.
    Drop,
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct NormalizeConfig {
    pub columns: ColumnNames,
    pub terms: TermScheme,
    pub blank_fields: BlankFieldPolicy,
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        NormalizeConfig {
            columns: ColumnNames::default(),
            terms: TermScheme::default(),
            blank_fields: BlankFieldPolicy::Reject,
        }
    }
}

/// Detection and parsing rules for the delegation flag.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ClassifierConfig {
    /// Header looked up first, verbatim.
    pub expected_header: String,
    /// Fallback: a normalized header containing one of these (normalized) keywords.
    pub header_keywords: Vec<String>,
    /// Normalized text values meaning "delegated".
    pub true_tokens: Vec<String>,
    /// Normalized text values meaning "autonomous". Anything in neither set is
    /// also autonomous, but counted as defaulted.
    pub false_tokens: Vec<String>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        let strs = |v: &[&str]| v.iter().map(|s| s.to_string()).collect::<Vec<String>>();
        ClassifierConfig {
            expected_header: "delegationRaw".to_string(),
            header_keywords: strs(&["위임", "delegat", "mandate"]),
            true_tokens: strs(&["true", "t", "y", "yes", "1", "위임", "o"]),
            false_tokens: strs(&["false", "f", "n", "no", "0", "자치", "x"]),
        }
    }
}

/// The categorical dimensions a cross-tab can be built over.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum Dimension {
    Province,
    Municipality,
    SubjectField,
    CouncilTerm,
    Delegation,
    EnactmentYear,
}

impl Dimension {
    pub fn name(&self) -> &'static str {
        match self {
            Dimension::Province => "province",
            Dimension::Municipality => "municipality",
            Dimension::SubjectField => "subjectField",
            Dimension::CouncilTerm => "councilTerm",
            Dimension::Delegation => "delegation",
            Dimension::EnactmentYear => "enactmentYear",
        }
    }

    pub fn from_name(name: &str) -> OrdinanceResult<Dimension> {
        match name {
            "province" => Ok(Dimension::Province),
            "municipality" => Ok(Dimension::Municipality),
            "subjectField" => Ok(Dimension::SubjectField),
            "councilTerm" => Ok(Dimension::CouncilTerm),
            "delegation" => Ok(Dimension::Delegation),
            "enactmentYear" => Ok(Dimension::EnactmentYear),
            x => Err(OrdinanceError::InvalidOption {
                message: format!("unknown dimension {:?}", x),
            }),
        }
    }
}

/// Which entities a ranking or a filter considers.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum EntityScope {
    /// Only records enacted by a municipality below its province.
    SubUnits,
    /// Only records enacted by a province itself.
    TopLevel,
    /// Everything.
    Combined,
}

#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum DelegationFilter {
    All,
    DelegatedOnly,
    AutonomousOnly,
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct JurisdictionFilter {
    pub province: String,
    /// Also accept every registered alias of `province`.
    pub alias_inclusive: bool,
}

/// Inclusive date range.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub struct DateRange {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

/// Conjunction of predicates applied before grouping. `None` means "no constraint".
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Filters {
    pub jurisdiction: Option<JurisdictionFilter>,
    pub subject_fields: Option<BTreeSet<String>>,
    pub council_terms: Option<BTreeSet<String>>,
    /// Records without a date never match a range.
    pub date_range: Option<DateRange>,
    pub delegation: DelegationFilter,
    pub entities: EntityScope,
}

impl Default for Filters {
    fn default() -> Self {
        Filters {
            jurisdiction: None,
            subject_fields: None,
            council_terms: None,
            date_range: None,
            delegation: DelegationFilter::All,
            entities: EntityScope::Combined,
        }
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum RowOrder {
    /// First-observed order, or the order of `reindex_rows` when given.
    Observed,
    /// Natural sequence: term ordinal, enactment year, or lexical order for other dimensions.
    Natural,
    /// Descending row total, ties by row key.
    DescendingTotal,
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct CrossTabOptions {
    /// Canonical row keys. Rows outside this sequence are dropped, missing ones are zero rows.
    pub reindex_rows: Option<Vec<String>>,
    /// Canonical column keys, same semantics as `reindex_rows`.
    pub reindex_columns: Option<Vec<String>>,
    pub row_order: RowOrder,
    /// Group province keys under their canonical name.
    pub fold_aliases: bool,
    /// Keep only the `top_n` rows with the largest totals (ties by key), in display order.
    ///
    /// Derive metrics from the untruncated cross-tab: [`crate::run_view`] does.
    pub top_n: Option<usize>,
    /// Label of an appended average row. `{n}` is replaced by the number of real rows.
    pub average_row: Option<String>,
    /// Label of an appended total row.
    pub total_row: Option<String>,
}

impl Default for CrossTabOptions {
    fn default() -> Self {
        CrossTabOptions {
            reindex_rows: None,
            reindex_columns: None,
            row_order: RowOrder::Observed,
            fold_aliases: false,
            top_n: None,
            average_row: None,
            total_row: None,
        }
    }
}

/// Content of cross-tab tables: raw counts or row percentages.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum RatioMode {
    Counts,
    Percentage,
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub enum ViewKind {
    CrossTab {
        row_dimension: Dimension,
        column_dimension: Dimension,
        options: CrossTabOptions,
    },
    Ranking {
        scope: EntityScope,
    },
}

/// One requested view: what to compute and how to present it.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ViewConfig {
    pub name: String,
    pub kind: ViewKind,
    pub filters: Filters,
    pub ratio_mode: RatioMode,
    /// Truncation of rankings and cross-tab rows.
    pub top_n: Option<usize>,
}

/// The result of a view. Exactly the parts relevant to the view kind are present.
#[derive(PartialEq, Debug, Clone)]
pub struct ViewOutput {
    pub name: String,
    pub crosstab: Option<CrossTab>,
    pub metrics: Option<DerivedMetrics>,
    pub ranking: Option<Vec<RankedEntry>>,
    /// The cross-tab (counts or percentages) or the ranking.
    pub table: Table,
    /// Per-row derived metrics, for cross-tab views.
    pub metrics_table: Option<Table>,
}
