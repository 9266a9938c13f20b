//! Per-column type inference and summary statistics.
//!
//! A column is classified by trying each tier in [`TIERS`] in order. A tier
//! only matches when every non-null value satisfies it; the first match wins
//! and later tiers are never consulted. Every tier rejects a column with no
//! values, which falls back to `VARCHAR(255)`; the text tier accepts any other
//! column, so every column ends up with exactly one type.

use chrono::NaiveDateTime;
use itertools::Itertools;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::{
    data::{CellValue, decimal_places},
    dialect::{DEFAULT_DECIMAL_PRECISION, Dialect, IntegerWidth},
};

/// Length assigned to columns that hold no values at all.
pub const EMPTY_COLUMN_VARCHAR_LENGTH: usize = 255;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InferredType {
    Integer(IntegerWidth),
    Decimal { precision: u32, scale: u32 },
    Date,
    Varchar(usize),
}

impl InferredType {
    pub fn render(&self, dialect: Dialect) -> String {
        match self {
            InferredType::Integer(width) => dialect.integer_type_for(*width).to_string(),
            InferredType::Decimal { precision, scale } => dialect.decimal_type(*precision, *scale),
            InferredType::Date => dialect.date_type().to_string(),
            InferredType::Varchar(length) => dialect.varchar_type(*length),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnMetadata {
    pub original_name: String,
    pub null_count: usize,
    pub total_count: usize,
    pub null_percentage: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decimal_places: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg_length: Option<f64>,
}

impl ColumnMetadata {
    fn counts(original_name: &str, null_count: usize, total_count: usize) -> Self {
        let null_percentage = if total_count == 0 {
            0.0
        } else {
            null_count as f64 / total_count as f64 * 100.0
        };
        Self {
            original_name: original_name.to_string(),
            null_count,
            total_count,
            null_percentage,
            min_value: None,
            max_value: None,
            decimal_places: None,
            min_date: None,
            max_date: None,
            min_length: None,
            max_length: None,
            avg_length: None,
        }
    }

    pub fn is_nullable(&self) -> bool {
        self.null_count > 0
    }
}

/// Result of analyzing one column against one dialect.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyzedColumn {
    pub inferred: InferredType,
    pub sql_type: String,
    pub metadata: ColumnMetadata,
}

/// Statistics produced by whichever tier matched.
#[derive(Debug, Clone, PartialEq)]
pub enum TierStats {
    Numeric {
        min: f64,
        max: f64,
        decimal_places: Option<u32>,
    },
    Date {
        min: NaiveDateTime,
        max: NaiveDateTime,
    },
    Text {
        min_length: usize,
        max_length: usize,
        avg_length: f64,
    },
}

impl TierStats {
    fn apply(self, metadata: &mut ColumnMetadata) {
        match self {
            TierStats::Numeric {
                min,
                max,
                decimal_places,
            } => {
                metadata.min_value = Some(min);
                metadata.max_value = Some(max);
                metadata.decimal_places = decimal_places;
            }
            TierStats::Date { min, max } => {
                metadata.min_date = Some(min.format("%Y-%m-%d").to_string());
                metadata.max_date = Some(max.format("%Y-%m-%d").to_string());
            }
            TierStats::Text {
                min_length,
                max_length,
                avg_length,
            } => {
                metadata.min_length = Some(min_length);
                metadata.max_length = Some(max_length);
                metadata.avg_length = Some(avg_length);
            }
        }
    }
}

pub type Classifier = fn(&[&CellValue]) -> Option<(InferredType, TierStats)>;

/// Classification tiers in priority order.
pub const TIERS: &[Classifier] = &[classify_numeric, classify_date, classify_text];

pub fn analyze_column(
    original_name: &str,
    values: &[Option<CellValue>],
    dialect: Dialect,
) -> AnalyzedColumn {
    let present = values
        .iter()
        .filter_map(|value| value.as_ref())
        .filter(|value| !value.is_blank())
        .collect::<Vec<_>>();
    let total_count = values.len();
    let null_count = total_count - present.len();
    let mut metadata = ColumnMetadata::counts(original_name, null_count, total_count);

    let inferred = match TIERS.iter().find_map(|classify| classify(&present)) {
        Some((inferred, stats)) => {
            stats.apply(&mut metadata);
            inferred
        }
        None => InferredType::Varchar(EMPTY_COLUMN_VARCHAR_LENGTH),
    };

    let sql_type = inferred.render(dialect);
    debug!(
        "Column '{original_name}' classified as {inferred:?} ({sql_type}) with {null_count}/{total_count} null(s)"
    );
    AnalyzedColumn {
        inferred,
        sql_type,
        metadata,
    }
}

/// Matches when every value is numeric. Integral columns become integers sized
/// by their maximum; anything with a fraction becomes a fixed-point decimal
/// wide enough for the longest fraction observed, capped at the precision.
pub fn classify_numeric(values: &[&CellValue]) -> Option<(InferredType, TierStats)> {
    let numbers = values
        .iter()
        .map(|value| value.as_number())
        .collect::<Option<Vec<f64>>>()?;
    let (min, max) = numbers
        .iter()
        .copied()
        .minmax_by(|a, b| a.total_cmp(b))
        .into_option()?;

    if numbers.iter().all(|value| value.trunc() == *value) {
        return Some((
            InferredType::Integer(IntegerWidth::for_max_value(max)),
            TierStats::Numeric {
                min,
                max,
                decimal_places: None,
            },
        ));
    }

    let scale = numbers
        .iter()
        .map(|value| decimal_places(*value))
        .fold(0, u32::max)
        .min(DEFAULT_DECIMAL_PRECISION);
    Some((
        InferredType::Decimal {
            precision: DEFAULT_DECIMAL_PRECISION,
            scale,
        },
        TierStats::Numeric {
            min,
            max,
            decimal_places: Some(scale),
        },
    ))
}

pub fn classify_date(values: &[&CellValue]) -> Option<(InferredType, TierStats)> {
    let stamps = values
        .iter()
        .map(|value| value.as_datetime())
        .collect::<Option<Vec<_>>>()?;
    let (min, max) = stamps.into_iter().minmax().into_option()?;
    Some((InferredType::Date, TierStats::Date { min, max }))
}

/// Matches any column with at least one value.
pub fn classify_text(values: &[&CellValue]) -> Option<(InferredType, TierStats)> {
    let lengths = values
        .iter()
        .map(|value| value.as_display().chars().count())
        .collect::<Vec<_>>();
    let (min_length, max_length) = lengths.iter().copied().minmax().into_option()?;
    let avg_length = lengths.iter().sum::<usize>() as f64 / lengths.len() as f64;
    Some((
        InferredType::Varchar(padded_varchar_length(max_length)),
        TierStats::Text {
            min_length,
            max_length,
            avg_length,
        },
    ))
}

/// `ceil(max_length * 1.2)` computed exactly.
pub fn padded_varchar_length(max_length: usize) -> usize {
    (max_length * 6).div_ceil(5)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_column(values: &[&str]) -> Vec<Option<CellValue>> {
        values.iter().map(|v| CellValue::from_text(v)).collect()
    }

    #[test]
    fn integer_column_with_blank_is_nullable_small_integer() {
        let column = analyze_column(
            "Amount",
            &text_column(&["1", "2", "", "4"]),
            Dialect::Generic,
        );
        assert_eq!(column.inferred, InferredType::Integer(IntegerWidth::Small));
        assert_eq!(column.sql_type, "INTEGER");
        assert_eq!(column.metadata.null_count, 1);
        assert_eq!(column.metadata.total_count, 4);
        assert_eq!(column.metadata.null_percentage, 25.0);
        assert_eq!(column.metadata.min_value, Some(1.0));
        assert_eq!(column.metadata.max_value, Some(4.0));
        assert!(column.metadata.is_nullable());
    }

    #[test]
    fn fractional_column_uses_widest_scale() {
        let column = analyze_column(
            "price",
            &text_column(&["1.5", "2.125", "3"]),
            Dialect::PostgreSql,
        );
        assert_eq!(
            column.inferred,
            InferredType::Decimal {
                precision: 18,
                scale: 3
            }
        );
        assert_eq!(column.sql_type, "NUMERIC(18,3)");
        assert_eq!(column.metadata.decimal_places, Some(3));
    }

    #[test]
    fn date_column_records_iso_bounds() {
        let column = analyze_column(
            "hired",
            &text_column(&["2021-06-15", "2021-01-01"]),
            Dialect::MySql,
        );
        assert_eq!(column.inferred, InferredType::Date);
        assert_eq!(column.sql_type, "DATETIME");
        assert_eq!(column.metadata.min_date.as_deref(), Some("2021-01-01"));
        assert_eq!(column.metadata.max_date.as_deref(), Some("2021-06-15"));
        assert!(column.metadata.min_value.is_none());
    }

    #[test]
    fn single_non_numeric_value_forces_text() {
        let column = analyze_column(
            "code",
            &text_column(&["10", "20", "N/A"]),
            Dialect::Generic,
        );
        assert_eq!(column.inferred, InferredType::Varchar(4));
        assert_eq!(column.metadata.min_length, Some(2));
        assert_eq!(column.metadata.max_length, Some(3));
        assert!(column.metadata.min_value.is_none());
    }

    #[test]
    fn numeric_tier_wins_over_date_tier() {
        let column = analyze_column("stamp", &text_column(&["20210101"]), Dialect::Generic);
        assert!(matches!(column.inferred, InferredType::Integer(_)));
    }

    #[test]
    fn empty_column_defaults_to_varchar_255() {
        let values = vec![None, None, Some(CellValue::Text(" ".to_string()))];
        let column = analyze_column("blank", &values, Dialect::Generic);
        assert_eq!(column.inferred, InferredType::Varchar(255));
        assert_eq!(column.metadata.null_count, 3);
        assert_eq!(column.metadata.null_percentage, 100.0);
        assert!(column.metadata.max_length.is_none());
    }

    #[test]
    fn zero_rows_report_zero_null_percentage() {
        let column = analyze_column("nothing", &[], Dialect::Generic);
        assert_eq!(column.metadata.total_count, 0);
        assert_eq!(column.metadata.null_percentage, 0.0);
        assert_eq!(column.inferred, InferredType::Varchar(255));
    }

    #[test]
    fn native_cells_classify_like_text_cells() {
        let values = vec![
            Some(CellValue::Integer(40_000)),
            Some(CellValue::Number(12.0)),
        ];
        let column = analyze_column("count", &values, Dialect::MySql);
        assert_eq!(column.sql_type, "INT");

        let flags = vec![Some(CellValue::Boolean(true)), Some(CellValue::Boolean(false))];
        let column = analyze_column("flag", &flags, Dialect::Generic);
        assert_eq!(column.inferred, InferredType::Varchar(6));
    }

    #[test]
    fn decimal_scale_is_capped_at_precision() {
        let column = analyze_column(
            "tiny",
            &text_column(&["0.00000000000000000001", "1.5"]),
            Dialect::MySql,
        );
        assert_eq!(
            column.inferred,
            InferredType::Decimal {
                precision: 18,
                scale: 18
            }
        );
        assert_eq!(column.sql_type, "DECIMAL(18,18)");
        assert_eq!(column.metadata.decimal_places, Some(18));
    }

    #[test]
    fn every_tier_rejects_an_empty_column() {
        assert!(TIERS.iter().all(|classify| classify(&[]).is_none()));
        let value = CellValue::Text("x".to_string());
        assert!(classify_text(&[&value]).is_some());
    }

    #[test]
    fn padded_length_is_exact_ceiling() {
        assert_eq!(padded_varchar_length(5), 6);
        assert_eq!(padded_varchar_length(6), 8);
        assert_eq!(padded_varchar_length(10), 12);
        assert_eq!(padded_varchar_length(1), 2);
    }
}
