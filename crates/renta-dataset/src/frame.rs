//! Typed tabular frames with explicit nulls
//!
//! Two shapes cover the whole core: [`TrainingFrame`] for fit-time data
//! (many rows, named columns, nullable cells) and [`FeatureRow`] for a
//! single prediction-time observation. Neither ever guesses at a missing
//! value; imputation happens in exactly two places: the builder applies
//! the neutral defaults, matrix conversion zero-fills the rest.

use std::collections::BTreeMap;

use serde::Serialize;
use time::Date;

use renta_common::{ErrorCode, RentaError, Result};
use renta_ml::Matrix;

/// One observation in a [`TrainingFrame`]
#[derive(Debug, Clone)]
pub struct FrameRow {
    /// Calendar day of the observation
    pub date: Date,
    /// Cell values, parallel to the frame's column list
    values: Vec<Option<f64>>,
}

impl FrameRow {
    /// Value at the given column index
    pub fn value(&self, col: usize) -> Option<f64> {
        self.values.get(col).copied().flatten()
    }
}

/// A named-column tabular frame with one row per date.
#[derive(Debug, Clone, Default)]
pub struct TrainingFrame {
    columns: Vec<String>,
    rows: Vec<FrameRow>,
}

impl TrainingFrame {
    /// Create an empty frame with the given column set
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// The frame's column names, in order
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the frame has no rows
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// The rows, in current order
    pub fn rows(&self) -> &[FrameRow] {
        &self.rows
    }

    /// Index of a column by name
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Append a row; the value vector must match the column count.
    pub fn push_row(&mut self, date: Date, values: Vec<Option<f64>>) -> Result<()> {
        if values.len() != self.columns.len() {
            return Err(RentaError::new(
                ErrorCode::InvalidInput,
                format!(
                    "row has {} values, frame has {} columns",
                    values.len(),
                    self.columns.len()
                ),
            ));
        }
        self.rows.push(FrameRow { date, values });
        Ok(())
    }

    /// Cell value by row index and column name
    pub fn value(&self, row: usize, column: &str) -> Option<f64> {
        let col = self.column_index(column)?;
        self.rows.get(row)?.value(col)
    }

    /// Sort rows by date, ascending (stable)
    pub fn sort_by_date(&mut self) {
        self.rows.sort_by_key(|r| r.date);
    }

    /// Drop rows whose cell in `target` is null.
    pub fn drop_null_target(&self, target: &str) -> Result<TrainingFrame> {
        let col = self.column_index(target).ok_or_else(|| {
            RentaError::new(
                ErrorCode::MissingTarget,
                format!("column '{}' missing from frame", target),
            )
        })?;
        let rows = self
            .rows
            .iter()
            .filter(|r| r.value(col).is_some())
            .cloned()
            .collect();
        Ok(TrainingFrame {
            columns: self.columns.clone(),
            rows,
        })
    }

    /// Temporal train/validation split: sort by date, first
    /// `1 - validation_ratio` of rows train, the rest validate. No
    /// shuffling, so every training date precedes every validation date.
    pub fn split_temporal(&self, validation_ratio: f64) -> (TrainingFrame, TrainingFrame) {
        let mut sorted = self.clone();
        sorted.sort_by_date();

        let n = sorted.rows.len();
        let split = ((n as f64) * (1.0 - validation_ratio)).floor() as usize;
        let val_rows = sorted.rows.split_off(split.min(n));

        (
            sorted,
            TrainingFrame {
                columns: self.columns.clone(),
                rows: val_rows,
            },
        )
    }

    /// Columns in frame order minus the given exclusions.
    pub fn feature_columns(&self, exclude: &[&str]) -> Vec<String> {
        self.columns
            .iter()
            .filter(|c| !exclude.contains(&c.as_str()))
            .cloned()
            .collect()
    }

    /// Build the feature matrix for the given columns, nulls as 0.0.
    ///
    /// Columns absent from the frame also fill with 0.0, mirroring how
    /// prediction treats missing features.
    pub fn to_matrix(&self, columns: &[String]) -> Matrix {
        let indices: Vec<Option<usize>> =
            columns.iter().map(|c| self.column_index(c)).collect();
        let rows: Vec<Vec<f32>> = self
            .rows
            .iter()
            .map(|row| {
                indices
                    .iter()
                    .map(|idx| idx.and_then(|i| row.value(i)).unwrap_or(0.0) as f32)
                    .collect()
            })
            .collect();
        Matrix::from_rows(rows)
    }

    /// Extract one column as an f32 vector, nulls as 0.0.
    pub fn column_vector(&self, column: &str) -> Vec<f32> {
        let idx = self.column_index(column);
        self.rows
            .iter()
            .map(|row| idx.and_then(|i| row.value(i)).unwrap_or(0.0) as f32)
            .collect()
    }
}

/// A single prediction-time observation: named features, no nulls.
///
/// Missing features are simply absent; [`FeatureRow::to_vector`] fills
/// them with 0.0 in whatever column order the model persisted, so a row
/// whose keys are a superset of the model's feature list predicts
/// identically to the exact list.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct FeatureRow(BTreeMap<String, f64>);

impl FeatureRow {
    /// Create an empty row
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a feature value
    pub fn set(&mut self, name: impl Into<String>, value: f64) {
        self.0.insert(name.into(), value);
    }

    /// Builder-style set
    pub fn with(mut self, name: impl Into<String>, value: f64) -> Self {
        self.set(name, value);
        self
    }

    /// Get a feature value
    pub fn get(&self, name: &str) -> Option<f64> {
        self.0.get(name).copied()
    }

    /// Whether the row has no features
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Project onto an ordered column list, missing features as 0.0.
    pub fn to_vector(&self, columns: &[String]) -> Vec<f32> {
        columns
            .iter()
            .map(|c| self.get(c).unwrap_or(0.0) as f32)
            .collect()
    }
}

impl<S: Into<String>> FromIterator<(S, f64)> for FeatureRow {
    fn from_iter<I: IntoIterator<Item = (S, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    fn frame_with_dates(dates: &[Date]) -> TrainingFrame {
        let mut frame = TrainingFrame::new(vec!["x".into(), "y_demand".into()]);
        for (i, d) in dates.iter().enumerate() {
            frame
                .push_row(*d, vec![Some(i as f64), Some((i * 2) as f64)])
                .unwrap();
        }
        frame
    }

    #[test]
    fn test_push_row_checks_arity() {
        let mut frame = TrainingFrame::new(vec!["a".into()]);
        assert!(frame
            .push_row(date!(2025 - 01 - 01), vec![Some(1.0), Some(2.0)])
            .is_err());
    }

    #[test]
    fn test_temporal_split_ordering() {
        let dates: Vec<Date> = (1..=10)
            .map(|d| Date::from_calendar_date(2025, time::Month::March, d).unwrap())
            .collect();
        // Shuffled insertion order; the split must sort first
        let mut frame = TrainingFrame::new(vec!["x".into()]);
        for d in [5, 1, 9, 3, 7, 2, 10, 4, 8, 6] {
            frame
                .push_row(dates[d - 1], vec![Some(d as f64)])
                .unwrap();
        }

        let (train, val) = frame.split_temporal(0.2);
        assert_eq!(train.len(), 8);
        assert_eq!(val.len(), 2);

        let max_train = train.rows().iter().map(|r| r.date).max().unwrap();
        let min_val = val.rows().iter().map(|r| r.date).min().unwrap();
        assert!(max_train <= min_val);
    }

    #[test]
    fn test_drop_null_target() {
        let mut frame = TrainingFrame::new(vec!["y_demand".into()]);
        frame.push_row(date!(2025 - 01 - 01), vec![Some(1.0)]).unwrap();
        frame.push_row(date!(2025 - 01 - 02), vec![None]).unwrap();

        let clean = frame.drop_null_target("y_demand").unwrap();
        assert_eq!(clean.len(), 1);

        assert!(frame.drop_null_target("absent").is_err());
    }

    #[test]
    fn test_to_matrix_fills_nulls() {
        let mut frame = TrainingFrame::new(vec!["a".into(), "b".into()]);
        frame
            .push_row(date!(2025 - 01 - 01), vec![Some(2.0), None])
            .unwrap();

        let m = frame.to_matrix(&["a".into(), "b".into(), "missing".into()]);
        assert_eq!(m.shape(), (1, 3));
        assert_eq!(m.row(0), &[2.0, 0.0, 0.0]);
    }

    #[test]
    fn test_feature_columns_exclusion() {
        let frame = frame_with_dates(&[date!(2025 - 01 - 01)]);
        assert_eq!(frame.feature_columns(&["y_demand"]), vec!["x".to_string()]);
    }

    #[test]
    fn test_feature_row_projection() {
        let row = FeatureRow::new()
            .with("price", 120.0)
            .with("capacity", 3.0)
            .with("ignored", 9.0);

        let cols = vec!["price".to_string(), "competitor_avg_price".to_string()];
        assert_eq!(row.to_vector(&cols), vec![120.0, 0.0]);
    }
}
