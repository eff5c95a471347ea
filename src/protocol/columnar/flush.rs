//! Splitting insert rows into flush batches.
//!
//! A batch's packed size stays within the flush byte target; a single row
//! larger than the target is sent alone. Batches are also capped by row count.

use std::ops::Range;

use crate::protocol::types::{ColumnMetadata, SqreamValue};

/// Rows that fit into `target` bytes at a fixed `row_width`, at least one.
pub fn rows_per_flush(target: usize, row_width: usize) -> usize {
    if row_width == 0 {
        return target.max(1);
    }
    (target / row_width).max(1)
}

/// Packed size of one row across all columns.
pub fn packed_row_size(columns: &[ColumnMetadata], row: &[SqreamValue]) -> usize {
    columns
        .iter()
        .zip(row)
        .map(|(column, value)| {
            let text = if column.is_variable_length {
                value.as_str().map_or(0, str::len)
            } else {
                0
            };
            column.fixed_row_bytes() + text
        })
        .sum()
}

/// Cut `rows` into consecutive batches.
pub fn plan_flushes(
    columns: &[ColumnMetadata],
    rows: &[Vec<SqreamValue>],
    target: usize,
    max_rows: usize,
) -> Vec<Range<usize>> {
    let max_rows = max_rows.max(1);

    if !columns.iter().any(|c| c.is_variable_length) {
        let row_width: usize = columns.iter().map(ColumnMetadata::fixed_row_bytes).sum();
        let step = rows_per_flush(target, row_width).min(max_rows);
        return (0..rows.len())
            .step_by(step)
            .map(|start| start..(start + step).min(rows.len()))
            .collect();
    }

    let mut batches = Vec::new();
    let mut start = 0;
    let mut batch_bytes = 0;
    for (i, row) in rows.iter().enumerate() {
        let size = packed_row_size(columns, row);
        let batch_rows = i - start;
        if batch_rows > 0 && (batch_bytes + size > target || batch_rows >= max_rows) {
            batches.push(start..i);
            start = i;
            batch_bytes = 0;
        }
        batch_bytes += size;
    }
    if start < rows.len() {
        batches.push(start..rows.len());
    }
    batches
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::types::SqreamType;
    use proptest::prelude::*;

    #[test]
    fn test_rows_per_flush() {
        assert_eq!(rows_per_flush(100, 10), 10);
        assert_eq!(rows_per_flush(5, 10), 1);
        assert_eq!(rows_per_flush(0, 10), 1);
    }

    #[test]
    fn test_plan_fixed_width() {
        let columns = vec![ColumnMetadata::new("i", SqreamType::Int, true)];
        let rows = vec![vec![SqreamValue::Int(1)]; 10];
        // 5 bytes per row, 12-byte target: two rows per batch.
        let batches = plan_flushes(&columns, &rows, 12, 1_000);
        assert_eq!(batches.len(), 5);
        assert_eq!(batches[0], 0..2);
        assert_eq!(batches[4], 8..10);

        let batches = plan_flushes(&columns, &rows, 1_000, 3);
        assert_eq!(batches, vec![0..3, 3..6, 6..9, 9..10]);
    }

    #[test]
    fn test_plan_text_oversized_row_alone() {
        let columns = vec![ColumnMetadata::new("t", SqreamType::Text, false)];
        let rows = vec![
            vec![SqreamValue::from("a")],
            vec![SqreamValue::from("x".repeat(100))],
            vec![SqreamValue::from("b")],
        ];
        let batches = plan_flushes(&columns, &rows, 20, 1_000);
        assert_eq!(batches, vec![0..1, 1..2, 2..3]);
    }

    #[test]
    fn test_plan_empty() {
        let columns = vec![ColumnMetadata::new("t", SqreamType::Text, false)];
        assert!(plan_flushes(&columns, &[], 20, 10).is_empty());
    }

    proptest! {
        #[test]
        fn prop_batches_within_target(
            lens in proptest::collection::vec(0usize..64, 0..200),
            target in 1usize..256,
            max_rows in 1usize..50
        ) {
            let columns = vec![
                ColumnMetadata::new("id", SqreamType::Int, false),
                ColumnMetadata::new("t", SqreamType::Text, true),
            ];
            let rows: Vec<Vec<SqreamValue>> = lens
                .iter()
                .map(|&n| vec![SqreamValue::Int(0), SqreamValue::from("z".repeat(n))])
                .collect();

            let batches = plan_flushes(&columns, &rows, target, max_rows);
            let mut next = 0;
            for batch in &batches {
                prop_assert_eq!(batch.start, next);
                prop_assert!(!batch.is_empty());
                prop_assert!(batch.len() <= max_rows);
                let bytes: usize = rows[batch.clone()]
                    .iter()
                    .map(|r| packed_row_size(&columns, r))
                    .sum();
                prop_assert!(batch.len() == 1 || bytes <= target);
                next = batch.end;
            }
            prop_assert_eq!(next, rows.len());
        }
    }
}
