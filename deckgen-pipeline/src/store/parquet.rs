//! Parquet encoding of store rows
//!
//! Every column is written as nullable Utf8 with Snappy compression. Reads
//! accept Utf8 and LargeUtf8 and map nulls to the empty string.

use super::{Row, Schema};
use crate::error::{PipelineError, Result};
use arrow::array::{Array, ArrayRef, LargeStringArray, StringArray};
use arrow::datatypes::{DataType, Field, Schema as ArrowSchema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;

/// Write all rows to `path`, replacing any file there
pub(crate) fn write_table(path: &Path, schema: &Schema, rows: &[Row]) -> Result<()> {
    let fields: Vec<Field> = schema
        .columns()
        .iter()
        .map(|name| Field::new(name, DataType::Utf8, true))
        .collect();
    let arrow_schema = Arc::new(ArrowSchema::new(fields));

    let arrays: Vec<ArrayRef> = (0..schema.len())
        .map(|col| {
            let array = StringArray::from_iter_values(rows.iter().map(|r| r.values[col].as_str()));
            Arc::new(array) as ArrayRef
        })
        .collect();

    let batch = RecordBatch::try_new(arrow_schema.clone(), arrays)?;

    let file = File::create(path)?;
    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();
    let mut writer = ArrowWriter::try_new(file, arrow_schema, Some(props))?;
    writer.write(&batch)?;
    writer.close()?;

    Ok(())
}

/// Read every row of `path`, aligned to `schema`
///
/// The file is decoded completely before returning, so a failure part-way
/// through yields no rows at all.
pub(crate) fn read_table(path: &Path, schema: &Schema) -> Result<Vec<Row>> {
    let file = File::open(path)?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;

    let file_schema = builder.schema().clone();
    let found: Vec<String> = file_schema.fields().iter().map(|f| f.name().clone()).collect();

    if !schema.matches(&found) {
        return Err(PipelineError::SchemaMismatch {
            path: path.to_path_buf(),
            expected: schema.columns().to_vec(),
            found,
        });
    }

    let mut positions = Vec::with_capacity(found.len());
    for field in file_schema.fields() {
        match field.data_type() {
            DataType::Utf8 | DataType::LargeUtf8 => {}
            other => {
                return Err(PipelineError::ColumnType {
                    column: field.name().clone(),
                    found: other.to_string(),
                })
            }
        }
        let pos = schema
            .position(field.name())
            .ok_or_else(|| PipelineError::UnknownColumn(field.name().clone()))?;
        positions.push(pos);
    }

    let reader = builder.build()?;
    let mut rows = Vec::new();

    for batch in reader {
        let batch = batch?;
        for r in 0..batch.num_rows() {
            let mut values = vec![String::new(); schema.len()];
            for (file_col, &pos) in positions.iter().enumerate() {
                values[pos] = string_at(batch.column(file_col), r);
            }
            rows.push(Row { values });
        }
    }

    Ok(rows)
}

fn string_at(column: &ArrayRef, row: usize) -> String {
    if column.is_null(row) {
        return String::new();
    }
    if let Some(array) = column.as_any().downcast_ref::<StringArray>() {
        return array.value(row).to_string();
    }
    if let Some(array) = column.as_any().downcast_ref::<LargeStringArray>() {
        return array.value(row).to_string();
    }
    String::new()
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::Int64Array;

    #[test]
    fn test_nulls_read_back_as_empty() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("nulls.parquet");

        let arrow_schema = Arc::new(ArrowSchema::new(vec![
            Field::new("word", DataType::Utf8, false),
            Field::new("word_trans", DataType::Utf8, true),
        ]));
        let batch = RecordBatch::try_new(
            arrow_schema.clone(),
            vec![
                Arc::new(StringArray::from(vec!["gehen"])) as ArrayRef,
                Arc::new(StringArray::from(vec![None::<&str>])) as ArrayRef,
            ],
        )
        .unwrap();
        let mut writer = ArrowWriter::try_new(File::create(&path).unwrap(), arrow_schema, None).unwrap();
        writer.write(&batch).unwrap();
        writer.close().unwrap();

        let schema = Schema::new("word", ["word", "word_trans"]).unwrap();
        let rows = read_table(&path, &schema).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].values, vec!["gehen".to_string(), String::new()]);
    }

    #[test]
    fn test_non_text_column_is_rejected() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("typed.parquet");

        let arrow_schema = Arc::new(ArrowSchema::new(vec![
            Field::new("word", DataType::Utf8, false),
            Field::new("count", DataType::Int64, false),
        ]));
        let batch = RecordBatch::try_new(
            arrow_schema.clone(),
            vec![
                Arc::new(StringArray::from(vec!["gehen"])) as ArrayRef,
                Arc::new(Int64Array::from(vec![3])) as ArrayRef,
            ],
        )
        .unwrap();
        let mut writer = ArrowWriter::try_new(File::create(&path).unwrap(), arrow_schema, None).unwrap();
        writer.write(&batch).unwrap();
        writer.close().unwrap();

        let schema = Schema::new("word", ["word", "count"]).unwrap();
        let err = read_table(&path, &schema).unwrap_err();
        assert!(matches!(err, PipelineError::ColumnType { column, .. } if column == "count"));
    }

    #[test]
    fn test_reordered_columns_are_aligned() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("order.parquet");

        let written = Schema::new("word", ["word_trans", "word"]).unwrap();
        write_table(
            &path,
            &written,
            &[Row {
                values: vec!["go".into(), "gehen".into()],
            }],
        )
        .unwrap();

        let expected = Schema::new("word", ["word", "word_trans"]).unwrap();
        let rows = read_table(&path, &expected).unwrap();
        assert_eq!(rows[0].values, vec!["gehen".to_string(), "go".to_string()]);
    }
}
