//! Parquet reader for GAIA metadata snapshots.

use std::path::Path;

use arrow::array::{Array, StringArray};
use arrow::record_batch::RecordBatch;
use arrow::compute::cast;
use arrow::datatypes::DataType;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use tracing::debug;

use super::types::{GaiaTask, Level};
use crate::error::DatasetError;

/// Read tasks from a `metadata.parquet` file.
///
/// Columns that are not stored as strings (the hub has shipped `Level` as an
/// integer) are cast to strings before parsing. A row without a task id or
/// with an unknown level fails the whole read, naming the row (1-based).
pub fn read_metadata_parquet(input_path: &Path) -> Result<Vec<GaiaTask>, DatasetError> {
    let file = std::fs::File::open(input_path)?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
    let reader = builder.build()?;

    let mut tasks = Vec::new();
    let mut row_offset = 0;
    let malformed = |row: usize, message: String| DatasetError::MalformedRow {
        path: input_path.display().to_string(),
        row,
        message,
    };

    for batch_result in reader {
        let batch = batch_result?;
        let num_rows = batch.num_rows();

        let task_ids = string_column(&batch, "task_id")?;
        let questions = string_column(&batch, "Question")?;
        let levels = string_column(&batch, "Level")?;
        let answers = string_column(&batch, "Final answer")?;
        let file_names = string_column(&batch, "file_name")?;
        let annotator = string_column(&batch, "Annotator Metadata")?;

        for i in 0..num_rows {
            let row = row_offset + i + 1;
            let id = task_ids[i].clone().unwrap_or_default();
            if id.trim().is_empty() {
                return Err(malformed(row, "missing task_id".to_string()));
            }

            let level = match levels[i].as_deref().map(str::parse::<Level>) {
                Some(Ok(level)) => level,
                Some(Err(e)) => return Err(malformed(row, format!("task {}: {}", id, e))),
                None => return Err(malformed(row, format!("task {}: missing Level", id))),
            };

            let mut task = GaiaTask::new(&id, questions[i].clone().unwrap_or_default(), level)
                .with_final_answer(answers[i].clone().unwrap_or_default());
            task.file_name = file_names[i].clone().unwrap_or_default();
            task.annotator_metadata = annotator[i]
                .as_deref()
                .and_then(|s| serde_json::from_str(s).ok())
                .unwrap_or(serde_json::Value::Null);
            tasks.push(task);
        }
        row_offset += num_rows;
    }

    debug!(path = %input_path.display(), tasks = tasks.len(), "Read parquet metadata");
    Ok(tasks)
}

fn string_column(batch: &RecordBatch, name: &str) -> Result<Vec<Option<String>>, DatasetError> {
    let num_rows = batch.num_rows();
    let Some(col) = batch.column_by_name(name) else {
        return Ok(vec![None; num_rows]);
    };

    // Struct columns (annotator metadata) have no string cast; treat as absent.
    let casted = match cast(col.as_ref(), &DataType::Utf8) {
        Ok(array) => array,
        Err(_) => return Ok(vec![None; num_rows]),
    };

    let arr = casted
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| {
            DatasetError::Arrow(arrow::error::ArrowError::CastError(format!(
                "column '{}' is not a string column",
                name
            )))
        })?;

    Ok((0..num_rows)
        .map(|i| {
            if arr.is_null(i) {
                None
            } else {
                Some(arr.value(i).to_string())
            }
        })
        .collect())
}
