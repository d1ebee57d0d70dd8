use crate::schema::{RawSource, with_record_ordinal};
use crate::storage::StorageRoot;
use arrow::array::Int64Array;
use arrow::error::ArrowError;
use arrow::json::ReaderBuilder;
use arrow::record_batch::RecordBatch;
use common::{Error, Result};
use datafusion::datasource::MemTable;
use datafusion::prelude::*;
use futures::{StreamExt, TryStreamExt, stream};
use serde_json::Value;
use std::io::Cursor;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

const JSON_BATCH_SIZE: usize = 8192;

/// A raw source loaded into the engine, with the `record_ordinal` column
/// appended.
pub struct ExtractedSource {
    pub source: RawSource,
    pub files: usize,
    pub records: usize,
    pub df: DataFrame,
}

pub struct DataExtractor {
    ctx: SessionContext,
    input: StorageRoot,
    read_concurrency: usize,
}

impl DataExtractor {
    pub fn new(ctx: SessionContext, input: StorageRoot, read_concurrency: usize) -> Self {
        Self {
            ctx,
            input,
            read_concurrency: read_concurrency.max(1),
        }
    }

    /// Lists and decodes every `.json` file under `prefix` against the
    /// source's contract. Any non-conforming file fails the whole source.
    pub async fn extract(&self, source: RawSource, prefix: &str) -> Result<ExtractedSource> {
        let start = Instant::now();
        info!(source = source.name(), prefix, "Extracting .json filepaths");
        let files = self.input.list_json_files(prefix).await?;
        let file_count = files.len();

        let contents: Vec<_> = stream::iter(files)
            .map(|path| async move {
                let bytes = self.input.read(&path).await?;
                Ok::<_, Error>((path, bytes))
            })
            .buffered(self.read_concurrency)
            .try_collect()
            .await?;

        let mut batches = Vec::new();
        let mut next_ordinal = 0_i64;
        for (path, bytes) in &contents {
            let decoded = decode_records(bytes, source, next_ordinal).map_err(|e| {
                Error::SchemaViolation {
                    source_name: source.name().to_string(),
                    path: path.to_string(),
                    message: e.to_string(),
                }
            })?;
            next_ordinal += decoded.iter().map(|b| b.num_rows() as i64).sum::<i64>();
            batches.extend(decoded);
        }

        let records = next_ordinal as usize;
        let schema = Arc::new(with_record_ordinal(&source.contract()));
        let table = MemTable::try_new(schema, vec![batches])?;
        let df = self.ctx.read_table(Arc::new(table))?.alias(source.name())?;

        info!(
            source = source.name(),
            files = file_count,
            records,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Extraction completed"
        );

        Ok(ExtractedSource {
            source,
            files: file_count,
            records,
            df,
        })
    }
}

/// Decodes newline- or whitespace-separated JSON objects into batches of the
/// source's contract plus a `record_ordinal` column numbered from
/// `first_ordinal`.
pub fn decode_records(
    data: &[u8],
    source: RawSource,
    first_ordinal: i64,
) -> std::result::Result<Vec<RecordBatch>, ArrowError> {
    let contract = source.contract();
    let schema = Arc::new(with_record_ordinal(&contract));

    let relaxed;
    let data = if source.lenient_fields().is_empty() {
        data
    } else {
        relaxed = relax_fields(data, source.lenient_fields())
            .map_err(|e| ArrowError::JsonError(e.to_string()))?;
        relaxed.as_slice()
    };

    let reader = ReaderBuilder::new(contract)
        .with_batch_size(JSON_BATCH_SIZE)
        .build(Cursor::new(data))?;

    let mut ordinal = first_ordinal;
    let mut batches = Vec::new();
    for batch in reader {
        let batch = batch?;
        let rows = batch.num_rows() as i64;
        let mut columns = batch.columns().to_vec();
        columns.push(Arc::new(Int64Array::from_iter_values(ordinal..ordinal + rows)));
        batches.push(RecordBatch::try_new(schema.clone(), columns)?);
        ordinal += rows;
    }

    Ok(batches)
}

/// Rewrites the records with every non-integer value of `fields` set to null.
fn relax_fields(data: &[u8], fields: &[&str]) -> serde_json::Result<Vec<u8>> {
    let mut relaxed = Vec::with_capacity(data.len());
    for record in serde_json::Deserializer::from_slice(data).into_iter::<Value>() {
        let mut record = record?;
        if let Some(object) = record.as_object_mut() {
            for field in fields {
                if let Some(value) = object.get_mut(*field) {
                    if !is_integer_like(value) {
                        *value = Value::Null;
                    }
                }
            }
        }
        serde_json::to_writer(&mut relaxed, &record)?;
        relaxed.push(b'\n');
    }
    Ok(relaxed)
}

/// Accepts exactly what decodes as an `Int64`: integral JSON numbers in range
/// and untrimmed integer strings.
fn is_integer_like(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Number(n) => n.as_i64().is_some(),
        Value::String(s) => s.parse::<i64>().is_ok(),
        _ => false,
    }
}
