use crate::schema::StarTable;
use crate::storage::StorageRoot;
use crate::utils::paths::PathBuilder;
use arrow::array::{Array, UInt64Array};
use arrow::datatypes::DataType;
use arrow::record_batch::RecordBatch;
use chrono::{DateTime, Utc};
use common::{Error, Result};
use datafusion::common::config::TableParquetOptions;
use datafusion::dataframe::DataFrameWriteOptions;
use datafusion::prelude::*;
use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{info, warn};

/// Partition value used for null partition columns.
pub const DEFAULT_PARTITION: &str = "__HIVE_DEFAULT_PARTITION__";

/// Contents of the `_SUCCESS` marker written next to each committed table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableMarker {
    pub run_id: String,
    pub table: String,
    pub rows: u64,
    pub partition_columns: Vec<String>,
    pub compression: String,
    pub committed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TableReport {
    pub table: String,
    pub rows: u64,
    pub location: String,
    pub partition_columns: Vec<String>,
}

struct StagedTable {
    table: StarTable,
    rows: u64,
}

/// Writes the star tables as Hive-partitioned Parquet with overwrite
/// semantics.
///
/// Tables are first written under `_staging/<run_id>/`. Only when every table
/// staged successfully are the final directories replaced, one table at a
/// time. A staging failure leaves existing output untouched. A commit failure
/// keeps the tables committed before it and discards the rest of the staging
/// area.
pub struct PartitionedSink {
    output: StorageRoot,
    paths: PathBuilder,
    run_id: String,
    compression: String,
}

impl PartitionedSink {
    pub fn new(output: StorageRoot, run_id: &str, compression: &str) -> Self {
        Self {
            output,
            paths: PathBuilder::new(run_id),
            run_id: run_id.to_string(),
            compression: compression.to_string(),
        }
    }

    pub async fn write_all(&self, tables: Vec<(StarTable, DataFrame)>) -> Result<Vec<TableReport>> {
        let start = Instant::now();

        let staged = match try_join_all(
            tables
                .into_iter()
                .map(|(table, df)| self.stage(table, df)),
        )
        .await
        {
            Ok(staged) => staged,
            Err(e) => {
                if let Err(cleanup) = self.discard_staging().await {
                    warn!(error = %cleanup, "Failed to remove staging area");
                }
                return Err(e);
            }
        };

        let mut reports = Vec::with_capacity(staged.len());
        for table in staged {
            match self.commit(table).await {
                Ok(report) => reports.push(report),
                Err(e) => {
                    // tables committed so far stay in place
                    if let Err(cleanup) = self.discard_staging().await {
                        warn!(error = %cleanup, "Failed to remove staging area");
                    }
                    return Err(e);
                }
            }
        }

        self.discard_staging().await?;

        info!(
            run_id = %self.run_id,
            tables = reports.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "All tables committed"
        );

        Ok(reports)
    }

    async fn stage(&self, table: StarTable, df: DataFrame) -> Result<StagedTable> {
        let location = self
            .output
            .url_for(&self.output.child(&self.paths.staging_table(table)));
        info!(table = table.name(), location = %location, "Staging table");

        let rows = self
            .write_table(table, df, &location)
            .await
            .map_err(|e| Error::sink_write(table.name(), e))?;

        info!(table = table.name(), rows, "Table staged");
        Ok(StagedTable { table, rows })
    }

    async fn write_table(&self, table: StarTable, df: DataFrame, location: &str) -> Result<u64> {
        let sort_exprs = table
            .columns()
            .iter()
            .map(|c| ident(*c).sort(true, true))
            .collect();
        let mut df = df
            .select(table.columns().iter().map(|c| ident(*c)).collect())?
            .sort(sort_exprs)?;

        for column in table.partition_columns() {
            df = df.with_column(column, partition_value(column))?;
        }

        let mut options = TableParquetOptions::new();
        options.global.compression = Some(self.compression.clone());

        let write_options = DataFrameWriteOptions::new().with_partition_by(
            table
                .partition_columns()
                .iter()
                .map(|c| c.to_string())
                .collect(),
        );

        let result = df.write_parquet(location, write_options, Some(options)).await?;
        Ok(written_rows(&result))
    }

    async fn commit(&self, staged: StagedTable) -> Result<TableReport> {
        let table = staged.table;
        let final_dir = self.output.child(&self.paths.final_table(table));
        let staged_dir = self.output.child(&self.paths.staging_table(table));
        let partition_columns: Vec<String> = table
            .partition_columns()
            .iter()
            .map(|c| c.to_string())
            .collect();

        let marker = TableMarker {
            run_id: self.run_id.clone(),
            table: table.name().to_string(),
            rows: staged.rows,
            partition_columns: partition_columns.clone(),
            compression: self.compression.clone(),
            committed_at: Utc::now(),
        };

        let (replaced, moved) = async {
            let replaced = self.output.delete_prefix(&final_dir).await?;
            let moved = self.output.move_prefix(&staged_dir, &final_dir).await?;
            self.output
                .put(
                    &self.output.child(&self.paths.marker(table)),
                    serde_json::to_vec_pretty(&marker)?,
                )
                .await?;
            Ok::<_, Error>((replaced, moved))
        }
        .await
        .map_err(|e| Error::sink_write(table.name(), e))?;

        let location = self.output.url_for(&final_dir);
        info!(
            table = table.name(),
            rows = staged.rows,
            files = moved,
            replaced,
            location = %location,
            "Table committed"
        );

        Ok(TableReport {
            table: table.name().to_string(),
            rows: staged.rows,
            location,
            partition_columns,
        })
    }

    async fn discard_staging(&self) -> Result<()> {
        let staging = self.output.child(&self.paths.staging_root());
        let removed = self.output.delete_prefix(&staging).await?;
        if removed > 0 {
            info!(run_id = %self.run_id, objects = removed, "Removed staging area");
        }
        Ok(())
    }
}

/// Partition values are written as text; nulls get the Hive default
/// partition.
fn partition_value(column: &str) -> Expr {
    coalesce(vec![
        cast(ident(column), DataType::Utf8),
        lit(DEFAULT_PARTITION),
    ])
}

fn written_rows(result: &[RecordBatch]) -> u64 {
    result
        .iter()
        .filter_map(|batch| {
            batch
                .column_by_name("count")
                .and_then(|c| c.as_any().downcast_ref::<UInt64Array>())
                .map(|counts| counts.iter().flatten().sum::<u64>())
        })
        .sum()
}
