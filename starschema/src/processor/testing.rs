//! Fixtures shared by the processor unit tests.

use crate::processor::extract::decode_records;
use crate::schema::{RawSource, with_record_ordinal};
use crate::storage::StorageRoot;
use arrow::array::Array;
use arrow::datatypes::DataType;
use arrow::util::display::array_value_to_string;
use datafusion::datasource::MemTable;
use datafusion::prelude::*;
use object_store::memory::InMemory;
use object_store::path::Path as ObjectPath;
use serde_json::{Value, json};
use std::sync::Arc;
use url::Url;

pub fn memory_root() -> StorageRoot {
    StorageRoot::with_store(
        Url::parse("memory:///").unwrap(),
        ObjectPath::from("warehouse"),
        Arc::new(InMemory::new()),
    )
}

/// Loads `records` as if they had been extracted from `source`, in order.
pub fn frame(ctx: &SessionContext, source: RawSource, records: &[Value]) -> DataFrame {
    let data = records
        .iter()
        .map(Value::to_string)
        .collect::<Vec<_>>()
        .join("\n");
    let batches = decode_records(data.as_bytes(), source, 0).unwrap();
    let schema = Arc::new(with_record_ordinal(&source.contract()));
    let table = MemTable::try_new(schema, vec![batches]).unwrap();
    ctx.read_table(Arc::new(table))
        .unwrap()
        .alias(source.name())
        .unwrap()
}

pub fn song(song_id: &str, title: &str, artist_id: &str, artist_name: &str, duration: f64) -> Value {
    json!({
        "song_id": song_id,
        "title": title,
        "artist_id": artist_id,
        "artist_name": artist_name,
        "artist_location": "",
        "artist_latitude": null,
        "artist_longitude": null,
        "duration": duration,
        "year": 2000,
        "num_songs": 1
    })
}

/// A `NextSong` event for user 42 with `overrides` applied on top.
pub fn event(overrides: Value) -> Value {
    let mut base = json!({
        "userId": "42",
        "firstName": "Jo",
        "lastName": "Doe",
        "gender": "F",
        "level": "free",
        "page": "NextSong",
        "song": "Song A",
        "artist": "Artist X",
        "length": 210.5,
        "ts": 1600000000000_i64,
        "sessionId": 7,
        "location": "NYC",
        "userAgent": "UA1",
        "auth": "Logged In",
        "method": "PUT",
        "status": 200,
        "itemInSession": 0,
        "registration": 1540919166796.0
    });
    if let (Some(target), Some(patch)) = (base.as_object_mut(), overrides.as_object()) {
        for (key, value) in patch {
            target.insert(key.clone(), value.clone());
        }
    }
    base
}

/// Collects `columns` of `df` as display strings, rows sorted. Nulls render as
/// `NULL`; timestamps render as epoch milliseconds.
pub async fn rows(df: DataFrame, columns: &[&str]) -> Vec<Vec<String>> {
    let exprs: Vec<Expr> = columns
        .iter()
        .map(|name| {
            let field = df.schema().field_with_unqualified_name(name).unwrap();
            match field.data_type() {
                DataType::Timestamp(_, _) => cast(ident(*name), DataType::Int64).alias(*name),
                _ => ident(*name),
            }
        })
        .collect();

    let batches = df.select(exprs).unwrap().collect().await.unwrap();

    let mut rows = Vec::new();
    for batch in batches {
        for row in 0..batch.num_rows() {
            rows.push(
                batch
                    .columns()
                    .iter()
                    .map(|array| {
                        if array.is_null(row) {
                            "NULL".to_string()
                        } else {
                            array_value_to_string(array.as_ref(), row).unwrap()
                        }
                    })
                    .collect::<Vec<_>>(),
            );
        }
    }
    rows.sort();
    rows
}

pub fn strings(row: &[&str]) -> Vec<String> {
    row.iter().map(|s| s.to_string()).collect()
}
