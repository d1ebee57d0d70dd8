use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use lazy_static::lazy_static;
use std::sync::Arc;

/// Column appended to every extracted source, holding the row's position in
/// input order.
pub const RECORD_ORDINAL: &str = "record_ordinal";

// Raw source schemas
pub fn song_data_schema() -> Schema {
    Schema::new(vec![
        Field::new("artist_id", DataType::Utf8, false),
        Field::new("artist_latitude", DataType::Float64, true),
        Field::new("artist_location", DataType::Utf8, true),
        Field::new("artist_longitude", DataType::Float64, true),
        Field::new("artist_name", DataType::Utf8, true),
        Field::new("duration", DataType::Float64, true),
        Field::new("num_songs", DataType::Int64, true),
        Field::new("song_id", DataType::Utf8, false),
        Field::new("title", DataType::Utf8, true),
        Field::new("year", DataType::Int64, true),
    ])
}

pub fn log_data_schema() -> Schema {
    Schema::new(vec![
        Field::new("artist", DataType::Utf8, true),
        Field::new("auth", DataType::Utf8, true),
        Field::new("firstName", DataType::Utf8, true),
        Field::new("gender", DataType::Utf8, true),
        Field::new("itemInSession", DataType::Int64, true),
        Field::new("lastName", DataType::Utf8, true),
        Field::new("length", DataType::Float64, true),
        Field::new("level", DataType::Utf8, true),
        Field::new("location", DataType::Utf8, true),
        Field::new("method", DataType::Utf8, true),
        Field::new("page", DataType::Utf8, true),
        Field::new("registration", DataType::Float64, true),
        Field::new("sessionId", DataType::Int64, true),
        Field::new("song", DataType::Utf8, true),
        Field::new("status", DataType::Int64, true),
        Field::new("ts", DataType::Int64, true),
        Field::new("userAgent", DataType::Utf8, true),
        Field::new("userId", DataType::Utf8, true),
    ])
}

/// Contract schema followed by the `record_ordinal` column.
pub fn with_record_ordinal(schema: &Schema) -> Schema {
    let mut fields: Vec<Field> = schema.fields().iter().map(|f| f.as_ref().clone()).collect();
    fields.push(Field::new(RECORD_ORDINAL, DataType::Int64, false));
    Schema::new(fields)
}

/// The two raw inputs and the prefix each is collected from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawSource {
    SongData,
    LogData,
}

impl RawSource {
    pub fn name(&self) -> &'static str {
        match self {
            RawSource::SongData => "song_data",
            RawSource::LogData => "log_data",
        }
    }

    /// Fields whose unreadable values count as missing rather than as a
    /// contract violation. Only derivations that need them drop the record.
    pub fn lenient_fields(&self) -> &'static [&'static str] {
        match self {
            RawSource::SongData => &[],
            RawSource::LogData => &["ts"],
        }
    }

    pub fn contract(&self) -> SchemaRef {
        match self {
            RawSource::SongData => SONG_DATA_SCHEMA.clone(),
            RawSource::LogData => LOG_DATA_SCHEMA.clone(),
        }
    }
}

/// Output tables of the dimensional model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StarTable {
    Songs,
    Artists,
    Users,
    Songplays,
    Time,
}

impl StarTable {
    pub const ALL: [StarTable; 5] = [
        StarTable::Songs,
        StarTable::Artists,
        StarTable::Users,
        StarTable::Songplays,
        StarTable::Time,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            StarTable::Songs => "songs",
            StarTable::Artists => "artists",
            StarTable::Users => "users",
            StarTable::Songplays => "songplays",
            StarTable::Time => "time",
        }
    }

    /// Directory the table is written to under the output root.
    pub fn directory(&self) -> String {
        format!("{}_table.parquet", self.name())
    }

    pub fn partition_columns(&self) -> &'static [&'static str] {
        match self {
            StarTable::Songs => &["year"],
            StarTable::Artists | StarTable::Users => &[],
            StarTable::Songplays | StarTable::Time => &["year", "month"],
        }
    }

    pub fn columns(&self) -> &'static [&'static str] {
        match self {
            StarTable::Songs => &["song_id", "title", "artist_id", "year", "duration"],
            StarTable::Artists => &[
                "artist_id",
                "artist_name",
                "artist_location",
                "artist_latitude",
                "artist_longitude",
            ],
            StarTable::Users => &["userId", "firstName", "lastName", "gender", "level"],
            StarTable::Songplays => &[
                "start_time",
                "user_id",
                "level",
                "song_id",
                "artist_id",
                "session_id",
                "location",
                "user_agent",
                "month",
                "year",
            ],
            StarTable::Time => &[
                "start_time",
                "hour",
                "day_of_year",
                "week_of_year",
                "month",
                "year",
                "weekday",
            ],
        }
    }
}

impl std::fmt::Display for StarTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// Lazy-loaded static schemas
lazy_static! {
    static ref SONG_DATA_SCHEMA: SchemaRef = Arc::new(song_data_schema());
    static ref LOG_DATA_SCHEMA: SchemaRef = Arc::new(log_data_schema());
}
