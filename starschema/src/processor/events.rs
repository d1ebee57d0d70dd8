use super::catalog::CatalogTables;
use super::udf::{CalendarPart, calendar_part_udf, epoch_millis_to_timestamp_udf};
use crate::schema::RECORD_ORDINAL;
use common::Result;
use datafusion::functions_window::expr_fn::row_number;
use datafusion::logical_expr::ExprFunctionExt;
use datafusion::prelude::*;
use std::time::Instant;
use tracing::info;

/// The only `page` value that denotes an actual song play.
pub const NEXT_SONG: &str = "NextSong";

const RECENCY_RANK: &str = "recency_rank";

/// Identity of a user as it appears in the log.
const USER_IDENTITY: [&str; 4] = ["userId", "firstName", "lastName", "gender"];

/// Dimension and fact tables derived from the event log.
#[derive(Clone)]
pub struct EventTables {
    pub users: DataFrame,
    pub time: DataFrame,
    pub songplays: DataFrame,
}

/// Derives `users`, `time` and `songplays` from log events, matching plays
/// against the catalog.
///
/// Events without a `ts` are dropped from every derivation, since neither the
/// latest level nor `start_time` can be computed for them. Plays without a
/// catalog match keep null `song_id`/`artist_id`.
pub struct EventLogTransformer;

impl EventLogTransformer {
    pub fn new() -> Self {
        Self
    }

    pub fn transform(&self, log_data: DataFrame, catalog: &CatalogTables) -> Result<EventTables> {
        let start = Instant::now();

        let timed = self.timed(log_data)?;
        let users = self.users(timed.clone())?;
        let plays = self.plays(timed)?;
        let catalog_keys = self.catalog_keys(catalog)?;
        let songplays = self.songplays(plays, catalog_keys)?;
        let time = self.time(songplays.clone())?;

        info!(
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Planned users, time and songplays tables"
        );

        Ok(EventTables {
            users,
            time,
            songplays,
        })
    }

    /// Events whose `ts` resolves to a `start_time`. Missing and out-of-range
    /// `ts` values drop out here for every derivation.
    fn timed(&self, log_data: DataFrame) -> Result<DataFrame> {
        let to_timestamp = epoch_millis_to_timestamp_udf();

        let timed = log_data
            .with_column("start_time", to_timestamp.call(vec![ident("ts")]))?
            .filter(ident("start_time").is_not_null())?;

        Ok(timed)
    }

    /// One row per identity tuple, carrying the `level` of the identity's
    /// latest event. Equal `ts` values resolve to the event seen first.
    fn users(&self, timed: DataFrame) -> Result<DataFrame> {
        let latest_first = row_number()
            .partition_by(USER_IDENTITY.iter().map(|c| ident(*c)).collect())
            .order_by(vec![
                ident("ts").sort(false, false),
                ident(RECORD_ORDINAL).sort(true, false),
            ])
            .build()?;

        let mut columns: Vec<Expr> = USER_IDENTITY.iter().map(|c| ident(*c)).collect();
        columns.push(ident("level"));

        let users = timed
            .with_column(RECENCY_RANK, latest_first)?
            .filter(ident(RECENCY_RANK).eq(lit(1_u64)))?
            .select(columns)?;

        Ok(users)
    }

    /// Play events with `start_time` resolved, projected to the fact columns
    /// plus the matching key.
    fn plays(&self, timed: DataFrame) -> Result<DataFrame> {
        let plays = timed
            .filter(ident("page").eq(lit(NEXT_SONG)))?
            .select(vec![
                ident("start_time"),
                ident("userId").alias("user_id"),
                ident("level"),
                ident("sessionId").alias("session_id"),
                ident("location"),
                ident("userAgent").alias("user_agent"),
                ident("song"),
                ident("artist"),
                ident("length"),
            ])?;

        Ok(plays)
    }

    /// `songs ⋈ artists` on `artist_id`, keyed by `(title, artist_name, duration)`.
    fn catalog_keys(&self, catalog: &CatalogTables) -> Result<DataFrame> {
        let artists = catalog.artists.clone().select(vec![
            ident("artist_id").alias("catalog_artist_id"),
            ident("artist_name"),
        ])?;

        let keys = catalog
            .songs
            .clone()
            .select(vec![
                ident("song_id"),
                ident("title"),
                ident("artist_id"),
                ident("duration"),
            ])?
            .join(
                artists,
                JoinType::Inner,
                &["artist_id"],
                &["catalog_artist_id"],
                None,
            )?
            .select(vec![
                ident("song_id"),
                ident("artist_id"),
                ident("title"),
                ident("artist_name"),
                ident("duration"),
            ])?;

        Ok(keys)
    }

    /// Left join of plays to the catalog on the structured key
    /// `(song, artist, length) = (title, artist_name, duration)`, then full-row
    /// dedup of the fact projection.
    fn songplays(&self, plays: DataFrame, catalog_keys: DataFrame) -> Result<DataFrame> {
        let month = calendar_part_udf(CalendarPart::Month);
        let year = calendar_part_udf(CalendarPart::Year);

        let songplays = plays
            .join(
                catalog_keys,
                JoinType::Left,
                &["song", "artist", "length"],
                &["title", "artist_name", "duration"],
                None,
            )?
            .select(vec![
                ident("start_time"),
                ident("user_id"),
                ident("level"),
                ident("song_id"),
                ident("artist_id"),
                ident("session_id"),
                ident("location"),
                ident("user_agent"),
            ])?
            .distinct()?
            .with_column("month", month.call(vec![ident("start_time")]))?
            .with_column("year", year.call(vec![ident("start_time")]))?;

        Ok(songplays)
    }

    fn time(&self, songplays: DataFrame) -> Result<DataFrame> {
        let part = |part: CalendarPart, name: &str| {
            calendar_part_udf(part)
                .call(vec![ident("start_time")])
                .alias(name)
        };

        let time = songplays
            .select(vec![ident("start_time")])?
            .distinct()?
            .select(vec![
                ident("start_time"),
                part(CalendarPart::Hour, "hour"),
                part(CalendarPart::DayOfYear, "day_of_year"),
                part(CalendarPart::WeekOfYear, "week_of_year"),
                part(CalendarPart::Month, "month"),
                part(CalendarPart::Year, "year"),
                part(CalendarPart::Weekday, "weekday"),
            ])?;

        Ok(time)
    }
}

impl Default for EventLogTransformer {
    fn default() -> Self {
        Self::new()
    }
}
