use common::Result;
use datafusion::prelude::*;
use std::time::Instant;
use tracing::info;

/// Dimension tables derived from the song catalog.
#[derive(Clone)]
pub struct CatalogTables {
    pub songs: DataFrame,
    pub artists: DataFrame,
}

/// Builds the `songs` and `artists` dimensions. Both are total projections of
/// the catalog followed by full-row dedup.
pub struct SongCatalogTransformer;

impl SongCatalogTransformer {
    pub fn new() -> Self {
        Self
    }

    pub fn transform(&self, song_data: DataFrame) -> Result<CatalogTables> {
        let start = Instant::now();

        let songs = song_data
            .clone()
            .select(vec![
                ident("song_id"),
                ident("title"),
                ident("artist_id"),
                ident("year"),
                ident("duration"),
            ])?
            .distinct()?;

        let artists = song_data
            .select(vec![
                ident("artist_id"),
                ident("artist_name"),
                ident("artist_location"),
                ident("artist_latitude"),
                ident("artist_longitude"),
            ])?
            .distinct()?;

        info!(
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Planned songs and artists tables"
        );

        Ok(CatalogTables { songs, artists })
    }
}

impl Default for SongCatalogTransformer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::testing::{frame, rows, song, strings};
    use crate::schema::RawSource;
    use serde_json::json;

    #[tokio::test]
    async fn builds_songs_from_the_reference_record() {
        let ctx = SessionContext::new();
        let catalog = frame(
            &ctx,
            RawSource::SongData,
            &[song("S1", "Song A", "AR1", "Artist X", 210.5)],
        );

        let tables = SongCatalogTransformer::new().transform(catalog).unwrap();

        assert_eq!(
            rows(tables.songs, &["song_id", "title", "artist_id", "year", "duration"]).await,
            vec![strings(&["S1", "Song A", "AR1", "2000", "210.5"])]
        );
    }

    #[tokio::test]
    async fn collapses_only_identical_rows() {
        let ctx = SessionContext::new();
        let catalog = frame(
            &ctx,
            RawSource::SongData,
            &[
                song("S1", "Song A", "AR1", "Artist X", 210.5),
                song("S1", "Song A", "AR1", "Artist X", 210.5),
                song("S1", "Song A ", "AR1", "Artist X", 210.5),
                song("S2", "song b", "AR1", "artist x", 99.0),
            ],
        );

        let tables = SongCatalogTransformer::new().transform(catalog).unwrap();

        assert_eq!(tables.songs.count().await.unwrap(), 3);
        // "Artist X" and "artist x" differ only in case and stay distinct
        assert_eq!(
            rows(tables.artists, &["artist_id", "artist_name"]).await,
            vec![strings(&["AR1", "Artist X"]), strings(&["AR1", "artist x"])]
        );
    }

    #[tokio::test]
    async fn dedup_is_idempotent() {
        let ctx = SessionContext::new();
        let mut with_location = song("S3", "Song C", "AR2", "Artist Y", 120.0);
        with_location["artist_location"] = json!("Berlin");
        with_location["artist_latitude"] = json!(52.52);
        let catalog = frame(
            &ctx,
            RawSource::SongData,
            &[
                song("S3", "Song C", "AR2", "Artist Y", 120.0),
                with_location.clone(),
                with_location,
            ],
        );

        let once = SongCatalogTransformer::new().transform(catalog).unwrap();
        let twice_artists = once.artists.clone().distinct().unwrap();
        let twice_songs = once.songs.clone().distinct().unwrap();

        let columns = [
            "artist_id",
            "artist_name",
            "artist_location",
            "artist_latitude",
            "artist_longitude",
        ];
        let artists_once = rows(once.artists, &columns).await;
        assert_eq!(artists_once.len(), 2);
        assert_eq!(artists_once, rows(twice_artists, &columns).await);
        assert_eq!(
            rows(once.songs, &["song_id", "duration"]).await,
            rows(twice_songs, &["song_id", "duration"]).await
        );
    }
}
