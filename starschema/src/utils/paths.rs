use crate::schema::StarTable;

/// Directory under the output root that holds in-flight table writes.
pub const STAGING_DIR: &str = "_staging";

pub const SUCCESS_MARKER: &str = "_SUCCESS";

/// Builds the relative locations a run writes to.
pub struct PathBuilder {
    run_id: String,
}

impl PathBuilder {
    pub fn new(run_id: &str) -> Self {
        Self {
            run_id: run_id.to_string(),
        }
    }

    pub fn staging_root(&self) -> String {
        format!("{}/{}", STAGING_DIR, self.run_id)
    }

    pub fn staging_table(&self, table: StarTable) -> String {
        format!("{}/{}", self.staging_root(), table.directory())
    }

    pub fn final_table(&self, table: StarTable) -> String {
        table.directory()
    }

    pub fn marker(&self, table: StarTable) -> String {
        format!("{}/{}", self.final_table(table), SUCCESS_MARKER)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn staging_is_scoped_by_run() {
        let paths = PathBuilder::new("run-1");

        assert_eq!(
            paths.staging_table(StarTable::Songplays),
            "_staging/run-1/songplays_table.parquet"
        );
        assert_eq!(paths.final_table(StarTable::Artists), "artists_table.parquet");
        assert_eq!(paths.marker(StarTable::Users), "users_table.parquet/_SUCCESS");
    }
}
