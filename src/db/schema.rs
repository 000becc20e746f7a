use crate::db::connection::BibleDb;
use crate::BibleError;

/// Continuity storage: entity records and the conflict log
const SCHEMA_001: &str = include_str!("migrations/001_continuity.surql");

/// Apply the database schema to an initialized database connection.
///
/// All statements use `IF NOT EXISTS`, so it's safe to call on every start.
///
/// # Example
///
/// ```no_run
/// # use storybible::db::{connection::{connect, StoreConfig}, schema::apply_schema};
/// # use std::path::Path;
/// # async fn example() -> Result<(), storybible::BibleError> {
/// let db = connect(&StoreConfig::default(), Path::new("./data")).await?;
/// apply_schema(&db).await?;
/// # Ok(())
/// # }
/// ```
pub async fn apply_schema(db: &BibleDb) -> Result<(), BibleError> {
    db.query(SCHEMA_001).await?.check()?;
    Ok(())
}
