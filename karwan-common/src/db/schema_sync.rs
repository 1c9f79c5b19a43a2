//! Automatic Schema Synchronization
//!
//! Declarative column maintenance: the expected column set of each table
//! lives in code and missing columns are added on startup.
//!
//! # Architecture
//!
//! Three-phase initialization:
//! 1. **CREATE TABLE IF NOT EXISTS** - Create missing tables with the full column set
//! 2. **Auto-Sync** - Add missing columns via ALTER TABLE (THIS MODULE)
//! 3. **Versioned Migrations** - Backfills and indexes (migrations.rs)
//!
//! Sync is additive only. It never drops, renames or retypes a column. A
//! column whose declared type conflicts with the stored one cannot be fixed
//! here and aborts startup with [`Error::Migration`].
//!
//! # Usage
//!
//! ```rust,ignore
//! pub struct ProfilesTableSchema;
//!
//! impl TableSchema for ProfilesTableSchema {
//!     fn table_name() -> &'static str { "profiles" }
//!
//!     fn expected_columns() -> Vec<ColumnDefinition> {
//!         vec![
//!             ColumnDefinition::new("id", "TEXT").primary_key(),
//!             ColumnDefinition::new("email", "TEXT").not_null(),
//!             ColumnDefinition::new("business_url", "TEXT"),  // ADD COLUMN HERE
//!         ]
//!     }
//! }
//!
//! SchemaSync::sync_table::<ProfilesTableSchema>(&pool).await?;
//! ```

use crate::{Error, Result};
use sqlx::{Row, SqlitePool};
use tracing::{info, warn};

/// Column definition with SQL constraints
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDefinition {
    /// Column name
    pub name: String,
    /// SQL type (e.g., "TEXT", "INTEGER", "BLOB", "TIMESTAMP")
    pub sql_type: String,
    /// NOT NULL constraint
    pub not_null: bool,
    /// PRIMARY KEY constraint
    pub primary_key: bool,
    /// UNIQUE constraint
    pub unique: bool,
    /// DEFAULT value (SQL expression)
    pub default_value: Option<String>,
}

impl ColumnDefinition {
    /// Create new column definition
    pub fn new(name: impl Into<String>, sql_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sql_type: sql_type.into(),
            not_null: false,
            primary_key: false,
            unique: false,
            default_value: None,
        }
    }

    /// Mark column as PRIMARY KEY
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    /// Mark column as NOT NULL
    pub fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }

    /// Mark column as UNIQUE
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Set DEFAULT value
    pub fn default(mut self, value: impl Into<String>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    /// SQLite rejects `ALTER TABLE ADD COLUMN` with a default that is
    /// evaluated per row (`CURRENT_TIMESTAMP` and friends).
    fn has_non_constant_default(&self) -> bool {
        self.default_value.as_deref().is_some_and(|d| {
            let d = d.trim().to_uppercase();
            d.starts_with("CURRENT_") || d.starts_with('(')
        })
    }
}

/// Actual column from database introspection (PRAGMA table_info result)
#[derive(Debug, Clone)]
pub struct ActualColumn {
    /// Column ID (position in table)
    pub cid: i32,
    /// Column name
    pub name: String,
    /// SQL type from PRAGMA table_info
    pub type_name: String,
    /// NOT NULL constraint
    pub not_null: bool,
    /// DEFAULT value
    pub default_value: Option<String>,
    /// PRIMARY KEY flag
    pub pk: bool,
}

/// Schema drift detected between expected and actual schema
#[derive(Debug, Clone)]
pub enum SchemaDrift {
    /// Column missing from database
    MissingColumn {
        table: String,
        column: ColumnDefinition,
    },
    /// Column type mismatch (fatal - data would have to be rewritten)
    TypeMismatch {
        table: String,
        column: String,
        expected: String,
        actual: String,
    },
    /// Constraint mismatch (requires table recreation, left as is)
    ConstraintMismatch {
        table: String,
        column: String,
        constraint: String, // "NOT NULL", "PRIMARY KEY"
    },
}

/// Defines expected schema for a database table
pub trait TableSchema {
    /// Table name in database
    fn table_name() -> &'static str;

    /// Expected column definitions (order matters for new table creation)
    fn expected_columns() -> Vec<ColumnDefinition>;
}

/// Schema introspection - read actual database schema
pub struct SchemaIntrospector;

impl SchemaIntrospector {
    /// Read actual columns from database table using PRAGMA table_info
    ///
    /// Returns columns in database order (by cid)
    pub async fn introspect_table(pool: &SqlitePool, table_name: &str) -> Result<Vec<ActualColumn>> {
        let query = format!("PRAGMA table_info({})", table_name);
        let rows = sqlx::query(&query).fetch_all(pool).await?;

        let mut columns: Vec<ActualColumn> = rows
            .iter()
            .map(|row| ActualColumn {
                cid: row.get("cid"),
                name: row.get("name"),
                type_name: row.get("type"),
                not_null: row.get::<i32, _>("notnull") != 0,
                default_value: row.get("dflt_value"),
                pk: row.get::<i32, _>("pk") != 0,
            })
            .collect();

        columns.sort_by_key(|c| c.cid);

        Ok(columns)
    }

    /// Check if table exists
    pub async fn table_exists(pool: &SqlitePool, table_name: &str) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM sqlite_master
                WHERE type='table' AND name = ?
            )
            "#,
        )
        .bind(table_name)
        .fetch_one(pool)
        .await?;

        Ok(exists)
    }
}

/// Schema comparison - detect drift between expected and actual
pub struct SchemaDiff;

impl SchemaDiff {
    /// Compare expected schema to actual database schema
    pub fn compare(
        table_name: &str,
        expected: &[ColumnDefinition],
        actual: &[ActualColumn],
    ) -> Vec<SchemaDrift> {
        let mut drift = Vec::new();

        for expected_col in expected {
            if let Some(actual_col) = actual.iter().find(|c| c.name == expected_col.name) {
                if !Self::types_compatible(&expected_col.sql_type, &actual_col.type_name) {
                    drift.push(SchemaDrift::TypeMismatch {
                        table: table_name.to_string(),
                        column: expected_col.name.clone(),
                        expected: expected_col.sql_type.clone(),
                        actual: actual_col.type_name.clone(),
                    });
                }

                if expected_col.not_null && !actual_col.not_null {
                    drift.push(SchemaDrift::ConstraintMismatch {
                        table: table_name.to_string(),
                        column: expected_col.name.clone(),
                        constraint: "NOT NULL".to_string(),
                    });
                }

                if expected_col.primary_key && !actual_col.pk {
                    drift.push(SchemaDrift::ConstraintMismatch {
                        table: table_name.to_string(),
                        column: expected_col.name.clone(),
                        constraint: "PRIMARY KEY".to_string(),
                    });
                }
            } else {
                drift.push(SchemaDrift::MissingColumn {
                    table: table_name.to_string(),
                    column: expected_col.clone(),
                });
            }
        }

        drift
    }

    /// Check if SQL types are compatible (SQLite type affinity rules)
    fn types_compatible(expected: &str, actual: &str) -> bool {
        let exp = expected.to_uppercase();
        let act = actual.to_uppercase();

        if exp == act {
            return true;
        }

        // Untyped legacy columns have BLOB/NONE affinity and accept anything
        if act.is_empty() {
            return true;
        }

        // INTEGER affinity
        if exp.contains("INT") && act.contains("INT") {
            return true;
        }

        // TEXT affinity (timestamps are stored as text)
        let is_text = |t: &str| {
            t.contains("TEXT") || t.contains("CHAR") || t.contains("CLOB") || t.contains("TIMESTAMP")
        };
        if is_text(&exp) && is_text(&act) {
            return true;
        }

        // REAL affinity
        let is_real = |t: &str| t.contains("REAL") || t.contains("FLOA") || t.contains("DOUB");
        if is_real(&exp) && is_real(&act) {
            return true;
        }

        false
    }
}

/// Schema synchronization - apply additive schema changes to database
pub struct SchemaSync;

impl SchemaSync {
    /// Synchronize table schema: detect drift and apply fixes
    ///
    /// **What this fixes:**
    /// - Missing columns (via ALTER TABLE ADD COLUMN)
    ///
    /// **What aborts with [`Error::Migration`]:**
    /// - Type conflicts between declared and stored columns
    ///
    /// **What is only logged:**
    /// - Constraint differences (SQLite would need a table rebuild)
    ///
    /// Returns the names of columns that were added.
    pub async fn sync_table<T: TableSchema>(pool: &SqlitePool) -> Result<Vec<String>> {
        let table_name = T::table_name();
        let expected = T::expected_columns();

        info!("Schema sync: Checking table '{}'", table_name);

        if !SchemaIntrospector::table_exists(pool, table_name).await? {
            warn!(
                "  Table '{}' does not exist - should be created by CREATE TABLE IF NOT EXISTS first",
                table_name
            );
            return Ok(Vec::new());
        }

        let actual = SchemaIntrospector::introspect_table(pool, table_name).await?;
        let drift = SchemaDiff::compare(table_name, &expected, &actual);

        if drift.is_empty() {
            info!("  ✓ Schema up to date for '{}'", table_name);
            return Ok(Vec::new());
        }

        // Refuse before touching anything if a column cannot be reconciled
        let conflicts: Vec<String> = drift
            .iter()
            .filter_map(|change| match change {
                SchemaDrift::TypeMismatch { table, column, expected, actual } => Some(format!(
                    "{}.{} is '{}' but '{}' is required",
                    table, column, actual, expected
                )),
                _ => None,
            })
            .collect();

        if !conflicts.is_empty() {
            return Err(Error::Migration(format!(
                "conflicting column types: {}",
                conflicts.join(", ")
            )));
        }

        let mut added = Vec::new();
        for change in drift {
            match change {
                SchemaDrift::MissingColumn { table, column } => {
                    Self::add_column(pool, &table, &column).await?;
                    added.push(column.name);
                }
                SchemaDrift::ConstraintMismatch { table, column, constraint } => {
                    warn!(
                        "  ⚠ Constraint mismatch in {}.{}: missing '{}'. Kept as is.",
                        table, column, constraint
                    );
                }
                SchemaDrift::TypeMismatch { .. } => {}
            }
        }

        Ok(added)
    }

    /// Add missing column to table via ALTER TABLE ADD COLUMN
    ///
    /// Columns with a per-row default are added nullable and backfilled with
    /// that default, since SQLite only accepts constant defaults here.
    async fn add_column(pool: &SqlitePool, table: &str, column: &ColumnDefinition) -> Result<()> {
        let mut sql = format!(
            "ALTER TABLE {} ADD COLUMN {} {}",
            table, column.name, column.sql_type
        );

        // SQLite ALTER TABLE ADD COLUMN limitations:
        // - PRIMARY KEY: Not supported (requires table recreation)
        // - UNIQUE: Not supported (requires table recreation)
        // - NOT NULL: Only with a constant DEFAULT

        if column.primary_key {
            warn!(
                "  ⚠ Cannot add PRIMARY KEY column {}.{} via ALTER TABLE. \
                 Column will be created without PRIMARY KEY constraint.",
                table, column.name
            );
        }

        if column.unique {
            warn!(
                "  ⚠ Cannot add UNIQUE column {}.{} via ALTER TABLE. \
                 Column will be created without UNIQUE constraint.",
                table, column.name
            );
        }

        let backfill = column.has_non_constant_default();

        if backfill {
            // Added nullable, filled below
        } else if column.not_null {
            if let Some(default) = &column.default_value {
                sql.push_str(&format!(" NOT NULL DEFAULT {}", default));
            } else {
                warn!(
                    "  ⚠ Cannot add NOT NULL column {}.{} without DEFAULT value. \
                     Column will be nullable.",
                    table, column.name
                );
            }
        } else if let Some(default) = &column.default_value {
            sql.push_str(&format!(" DEFAULT {}", default));
        }

        info!("  ✓ Adding column: {}.{} ({})", table, column.name, column.sql_type);

        match sqlx::query(&sql).execute(pool).await {
            Ok(_) => {}
            Err(sqlx::Error::Database(db_err)) if db_err.message().contains("duplicate column") => {
                // Concurrent initialization - column added by another process
                info!("  Column {}.{} already added (concurrent initialization)", table, column.name);
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        }

        if let (true, Some(default)) = (backfill, &column.default_value) {
            let fill = format!(
                "UPDATE {} SET {} = {} WHERE {} IS NULL",
                table, column.name, default, column.name
            );
            let filled = sqlx::query(&fill).execute(pool).await?.rows_affected();
            info!("  ✓ Backfilled {}.{} on {} rows", table, column.name, filled);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn setup_test_db() -> SqlitePool {
        SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap()
    }

    struct MembersSchema;

    impl TableSchema for MembersSchema {
        fn table_name() -> &'static str {
            "members"
        }

        fn expected_columns() -> Vec<ColumnDefinition> {
            vec![
                ColumnDefinition::new("id", "TEXT").primary_key(),
                ColumnDefinition::new("email", "TEXT").not_null(),
                ColumnDefinition::new("city", "TEXT"),
                ColumnDefinition::new("profession", "TEXT").not_null().default("''"),
                ColumnDefinition::new("created_at", "TIMESTAMP")
                    .not_null()
                    .default("CURRENT_TIMESTAMP"),
            ]
        }
    }

    #[test]
    fn test_column_definition_builder() {
        let col = ColumnDefinition::new("test_col", "TEXT")
            .not_null()
            .unique()
            .default("'default_value'");

        assert_eq!(col.name, "test_col");
        assert_eq!(col.sql_type, "TEXT");
        assert!(col.not_null);
        assert!(col.unique);
        assert_eq!(col.default_value, Some("'default_value'".to_string()));
        assert!(!col.has_non_constant_default());
        assert!(ColumnDefinition::new("t", "TIMESTAMP")
            .default("CURRENT_TIMESTAMP")
            .has_non_constant_default());
    }

    #[test]
    fn test_types_compatible() {
        assert!(SchemaDiff::types_compatible("TEXT", "TEXT"));
        assert!(SchemaDiff::types_compatible("text", "TEXT"));
        assert!(SchemaDiff::types_compatible("INTEGER", "INT"));
        assert!(SchemaDiff::types_compatible("TEXT", "VARCHAR(255)"));
        assert!(SchemaDiff::types_compatible("TIMESTAMP", "TEXT"));
        assert!(SchemaDiff::types_compatible("REAL", "DOUBLE"));
        assert!(SchemaDiff::types_compatible("BLOB", ""));

        assert!(!SchemaDiff::types_compatible("TEXT", "INTEGER"));
        assert!(!SchemaDiff::types_compatible("BLOB", "TEXT"));
    }

    #[tokio::test]
    async fn test_introspect_table() {
        let pool = setup_test_db().await;

        sqlx::query("CREATE TABLE members (id TEXT PRIMARY KEY, email TEXT NOT NULL, photo BLOB)")
            .execute(&pool)
            .await
            .unwrap();

        let columns = SchemaIntrospector::introspect_table(&pool, "members")
            .await
            .unwrap();

        assert_eq!(columns.len(), 3);
        assert_eq!(columns[0].name, "id");
        assert!(columns[0].pk);
        assert_eq!(columns[1].name, "email");
        assert!(columns[1].not_null);
        assert_eq!(columns[2].type_name, "BLOB");
        assert!(!columns[2].not_null);
    }

    #[tokio::test]
    async fn test_sync_adds_missing_columns_and_keeps_rows() {
        let pool = setup_test_db().await;

        sqlx::query("CREATE TABLE members (id TEXT PRIMARY KEY, email TEXT NOT NULL)")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query("INSERT INTO members (id, email) VALUES ('m1', 'a@example.com')")
            .execute(&pool)
            .await
            .unwrap();

        let added = SchemaSync::sync_table::<MembersSchema>(&pool).await.unwrap();
        assert_eq!(added, vec!["city", "profession", "created_at"]);

        let (email, city, profession, created_at): (String, Option<String>, String, Option<String>) =
            sqlx::query_as("SELECT email, city, profession, created_at FROM members WHERE id = 'm1'")
                .fetch_one(&pool)
                .await
                .unwrap();

        assert_eq!(email, "a@example.com");
        assert_eq!(city, None);
        assert_eq!(profession, "");
        assert!(created_at.is_some(), "non-constant default should be backfilled");
    }

    #[tokio::test]
    async fn test_sync_idempotent() {
        let pool = setup_test_db().await;

        sqlx::query("CREATE TABLE members (id TEXT PRIMARY KEY, email TEXT NOT NULL)")
            .execute(&pool)
            .await
            .unwrap();

        SchemaSync::sync_table::<MembersSchema>(&pool).await.unwrap();
        let second = SchemaSync::sync_table::<MembersSchema>(&pool).await.unwrap();
        assert!(second.is_empty());

        let column_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM pragma_table_info('members')")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(column_count, 5);
    }

    #[tokio::test]
    async fn test_type_conflict_is_fatal_and_changes_nothing() {
        let pool = setup_test_db().await;

        sqlx::query("CREATE TABLE members (id TEXT PRIMARY KEY, email INTEGER NOT NULL)")
            .execute(&pool)
            .await
            .unwrap();

        let err = SchemaSync::sync_table::<MembersSchema>(&pool).await.unwrap_err();
        assert!(matches!(err, Error::Migration(_)), "{:?}", err);

        let column_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM pragma_table_info('members')")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(column_count, 2);
    }

    #[tokio::test]
    async fn test_missing_table_is_skipped() {
        let pool = setup_test_db().await;
        let added = SchemaSync::sync_table::<MembersSchema>(&pool).await.unwrap();
        assert!(added.is_empty());
        assert!(!SchemaIntrospector::table_exists(&pool, "members").await.unwrap());
    }
}
