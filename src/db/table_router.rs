//! Deterministic table identifiers and the fixed column layout they carry.
//!
//! Identifiers are never built from free text: every component must already be
//! allow-listed, and the joined result is checked again before any SQL sees it.

use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

use crate::catalog::{self, CanonicalField};
use crate::error::{AppError, Result};
use crate::types::Combination;

pub const SEPARATOR: &str = "_";

/// SQLite accepts longer names; 63 keeps identifiers portable to other backends.
const IDENTIFIER_PATTERN: &str = r"^[A-Za-z][A-Za-z0-9_]{0,62}$";

fn identifier_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(IDENTIFIER_PATTERN).expect("valid identifier pattern"))
}

/// A table identifier that has passed validation. Only constructible through [`TableName::parse`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct TableName(String);

impl TableName {
    pub fn parse(name: &str) -> Result<Self> {
        if identifier_re().is_match(name) {
            Ok(Self(name.to_string()))
        } else {
            Err(AppError::InvalidTableName(name.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Double-quoted form for DDL/DML.
    pub fn quoted(&self) -> String {
        format!("\"{}\"", self.as_str())
    }
}

impl std::fmt::Display for TableName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Accept a name component only if every character is a letter, digit or underscore.
/// Anything else is rejected, never stripped: stripping `SH&SZ` and `SHSZ` would collide.
pub fn check_component(component: &str) -> Result<&str> {
    if !component.is_empty() && component.chars().all(|ch| ch.is_ascii_alphanumeric() || ch == '_') {
        Ok(component)
    } else {
        Err(AppError::InvalidTableName(format!(
            "component '{component}' contains characters outside [A-Za-z0-9_]"
        )))
    }
}

/// `Stock_Flow_All_Stocks_Today`, `Sector_Flow_Concept_Flow_5_Day`, ...
pub fn table_name_for(c: &Combination) -> Result<TableName> {
    catalog::validate(c)?;
    let parts = [
        check_component(c.scope_kind.label())?,
        check_component(c.selector.slug())?,
        check_component(c.period.slug())?,
    ];
    TableName::parse(&parts.join(SEPARATOR))
}

// ---------------------------------------------------------------------------
// Column registry
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
pub struct Column {
    pub name: &'static str,
    pub sql_type: &'static str,
}

const fn col(name: &'static str, sql_type: &'static str) -> Column {
    Column { name, sql_type }
}

/// Data columns in insert order. Every combination table also has an `id` primary key.
pub const COLUMNS: &[Column] = &[
    col("rank", "INTEGER NOT NULL"),
    col("code", "TEXT NOT NULL"),
    col("name", "TEXT NOT NULL"),
    col("scope_kind", "TEXT NOT NULL"),
    col("scope_selector", "TEXT NOT NULL"),
    col("period", "TEXT NOT NULL"),
    col("latest_price", "REAL"),
    col("change_percentage", "REAL NOT NULL"),
    col("main_flow_net_amount", "REAL NOT NULL"),
    col("main_flow_net_percentage", "REAL NOT NULL"),
    col("extra_large_order_flow_net_amount", "REAL NOT NULL"),
    col("extra_large_order_flow_net_percentage", "REAL NOT NULL"),
    col("large_order_flow_net_amount", "REAL NOT NULL"),
    col("large_order_flow_net_percentage", "REAL NOT NULL"),
    col("medium_order_flow_net_amount", "REAL NOT NULL"),
    col("medium_order_flow_net_percentage", "REAL NOT NULL"),
    col("small_order_flow_net_amount", "REAL NOT NULL"),
    col("small_order_flow_net_percentage", "REAL NOT NULL"),
    col("captured_at", "TEXT NOT NULL"),
];

pub fn create_table_sql(table: &TableName) -> String {
    let columns: Vec<String> = COLUMNS
        .iter()
        .map(|c| format!("{} {}", c.name, c.sql_type))
        .collect();
    format!(
        "CREATE TABLE IF NOT EXISTS {} (id INTEGER PRIMARY KEY AUTOINCREMENT, {})",
        table.quoted(),
        columns.join(", ")
    )
}

pub fn insert_sql(table: &TableName) -> String {
    let names: Vec<&str> = COLUMNS.iter().map(|c| c.name).collect();
    let placeholders = vec!["?"; COLUMNS.len()].join(", ");
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        table.quoted(),
        names.join(", "),
        placeholders
    )
}

/// Whether the registry carries a column for every canonical flow field.
#[cfg(test)]
pub fn covers_canonical_fields() -> bool {
    CanonicalField::ALL
        .iter()
        .all(|f| COLUMNS.iter().any(|c| c.name == f.column()))
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::catalog::enumerate;
    use crate::types::{MarketSegment, Period, SectorCategory};

    #[test]
    fn names_are_deterministic_and_allow_listed() {
        for c in enumerate() {
            let first = table_name_for(&c).unwrap();
            let second = table_name_for(&c).unwrap();
            assert_eq!(first, second);
            assert!(
                first.as_str().chars().all(|ch| ch.is_ascii_alphanumeric() || ch == '_'),
                "{first}"
            );
        }
    }

    #[test]
    fn names_are_unique_across_the_catalog() {
        let names: HashSet<TableName> = enumerate().iter().map(|c| table_name_for(c).unwrap()).collect();
        assert_eq!(names.len(), enumerate().len());
    }

    #[test]
    fn names_follow_the_reference_layout() {
        let c = Combination::instrument(MarketSegment::ShSzAShares, Period::ThreeDay);
        assert_eq!(table_name_for(&c).unwrap().as_str(), "Stock_Flow_SH_SZ_A_Shares_3_Day");
        let c = Combination::sector(SectorCategory::Regional, Period::Today);
        assert_eq!(table_name_for(&c).unwrap().as_str(), "Sector_Flow_Regional_Flow_Today");
    }

    #[test]
    fn disallowed_characters_are_rejected_not_stripped() {
        assert!(check_component("SH&SZ_A_Shares").is_err());
        assert!(check_component("All Stocks").is_err());
        assert!(check_component("x\";DROP TABLE t;--").is_err());
        assert!(check_component("").is_err());
        assert_eq!(check_component("STAR_Market").unwrap(), "STAR_Market");
    }

    #[test]
    fn parse_rejects_injection_and_leading_digits() {
        assert!(TableName::parse("a\"b").is_err());
        assert!(TableName::parse("1_Day").is_err());
        assert!(TableName::parse(&"x".repeat(64)).is_err());
        assert!(TableName::parse("Stock_Flow_All_Stocks_Today").is_ok());
    }

    #[test]
    fn invalid_combination_has_no_table() {
        let c = Combination::sector(SectorCategory::Concept, Period::ThreeDay);
        assert!(matches!(table_name_for(&c), Err(AppError::InvalidCombination(_))));
    }

    #[test]
    fn registry_covers_every_canonical_field() {
        assert!(covers_canonical_fields());
        let sql = insert_sql(&TableName::parse("t").unwrap());
        assert_eq!(sql.matches('?').count(), COLUMNS.len());
    }
}
