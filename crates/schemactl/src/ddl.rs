//! Text heuristics over stored DDL.
//!
//! The catalogs do not expose everything the schema model needs: sqlite's
//! pragmas omit AUTOINCREMENT and CHECK clauses, and MySQL only reliably
//! reports CHECK constraints through `SHOW CREATE TABLE`. These helpers
//! recover that information by scanning the stored DDL text. They are
//! best-effort structural parses, not a SQL grammar: a no-match is treated
//! as "absent", never as an error. Known not to handle multi-line CHECK
//! expressions or identifiers with embedded commas.

use std::sync::LazyLock;

use regex::Regex;

/// Literal marker separating a migration file's forward and rollback halves.
pub const ROLLBACK_MARKER: &str = "-- schema rollback";

static CHECK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bCHECK\s*\((.*)\)").expect("check regex"));

static NAMED_CHECK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"CONSTRAINT\s+["'`]?(\w+)["'`]?\s+CHECK\s*\((.*)\)"#).expect("named check regex")
});

static ENGINE_SUFFIX_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\s*ENGINE=\w+.*(?:DEFAULT)?\s*CHARSET=\S+( COLLATE=\S+)?;?").expect("engine regex")
});

/// Splits a migration file into its forward script and, if the marker is
/// present, the rollback script after it.
#[must_use]
pub fn split_migration(content: &str) -> (&str, Option<&str>) {
    content
        .split_once(ROLLBACK_MARKER)
        .map_or((content, None), |(forward, rollback)| {
            (forward, Some(rollback))
        })
}

/// Scans a stored `CREATE TABLE` statement for columns declared
/// AUTOINCREMENT.
///
/// sqlite's `table_info` pragma does not expose the flag, so the
/// parenthesized body is split on top-level commas and each definition
/// containing the literal token yields its first whitespace-delimited
/// token (stripped of quoting characters) as a column name. Works for
/// single-line and multi-line DDL alike.
#[must_use]
pub fn autoincrement_columns(create_sql: &str) -> Vec<String> {
    let Some((open, close)) = create_sql
        .find('(')
        .zip(create_sql.rfind(')'))
        .filter(|(open, close)| close > open)
    else {
        return Vec::new();
    };

    let mut cols = Vec::new();
    for def in split_top_level_commas(&create_sql[open + 1..close]) {
        if def.to_uppercase().contains("AUTOINCREMENT") {
            if let Some(first) = def.split_whitespace().next() {
                cols.push(
                    first
                        .trim_matches(|c| matches!(c, '"' | '`' | '[' | ']'))
                        .to_string(),
                );
            }
        }
    }
    cols
}

/// Recovers `CHECK(...)` expressions from a stored sqlite `CREATE TABLE`
/// statement, one line at a time. A trailing `),` or `)` left over from
/// the greedy match is trimmed off.
#[must_use]
pub fn sqlite_check_expressions(create_sql: &str) -> Vec<String> {
    let mut exprs = Vec::new();
    for line in create_sql.lines() {
        if let Some(caps) = CHECK_RE.captures(line) {
            let raw = &caps[1];
            let expr = raw
                .strip_suffix("),")
                .or_else(|| raw.strip_suffix(')'))
                .unwrap_or(raw);
            exprs.push(expr.trim().to_string());
        }
    }
    exprs
}

/// Recovers CHECK constraints from `SHOW CREATE TABLE` output.
///
/// Returns `(name, expression)` pairs; the name is empty for bare
/// `CHECK(...)` clauses. Lines already matched as named constraints are
/// not re-matched by the bare pattern.
#[must_use]
pub fn mysql_check_constraints(create_sql: &str) -> Vec<(String, String)> {
    let mut checks = Vec::new();
    for raw_line in create_sql.lines() {
        let line = raw_line.trim().trim_end_matches(',').trim();
        if let Some(caps) = NAMED_CHECK_RE.captures(line) {
            checks.push((caps[1].to_string(), strip_outer_parens(&caps[2]).to_string()));
        } else if let Some(caps) = CHECK_RE.captures(line) {
            if !line.starts_with("CONSTRAINT") {
                checks.push((String::new(), strip_outer_parens(&caps[1]).to_string()));
            }
        }
    }
    checks
}

/// Strips matched outer parentheses, repeatedly.
#[must_use]
pub fn strip_outer_parens(s: &str) -> &str {
    let mut s = s.trim();
    while let Some(inner) = s.strip_prefix('(').and_then(|r| r.strip_suffix(')')) {
        s = inner;
    }
    s
}

/// Parses the declared value list out of a MySQL `column_type` such as
/// `enum('a','b')`, quote-stripped.
#[must_use]
pub fn mysql_enum_values(column_type: &str) -> Vec<String> {
    let inner = column_type
        .strip_prefix("enum(")
        .and_then(|r| r.strip_suffix(')'))
        .unwrap_or(column_type);
    inner
        .split(',')
        .map(|v| v.trim().trim_matches('\'').to_string())
        .collect()
}

/// Synthesizes an enum type name for engines without a native enum
/// catalog: `<table>_<column>`, with a `status` column on a plural table
/// name singularized (`orders.status` becomes `order_status`).
#[must_use]
pub fn enum_type_name(table: &str, column: &str) -> String {
    if column == "status" {
        if let Some(singular) = table.strip_suffix('s') {
            return format!("{singular}_{column}");
        }
    }
    format!("{table}_{column}")
}

/// Splits a column-definition list on top-level commas only, so commas
/// inside `CHECK(...)` or type parameters survive.
#[must_use]
pub fn split_top_level_commas(s: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0_i32;
    let mut last_split = 0;
    for (i, c) in s.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth -= 1,
            ',' if depth == 0 => {
                parts.push(&s[last_split..i]);
                last_split = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&s[last_split..]);
    parts
}

/// Strips the storage-engine/charset suffix MySQL appends to
/// `SHOW CREATE TABLE` output.
#[must_use]
pub fn strip_engine_suffix(create_sql: &str) -> String {
    ENGINE_SUFFIX_RE.replace_all(create_sql, "").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_migration_with_marker() {
        let content = "CREATE TABLE t (id INTEGER);\n\n-- schema rollback\n\nDROP TABLE t;\n";
        let (forward, rollback) = split_migration(content);
        assert!(forward.contains("CREATE TABLE t"));
        assert_eq!(rollback.unwrap().trim(), "DROP TABLE t;");
    }

    #[test]
    fn test_split_migration_without_marker() {
        let (forward, rollback) = split_migration("CREATE TABLE t (id INTEGER);");
        assert_eq!(forward, "CREATE TABLE t (id INTEGER);");
        assert!(rollback.is_none());
    }

    #[test]
    fn test_split_migration_empty_rollback_half() {
        let (_, rollback) = split_migration("CREATE TABLE t (id INTEGER);\n-- schema rollback\n\n");
        assert!(rollback.unwrap().trim().is_empty());
    }

    #[test]
    fn test_autoincrement_scan() {
        let ddl = "CREATE TABLE t (\n  id INTEGER PRIMARY KEY AUTOINCREMENT,\n  name TEXT\n)";
        assert_eq!(autoincrement_columns(ddl), vec!["id"]);
    }

    #[test]
    fn test_autoincrement_scan_quoted_column() {
        let ddl = "CREATE TABLE t (\n  \"id\" INTEGER PRIMARY KEY AUTOINCREMENT\n)";
        assert_eq!(autoincrement_columns(ddl), vec!["id"]);
    }

    #[test]
    fn test_autoincrement_scan_single_line_ddl() {
        // sqlite stores one-statement DDL exactly as typed, parens and all.
        let ddl = "CREATE TABLE t (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT NOT NULL, CHECK(length(name) > 0))";
        assert_eq!(autoincrement_columns(ddl), vec!["id"]);
    }

    #[test]
    fn test_autoincrement_scan_absent() {
        assert!(autoincrement_columns("CREATE TABLE t (id INTEGER PRIMARY KEY)").is_empty());
    }

    #[test]
    fn test_sqlite_check_expression() {
        let ddl = "CREATE TABLE t (\n  name TEXT NOT NULL,\n  CHECK(length(name) > 0)\n)";
        assert_eq!(sqlite_check_expressions(ddl), vec!["length(name) > 0"]);
    }

    #[test]
    fn test_sqlite_check_trailing_comma_artifact() {
        // Inline CHECK followed by another definition on the same line.
        let ddl = "CREATE TABLE t (\n  age INTEGER CHECK(age > 0),\n  name TEXT\n)";
        assert_eq!(sqlite_check_expressions(ddl), vec!["age > 0"]);
    }

    #[test]
    fn test_sqlite_check_nested_parens() {
        let ddl = "CREATE TABLE t (\n  CHECK(length(trim(name)) > 0)\n)";
        assert_eq!(sqlite_check_expressions(ddl), vec!["length(trim(name)) > 0"]);
    }

    #[test]
    fn test_mysql_named_check() {
        let ddl = "CREATE TABLE `t` (\n  `age` int,\n  CONSTRAINT `age_positive` CHECK ((`age` > 0))\n)";
        let checks = mysql_check_constraints(ddl);
        assert_eq!(checks.len(), 1);
        assert_eq!(checks[0].0, "age_positive");
        assert_eq!(checks[0].1, "`age` > 0");
    }

    #[test]
    fn test_mysql_bare_check() {
        let ddl = "CREATE TABLE t (\n  age int,\n  CHECK (age > 0),\n)";
        let checks = mysql_check_constraints(ddl);
        assert_eq!(checks, vec![(String::new(), "age > 0".to_string())]);
    }

    #[test]
    fn test_strip_outer_parens() {
        assert_eq!(strip_outer_parens("((a > 0))"), "a > 0");
        assert_eq!(strip_outer_parens("a > 0"), "a > 0");
        assert_eq!(strip_outer_parens(" (a > 0) "), "a > 0");
    }

    #[test]
    fn test_mysql_enum_values() {
        assert_eq!(
            mysql_enum_values("enum('new','shipped','cancelled')"),
            vec!["new", "shipped", "cancelled"]
        );
    }

    #[test]
    fn test_mysql_enum_values_with_spaces() {
        assert_eq!(mysql_enum_values("enum('a', 'b')"), vec!["a", "b"]);
    }

    #[test]
    fn test_enum_type_name_singularizes_status() {
        assert_eq!(enum_type_name("orders", "status"), "order_status");
        assert_eq!(enum_type_name("users", "status"), "user_status");
    }

    #[test]
    fn test_enum_type_name_plain() {
        assert_eq!(enum_type_name("orders", "kind"), "orders_kind");
        assert_eq!(enum_type_name("person", "status"), "person_status");
    }

    #[test]
    fn test_split_top_level_commas() {
        let parts = split_top_level_commas("id INTEGER, name TEXT, CHECK(a > 0 AND b IN (1,2))");
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[2].trim(), "CHECK(a > 0 AND b IN (1,2))");
    }

    #[test]
    fn test_split_top_level_commas_type_params() {
        let parts = split_top_level_commas("price NUMERIC(10,2), qty INTEGER");
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].trim(), "price NUMERIC(10,2)");
    }

    #[test]
    fn test_strip_engine_suffix() {
        let ddl = "CREATE TABLE t (\n  id int\n) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4 COLLATE=utf8mb4_0900_ai_ci";
        let stripped = strip_engine_suffix(ddl);
        assert!(!stripped.contains("ENGINE"));
        assert!(!stripped.contains("CHARSET"));
        assert!(stripped.contains("id int"));
    }
}
