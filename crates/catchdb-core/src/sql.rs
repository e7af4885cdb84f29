//! Text-level rewriting of SQL templates.
//!
//! Templates are plain SQL with two kinds of holes: positional `?` bind
//! parameters, left to the engine, and the literal `[?]` token, replaced
//! here by a column name. Columns are appended to a SELECT list just before
//! its first `FROM`; extra predicates go just before `ORDER BY`.

use catchdb_error::{CatchError, Result};

/// Token substituted by [`replace_placeholder`].
pub const PLACEHOLDER: &str = "[?]";

fn is_word_byte(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte == b'_'
}

/// Byte offset of the first case-insensitive whole-word occurrence of
/// `word` in `sql` at or after `from`.
#[must_use]
pub fn find_word(sql: &str, word: &str, from: usize) -> Option<usize> {
    let haystack = sql.as_bytes();
    let needle = word.as_bytes();
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    (from..=haystack.len() - needle.len()).find(|&start| {
        let end = start + needle.len();
        haystack[start..end].eq_ignore_ascii_case(needle)
            && (start == 0 || !is_word_byte(haystack[start - 1]))
            && (end == haystack.len() || !is_word_byte(haystack[end]))
    })
}

/// Byte offset of the first `ORDER BY` (any whitespace between the words).
#[must_use]
pub fn find_order_by(sql: &str) -> Option<usize> {
    let mut from = 0;
    while let Some(start) = find_word(sql, "ORDER", from) {
        let rest = &sql[start + "ORDER".len()..];
        let trimmed = rest.trim_start();
        if trimmed.len() < rest.len() && find_word(trimmed, "BY", 0) == Some(0) {
            return Some(start);
        }
        from = start + 1;
    }
    None
}

/// Reject anything but `[A-Za-z_][A-Za-z0-9_]*` so that names can be
/// spliced into SQL text.
pub fn validate_identifier(name: &str) -> Result<&str> {
    let mut bytes = name.bytes();
    let valid = bytes
        .next()
        .is_some_and(|first| first.is_ascii_alphabetic() || first == b'_')
        && bytes.all(is_word_byte);
    if valid {
        Ok(name)
    } else {
        Err(CatchError::InvalidIdentifier {
            name: name.to_owned(),
        })
    }
}

/// Append `columns` to the SELECT list of `sql`, immediately before its
/// first `FROM`.
pub fn complete_select<S: AsRef<str>>(sql: &str, columns: &[S]) -> Result<String> {
    let from = find_word(sql, "FROM", 0)
        .ok_or_else(|| CatchError::configuration(sql, "no FROM clause to extend"))?;
    if columns.is_empty() {
        return Ok(sql.to_owned());
    }
    let mut extra = String::new();
    for column in columns {
        extra.push_str(", ");
        extra.push_str(validate_identifier(column.as_ref())?);
    }
    Ok(format!("{}{extra} {}", sql[..from].trim_end(), &sql[from..]))
}

/// Replace every `[?]` token of `template` by `name`.
pub fn replace_placeholder(template: &str, name: &str) -> Result<String> {
    if !template.contains(PLACEHOLDER) {
        return Err(CatchError::configuration(
            template,
            format!("missing {PLACEHOLDER} placeholder"),
        ));
    }
    Ok(template.replace(PLACEHOLDER, validate_identifier(name)?))
}

/// Add `AND (column IS NOT NULL)` for every column, immediately before the
/// template's `ORDER BY`.
pub fn require_not_null<S: AsRef<str>>(sql: &str, columns: &[S]) -> Result<String> {
    let anchor = find_order_by(sql)
        .ok_or_else(|| CatchError::configuration(sql, "no ORDER BY anchor for NULL filtering"))?;
    if columns.is_empty() {
        return Ok(sql.to_owned());
    }
    let mut clauses = String::new();
    for column in columns {
        clauses.push_str(" AND (");
        clauses.push_str(validate_identifier(column.as_ref())?);
        clauses.push_str(" IS NOT NULL)");
    }
    Ok(format!("{}{clauses} {}", sql[..anchor].trim_end(), &sql[anchor..]))
}

/// The first two entries of the SELECT list of `sql`.
fn leading_columns(sql: &str) -> Result<(&str, &str)> {
    let select = find_word(sql, "SELECT", 0)
        .ok_or_else(|| CatchError::configuration(sql, "no SELECT keyword"))?;
    let from = find_word(sql, "FROM", select)
        .ok_or_else(|| CatchError::configuration(sql, "no FROM clause"))?;
    let mut columns = sql[select + "SELECT".len()..from].split(',').map(str::trim);
    match (columns.next(), columns.next()) {
        (Some(first), Some(second)) if !first.is_empty() && !second.is_empty() => {
            Ok((first, second))
        }
        _ => Err(CatchError::configuration(
            sql,
            "lookup templates must select a key column and a value column",
        )),
    }
}

/// Turn a lookup template `SELECT key, value FROM t WHERE key=?` into its
/// reverse `SELECT key, value FROM t WHERE value=?`.
///
/// The first selected column must reappear in the WHERE clause; that
/// occurrence is replaced by the second selected column.
pub fn reverse_lookup(sql: &str) -> Result<String> {
    let (key, value) = leading_columns(sql)?;
    let clause = find_word(sql, "WHERE", 0)
        .ok_or_else(|| CatchError::configuration(sql, "lookup template has no WHERE clause"))?;
    let at = find_word(sql, key, clause).ok_or_else(|| {
        CatchError::configuration(
            sql,
            format!("first selected column '{key}' does not reappear in WHERE"),
        )
    })?;
    Ok(format!("{}{value}{}", &sql[..at], &sql[at + key.len()..]))
}

/// Wrap `sql` so that it returns one page of rows whose key (its first
/// column, named `key_column`) is at least a lower bound.
///
/// The wrapped statement takes the original parameters followed by the
/// lower bound and the page size.
#[must_use]
pub fn keyset_page(sql: &str, key_column: &str) -> String {
    let inner = sql.trim().trim_end_matches(';');
    let quoted = key_column.replace('"', "\"\"");
    format!(
        "SELECT * FROM ({inner}) AS page WHERE \"{quoted}\" >= ? ORDER BY \"{quoted}\" LIMIT ?"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const ENV: &str =
        "SELECT ID FROM Environments WHERE position=? AND timeLag=? AND parameter=? ORDER BY ID";

    #[test]
    fn find_word_respects_boundaries() {
        assert_eq!(find_word("SELECT fromage FROM t", "FROM", 0), Some(15));
        assert_eq!(find_word("select a from t", "FROM", 0), Some(9));
        assert_eq!(find_word("SELECT a", "FROM", 0), None);
    }

    #[test]
    fn find_order_by_allows_whitespace() {
        assert_eq!(find_order_by("SELECT a FROM t ORDER\n  BY a"), Some(16));
        assert_eq!(find_order_by("SELECT ordering FROM t"), None);
        assert_eq!(find_order_by("SELECT a FROM t ORDER a"), None);
    }

    #[test]
    fn complete_select_inserts_before_from() {
        let sql = complete_select(ENV, &["value", "sobel3"]).unwrap();
        assert_eq!(
            sql,
            "SELECT ID, value, sobel3 FROM Environments WHERE position=? AND timeLag=? AND parameter=? ORDER BY ID"
        );
        assert_eq!(complete_select(ENV, &[] as &[&str]).unwrap(), ENV);
    }

    #[test]
    fn complete_select_without_from_fails_fast() {
        let err = complete_select("SELECT 1", &["value"]).unwrap_err();
        assert!(matches!(err, CatchError::Configuration { .. }));
    }

    #[test]
    fn complete_select_rejects_injection() {
        let err = complete_select(ENV, &["value; DROP TABLE x"]).unwrap_err();
        assert!(matches!(err, CatchError::InvalidIdentifier { .. }));
    }

    #[test]
    fn placeholder_substitution() {
        let sql = replace_placeholder("UPDATE Longlines SET [?]=? WHERE ID=?", "ALB").unwrap();
        assert_eq!(sql, "UPDATE Longlines SET ALB=? WHERE ID=?");
        assert!(replace_placeholder("UPDATE t SET a=?", "ALB").is_err());
    }

    #[test]
    fn not_null_clauses_precede_order_by() {
        let sql = require_not_null(ENV, &["value", "sobel3"]).unwrap();
        assert_eq!(
            sql,
            "SELECT ID FROM Environments WHERE position=? AND timeLag=? AND parameter=? AND (value IS NOT NULL) AND (sobel3 IS NOT NULL) ORDER BY ID"
        );
        assert!(require_not_null("SELECT ID FROM t WHERE a=?", &["value"]).is_err());
    }

    #[test]
    fn reverse_lookup_swaps_where_column() {
        let sql = reverse_lookup("SELECT ID, name FROM Parameters WHERE ID=?").unwrap();
        assert_eq!(sql, "SELECT ID, name FROM Parameters WHERE name=?");
    }

    #[test]
    fn reverse_lookup_requires_key_in_where() {
        let err = reverse_lookup("SELECT ID, name FROM Parameters WHERE code=?").unwrap_err();
        assert!(matches!(
            err,
            CatchError::Configuration { detail, .. } if detail.contains("'ID'")
        ));
        assert!(reverse_lookup("SELECT name FROM Parameters WHERE name=?").is_err());
    }

    #[test]
    fn validate_identifier_rules() {
        assert!(validate_identifier("sobel3").is_ok());
        assert!(validate_identifier("_x").is_ok());
        assert!(validate_identifier("3x").is_err());
        assert!(validate_identifier("").is_err());
        assert!(validate_identifier("a-b").is_err());
    }

    #[test]
    fn keyset_page_wraps_query() {
        let sql = keyset_page("SELECT ID, value FROM t ORDER BY ID;", "ID");
        assert_eq!(
            sql,
            "SELECT * FROM (SELECT ID, value FROM t ORDER BY ID) AS page WHERE \"ID\" >= ? ORDER BY \"ID\" LIMIT ?"
        );
    }
}
