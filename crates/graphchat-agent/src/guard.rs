//! Lexical read-only guard and result bounding for generated queries.

use serde_json::Value;
use thiserror::Error;

use crate::store::Record;

/// Single-keyword clauses that modify the graph or the database.
const WRITE_KEYWORDS: &[&str] = &[
    "CREATE", "MERGE", "DELETE", "DETACH", "SET", "REMOVE", "DROP", "FOREACH",
];

/// Appended to a string field cut at the character limit.
const ELLIPSIS: char = '…';

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("`{0}` is not allowed: only read-only queries may be executed")]
pub struct WriteClauseRejected(pub &'static str);

/// Reject queries containing write clauses.
///
/// Keywords are matched as whole words, case-insensitively, outside string
/// literals, backtick-quoted identifiers and comments.
pub fn ensure_read_only(query: &str) -> Result<(), WriteClauseRejected> {
    let words = keywords(query);

    for (i, word) in words.iter().enumerate() {
        if let Some(keyword) = WRITE_KEYWORDS.iter().find(|k| **k == word.as_str()) {
            return Err(WriteClauseRejected(*keyword));
        }
        let next = words.get(i + 1).map(String::as_str);
        if word == "LOAD" && next == Some("CSV") {
            return Err(WriteClauseRejected("LOAD CSV"));
        }
        if word == "IN" && next == Some("TRANSACTIONS") {
            return Err(WriteClauseRejected("CALL ... IN TRANSACTIONS"));
        }
    }
    Ok(())
}

/// Upper-cased bare words of a Cypher statement.
///
/// A word directly after `.` is a property name, not a keyword, and is left
/// out.
fn keywords(query: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut property = false;
    let mut chars = query.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            c if c.is_alphanumeric() || c == '_' => {
                current.push(c);
                continue;
            }
            '\'' | '"' | '`' => {
                flush(&mut current, &mut words, property);
                let mut escaped = false;
                for inner in chars.by_ref() {
                    if escaped {
                        escaped = false;
                    } else if inner == '\\' && c != '`' {
                        escaped = true;
                    } else if inner == c {
                        break;
                    }
                }
            }
            '/' if chars.peek() == Some(&'/') => {
                flush(&mut current, &mut words, property);
                for inner in chars.by_ref() {
                    if inner == '\n' {
                        break;
                    }
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                flush(&mut current, &mut words, property);
                chars.next();
                let mut star = false;
                for inner in chars.by_ref() {
                    if star && inner == '/' {
                        break;
                    }
                    star = inner == '*';
                }
            }
            _ => flush(&mut current, &mut words, property),
        }
        property = c == '.';
    }
    flush(&mut current, &mut words, property);
    words
}

fn flush(current: &mut String, words: &mut Vec<String>, property: bool) {
    if !current.is_empty() && !property {
        words.push(current.to_uppercase());
    }
    current.clear();
}

/// Unwrap a query the model wrapped in a Markdown code fence.
///
/// Text outside the first fenced block is dropped, as is a language tag on
/// the opening fence line.
pub fn strip_code_fences(text: &str) -> String {
    let trimmed = text.trim();
    let Some(start) = trimmed.find("```") else {
        return trimmed.to_owned();
    };
    let mut body = &trimmed[start + 3..];

    if let Some(newline) = body.find('\n') {
        let tag = body[..newline].trim();
        if !tag.contains(char::is_whitespace) && !tag.contains("```") {
            body = &body[newline + 1..];
        }
    }
    let body = match body.find("```") {
        Some(end) => &body[..end],
        None => body,
    };
    body.trim().to_owned()
}

/// Keep at most `max_rows` records and cut every string longer than
/// `max_chars` characters, nested values included.
pub fn bound_records(records: Vec<Record>, max_rows: usize, max_chars: usize) -> Vec<Record> {
    records
        .into_iter()
        .take(max_rows)
        .map(|record| {
            record
                .into_iter()
                .map(|(key, value)| (key, truncate_value(value, max_chars)))
                .collect()
        })
        .collect()
}

fn truncate_value(value: Value, max_chars: usize) -> Value {
    match value {
        Value::String(s) => Value::String(truncate(s, max_chars)),
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(|v| truncate_value(v, max_chars))
                .collect(),
        ),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (k, truncate_value(v, max_chars)))
                .collect(),
        ),
        other => other,
    }
}

fn truncate(s: String, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((cut, _)) => {
            let mut out = s[..cut].to_owned();
            out.push(ELLIPSIS);
            out
        }
        None => s,
    }
}

/// Render records as the JSON array handed back to the model.
pub fn render_records(records: &[Record]) -> String {
    serde_json::to_string(records).unwrap_or_else(|_| "[]".to_owned())
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    #[test]
    fn read_queries_pass() {
        for query in [
            "MATCH (a:Activity)-[:LOCATED_IN]->(r:Region {name: 'Vysočina'}) RETURN a.name LIMIT 5",
            "MATCH (n) WHERE n.offset > 3 RETURN n.settings",
            "CALL db.labels() YIELD label RETURN label",
            "MATCH (n {note: 'please DELETE me'}) RETURN n",
            "MATCH (n:`CREATE`) RETURN n // SET nothing",
        ] {
            assert_eq!(ensure_read_only(query), Ok(()), "{query}");
        }
    }

    #[test]
    fn write_clauses_are_rejected() {
        let cases = [
            ("CREATE (n:Person {name: 'x'})", "CREATE"),
            ("match (n) detach delete n", "DETACH"),
            ("MATCH (n) SET n.x = 1", "SET"),
            ("MERGE (n:Tag {id: 1})", "MERGE"),
            ("MATCH (n) REMOVE n:Tag", "REMOVE"),
            ("DROP INDEX foo", "DROP"),
            ("LOAD CSV FROM 'file:///x.csv' AS row RETURN row", "LOAD CSV"),
            (
                "CALL { MATCH (n) RETURN n } IN TRANSACTIONS OF 10 ROWS",
                "CALL ... IN TRANSACTIONS",
            ),
            ("MATCH p=(a)-->(b) FOREACH (n IN nodes(p) | SET n.seen = true)", "FOREACH"),
        ];
        for (query, clause) in cases {
            assert_eq!(
                ensure_read_only(query),
                Err(WriteClauseRejected(clause)),
                "{query}"
            );
        }
    }

    #[test]
    fn property_names_are_not_keywords() {
        for query in [
            "MATCH (n:Config) RETURN n.set, n.merge",
            "MATCH (n) WHERE n.delete = false RETURN n.create",
            "MATCH (n) RETURN n.`remove`",
        ] {
            assert_eq!(ensure_read_only(query), Ok(()), "{query}");
        }
        assert_eq!(
            ensure_read_only("MATCH (n) SET n.set = 1"),
            Err(WriteClauseRejected("SET"))
        );
        assert_eq!(
            ensure_read_only("MATCH (n) WITH n.x AS x DELETE n"),
            Err(WriteClauseRejected("DELETE"))
        );
    }

    #[test]
    fn block_comments_are_skipped() {
        assert_eq!(ensure_read_only("MATCH (n) /* CREATE */ RETURN n"), Ok(()));
    }

    #[test]
    fn strips_fences() {
        assert_eq!(
            strip_code_fences("```cypher\nMATCH (n) RETURN n\n```"),
            "MATCH (n) RETURN n"
        );
        assert_eq!(
            strip_code_fences("Here you go:\n```\nMATCH (n)\nRETURN n\n```\nEnjoy"),
            "MATCH (n)\nRETURN n"
        );
        assert_eq!(strip_code_fences("```MATCH (n) RETURN n```"), "MATCH (n) RETURN n");
        assert_eq!(strip_code_fences("  MATCH (n) RETURN n "), "MATCH (n) RETURN n");
    }

    #[test]
    fn bounds_rows_and_fields() {
        let records: Vec<Record> = (0..8)
            .map(|i| {
                json!({ "name": "čtyřicet", "i": i, "tags": ["abcdefgh"] })
                    .as_object()
                    .cloned()
                    .unwrap()
            })
            .collect();

        let bounded = bound_records(records, 5, 4);
        assert_eq!(bounded.len(), 5);
        assert_eq!(bounded[0]["name"], "čtyř…");
        assert_eq!(bounded[0]["tags"][0], "abcd…");
        assert_eq!(bounded[4]["i"], 4);
    }

    #[test]
    fn short_fields_are_untouched() {
        let record = json!({ "name": "Ada" }).as_object().cloned().unwrap();
        let bounded = bound_records(vec![record.clone()], 5, 3);
        assert_eq!(bounded, vec![record]);
        assert_eq!(render_records(&bounded), r#"[{"name":"Ada"}]"#);
    }
}
