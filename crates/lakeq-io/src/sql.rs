//! SQL text helpers for statements the engine layer builds itself.

/// `'it''s'` style string literal.
pub fn literal(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

/// `"my ""view"""` style quoted identifier.
pub fn ident(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

/// `read_parquet(...)` over one path or a union of several.
pub fn read_parquet(paths: &[String]) -> String {
    match paths {
        [single] => format!("read_parquet({})", literal(single)),
        many => {
            let list = many
                .iter()
                .map(|p| literal(p))
                .collect::<Vec<_>>()
                .join(", ");
            format!("read_parquet([{list}], union_by_name = true)")
        }
    }
}
