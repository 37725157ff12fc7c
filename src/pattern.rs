//! Pattern-file loading (spec.md §5, component C3): reads the table that
//! defines the target ISA, one row per `::`-separated instruction or
//! pattern-file directive.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::AssembleError;
use crate::lex::{self, chars, reduce_spaces, remove_pattern_comment};

/// One `pattern :: error_expr :: emit_expr :: idxs_expr :: extra1 :: extra2`
/// row. Pattern-file directive rows (`.setsym`, `.bits`, `.vliw`, ...) reuse
/// the same shape with the directive name occupying `pattern`.
#[derive(Debug, Clone, Default)]
pub struct PatternRow {
    pub pattern: String,
    pub error_expr: String,
    pub emit_expr: String,
    pub idxs_expr: String,
    pub extra1: String,
    pub extra2: String,
}

/// Split a pattern-file line on `::`, returning up to six trimmed fields
fn split_fields(line: &str) -> Vec<String> {
    let buf = chars(line);
    let mut idx = lex::skip_spaces(&buf, 0);
    let mut fields = Vec::new();
    loop {
        let mut field = String::new();
        let mut saw_separator = false;
        while idx < buf.len() {
            if lex::looking_at(&buf, idx, "::") {
                idx += 2;
                saw_separator = true;
                break;
            }
            field.push(buf[idx]);
            idx += 1;
        }
        fields.push(field.trim_end_matches([' ', '\t']).to_string());
        if !saw_separator {
            break;
        }
    }
    fields
}

fn row_from_fields(fields: &[String]) -> PatternRow {
    let get = |i: usize| fields.get(i).cloned().unwrap_or_default();
    if fields.is_empty() || fields.len() > 6 {
        return PatternRow::default();
    }
    PatternRow {
        pattern: get(0),
        error_expr: get(1),
        emit_expr: get(2),
        idxs_expr: get(3),
        extra1: get(4),
        extra2: get(5),
    }
}

/// `.include "file"` directive inside a pattern file; returns `None` when
/// the line isn't an include directive
fn try_include(line: &str, base_dir: &Path) -> Option<Result<Vec<PatternRow>, AssembleError>> {
    let buf = chars(line);
    let idx = lex::skip_spaces(&buf, 0);
    if !lex::looking_at(&buf, idx, ".include") {
        return None;
    }
    let rest: String = buf[idx + 8..].iter().collect();
    let name = lex::get_quoted_string(&chars(&rest));
    let path = base_dir.join(&name);
    Some(read_pattern_file(&path))
}

/// Read a pattern file, recursively expanding `.include` directives
pub fn read_pattern_file(path: &Path) -> Result<Vec<PatternRow>, AssembleError> {
    let text = fs::read_to_string(path).map_err(|source| AssembleError::PatternFileRead {
        path: path.to_path_buf(),
        source,
    })?;
    let base_dir: PathBuf = path.parent().map(Path::to_path_buf).unwrap_or_default();

    let mut rows = Vec::new();
    for raw_line in text.lines() {
        let line = remove_pattern_comment(raw_line);
        let line = line.replace('\t', " ");
        let line = reduce_spaces(&line);
        if line.trim().is_empty() {
            continue;
        }

        if let Some(result) = try_include(&line, &base_dir) {
            rows.extend(result?);
            continue;
        }

        let fields = split_fields(&line);
        rows.push(row_from_fields(&fields));
    }
    Ok(rows)
}

/// Pattern symbols (`.setsym`/`.clearsym` rows and similar) are frozen
/// ahead of the first pass so label names can be checked against them in
/// constant time (spec.md §4.6)
pub fn collect_pattern_symbol_names(rows: &[PatternRow]) -> Vec<String> {
    rows.iter()
        .filter(|r| r.pattern.eq_ignore_ascii_case(".setsym"))
        .map(|r| r.error_expr.trim().to_uppercase())
        .filter(|n| !n.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_double_colon() {
        let fields = split_fields("NOP :: :: 0x90 :: 0");
        assert_eq!(fields, vec!["NOP", "", "0x90", "0"]);
    }

    #[test]
    fn row_from_fields_fills_missing_trailing_fields() {
        let row = row_from_fields(&split_fields("NOP :: :: 0x90 :: 0"));
        assert_eq!(row.pattern, "NOP");
        assert_eq!(row.emit_expr, "0x90");
        assert_eq!(row.idxs_expr, "0");
        assert_eq!(row.extra1, "");
        assert_eq!(row.extra2, "");
    }

    #[test]
    fn more_than_six_fields_collapses_to_a_blank_row() {
        let row = row_from_fields(&split_fields("A :: B :: C :: D :: E :: F :: G"));
        assert_eq!(row.pattern, "");
        assert_eq!(row.error_expr, "");
        assert_eq!(row.emit_expr, "");
    }

    #[test]
    fn collects_only_setsym_names() {
        let rows = vec![
            PatternRow { pattern: ".setsym".into(), error_expr: "r0".into(), ..Default::default() },
            PatternRow { pattern: ".setsym".into(), error_expr: "r1".into(), ..Default::default() },
            PatternRow { pattern: "NOP".into(), error_expr: "".into(), ..Default::default() },
        ];
        let names = collect_pattern_symbol_names(&rows);
        assert_eq!(names, vec!["R0".to_string(), "R1".to_string()]);
    }
}
