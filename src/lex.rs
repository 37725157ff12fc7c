//! Lexical helpers shared by the expression evaluator, pattern matcher and
//! directive dispatcher (spec.md §4.2, component C2).
//!
//! Every function here operates on a `&[char]` buffer plus a cursor index
//! and returns `(value, next_index)`, mirroring the original implementation's
//! `(s, idx) -> (value, idx)` threading style rather than a tokenizer with
//! lookahead.

pub const DIGIT: &str = "0123456789";
pub const CAPITAL: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ";
pub const LOWER: &str = "abcdefghijklmnopqrstuvwxyz";
pub const XDIGIT: &str = "0123456789ABCDEF";

pub fn alphabet() -> String {
    format!("{LOWER}{CAPITAL}")
}

/// Default character set accepted by pattern-symbol words
pub fn default_sword_chars() -> String {
    format!("{DIGIT}{}_%$-~&|", alphabet())
}

/// Default character set accepted by label words
pub fn default_lword_chars() -> String {
    format!("{DIGIT}{}_.", alphabet())
}

pub fn char_at(s: &[char], idx: usize) -> char {
    s.get(idx).copied().unwrap_or('\0')
}

pub fn skip_spaces(s: &[char], mut idx: usize) -> usize {
    while char_at(s, idx) == ' ' {
        idx += 1;
    }
    idx
}

/// Quick case-insensitive comparison of `t` against `s` starting at `idx`,
/// without requiring a word boundary (mirrors the original's `q` helper)
pub fn looking_at(s: &[char], idx: usize, t: &str) -> bool {
    let t: Vec<char> = t.chars().collect();
    if idx + t.len() > s.len() {
        return false;
    }
    s[idx..idx + t.len()]
        .iter()
        .zip(t.iter())
        .all(|(a, b)| a.eq_ignore_ascii_case(b))
}

/// Consume a parameter up to the next space
pub fn get_param_to_spc(s: &[char], idx: usize) -> (String, usize) {
    let mut idx = skip_spaces(s, idx);
    let mut t = String::new();
    while idx < s.len() && s[idx] != ' ' {
        t.push(s[idx]);
        idx += 1;
    }
    (t, idx)
}

/// Consume a parameter up to end of line or a `!!` VLIW separator
pub fn get_param_to_eon(s: &[char], idx: usize) -> (String, usize) {
    let mut idx = skip_spaces(s, idx);
    let mut t = String::new();
    while idx < s.len() && !(char_at(s, idx) == '!' && char_at(s, idx + 1) == '!') {
        t.push(s[idx]);
        idx += 1;
    }
    (t, idx)
}

/// Collapse runs of whitespace down to a single space
pub fn reduce_spaces(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_space = false;
    for c in s.chars() {
        let is_space = c.is_whitespace();
        if is_space && prev_space {
            continue;
        }
        out.push(if is_space { ' ' } else { c });
        prev_space = is_space;
    }
    out
}

/// Strip a `/* ... */`-style pattern-file comment; since the original never
/// searches for the closing `*/`, anything from `/*` to end of line is
/// dropped
pub fn remove_pattern_comment(line: &str) -> String {
    match line.find("/*") {
        Some(0) => String::new(),
        Some(idx) => line[..idx].trim_end().to_string(),
        None => line.to_string(),
    }
}

/// Strip a `;`-style assembly comment
pub fn remove_asm_comment(line: &str) -> String {
    match line.find(';') {
        Some(idx) => line[..idx].trim_end().to_string(),
        None => line.trim_end().to_string(),
    }
}

/// Consume a run of digits
pub fn get_int_str(s: &[char], mut idx: usize) -> (String, usize) {
    let mut t = String::new();
    while idx < s.len() && DIGIT.contains(s[idx]) {
        t.push(s[idx]);
        idx += 1;
    }
    (t, idx)
}

/// Consume the body of a float literal: `inf`, `-inf`, `nan`, or a run of
/// `[0-9.eE-]`
pub fn get_float_str(s: &[char], idx: usize) -> (String, usize) {
    if looking_at(s, idx, "-inf") {
        return ("-inf".to_string(), idx + 4);
    }
    if looking_at(s, idx, "inf") {
        return ("inf".to_string(), idx + 3);
    }
    if looking_at(s, idx, "nan") {
        return ("nan".to_string(), idx + 3);
    }
    let mut t = String::new();
    let mut idx = idx;
    while idx < s.len() && "0123456789-.eE".contains(s[idx]) {
        t.push(s[idx]);
        idx += 1;
    }
    (t, idx)
}

/// Consume a `{ ... }` body (used by `qad{}` / `dbl{}` / `flt{}`), returning
/// whether an opening brace was found, the raw body text, and the index
/// just past the closing brace (or the opening position on failure)
pub fn get_curly_body(s: &[char], idx: usize) -> (bool, String, usize) {
    let idx = skip_spaces(s, idx);
    if char_at(s, idx) != '{' {
        return (false, String::new(), idx);
    }
    let mut i = idx + 1;
    i = skip_spaces(s, i);
    let mut t = String::new();
    while i < s.len() && s[i] != '}' {
        t.push(s[i]);
        i += 1;
    }
    i = skip_spaces(s, i);
    if char_at(s, i) == '}' {
        i += 1;
    }
    (true, t, i)
}

/// Consume a symbol word: any run of `sword_chars`, not starting with a digit
pub fn get_symbol_word(s: &[char], idx: usize, sword_chars: &str) -> (String, usize) {
    let mut t = String::new();
    let mut idx = idx;
    if idx < s.len() && !DIGIT.contains(s[idx]) && sword_chars.contains(s[idx]) {
        t.push(s[idx]);
        idx += 1;
        while idx < s.len() && sword_chars.contains(s[idx]) {
            t.push(s[idx]);
            idx += 1;
        }
    }
    (t.to_uppercase(), idx)
}

/// Consume a label word: `lword_chars`, not starting with a digit (except a
/// leading `.`), swallowing a trailing `:` if present. The caller
/// distinguishes "defines a label" from "references a label" by checking
/// whether `s[idx - 1] == ':'` after the call.
pub fn get_label_word(s: &[char], idx: usize, lword_chars: &str) -> (String, usize) {
    let mut t = String::new();
    let mut idx = idx;
    let starts = idx < s.len() && (s[idx] == '.' || (!DIGIT.contains(s[idx]) && lword_chars.contains(s[idx])));
    if starts {
        t.push(s[idx]);
        idx += 1;
        while idx < s.len() && lword_chars.contains(s[idx]) {
            t.push(s[idx]);
            idx += 1;
        }
        if char_at(s, idx) == ':' {
            idx += 1;
        }
    }
    (t, idx)
}

/// Extract the body of a `"..."` quoted string with no escape processing,
/// used for directive arguments such as `.include "file"`
pub fn get_quoted_string(s: &[char]) -> String {
    let idx = skip_spaces(s, 0);
    if char_at(s, idx) != '"' {
        return String::new();
    }
    let mut idx = idx + 1;
    let mut out = String::new();
    while idx < s.len() {
        if s[idx] == '"' {
            break;
        }
        out.push(s[idx]);
        idx += 1;
    }
    out
}

pub fn chars(s: &str) -> Vec<char> {
    s.chars().collect()
}
