//! Pattern matcher (spec.md §5, component C4): tests one source line
//! against one pattern-row template, capturing expression/register/symbol
//! fields into the variable slots `a`-`z` as it goes.
//!
//! Templates may contain `[[...]]` optional groups; `match_with_options`
//! tries every subset of groups removed, smallest-removed-first, and
//! returns the first combination that matches (spec.md §5.3).

use crate::context::AssemblerContext;
use crate::expr;
use crate::lex::{char_at, chars, get_symbol_word, skip_spaces, LOWER};

const OPEN_MARK: char = '\u{90}';
const CLOSE_MARK: char = '\u{91}';

/// Try `t` against `s`, trying every subset of `[[...]]` groups removed in
/// turn. Returns true on the first combination that matches; variable
/// slots are left as set by that successful attempt.
pub fn match_with_options(ctx: &mut AssemblerContext, s: &[char], template: &str) -> bool {
    let marked = template.replace("[[", &OPEN_MARK.to_string()).replace("]]", &CLOSE_MARK.to_string());
    let marked_chars = chars(&marked);
    let group_count = marked_chars.iter().filter(|&&c| c == OPEN_MARK).count();

    for group_size in 0..=group_count {
        for combo in combinations(group_count, group_size) {
            let candidate = remove_groups(&marked_chars, &combo);
            if match_exact(ctx, s, &candidate) {
                return true;
            }
        }
    }
    false
}

/// All `size`-element subsets of `1..=n`, in increasing numeric order
fn combinations(n: usize, size: usize) -> Vec<Vec<usize>> {
    if size == 0 {
        return vec![Vec::new()];
    }
    if size > n {
        return Vec::new();
    }
    let mut out = Vec::new();
    let mut combo: Vec<usize> = (1..=size).collect();
    loop {
        out.push(combo.clone());
        let mut i = size;
        loop {
            if i == 0 {
                return out;
            }
            i -= 1;
            if combo[i] < n - (size - 1 - i) {
                combo[i] += 1;
                for j in (i + 1)..size {
                    combo[j] = combo[j - 1] + 1;
                }
                break;
            }
        }
    }
}

/// Blank out the bracket markers and everything between the `index`-th
/// open/close pair, for each index in `groups`
fn remove_groups(marked: &[char], groups: &[usize]) -> Vec<char> {
    let mut open_count = 0usize;
    let mut positions: Vec<(usize, usize, bool)> = Vec::new();
    for (i, &c) in marked.iter().enumerate() {
        if c == OPEN_MARK {
            open_count += 1;
            positions.push((open_count, i, true));
        } else if c == CLOSE_MARK {
            positions.push((open_count, i, false));
        }
    }

    let mut result = marked.to_vec();
    for &group in groups {
        let start = positions.iter().find(|(count, _, open)| *count == group && *open).map(|(_, pos, _)| *pos);
        let end = positions.iter().find(|(count, _, open)| *count == group && !*open).map(|(_, pos, _)| *pos);
        if let (Some(start), Some(end)) = (start, end) {
            for slot in result.iter_mut().take(end + 1).skip(start) {
                *slot = '\0';
            }
        }
    }
    result
}

fn strip_control(s: &[char]) -> Vec<char> {
    s.iter().copied().filter(|&c| c != '\0' && c != OPEN_MARK && c != CLOSE_MARK).collect()
}

/// Match with no optional-group expansion: every `!`/literal/lowercase
/// token in `template` must consume exactly what it expects from `s`
fn match_exact(ctx: &mut AssemblerContext, s: &[char], template_raw: &[char]) -> bool {
    let t = strip_control(template_raw);

    let mut idx_s = skip_spaces(s, 0);
    let mut idx_t = skip_spaces(&t, 0);

    loop {
        idx_s = skip_spaces(s, idx_s);
        idx_t = skip_spaces(&t, idx_t);
        let b = char_at(s, idx_s);
        let a = char_at(&t, idx_t);

        if a == '\0' && b == '\0' {
            return true;
        }

        if a == '\\' {
            idx_t += 1;
            let lit = char_at(&t, idx_t);
            if lit == b && b != '\0' {
                idx_t += 1;
                idx_s += 1;
                continue;
            }
            return false;
        } else if a.is_ascii_uppercase() {
            if a == b.to_ascii_uppercase() {
                idx_s += 1;
                idx_t += 1;
                continue;
            }
            return false;
        } else if a == '!' {
            idx_t += 1;
            let mut kind = char_at(&t, idx_t);
            idx_t += 1;
            if kind == '!' {
                // `!!X`: a single factor, not a full expression
                kind = char_at(&t, idx_t);
                idx_t += 1;
                let (v, next_s) = expr::evaluate_factor(ctx, s, idx_s);
                ctx.put_var(kind, v);
                idx_s = next_s;
                continue;
            } else {
                // `!X`: a full expression, optionally `!X\c` stopping at `c`
                idx_t = skip_spaces(&t, idx_t);
                let stop_char = if char_at(&t, idx_t) == '\\' {
                    idx_t = skip_spaces(&t, idx_t + 1);
                    char_at(&t, idx_t)
                } else {
                    '\0'
                };
                let (v, next_s) = expr::evaluate_escaped(ctx, s, idx_s, stop_char);
                ctx.put_var(kind, v);
                idx_s = next_s;
                continue;
            }
        } else if LOWER.contains(a) {
            idx_t += 1;
            let (word, next_s) = get_symbol_word(s, idx_s, &ctx.sword_chars);
            match ctx.get_symbol(&word) {
                Some(v) => {
                    ctx.put_var(a, v);
                    idx_s = next_s;
                    continue;
                }
                None => return false,
            }
        } else if a == b {
            idx_t += 1;
            idx_s += 1;
            continue;
        } else {
            return false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::AssemblerContext;

    #[test]
    fn literal_uppercase_template_matches_case_insensitively() {
        let mut ctx = AssemblerContext::new();
        assert!(match_with_options(&mut ctx, &chars("nop"), "NOP"));
        assert!(match_with_options(&mut ctx, &chars("NOP"), "NOP"));
        assert!(!match_with_options(&mut ctx, &chars("nope"), "NOP"));
    }

    #[test]
    fn full_expression_capture_sets_variable() {
        let mut ctx = AssemblerContext::new();
        assert!(match_with_options(&mut ctx, &chars("mov a,0x42"), "MOV A,!X"));
        assert_eq!(ctx.get_var('x'), 0x42);
    }

    #[test]
    fn single_factor_capture_differs_from_full_expression() {
        let mut ctx = AssemblerContext::new();
        // `!!X` only consumes one factor, so a trailing `+1` is left
        // unconsumed and the overall match fails (the whole line must be
        // consumed).
        assert!(!match_with_options(&mut ctx, &chars("add 1+1"), "ADD !!X"));
        assert!(match_with_options(&mut ctx, &chars("add 1"), "ADD !!X"));
        assert_eq!(ctx.get_var('x'), 1);
    }

    #[test]
    fn lowercase_symbol_capture_requires_known_symbol() {
        let mut ctx = AssemblerContext::new();
        ctx.set_symbol("R1", 1);
        assert!(match_with_options(&mut ctx, &chars("mov r1"), "MOV r"));
        assert_eq!(ctx.get_var('r'), 1);
        assert!(!match_with_options(&mut ctx, &chars("mov r9"), "MOV r"));
    }

    #[test]
    fn optional_group_tries_both_presence_and_absence() {
        let mut ctx = AssemblerContext::new();
        assert!(match_with_options(&mut ctx, &chars("inc a"), "INC[[ A]]"));
        assert!(match_with_options(&mut ctx, &chars("inc"), "INC[[ A]]"));
        assert!(!match_with_options(&mut ctx, &chars("inc b"), "INC[[ A]]"));
    }

    #[test]
    fn whole_line_must_be_consumed() {
        let mut ctx = AssemblerContext::new();
        assert!(!match_with_options(&mut ctx, &chars("nop extra"), "NOP"));
    }
}
