//! Object-code emission from a pattern row's `emit_expr` field, and
//! evaluation of its `error_expr` field (spec.md §5, §7, component C5).

use crate::context::AssemblerContext;
use crate::error::error_message;
use crate::expr;
use crate::lex::{self, chars};

/// Expand `rep[count, body]` occurrences in an emit template, then replace
/// every `%%` with an incrementing counter that starts at 0 and is shared
/// across the whole emission (spec.md §4.4). `rep[]` nests via bracket
/// counting: a nested `rep[` inside `body` is expanded by the recursive
/// call before the outer repetition copies it out `count` times, so each
/// copy gets its own run of `%%` substitutions.
fn expand_macros(ctx: &mut AssemblerContext, s: &[char], counter: &mut i128) -> String {
    let mut out = String::new();
    let mut i = 0;
    while i < s.len() {
        if lex::looking_at(s, i, "rep[") {
            let body_start = i + 4;
            let mut depth = 1i32;
            let mut j = body_start;
            while j < s.len() && depth > 0 {
                match s[j] {
                    '[' => depth += 1,
                    ']' => {
                        depth -= 1;
                        if depth == 0 {
                            break;
                        }
                    }
                    _ => {}
                }
                j += 1;
            }
            let inner = &s[body_start..j.min(s.len())];

            let mut split_depth = 0i32;
            let mut split_at = None;
            for (k, &c) in inner.iter().enumerate() {
                match c {
                    '(' | '[' => split_depth += 1,
                    ')' | ']' => split_depth -= 1,
                    ',' if split_depth == 0 => {
                        split_at = Some(k);
                        break;
                    }
                    _ => {}
                }
            }

            if let Some(k) = split_at {
                let count_expr = &inner[..k];
                let body = &inner[k + 1..];
                let (n, _) = expr::evaluate_pattern(ctx, count_expr, 0);
                for iter in 0..n.max(0) {
                    if iter > 0 {
                        out.push(',');
                    }
                    out.push_str(&expand_macros(ctx, body, counter));
                }
            }
            i = j.saturating_add(1);
            continue;
        } else if s[i] == '%' && i + 1 < s.len() && s[i + 1] == '%' {
            out.push_str(&counter.to_string());
            *counter += 1;
            i += 2;
            continue;
        } else {
            out.push(s[i]);
            i += 1;
        }
    }
    out
}

/// Expand a pattern row's emit template into the sequence of values it
/// produces. A bare `,` triggers alignment padding with the current
/// padding byte; a `;expr` prefix only contributes its value when
/// non-zero (a conditional emission).
pub fn make_object(ctx: &mut AssemblerContext, template: &str) -> Vec<i128> {
    let mut counter = 0i128;
    let raw = chars(template);
    let expanded = expand_macros(ctx, &raw, &mut counter);
    let s = chars(&expanded);
    let mut idx = 0;
    let mut values = Vec::new();

    loop {
        if idx >= s.len() || s[idx] == '\0' {
            break;
        }

        if s[idx] == ',' {
            idx += 1;
            let p = ctx.pc + values.len() as i128;
            let n = ctx.align_addr(p);
            for _ in p..n {
                values.push(ctx.padding as i128);
            }
            continue;
        }

        let conditional = s[idx] == ';';
        if conditional {
            idx += 1;
        }

        let (x, next) = expr::evaluate_pattern(ctx, &s, idx);
        idx = next;

        if !conditional || x != 0 {
            values.push(x);
        }

        if idx < s.len() && s[idx] == ',' {
            idx += 1;
            continue;
        }
        break;
    }

    values
}

/// Evaluate a pattern row's `error_expr` field: comma-separated
/// `condition [; ] code` pairs, each printed (via [`crate::logging`]) when
/// `condition` is non-zero. Returns the last error code that fired, if
/// any, so the driver can report it as a [`crate::error::LineDiagnostic`].
pub fn evaluate_error_template(ctx: &mut AssemblerContext, template: &str) -> Option<i128> {
    let trimmed: String = template.chars().filter(|c| *c != ' ').collect();
    if trimmed.is_empty() {
        return None;
    }

    let s = chars(template);
    let mut idx = 0;
    let mut fired = None;

    loop {
        if idx >= s.len() {
            break;
        }
        if s[idx] == ',' {
            idx += 1;
            continue;
        }

        let (condition, next) = expr::evaluate_pattern(ctx, &s, idx);
        idx = next;
        if idx < s.len() && s[idx] == ';' {
            idx += 1;
        }
        let (code, next) = expr::evaluate_pattern(ctx, &s, idx);
        idx = next;

        if condition != 0 && ctx.pass.emits() {
            let text = error_message(code);
            crate::logging::line_diagnostic(
                &ctx.current_file,
                ctx.line_number,
                &format!("Error code {code} {text}"),
            );
            fired = Some(code);
        }
    }

    fired
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::AssemblerContext;

    #[test]
    fn comma_separated_values() {
        let mut ctx = AssemblerContext::new();
        assert_eq!(make_object(&mut ctx, "0x3E, 0x42"), vec![0x3E, 0x42]);
    }

    #[test]
    fn conditional_term_only_emits_when_nonzero() {
        let mut ctx = AssemblerContext::new();
        assert_eq!(make_object(&mut ctx, "1, ;0, 2"), vec![1, 2]);
        assert_eq!(make_object(&mut ctx, "1, ;1, 2"), vec![1, 1, 2]);
    }

    #[test]
    fn bare_comma_pads_to_alignment() {
        let mut ctx = AssemblerContext::new();
        ctx.align = 4;
        ctx.padding = 0xAA;
        ctx.pc = 0;
        // one value (PC would sit at 1), then a bare `,` pads up to the
        // next multiple of 4
        let values = make_object(&mut ctx, "1,,2");
        assert_eq!(values, vec![1, 0xAA, 0xAA, 0xAA, 2]);
    }

    #[test]
    fn rep_expands_body_n_times() {
        let mut ctx = AssemblerContext::new();
        assert_eq!(make_object(&mut ctx, "rep[3, 0x90]"), vec![0x90, 0x90, 0x90]);
    }

    #[test]
    fn percent_percent_counts_up_across_the_whole_template() {
        let mut ctx = AssemblerContext::new();
        assert_eq!(make_object(&mut ctx, "rep[3, %%]"), vec![0, 1, 2]);
    }

    #[test]
    fn rep_nests() {
        let mut ctx = AssemblerContext::new();
        assert_eq!(make_object(&mut ctx, "rep[2, rep[2, %%]]"), vec![0, 1, 2, 3]);
    }

    #[test]
    fn error_template_fires_only_when_condition_nonzero() {
        let mut ctx = AssemblerContext::new();
        ctx.pass = crate::context::Pass::Second;
        assert_eq!(evaluate_error_template(&mut ctx, "0; 0"), None);
        assert_eq!(evaluate_error_template(&mut ctx, "1; 2"), Some(2));
    }
}
