//! The 15-level-precedence expression evaluator (spec.md §4.1, component
//! C1). Each `term*`/`factor*` function is a pure `(s, idx) -> (value,
//! next_idx)` step over a `&[char]` buffer, mirroring the original
//! implementation's string+index threading instead of building a token
//! stream. Precedence climbs from `term11` (ternary, loosest) down to
//! `factor` (primary, tightest); callers enter at `evaluate`.

use crate::context::{AssemblerContext, ExprMode};
use crate::float;
use crate::lex::{self, char_at, get_label_word, get_symbol_word, looking_at, skip_spaces, XDIGIT};

/// Evaluate a full expression starting at `idx`, in the context's current
/// `expr_mode`. Returns the value and the index just past the expression.
pub fn evaluate(ctx: &mut AssemblerContext, s: &[char], idx: usize) -> (i128, usize) {
    let idx = skip_spaces(s, idx);
    term11(ctx, s, idx)
}

/// Evaluate in pattern mode (`!!!`/`!!!!`/`x:=expr` recognized)
pub fn evaluate_pattern(ctx: &mut AssemblerContext, s: &[char], idx: usize) -> (i128, usize) {
    ctx.expr_mode = ExprMode::Pattern;
    evaluate(ctx, s, idx)
}

/// Evaluate in assembly mode
pub fn evaluate_asm(ctx: &mut AssemblerContext, s: &[char], idx: usize) -> (i128, usize) {
    ctx.expr_mode = ExprMode::Assembly;
    evaluate(ctx, s, idx)
}

/// Evaluate a single factor (used by the `!!X` single-factor capture in
/// pattern matching, as opposed to `!X`'s full-expression capture)
pub fn evaluate_factor(ctx: &mut AssemblerContext, s: &[char], idx: usize) -> (i128, usize) {
    ctx.expr_mode = ExprMode::Pattern;
    factor(ctx, s, idx)
}

/// Evaluate a capture field whose text runs up to (but excludes) the next
/// unparenthesized occurrence of `stop_char`, used by the `!X\c` pattern
/// capture syntax (spec.md §5). `stop_char` is masked out inside balanced
/// parens so it can appear freely in sub-expressions.
pub fn evaluate_escaped(ctx: &mut AssemblerContext, s: &[char], idx: usize, stop_char: char) -> (i128, usize) {
    ctx.expr_mode = ExprMode::Pattern;
    let mut masked: Vec<char> = Vec::with_capacity(s.len());
    let mut depth = 0i32;
    for &c in s {
        match c {
            '(' => {
                depth += 1;
                masked.push(c);
            }
            ')' => {
                if depth > 0 {
                    depth -= 1;
                }
                masked.push(c);
            }
            c if depth == 0 && c == stop_char => masked.push('\0'),
            c => masked.push(c),
        }
    }
    evaluate(ctx, &masked, idx)
}

fn term11(ctx: &mut AssemblerContext, s: &[char], idx: usize) -> (i128, usize) {
    let (mut x, mut idx) = term10(ctx, s, idx);
    while looking_at(s, idx, "?") {
        let (t, next) = term10(ctx, s, idx + 1);
        idx = next;
        if looking_at(s, idx, ":") {
            let (u, next) = term10(ctx, s, idx + 1);
            idx = next;
            x = if x != 0 { t } else { u };
        }
    }
    (x, idx)
}

fn term10(ctx: &mut AssemblerContext, s: &[char], idx: usize) -> (i128, usize) {
    let (mut x, mut idx) = term9(ctx, s, idx);
    while looking_at(s, idx, "||") {
        let (t, next) = term9(ctx, s, idx + 2);
        x = if x != 0 || t != 0 { 1 } else { 0 };
        idx = next;
    }
    (x, idx)
}

fn term9(ctx: &mut AssemblerContext, s: &[char], idx: usize) -> (i128, usize) {
    let (mut x, mut idx) = term8(ctx, s, idx);
    while looking_at(s, idx, "&&") {
        let (t, next) = term8(ctx, s, idx + 2);
        x = if x != 0 && t != 0 { 1 } else { 0 };
        idx = next;
    }
    (x, idx)
}

fn term8(ctx: &mut AssemblerContext, s: &[char], idx: usize) -> (i128, usize) {
    if looking_at(s, idx, "not(") {
        let (x, next) = evaluate(ctx, s, idx + 3);
        (if x != 0 { 0 } else { 1 }, next)
    } else {
        term7(ctx, s, idx)
    }
}

fn term7(ctx: &mut AssemblerContext, s: &[char], idx: usize) -> (i128, usize) {
    let (mut x, mut idx) = term6(ctx, s, idx);
    loop {
        if looking_at(s, idx, "<=") {
            let (t, next) = term6(ctx, s, idx + 2);
            x = (x <= t) as i128;
            idx = next;
        } else if char_at(s, idx) == '<' {
            let (t, next) = term6(ctx, s, idx + 1);
            x = (x < t) as i128;
            idx = next;
        } else if looking_at(s, idx, ">=") {
            let (t, next) = term6(ctx, s, idx + 2);
            x = (x >= t) as i128;
            idx = next;
        } else if char_at(s, idx) == '>' {
            let (t, next) = term6(ctx, s, idx + 1);
            x = (x > t) as i128;
            idx = next;
        } else if looking_at(s, idx, "==") {
            let (t, next) = term6(ctx, s, idx + 2);
            x = (x == t) as i128;
            idx = next;
        } else if looking_at(s, idx, "!=") {
            let (t, next) = term6(ctx, s, idx + 2);
            x = (x != t) as i128;
            idx = next;
        } else {
            break;
        }
    }
    (x, idx)
}

/// Sign-extend `x` as a `t`-bit value. Per spec.md §7 ("expressions never
/// throw"), a malformed bit count (`t <= 0`, e.g. `x'` with no digits
/// following) is a no-op rather than a shift-by-negative panic -- the
/// original raises a `ValueError` here that its surrounding `try/except`
/// around pattern matching turns into a recoverable syntax error.
fn term6(ctx: &mut AssemblerContext, s: &[char], idx: usize) -> (i128, usize) {
    let (mut x, mut idx) = term5(ctx, s, idx);
    while char_at(s, idx) == '\'' {
        let (t, next) = term5(ctx, s, idx + 1);
        idx = next;
        if t >= 1 {
            let mask = !(!0i128 << t);
            let sign_bit = (x >> (t - 1)) & 1 != 0;
            x = (x & mask) | if sign_bit { !0i128 << t } else { 0 };
        }
    }
    (x, idx)
}

fn term5(ctx: &mut AssemblerContext, s: &[char], idx: usize) -> (i128, usize) {
    let (mut x, mut idx) = term4(ctx, s, idx);
    while char_at(s, idx) == '^' {
        let (t, next) = term4(ctx, s, idx + 1);
        x ^= t;
        idx = next;
    }
    (x, idx)
}

fn term4(ctx: &mut AssemblerContext, s: &[char], idx: usize) -> (i128, usize) {
    let (mut x, mut idx) = term3(ctx, s, idx);
    while char_at(s, idx) == '|' && char_at(s, idx + 1) != '|' {
        let (t, next) = term3(ctx, s, idx + 1);
        x |= t;
        idx = next;
    }
    (x, idx)
}

fn term3(ctx: &mut AssemblerContext, s: &[char], idx: usize) -> (i128, usize) {
    let (mut x, mut idx) = term2(ctx, s, idx);
    while char_at(s, idx) == '&' && char_at(s, idx + 1) != '&' {
        let (t, next) = term2(ctx, s, idx + 1);
        x &= t;
        idx = next;
    }
    (x, idx)
}

fn term2(ctx: &mut AssemblerContext, s: &[char], idx: usize) -> (i128, usize) {
    let (mut x, mut idx) = term1(ctx, s, idx);
    loop {
        if looking_at(s, idx, "<<") {
            let (t, next) = term1(ctx, s, idx + 2);
            x <<= t;
            idx = next;
        } else if looking_at(s, idx, ">>") {
            let (t, next) = term1(ctx, s, idx + 2);
            x >>= t;
            idx = next;
        } else {
            break;
        }
    }
    (x, idx)
}

fn term1(ctx: &mut AssemblerContext, s: &[char], idx: usize) -> (i128, usize) {
    let (mut x, mut idx) = term0(ctx, s, idx);
    loop {
        if char_at(s, idx) == '+' {
            let (t, next) = term0(ctx, s, idx + 1);
            x += t;
            idx = next;
        } else if char_at(s, idx) == '-' {
            let (t, next) = term0(ctx, s, idx + 1);
            x -= t;
            idx = next;
        } else {
            break;
        }
    }
    (x, idx)
}

/// Floor division, matching Python's `//`: rounds toward negative infinity
/// rather than toward zero (`i128::div_euclid`) or toward the dividend's
/// sign, so it agrees with Rust's `/` only when `t > 0`.
fn floor_div(x: i128, t: i128) -> i128 {
    let q = x / t;
    let r = x % t;
    if r != 0 && (r < 0) != (t < 0) { q - 1 } else { q }
}

/// Floor modulo, matching Python's `%`: the result takes the sign of the
/// divisor `t`, not the sign of `x` (`%`) or always non-negative
/// (`i128::rem_euclid`).
fn floor_mod(x: i128, t: i128) -> i128 {
    let r = x % t;
    if r != 0 && (r < 0) != (t < 0) { r + t } else { r }
}

fn term0(ctx: &mut AssemblerContext, s: &[char], idx: usize) -> (i128, usize) {
    let (mut x, mut idx) = term0_0(ctx, s, idx);
    loop {
        if char_at(s, idx) == '*' && char_at(s, idx + 1) != '*' {
            let (t, next) = term0_0(ctx, s, idx + 1);
            x *= t;
            idx = next;
        } else if looking_at(s, idx, "//") {
            let (t, next) = term0_0(ctx, s, idx + 2);
            idx = next;
            if t == 0 {
                crate::logging::error("Division by 0 error.".to_string());
            } else {
                x = floor_div(x, t);
            }
        } else if char_at(s, idx) == '%' {
            let (t, next) = term0_0(ctx, s, idx + 1);
            idx = next;
            if t == 0 {
                crate::logging::error("Division by 0 error.".to_string());
            } else {
                x = floor_mod(x, t);
            }
        } else {
            break;
        }
    }
    (x, idx)
}

fn term0_0(ctx: &mut AssemblerContext, s: &[char], idx: usize) -> (i128, usize) {
    let (mut x, mut idx) = factor(ctx, s, idx);
    while looking_at(s, idx, "**") {
        let (t, next) = factor(ctx, s, idx + 2);
        x = if t >= 0 { x.pow(t as u32) } else { 0 };
        idx = next;
    }
    (x, idx)
}

fn factor(ctx: &mut AssemblerContext, s: &[char], idx: usize) -> (i128, usize) {
    let idx = skip_spaces(s, idx);

    let (x, idx) = if ctx.expr_mode == ExprMode::Pattern && looking_at(s, idx, "!!!!") {
        (ctx.vliw_stop, idx + 4)
    } else if ctx.expr_mode == ExprMode::Pattern && looking_at(s, idx, "!!!") {
        (ctx.vcnt, idx + 3)
    } else if char_at(s, idx) == '*' && char_at(s, idx + 1) == '(' {
        let (addr, next) = evaluate(ctx, s, idx + 2);
        let next = skip_spaces(s, next);
        let next = if char_at(s, next) == ',' { next + 1 } else { next };
        let (offset, next) = evaluate(ctx, s, next);
        let next = skip_spaces(s, next);
        let next = if char_at(s, next) == ')' { next + 1 } else { next };
        (ctx.read_emitted(addr, offset), next)
    } else if char_at(s, idx) == '-' {
        let (v, next) = factor(ctx, s, idx + 1);
        (-v, next)
    } else if char_at(s, idx) == '~' {
        let (v, next) = factor(ctx, s, idx + 1);
        (!v, next)
    } else if char_at(s, idx) == '@' {
        let (v, next) = factor(ctx, s, idx + 1);
        (AssemblerContext::nbit(v), next)
    } else {
        factor1(ctx, s, idx)
    };

    (x, skip_spaces(s, idx))
}

fn factor1(ctx: &mut AssemblerContext, s: &[char], idx: usize) -> (i128, usize) {
    let idx = skip_spaces(s, idx);
    if idx >= s.len() {
        return (0, idx);
    }

    let (x, idx) = if s[idx] == '(' {
        let (v, mut next) = evaluate(ctx, s, idx + 1);
        if char_at(s, next) == ')' {
            next += 1;
        }
        (v, next)
    } else if s[idx] == '\'' {
        let mut i = idx + 1;
        let val = if char_at(s, i) == '\\' {
            let esc = char_at(s, i + 1);
            i += 2;
            match esc {
                'n' => '\n' as i128,
                't' => '\t' as i128,
                '\'' => '\'' as i128,
                '\\' => '\\' as i128,
                other => other as i128,
            }
        } else {
            let c = char_at(s, i);
            i += 1;
            c as i128
        };
        if char_at(s, i) == '\'' {
            i += 1;
        }
        (val, i)
    } else if looking_at(s, idx, "$$") {
        (ctx.pc, idx + 2)
    } else if looking_at(s, idx, "#") {
        let (word, next) = get_symbol_word(s, idx + 1, &ctx.sword_chars);
        (ctx.get_symbol(&word).unwrap_or(0), next)
    } else if looking_at(s, idx, "0b") {
        let mut v = 0i128;
        let mut i = idx + 2;
        while i < s.len() && (s[i] == '0' || s[i] == '1') {
            v = v * 2 + if s[i] == '1' { 1 } else { 0 };
            i += 1;
        }
        (v, i)
    } else if looking_at(s, idx, "0x") {
        let mut v = 0i128;
        let mut i = idx + 2;
        while i < s.len() && XDIGIT.contains(s[i].to_ascii_uppercase()) {
            v = v * 16 + s[i].to_digit(16).unwrap_or(0) as i128;
            i += 1;
        }
        (v, i)
    } else if looking_at(s, idx, "qad") {
        parse_float_literal(ctx, s, idx + 3, float::encode_f128)
    } else if looking_at(s, idx, "dbl") {
        parse_float_literal(ctx, s, idx + 3, float::encode_f64)
    } else if looking_at(s, idx, "flt") {
        parse_float_literal(ctx, s, idx + 3, float::encode_f32)
    } else if s[idx].is_ascii_digit() {
        let (digits, next) = lex::get_int_str(s, idx);
        (digits.parse::<i128>().unwrap_or(0), next)
    } else if ctx.expr_mode == ExprMode::Pattern
        && lex::LOWER.contains(s[idx])
        && idx + 1 < s.len()
        && !lex::LOWER.contains(s[idx + 1])
    {
        let ch = s[idx];
        if looking_at(s, idx + 1, ":=") {
            let (v, next) = evaluate(ctx, s, idx + 3);
            ctx.put_var(ch, v);
            (v, next)
        } else {
            (ctx.get_var(ch), idx + 1)
        }
    } else if ctx.lword_chars.contains(s[idx]) {
        let (word, next) = get_label_word(s, idx, &ctx.lword_chars);
        if next != idx {
            (ctx.get_label_value(&word), next)
        } else {
            (0, idx)
        }
    } else {
        (0, idx)
    };

    (x, skip_spaces(s, idx))
}

/// Shared body for the `qad{}`/`dbl{}`/`flt{}` literal primaries: consume a
/// `{...}` body and hand it to the matching IEEE-754 encoder
fn parse_float_literal(s_ctx: &mut AssemblerContext, s: &[char], idx: usize, encode: fn(&str) -> i128) -> (i128, usize) {
    let _ = s_ctx;
    let (found, body, next) = lex::get_curly_body(s, idx);
    if !found {
        return (0, next);
    }
    (encode(body.trim()), next)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(text: &str) -> i128 {
        let mut ctx = AssemblerContext::new();
        let s = lex::chars(text);
        evaluate_asm(&mut ctx, &s, 0).0
    }

    #[test]
    fn literal_forms_round_trip() {
        assert_eq!(eval("0x2A"), 42);
        assert_eq!(eval("0b101010"), 42);
        assert_eq!(eval("42"), 42);
        assert_eq!(eval("'a'"), 'a' as i128);
        assert_eq!(eval("'\\n'"), '\n' as i128);
    }

    #[test]
    fn negation_is_self_inverse() {
        assert_eq!(eval("-42 + 42"), 0);
        assert_eq!(eval("-(1+2+3) + (1+2+3)"), 0);
    }

    #[test]
    fn division_and_modulo_identity() {
        // x // y * y + x % y == x, for y != 0, including negative divisors
        let mut ctx = AssemblerContext::new();
        for (x, y) in [(17, 5), (-17, 5), (100, 7), (-7, -2), (7, -2), (-17, -5)] {
            let s = lex::chars(&format!("{x} // {y} * {y} + {x} % {y}"));
            let (v, _) = evaluate_asm(&mut ctx, &s, 0);
            assert_eq!(v, x);
        }
    }

    #[test]
    fn floor_division_rounds_toward_negative_infinity_like_python() {
        // these pin the exact quotient/remainder Python's `//`/`%` produce,
        // not just the round-trip identity (which Euclidean division also
        // satisfies) -- negative divisors are where floor and Euclidean
        // division disagree
        assert_eq!(eval("-7 // -2"), 3);
        assert_eq!(eval("7 // -2"), -4);
        assert_eq!(eval("7 % -2"), -1);
        assert_eq!(eval("-7 % -2"), -1);
    }

    #[test]
    fn sign_extend_is_idempotent_on_narrower_width() {
        // ((x'n)'m) == x'min(n,m) when n,m <= bit-width
        let mut ctx = AssemblerContext::new();
        let s = lex::chars("(0xFF'8)'4");
        let (a, _) = evaluate_asm(&mut ctx, &s, 0);
        let s = lex::chars("0xFF'4");
        let (b, _) = evaluate_asm(&mut ctx, &s, 0);
        assert_eq!(a, b);
    }

    #[test]
    fn sign_extend_with_zero_bit_count_is_a_no_op_not_a_panic() {
        let mut ctx = AssemblerContext::new();
        let s = lex::chars("0xFF'0");
        let (v, _) = evaluate_asm(&mut ctx, &s, 0);
        assert_eq!(v, 0xFF);
    }

    #[test]
    fn ternary_selects_branch() {
        assert_eq!(eval("1 ? 10 : 20"), 10);
        assert_eq!(eval("0 ? 10 : 20"), 20);
    }

    #[test]
    fn bitwise_and_shift_operators() {
        assert_eq!(eval("0xF0 & 0xFF"), 0xF0);
        assert_eq!(eval("0x0F | 0xF0"), 0xFF);
        assert_eq!(eval("1 << 4"), 16);
        assert_eq!(eval("256 >> 4"), 16);
        assert_eq!(eval("5 ^ 1"), 4);
    }

    #[test]
    fn at_operator_counts_bits() {
        assert_eq!(AssemblerContext::nbit(0), 0);
        assert_eq!(AssemblerContext::nbit(1), 1);
        assert_eq!(AssemblerContext::nbit(0xFF), 8);
    }

    #[test]
    fn pattern_mode_vcnt_and_vliw_stop_tokens() {
        let mut ctx = AssemblerContext::new();
        ctx.vcnt = 3;
        ctx.vliw_stop = 1;
        let s = lex::chars("!!!");
        assert_eq!(evaluate_pattern(&mut ctx, &s, 0).0, 3);
        let s = lex::chars("!!!!");
        assert_eq!(evaluate_pattern(&mut ctx, &s, 0).0, 1);
    }

    #[test]
    fn pattern_mode_variable_assignment_and_read() {
        let mut ctx = AssemblerContext::new();
        let s = lex::chars("a:=5");
        let (v, _) = evaluate_pattern(&mut ctx, &s, 0);
        assert_eq!(v, 5);
        assert_eq!(ctx.get_var('a'), 5);
    }

    #[test]
    fn self_referential_read_sees_already_emitted_bytes() {
        let mut ctx = AssemblerContext::new();
        ctx.write_unit(0, 0xAB);
        let s = lex::chars("*(0, 0)");
        let (v, _) = evaluate_asm(&mut ctx, &s, 0);
        assert_eq!(v, 0xAB);
    }

    #[test]
    fn self_referential_read_of_unwritten_memory_is_zero() {
        let mut ctx = AssemblerContext::new();
        let s = lex::chars("*(5, 0)");
        let (v, _) = evaluate_asm(&mut ctx, &s, 0);
        assert_eq!(v, 0);
    }

    #[test]
    fn undefined_label_reference_yields_zero_and_sets_flag() {
        let mut ctx = AssemblerContext::new();
        let s = lex::chars("nosuchlabel");
        let (v, _) = evaluate_asm(&mut ctx, &s, 0);
        assert_eq!(v, 0);
        assert!(ctx.error_undefined_label);
    }
}
