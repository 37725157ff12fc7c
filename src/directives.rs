//! Directive dispatch (spec.md §6, component C6): both the pattern-file
//! side (`.setsym`, `.clearsym`, `.bits`, `.padding`, `.symbolc`, `.vliw`,
//! `EPIC`, scanned fresh against every pattern row on every source line)
//! and the source side (`section`/`endsection`, `.zero`, `.ascii`,
//! `.asciiz`, `.include`, `.align`, `.org`, `.labelc`, `.export`, label
//! definitions).

use crate::context::{AssemblerContext, Section};
use crate::expr;
use crate::lex::{self, chars};
use crate::pattern::PatternRow;

/// Try the pattern-file-side directive rows against one scanned pattern
/// row, returning true if `row` was a directive (and thus should not also
/// be tried as an instruction template)
pub fn try_pattern_directive(ctx: &mut AssemblerContext, row: &PatternRow) -> bool {
    set_symbol(ctx, row)
        || clear_symbol(ctx, row)
        || padding_directive(ctx, row)
        || bits_directive(ctx, row)
        || symbolc_directive(ctx, row)
        || epic_directive(ctx, row)
        || vliw_directive(ctx, row)
}

fn eval_field(ctx: &mut AssemblerContext, field: &str) -> i128 {
    let s = chars(field);
    expr::evaluate_pattern(ctx, &s, 0).0
}

fn set_symbol(ctx: &mut AssemblerContext, row: &PatternRow) -> bool {
    if !row.pattern.eq_ignore_ascii_case(".setsym") {
        return false;
    }
    let key = row.error_expr.trim().to_uppercase();
    let value = if row.emit_expr.is_empty() { 0 } else { eval_field(ctx, &row.emit_expr) };
    ctx.set_symbol(&key, value);
    true
}

fn clear_symbol(ctx: &mut AssemblerContext, row: &PatternRow) -> bool {
    if !row.pattern.eq_ignore_ascii_case(".clearsym") {
        return false;
    }
    let key = row.emit_expr.trim();
    if key.is_empty() {
        ctx.clear_symbol(None);
    } else {
        ctx.clear_symbol(Some(key));
    }
    true
}

fn padding_directive(ctx: &mut AssemblerContext, row: &PatternRow) -> bool {
    if !row.pattern.eq_ignore_ascii_case(".padding") {
        return false;
    }
    let v = if row.emit_expr.is_empty() { 0 } else { eval_field(ctx, &row.emit_expr) };
    ctx.padding = v as u8;
    true
}

fn bits_directive(ctx: &mut AssemblerContext, row: &PatternRow) -> bool {
    if !row.pattern.eq_ignore_ascii_case(".bits") {
        return false;
    }
    ctx.endian = if row.error_expr.eq_ignore_ascii_case("big") {
        crate::context::Endian::Big
    } else {
        crate::context::Endian::Little
    };
    let v = if row.emit_expr.is_empty() { 8 } else { eval_field(ctx, &row.emit_expr) };
    ctx.bits = v.max(1) as u32;
    true
}

fn symbolc_directive(ctx: &mut AssemblerContext, row: &PatternRow) -> bool {
    if !row.pattern.eq_ignore_ascii_case(".symbolc") {
        return false;
    }
    // the original resets swordchars unconditionally on every `.symbolc` row
    // (its length guard is always true for a fully-padded six-field row),
    // even when the extra-chars field is empty
    ctx.sword_chars = format!("{}{}", lex::default_sword_chars(), row.emit_expr);
    true
}

fn vliw_directive(ctx: &mut AssemblerContext, row: &PatternRow) -> bool {
    if !row.pattern.eq_ignore_ascii_case(".vliw") {
        return false;
    }
    let bits = eval_field(ctx, &row.error_expr);
    let inst_bits = eval_field(ctx, &row.emit_expr);
    let template_bits = eval_field(ctx, &row.idxs_expr);
    let nop_word = eval_field(ctx, &row.extra1);

    ctx.vliw_bits = bits as i64;
    ctx.vliw_inst_bits = inst_bits as i64;
    ctx.vliw_template_bits = template_bits as i64;
    ctx.vliw_flag = true;

    let nop_bytes = (inst_bits as i64).div_ceil(8).max(1);
    let mut nop = Vec::with_capacity(nop_bytes as usize);
    let mut v = nop_word;
    for _ in 0..nop_bytes {
        nop.push((v & 0xff) as u8);
        v >>= 8;
    }
    ctx.vliw_nop = nop;
    true
}

fn epic_directive(ctx: &mut AssemblerContext, row: &PatternRow) -> bool {
    if !row.pattern.eq_ignore_ascii_case("epic") {
        return false;
    }
    if row.error_expr.trim().is_empty() {
        return false;
    }

    let s = chars(&row.error_expr);
    let mut idx = 0;
    let mut idxs = Vec::new();
    loop {
        let (v, next) = expr::evaluate_pattern(ctx, &s, idx);
        idxs.push(v);
        idx = next;
        if idx < s.len() && s[idx] == ',' {
            idx += 1;
            continue;
        }
        break;
    }

    let already = ctx.vliw_set.iter().any(|(set, tmpl)| *set == idxs && tmpl == &row.emit_expr);
    if !already {
        ctx.vliw_set.push((idxs, row.emit_expr.clone()));
    }
    true
}

/// What a source-side directive line resolved to
pub enum SourceDirective {
    NotMatched,
    Handled,
    Include(String),
}

/// Try every source-side directive against one `mnemonic rest-of-line`
/// split (spec.md §6.2). `l1` has already had internal spaces stripped
/// (as the original's `lineassemble2` does before dispatch).
pub fn try_source_directive(ctx: &mut AssemblerContext, l1: &str, l2: &str) -> SourceDirective {
    if l1.eq_ignore_ascii_case("section") || l1.eq_ignore_ascii_case("segment") {
        if !l2.is_empty() {
            ctx.current_section = l2.to_string();
            let existing = ctx.sections.iter_mut().find(|(name, _)| name == l2);
            match existing {
                Some((_, sec)) => *sec = Section { start: ctx.pc, length: 0 },
                None => ctx.sections.push((l2.to_string(), Section { start: ctx.pc, length: 0 })),
            }
        }
        return SourceDirective::Handled;
    }

    if l1.eq_ignore_ascii_case("endsection") || l1.eq_ignore_ascii_case("endsegment") {
        let section = ctx.current_section.clone();
        if let Some((_, sec)) = ctx.sections.iter_mut().find(|(name, _)| *name == section) {
            sec.length = ctx.pc - sec.start;
        }
        return SourceDirective::Handled;
    }

    if l1.eq_ignore_ascii_case(".zero") {
        // matches the original's `outbin2`: written but not traced
        let s = chars(l2);
        let (x, _) = expr::evaluate_asm(ctx, &s, 0);
        for _ in 0..=x {
            ctx.write_unit(ctx.pc, 0);
            ctx.pc += 1;
        }
        return SourceDirective::Handled;
    }

    if l1.eq_ignore_ascii_case(".ascii") {
        emit_ascii(ctx, l2, false);
        return SourceDirective::Handled;
    }

    if l1.eq_ignore_ascii_case(".asciiz") {
        emit_ascii(ctx, l2, true);
        return SourceDirective::Handled;
    }

    if l1.eq_ignore_ascii_case(".include") {
        let name = lex::get_quoted_string(&chars(l2));
        if !name.is_empty() {
            return SourceDirective::Include(name);
        }
        return SourceDirective::Handled;
    }

    if l1.eq_ignore_ascii_case(".align") {
        if !l2.is_empty() {
            let s = chars(l2);
            let (v, _) = expr::evaluate_asm(ctx, &s, 0);
            ctx.align = v;
        }
        ctx.pc = ctx.align_addr(ctx.pc);
        return SourceDirective::Handled;
    }

    if l1.eq_ignore_ascii_case(".org") {
        // matches the original's `outbin2`: written but not traced
        let s = chars(l2);
        let (target, idx) = expr::evaluate_asm(ctx, &s, 0);
        if lex::looking_at(&s, idx, ",P") {
            if target > ctx.pc {
                for i in 0..(target - ctx.pc) {
                    ctx.write_unit(ctx.pc + i, ctx.padding as i128);
                }
            }
        }
        ctx.pc = target;
        return SourceDirective::Handled;
    }

    if l1.eq_ignore_ascii_case(".labelc") {
        if !l2.is_empty() {
            ctx.lword_chars = format!("{}{}", lex::default_lword_chars(), l2);
        }
        return SourceDirective::Handled;
    }

    if l1.eq_ignore_ascii_case(".export") {
        if ctx.pass.emits() {
            export_labels(ctx, l2);
        }
        return SourceDirective::Handled;
    }

    SourceDirective::NotMatched
}

fn trace_bytes(ctx: &AssemblerContext, bytes: &[u8]) {
    if ctx.pass.emits() {
        for &b in bytes {
            crate::logging::trace_byte(b);
        }
    }
}

/// Emit a quoted ASCII string one byte at a time, recognizing `\0`, `\t`
/// and `\n` escapes; appends a NUL terminator when `zero_terminated`
fn emit_ascii(ctx: &mut AssemblerContext, l2: &str, zero_terminated: bool) {
    let s = chars(l2);
    if s.first() != Some(&'"') {
        return;
    }
    let mut idx = 1;
    while idx < s.len() {
        if s[idx] == '"' {
            break;
        }
        let ch = if lex::looking_at(&s, idx, "\\0") {
            idx += 2;
            '\0'
        } else if lex::looking_at(&s, idx, "\\t") {
            idx += 2;
            '\t'
        } else if lex::looking_at(&s, idx, "\\n") {
            idx += 2;
            '\n'
        } else {
            let c = s[idx];
            idx += 1;
            c
        };
        let written = ctx.write_unit(ctx.pc, ch as i128);
        trace_bytes(ctx, &written);
        ctx.pc += 1;
    }
    if zero_terminated {
        let written = ctx.write_unit(ctx.pc, 0);
        trace_bytes(ctx, &written);
        ctx.pc += 1;
    }
}

fn export_labels(ctx: &mut AssemblerContext, l2: &str) {
    let s = chars(l2);
    let mut idx = 0;
    loop {
        idx = lex::skip_spaces(&s, idx);
        let (name, next) = lex::get_label_word(&s, idx, &ctx.lword_chars);
        if name.is_empty() {
            break;
        }
        idx = next;
        let value = ctx.get_label_value(&name);
        let section = ctx.get_label_section(&name);
        let label = crate::context::Label { value, section };
        match ctx.export_labels.iter_mut().find(|(n, _)| *n == name) {
            Some((_, l)) => *l = label,
            None => ctx.export_labels.push((name, label)),
        }
        if idx < s.len() && s[idx] == ',' {
            idx += 1;
        } else {
            break;
        }
    }
}

/// Process a leading label definition on a line (`NAME:` or
/// `NAME: .equ EXPR`), returning the remaining line text to assemble.
/// Matches the original's `label_processing`: a bare `NAME:` records the
/// current PC; `NAME: .equ EXPR` records `EXPR`'s value instead and
/// consumes the whole line.
pub fn process_label(ctx: &mut AssemblerContext, line: &str) -> Result<String, crate::error::LineDiagnostic> {
    if line.is_empty() {
        return Ok(String::new());
    }
    let s = chars(line);
    let (label, idx) = lex::get_label_word(&s, 0, &ctx.lword_chars);
    if label.is_empty() || idx == 0 || s[idx - 1] != ':' {
        return Ok(line.to_string());
    }

    let after = lex::skip_spaces(&s, idx);
    let (directive, after) = lex::get_param_to_spc(&s, after);
    let section = ctx.current_section.clone();

    if directive.eq_ignore_ascii_case(".equ") {
        let (value, _) = expr::evaluate_asm(ctx, &s, after);
        ctx.put_label_value(&label, value, &section)?;
        Ok(String::new())
    } else {
        let pc = ctx.pc;
        ctx.put_label_value(&label, pc, &section)?;
        Ok(s[idx..].iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::AssemblerContext;

    #[test]
    fn align_then_align_again_leaves_pc_unchanged() {
        let mut ctx = AssemblerContext::new();
        ctx.pc = 5;
        try_source_directive(&mut ctx, ".align", "16");
        assert_eq!(ctx.pc, 16);
        let pc_after_first = ctx.pc;
        try_source_directive(&mut ctx, ".align", "16");
        assert_eq!(ctx.pc, pc_after_first);
        assert_eq!(ctx.pc % 16, 0);
    }

    #[test]
    fn org_with_padding_fills_the_gap() {
        let mut ctx = AssemblerContext::new();
        ctx.padding = 0xFF;
        try_source_directive(&mut ctx, ".org", "0x10,P");
        assert_eq!(ctx.pc, 0x10);
        for addr in 0..0x10 {
            assert_eq!(ctx.read_emitted(addr, 0), 0xFF);
        }
    }

    #[test]
    fn zero_directive_writes_n_plus_one_zero_bytes() {
        let mut ctx = AssemblerContext::new();
        try_source_directive(&mut ctx, ".zero", "3");
        assert_eq!(ctx.pc, 4);
    }

    #[test]
    fn bare_label_records_current_pc() {
        let mut ctx = AssemblerContext::new();
        ctx.pc = 0x20;
        let remaining = process_label(&mut ctx, "here: nop").unwrap();
        assert_eq!(remaining.trim(), "nop");
        assert_eq!(ctx.get_label_value("here"), 0x20);
    }

    #[test]
    fn equ_label_records_expression_value() {
        let mut ctx = AssemblerContext::new();
        let remaining = process_label(&mut ctx, "target: .equ 0x1234").unwrap();
        assert_eq!(remaining, "");
        assert_eq!(ctx.get_label_value("target"), 0x1234);
    }

    #[test]
    fn duplicate_label_in_pass_one_is_an_error() {
        let mut ctx = AssemblerContext::new();
        ctx.pass = crate::context::Pass::First;
        process_label(&mut ctx, "foo: nop").unwrap();
        let err = process_label(&mut ctx, "foo: nop").unwrap_err();
        assert!(matches!(err, crate::error::LineDiagnostic::DuplicateLabel { .. }));
    }

    #[test]
    fn label_shadowing_pattern_symbol_is_rejected() {
        let mut ctx = AssemblerContext::new();
        ctx.pat_symbols.insert("FOO".to_string(), 0);
        let err = process_label(&mut ctx, "foo: nop").unwrap_err();
        assert!(matches!(err, crate::error::LineDiagnostic::LabelShadowsSymbol { .. }));
    }

    #[test]
    fn export_produces_one_row_per_label() {
        let mut ctx = AssemblerContext::new();
        ctx.pass = crate::context::Pass::Second;
        process_label(&mut ctx, "alpha: .equ 1").unwrap();
        process_label(&mut ctx, "beta: .equ 2").unwrap();
        try_source_directive(&mut ctx, ".export", "alpha,beta");
        assert_eq!(ctx.export_labels.len(), 2);
    }
}
