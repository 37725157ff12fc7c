//! VLIW bundle packing (spec.md §6.3, component C9): given the byte
//! sequences produced by each `!!`-separated sub-instruction on a bundle
//! line, pack them into one fixed-width word as defined by the matching
//! `.vliw`/`EPIC` pattern-file rows.

use crate::context::AssemblerContext;
use crate::error::LineDiagnostic;
use crate::expr;
use crate::lex::chars;

/// Pack `sub_instructions` (one byte-value list per `!!`-separated slot,
/// in source order) into the output image at the current PC, choosing the
/// `EPIC` row whose index set matches `idx_sets` as an unordered,
/// duplicate-insensitive set (the original's `list(set(...))` comparison).
pub fn pack_bundle(
    ctx: &mut AssemblerContext,
    idx_sets: &[i128],
    sub_instructions: &[Vec<i128>],
) -> Result<(), LineDiagnostic> {
    if ctx.vliw_template_bits == 0 {
        ctx.vliw_set = vec![(vec![0], "0".to_string())];
    }

    let vbits = ctx.vliw_bits.unsigned_abs() as u32;
    let template_bits_abs = ctx.vliw_template_bits.unsigned_abs() as u32;

    let wanted = as_set(idx_sets);
    let template_bits_is_zero = ctx.vliw_template_bits == 0;
    let row = ctx
        .vliw_set
        .iter()
        .find(|(set, _)| template_bits_is_zero || as_set(set) == wanted)
        .cloned();

    let Some((_, template_expr)) = row else {
        return Err(LineDiagnostic::MissingVliwDefinition);
    };

    let inst_mask: i128 = (1i128 << ctx.vliw_inst_bits) - 1;
    let template_mask: i128 = (1i128 << template_bits_abs) - 1;
    let pack_mask: i128 = (1i128 << vbits) - 1;

    let s = chars(&template_expr);
    let (template_value, _) = expr::evaluate_pattern(ctx, &s, 0);
    let templ = template_value & template_mask;

    let inst_bytes = (ctx.vliw_inst_bits as u32).div_ceil(8).max(1) as usize;
    let slot_count = ((vbits - template_bits_abs) as i64 / ctx.vliw_inst_bits) as usize;

    let mut values: Vec<i128> = sub_instructions.iter().flatten().copied().collect();
    let needed = inst_bytes * slot_count;
    while values.len() < needed {
        values.extend(ctx.vliw_nop.iter().map(|&b| b as i128));
    }

    let mut slots = Vec::with_capacity(slot_count);
    let mut cnt = 0usize;
    for _ in 0..slot_count {
        let mut v = 0i128;
        for _ in 0..inst_bytes {
            v <<= 8;
            if cnt < values.len() {
                v |= values[cnt] & 0xff;
            }
            cnt += 1;
        }
        slots.push(v & inst_mask);
    }

    let mut packed = 0i128;
    for slot in slots {
        packed = (packed << ctx.vliw_inst_bits) | slot;
    }
    packed &= pack_mask;

    let result = if ctx.vliw_template_bits < 0 {
        packed | (templ << (vbits - template_bits_abs))
    } else {
        (packed << template_bits_abs) | templ
    };

    let byte_count = vbits / 8;
    if ctx.vliw_bits > 0 {
        let mut shift = (vbits - 8) as i128;
        for cnt in 0..byte_count {
            let byte = ((result >> shift) & 0xff) as u8;
            emit_byte(ctx, cnt as i128, byte);
            shift -= 8;
        }
    } else {
        let mut v = result;
        for cnt in 0..byte_count {
            emit_byte(ctx, cnt as i128, (v & 0xff) as u8);
            v >>= 8;
        }
    }

    ctx.pc += byte_count as i128;
    Ok(())
}

fn emit_byte(ctx: &mut AssemblerContext, offset: i128, byte: u8) {
    let written = ctx.write_unit(ctx.pc + offset, byte as i128);
    if ctx.pass.emits() {
        for b in written {
            crate::logging::trace_byte(b);
        }
    }
}

fn as_set(values: &[i128]) -> std::collections::BTreeSet<i128> {
    values.iter().copied().collect()
}
