//! Command-line entry point (spec.md §8, ambient CLI layer): hand-rolled
//! flag extraction in the same style as the reference implementation's
//! `option()` helper, rather than a declarative argument-parsing crate,
//! since the pattern file and optional source file are positional and the
//! flag set is small and fixed.

use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use crate::context::AssemblerContext;
use crate::driver;
use crate::error::AssembleError;
use crate::pattern;

pub struct Args {
    pub pattern_file: PathBuf,
    pub source_file: Option<PathBuf>,
    pub export_file: Option<PathBuf>,
    pub elf_export_file: Option<PathBuf>,
    pub output_file: Option<PathBuf>,
    pub import_file: Option<PathBuf>,
}

/// Pull a `-flag value` pair out of `args`, returning the remaining
/// arguments and the value (empty string if the flag wasn't present or had
/// nothing after it), mirroring the original's `option()` helper.
fn take_flag(args: &[String], flag: &str) -> (Vec<String>, Option<String>) {
    match args.iter().position(|a| a == flag) {
        Some(idx) => {
            let value = args.get(idx + 1).cloned();
            let mut rest = args[..idx].to_vec();
            if let Some(after) = args.get(idx + 2..) {
                rest.extend_from_slice(after);
            }
            (rest, value)
        }
        None => (args.to_vec(), None),
    }
}

pub fn parse_args(raw: &[String]) -> Option<Args> {
    if raw.is_empty() {
        return None;
    }

    let mut rest = raw.to_vec();
    let export_file;
    let elf_export_file;
    let output_file;
    let import_file;

    (rest, export_file) = take_flag(&rest, "-e");
    (rest, elf_export_file) = take_flag(&rest, "-E");
    (rest, output_file) = take_flag(&rest, "-o");
    (rest, import_file) = take_flag(&rest, "-i");

    if rest.is_empty() {
        return None;
    }

    Some(Args {
        pattern_file: PathBuf::from(&rest[0]),
        source_file: rest.get(1).map(PathBuf::from),
        export_file: export_file.map(PathBuf::from),
        elf_export_file: elf_export_file.map(PathBuf::from),
        output_file: output_file.map(PathBuf::from),
        import_file: import_file.map(PathBuf::from),
    })
}

pub fn usage() -> &'static str {
    "axx general assembler\n\
     Usage: axx patternfile.axx [sourcefile.s] [-o outfile.bin] [-e export_labels.tsv] [-E export_labels.tsv] [-i import_labels.tsv]"
}

pub fn run(args: Args) -> Result<(), AssembleError> {
    let mut ctx = AssemblerContext::new();

    ctx.patterns = pattern::read_pattern_file(&args.pattern_file)?;
    let frozen = pattern::collect_pattern_symbol_names(&ctx.patterns);
    for name in &frozen {
        ctx.pat_symbols.insert(name.clone(), 0);
    }

    if let Some(import_path) = &args.import_file {
        let text = fs::read_to_string(import_path).map_err(|source| AssembleError::Io {
            path: import_path.clone(),
            source,
        })?;
        for line in text.lines() {
            driver::import_label_line(&mut ctx, line);
        }
    }

    if let Some(out) = &args.output_file {
        let _ = fs::remove_file(out);
        fs::write(out, []).map_err(|source| AssembleError::Io { path: out.clone(), source })?;
    }

    match &args.source_file {
        None => run_repl(&mut ctx),
        Some(source) => {
            driver::assemble_two_pass(&mut ctx, source)?;
        }
    }

    if let Some(out) = &args.output_file {
        fs::write(out, &ctx.image).map_err(|source| AssembleError::Io { path: out.clone(), source })?;
    }

    let (export_path, is_elf) = match (&args.elf_export_file, &args.export_file) {
        (Some(p), _) => (Some(p.clone()), true),
        (None, Some(p)) => (Some(p.clone()), false),
        (None, None) => (None, false),
    };

    if let Some(export_path) = export_path {
        write_export_file(&ctx, &export_path, is_elf)?;
    }

    Ok(())
}

fn run_repl(ctx: &mut AssemblerContext) {
    ctx.pc = 0;
    ctx.pass = crate::context::Pass::Repl;
    ctx.line_number = 1;
    ctx.current_file = "(stdin)".to_string();

    let stdin = io::stdin();
    loop {
        print!("{:016x}: >> ", ctx.pc);
        let _ = io::stdout().flush();

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }
        let line = line.trim().replace("\\\\", "\\");
        if line.is_empty() {
            continue;
        }
        if line == "?" {
            dump_label_table(ctx);
            continue;
        }
        driver::assemble_repl_line(ctx, &line);
    }
}

/// `?` in the REPL dumps every label defined so far, the original having no
/// other way to inspect `state.labels` interactively
fn dump_label_table(ctx: &AssemblerContext) {
    let mut names: Vec<&String> = ctx.labels.keys().collect();
    names.sort();
    for name in names {
        let label = &ctx.labels[name];
        println!("{name}\t{:#x}\t{}", label.value, label.section);
    }
}

fn write_export_file(ctx: &AssemblerContext, path: &Path, is_elf: bool) -> Result<(), AssembleError> {
    let mut out = String::new();
    for (name, section) in &ctx.sections {
        let flag = if is_elf && name == ".text" {
            "AX"
        } else if is_elf && name == ".data" {
            "WA"
        } else {
            ""
        };
        out.push_str(&format!("{name}\t{:#x}\t{:#x}\t{flag}\n", section.start, section.length));
    }
    for (name, label) in &ctx.export_labels {
        out.push_str(&format!("{name}\t{:#x}\n", label.value));
    }
    fs::write(path, out).map_err(|source| AssembleError::Io { path: path.to_path_buf(), source })
}
