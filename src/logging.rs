//! Pretty-printing messages to the console

use colored::Colorize;

/// Pretty-print an error message to the console
pub fn error(error_message: String) {
    let error_title = "error:".red().bold();
    eprintln!("{} {}", error_title, error_message);
}

/// Pretty-print a warning message to the console
pub fn warning(message: String, line_number: usize) {
    let warning = "warning:".yellow().bold();
    eprintln!("{} line {}: {}", warning, line_number, message);
}

/// Pretty-print a diagnostic raised while assembling a specific line
/// (spec.md §4.9: pass 2 elevates recoverable conditions to printed errors)
pub fn line_diagnostic(file: &str, line_number: usize, message: &str) {
    let tag = "error:".red().bold();
    eprintln!(" {} {}:{}: {}", tag, file, line_number, message);
}

/// Print the address/file/line/text prefix emitted before each assembled
/// line in pass 2 (and pass 0, the REPL), mirroring the original's
/// `lineassemble0` transcript
pub fn trace_line(pc: i128, file: &str, line_number: usize, text: &str) {
    print!("{:016x} {} {} {} ", pc, file, line_number, text);
}

/// Print the bytes produced for one emitted unit, as `outbin` does
pub fn trace_byte(byte: u8) {
    print!(" 0x{:02x}", byte);
}
