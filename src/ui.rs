// Terminal output helpers
// stdout is reserved for command results, so messages go to stderr.

use colored::Colorize;

pub fn print_error(message: &str) {
    eprintln!("{}", format!("❌ {}", message).bright_red().bold());
}

pub fn print_warning(message: &str) {
    eprintln!("{}", format!("⚠️  {}", message).bright_yellow());
}
