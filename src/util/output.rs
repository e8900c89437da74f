use std::io::{self, Write};

use console::style;

pub fn info(message: &str) {
    let _ = writeln!(io::stderr(), "{}", message);
}

pub fn warn(message: &str) {
    let _ = writeln!(io::stderr(), "{}", style(message).yellow().for_stderr());
}

pub fn error(message: &str) {
    let _ = writeln!(io::stderr(), "{}", style(message).red().for_stderr());
}

/// Labelled progress line, e.g. `svn cat ag/cp/1-13`.
pub fn step(label: &str, message: &str) {
    let _ = writeln!(io::stderr(), "{} {}", style(label).cyan().for_stderr(), message);
}

pub fn set_color(enabled: bool) {
    console::set_colors_enabled(enabled);
    console::set_colors_enabled_stderr(enabled);
}
