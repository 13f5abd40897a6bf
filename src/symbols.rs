// src/symbols.rs

use colored::{ColoredString, Colorize};
use std::sync::LazyLock;

pub static OK: LazyLock<ColoredString> = LazyLock::new(|| "[OK]".green());
pub static ERROR: LazyLock<ColoredString> = LazyLock::new(|| "[X]".red());
pub static INFO: LazyLock<ColoredString> = LazyLock::new(|| "[i]".cyan());
pub static WARN: LazyLock<ColoredString> = LazyLock::new(|| "[!]".yellow());
pub static CC_YES: LazyLock<ColoredString> = LazyLock::new(|| "[CC]".green().bold());
pub static CC_NO: LazyLock<ColoredString> = LazyLock::new(|| "[--]".red().bold());
pub static ENTER: LazyLock<ColoredString> = LazyLock::new(|| "Enter".yellow());
