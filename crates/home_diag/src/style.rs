//! ANSI terminal color styling for diagnostic rendering.
//!
//! All colors reset at the end of the wrapped string. Honors `NO_COLOR`
//! (https://no-color.org) via [`Style::enabled`].

pub struct Style;

impl Style {
    pub const RESET: &'static str = "\x1b[0m";
    pub const BOLD: &'static str = "\x1b[1m";
    pub const RED: &'static str = "\x1b[31m";
    pub const GREEN: &'static str = "\x1b[32m";
    pub const YELLOW: &'static str = "\x1b[33m";
    pub const BLUE: &'static str = "\x1b[34m";
    pub const MAGENTA: &'static str = "\x1b[35m";
    pub const CYAN: &'static str = "\x1b[36m";

    /// Whether color output should be produced in the current environment.
    pub fn enabled() -> bool {
        std::env::var_os("NO_COLOR").is_none()
    }

    fn wrap(code: &str, s: &str) -> String {
        if Self::enabled() {
            format!("{code}{s}{}", Self::RESET)
        } else {
            s.to_string()
        }
    }

    pub fn red(s: &str) -> String {
        Self::wrap(Self::RED, s)
    }

    pub fn yellow(s: &str) -> String {
        Self::wrap(Self::YELLOW, s)
    }

    pub fn blue(s: &str) -> String {
        Self::wrap(Self::BLUE, s)
    }

    pub fn cyan(s: &str) -> String {
        Self::wrap(Self::CYAN, s)
    }

    pub fn magenta(s: &str) -> String {
        Self::wrap(Self::MAGENTA, s)
    }

    pub fn bold(s: &str) -> String {
        Self::wrap(Self::BOLD, s)
    }

    pub fn bold_red(s: &str) -> String {
        if Self::enabled() {
            format!("{}{}{s}{}", Self::BOLD, Self::RED, Self::RESET)
        } else {
            s.to_string()
        }
    }

    pub fn bold_yellow(s: &str) -> String {
        if Self::enabled() {
            format!("{}{}{s}{}", Self::BOLD, Self::YELLOW, Self::RESET)
        } else {
            s.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn red_wraps_string() {
        std::env::remove_var("NO_COLOR");
        let result = Style::red("error");
        assert!(result.contains("\x1b[31m"));
        assert!(result.contains("error"));
        assert!(result.contains("\x1b[0m"));
    }

    #[test]
    fn bold_red_combines_codes() {
        std::env::remove_var("NO_COLOR");
        let result = Style::bold_red("Error");
        assert!(result.contains("\x1b[1m"));
        assert!(result.contains("\x1b[31m"));
    }
}
