//! Per-client color assignment.
//!
//! Colors are short ANSI SGR codes, chosen once at client creation and fixed for the lifetime of
//! the connection (renaming does not reassign it).

use rand::seq::SliceRandom;

/// Foreground colors that read reasonably on both light and dark terminals. 0 and 7-8 (black,
/// white/gray) are skipped since they tend to be invisible against one background or the other.
const PALETTE: &[u8] = &[1, 2, 3, 4, 5, 6, 9, 10, 11, 12, 13, 14];

/// An assigned ANSI color, e.g. `\x1b[36m`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color(u8);

impl Color {
    pub fn random() -> Color {
        let code = *PALETTE.choose(&mut rand::thread_rng()).unwrap();
        Color(code)
    }

    /// Wraps `text` in this color's escape sequence, resetting afterward.
    pub fn paint(&self, text: &str) -> String {
        format!("\x1b[{}m{}\x1b[0m", self.0, text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paint_wraps_and_resets() {
        let c = Color(3);
        assert_eq!(c.paint("bob"), "\x1b[3mbob\x1b[0m");
    }

    #[test]
    fn random_is_in_palette() {
        for _ in 0..50 {
            let Color(code) = Color::random();
            assert!(PALETTE.contains(&code));
        }
    }
}
