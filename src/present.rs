//! Showing images to the operator and reading their key presses.

use std::io::{self, BufRead, Write};

use crate::label::{LabelScheme, KEY_ESCAPE, KEY_SPACE};
use crate::source::StagedImage;
use crate::tally::Tally;

/// Shows an image and blocks until the operator answers.
pub trait Presenter {
    /// Returns the raw key code the operator pressed.
    fn present(&mut self, image: &StagedImage) -> io::Result<u32>;

    /// Called after every recorded label with the updated counts.
    fn show_tally(&mut self, _tally: &Tally) {}
}

/// A line-based presenter for terminals.
///
/// Each answer is one line of input. The key code is the first character
/// of the line; an empty line counts as the space bar and end of input
/// counts as Escape.
pub struct TerminalPresenter<R, W> {
    input: R,
    output: W,
    scheme: LabelScheme,
}

impl TerminalPresenter<io::StdinLock<'static>, io::Stdout> {
    /// Reads from stdin and writes prompts to stdout.
    pub fn stdio(scheme: LabelScheme) -> Self {
        Self::new(io::stdin().lock(), io::stdout(), scheme)
    }
}

impl<R: BufRead, W: Write> TerminalPresenter<R, W> {
    pub fn new(input: R, output: W, scheme: LabelScheme) -> Self {
        Self {
            input,
            output,
            scheme,
        }
    }

    fn prompt(&self) -> String {
        let keys: Vec<String> = self
            .scheme
            .tokens
            .iter()
            .map(|(token, label)| format!("{}={}", key_name(*token), self.scheme.name(*label)))
            .collect();
        format!("{} (any other key quits)", keys.join(", "))
    }
}

impl<R: BufRead, W: Write> Presenter for TerminalPresenter<R, W> {
    fn present(&mut self, image: &StagedImage) -> io::Result<u32> {
        let dimensions = imagesize::blob_size(&image.bytes)
            .map(|size| format!("{}x{}", size.width, size.height))
            .unwrap_or_else(|_| "unknown size".to_string());
        writeln!(
            self.output,
            "{} [{}] {}",
            image.path.display(),
            dimensions,
            self.prompt()
        )?;
        self.output.flush()?;

        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(KEY_ESCAPE);
        }

        let answer = line.trim_end_matches(['\r', '\n']);
        Ok(answer.chars().next().map(u32::from).unwrap_or(KEY_SPACE))
    }

    fn show_tally(&mut self, tally: &Tally) {
        // stdout going away mid-session must not end it
        let _ = writeln!(self.output, "{}", tally.describe(&self.scheme));
    }
}

fn key_name(token: u32) -> String {
    match token {
        KEY_SPACE => "space".to_string(),
        KEY_ESCAPE => "esc".to_string(),
        _ => char::from_u32(token)
            .filter(|c| !c.is_control())
            .map(String::from)
            .unwrap_or_else(|| format!("#{token}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::label::{KEY_ONE, KEY_ZERO};
    use std::path::PathBuf;

    fn image() -> StagedImage {
        StagedImage {
            id: "1".to_string(),
            path: PathBuf::from("images/1.jpg"),
            bytes: Vec::new(),
        }
    }

    fn answers(input: &str) -> Vec<u32> {
        let mut presenter =
            TerminalPresenter::new(input.as_bytes(), Vec::new(), LabelScheme::default());
        (0..input.lines().count() + 1)
            .map(|_| presenter.present(&image()).unwrap())
            .collect()
    }

    #[test]
    fn first_character_is_the_key_code() {
        assert_eq!(answers("1\n0\nq\n"), vec![KEY_ONE, KEY_ZERO, 113, KEY_ESCAPE]);
    }

    #[test]
    fn empty_line_is_space() {
        assert_eq!(answers("\n"), vec![KEY_SPACE, KEY_ESCAPE]);
    }

    #[test]
    fn prompt_lists_bound_keys_and_tally_uses_names() {
        let mut out = Vec::new();
        {
            let mut presenter =
                TerminalPresenter::new("1\n".as_bytes(), &mut out, LabelScheme::default());
            presenter.present(&image()).unwrap();
            presenter.show_tally(&Tally::new(3, 2));
        }
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("images/1.jpg [unknown size]"));
        assert!(text.contains("space=Ignore, 0=Absent, 1=Present"));
        assert!(text.ends_with("Present count: 3, Absent count: 2\n"));
    }
}
