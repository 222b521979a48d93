//! Rendering of traced errors.
//!
//! A report looks like this:
//!
//! ```text
//! Error: expected ')', instead found ';'
//!  >>> input.wv:3:12
//!   |
//! 3 | swap(a, b;
//!   |          ^ unexpected ';'
//! ```
//!
//! followed by a context block for the innermost macro expansion, if any,
//!     and the full stack of expansions in a note.

use crate::error;
use crate::token::Token;
use weave_stdext::color::{ColoredString, Colorize};

pub fn format_error(f: &mut std::fmt::Formatter<'_>, err: &error::TracedError) -> std::fmt::Result {
    let (stack, root) = err.error.stack_view();
    let lines: Vec<&str> = err.source.lines().collect();
    let immediate = stack.last();
    let location = match root.kind() {
        error::Kind::Token(token) => Location::of_token(&lines, &token),
        error::Kind::Line(n) => Location::of_line(&lines, n),
        error::Kind::EndOfInput => Location::of_end(&lines),
        error::Kind::FailedPrecondition => immediate
            .and_then(|propagated| Location::of_token(&lines, &propagated.token)),
    };

    let line = PrimaryLine {
        tone: Tone::Error,
        file_name: &err.file_name,
        location,
        title: root.title(),
        annotation: root.source_annotation(),
        notes: root.notes().iter().map(|n| format!["{n}"]).collect(),
    };
    write!(f, "{line}")?;

    if let Some(propagated) = immediate {
        let line = PrimaryLine {
            tone: Tone::Context,
            file_name: &err.file_name,
            location: Location::of_token(&lines, &propagated.token),
            title: format!["this error occurred while {}:", propagated.context.action()],
            annotation: "".into(),
            notes: vec![format![
                "this is the full stack trace of the error:\n\n{}",
                ErrorStack {
                    stack: &stack,
                    lines: &lines,
                    file_name: &err.file_name,
                }
            ]],
        };
        write!(f, "\n{line}")?;
    }
    Ok(())
}

/// A place in the source code to underline.
#[derive(Debug)]
struct Location<'a> {
    line_number: u32,
    line_content: &'a str,
    index: usize,
    length: usize,
}

impl<'a> Location<'a> {
    fn of_token(lines: &[&'a str], token: &Token) -> Option<Location<'a>> {
        let line_number = token.line()?;
        let line_content = *lines.get(line_number.checked_sub(1)? as usize)?;
        let text = token.text().lines().next().unwrap_or("");
        let (index, length) = match line_content.find(text) {
            Some(index) if !text.is_empty() => (index, text.len()),
            _ => (0, line_content.trim_end().len().max(1)),
        };
        Some(Location {
            line_number,
            line_content,
            index,
            length,
        })
    }

    fn of_line(lines: &[&'a str], line_number: u32) -> Option<Location<'a>> {
        let line_content = *lines.get(line_number.checked_sub(1)? as usize)?;
        Some(Location {
            line_number,
            line_content,
            index: 0,
            length: line_content.trim_end().len().max(1),
        })
    }

    fn of_end(lines: &[&'a str]) -> Option<Location<'a>> {
        let line_content = *lines.last()?;
        Some(Location {
            line_number: lines.len() as u32,
            line_content,
            index: line_content.trim_end().len(),
            length: 1,
        })
    }
}

#[derive(Debug, Clone, Copy)]
enum Tone {
    Error,
    Context,
}

impl Tone {
    fn paint(&self, s: &str) -> ColoredString {
        match self {
            Tone::Error => s.bright_red(),
            Tone::Context => s.yellow(),
        }
    }
}

impl std::fmt::Display for Tone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let word = match self {
            Tone::Error => "Error",
            Tone::Context => "Context",
        };
        write!(f, "{}", self.paint(word).bold())
    }
}

#[derive(Debug)]
struct PrimaryLine<'a> {
    tone: Tone,
    file_name: &'a str,
    location: Option<Location<'a>>,
    title: String,
    annotation: String,
    notes: Vec<String>,
}

impl<'a> std::fmt::Display for PrimaryLine<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let margin_width = match &self.location {
            Some(location) => location.line_number.to_string().len() + 1,
            None => 2,
        };
        let printer = Printer {
            indent: margin_width,
        };
        writeln!(f, "{}: {}", self.tone, self.title.as_str().bold())?;
        match &self.location {
            Some(location) => {
                fmt_location(&printer, f, self.file_name, location, &self.annotation, self.tone)?
            }
            None => printer
                .new_line()
                .without_separator()
                .with_indent_adjustment(1)
                .with_content(format!["{} {}", ">>>".bright_cyan().bold(), self.file_name])
                .print(f)?,
        }

        for (i, note) in self.notes.iter().enumerate() {
            let mut note_lines = note.trim_end().lines();
            let Some(first_note_line) = note_lines.next() else {
                continue;
            };
            printer.new_line().print(f)?;
            printer
                .new_line()
                .with_separator('=')
                .with_content(format!["{} {}", "note:".bold(), first_note_line])
                .print(f)?;
            for line in note_lines {
                let mut l = printer.new_line().with_content(format!["      {line}"]);
                if i == self.notes.len() - 1 {
                    l = l.with_separator(' ');
                }
                l.print(f)?;
            }
        }
        Ok(())
    }
}

struct ErrorStack<'a, 'b> {
    stack: &'b [&'a error::PropagatedError],
    lines: &'b [&'b str],
    file_name: &'b str,
}

impl<'a, 'b> std::fmt::Display for ErrorStack<'a, 'b> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (u, propagated) in self.stack.iter().rev().enumerate() {
            if u > 0 {
                writeln!(f)?;
            }
            let action = propagated.context.action();
            match Location::of_token(self.lines, &propagated.token) {
                Some(location) => fmt_location_light(f, self.file_name, &location, action)?,
                None => writeln!(f, "  {} ({})", propagated.token.text(), action)?,
            }
        }
        Ok(())
    }
}

struct Printer {
    indent: usize,
}

struct PrintLineBuilder<'a> {
    printer: &'a Printer,
    margin_content: String,
    separator: Option<char>,
    content: String,
    indent_adjustment: usize,
}

impl Printer {
    fn new_line(&self) -> PrintLineBuilder {
        PrintLineBuilder {
            printer: self,
            margin_content: "".into(),
            separator: Some('|'),
            content: "".into(),
            indent_adjustment: 0,
        }
    }
}

impl<'a> PrintLineBuilder<'a> {
    fn with_content<T: Into<String>>(mut self, content: T) -> Self {
        self.content = content.into();
        self
    }
    fn with_margin_content<T: Into<String>>(mut self, content: T) -> Self {
        self.margin_content = content.into();
        self
    }
    fn with_indent_adjustment(mut self, u: usize) -> Self {
        self.indent_adjustment = u;
        self
    }
    fn with_separator(mut self, c: char) -> Self {
        self.separator = Some(c);
        self
    }
    fn without_separator(mut self) -> Self {
        self.separator = None;
        self
    }

    fn print(self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let indent: usize = self
            .printer
            .indent
            .saturating_sub(self.indent_adjustment)
            .saturating_sub(self.margin_content.len() + 1);
        let margin_content = format!["{}{} ", " ".repeat(indent), self.margin_content];
        let separator = match self.separator {
            None => "".to_string(),
            Some(c) => format!["{c} "],
        };
        writeln!(
            f,
            "{}{}{}",
            margin_content.as_str().bright_cyan(),
            separator.as_str().bright_cyan(),
            self.content
        )
    }
}

fn fmt_location(
    printer: &Printer,
    f: &mut std::fmt::Formatter<'_>,
    file_name: &str,
    location: &Location,
    annotation: &str,
    tone: Tone,
) -> std::fmt::Result {
    printer
        .new_line()
        .without_separator()
        .with_indent_adjustment(1)
        .with_content(format!(
            "{} {}:{}:{}",
            ">>>".bright_cyan().bold(),
            file_name,
            location.line_number,
            location.index + 1
        ))
        .print(f)?;
    printer.new_line().print(f)?;
    printer
        .new_line()
        .with_margin_content(format!["{}", location.line_number])
        .with_content(highlight_substring(
            location.line_content,
            location.index,
            location.length,
        ))
        .print(f)?;
    printer
        .new_line()
        .with_content(format![
            "{}{} {}",
            " ".repeat(location.index),
            tone.paint(&"^".repeat(location.length)).bold(),
            tone.paint(annotation).bold(),
        ])
        .print(f)?;
    Ok(())
}

fn fmt_location_light(
    f: &mut std::fmt::Formatter<'_>,
    file_name: &str,
    location: &Location,
    annotation: &str,
) -> std::fmt::Result {
    let prefix = format!(
        "  {}:{}:{}",
        file_name,
        location.line_number,
        location.index + 1
    );
    writeln!(
        f,
        "{}  {}",
        prefix,
        highlight_substring(location.line_content, location.index, location.length)
    )?;
    writeln!(
        f,
        "{}  {} {}",
        " ".repeat(prefix.len() + location.index),
        Tone::Context.paint(&"^".repeat(location.length)).bold(),
        annotation,
    )
}

fn highlight_substring(line: &str, start: usize, length: usize) -> String {
    if line.len() < start + length || !line.is_char_boundary(start + length) {
        return line.trim_end().into();
    }
    format![
        "{}{}{}",
        &line[..start],
        line[start..start + length].bold(),
        line[start + length..].trim_end(),
    ]
}

/// A note attached to an error.
#[derive(Debug, Clone)]
pub enum Note {
    Text(String),
}

impl<T: Into<String>> From<T> for Note {
    fn from(value: T) -> Self {
        Note::Text(value.into())
    }
}

impl std::fmt::Display for Note {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Note::Text(s) => write!(f, "{s}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, OperationKind, SimpleTokenError, TracedError};

    fn render(error: Box<Error>, source: &str) -> String {
        TracedError::new(error, "input.wv", source).to_string()
    }

    #[test]
    fn token_error_points_at_token() {
        let source = "a = 1;\nswap(a, b;\n";
        let token = Token::char(';').with_line(Some(2));
        let report = render(SimpleTokenError::new(token, "expected ')'").into(), source);
        assert!(report.contains("expected ')'"));
        assert!(report.contains("input.wv:2:10"));
        assert!(report.contains("swap(a, b"));
        assert!(report.contains('^'));
    }

    #[test]
    fn propagated_error_has_context() {
        let source = "swap(a, b);\n";
        let error: Box<Error> =
            SimpleTokenError::new(Token::identifier("b").with_line(Some(1)), "bad").into();
        let error = error.propagate(
            OperationKind::Expansion,
            Token::identifier("swap").with_line(Some(1)),
        );
        let report = render(error, source);
        assert!(report.contains("this error occurred while expanding this macro:"));
        assert!(report.contains("full stack trace"));
    }

    #[test]
    fn missing_line_falls_back_to_file_name() {
        let report = render(
            SimpleTokenError::new(Token::identifier("b"), "bad").into(),
            "",
        );
        assert!(report.contains("input.wv"));
    }
}
