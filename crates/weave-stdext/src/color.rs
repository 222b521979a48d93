//! Terminal coloring for diagnostics
//!
//! Colors come from the [colored](https://docs.rs/colored/latest/colored/) crate
//!     when the `color` Cargo feature is enabled.
//! Without the feature every style is a no-op and text passes through unchanged,
//!     so callers never need their own `cfg` checks:
//!
//! ```
//! use weave_stdext::color::Colorize;
//! println!["{}", "expected ')'".bold().bright_red()];
//! ```

#[cfg(feature = "color")]
pub type ColoredString = colored::ColoredString;

#[cfg(not(feature = "color"))]
pub type ColoredString = String;

/// A style used in Weave's error output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Style {
    Bold,
    BrightCyan,
    BrightRed,
    Yellow,
}

/// Coloring methods on strings.
pub trait Colorize: Sized {
    fn style(self, style: Style) -> ColoredString;

    fn bold(self) -> ColoredString {
        self.style(Style::Bold)
    }

    fn bright_cyan(self) -> ColoredString {
        self.style(Style::BrightCyan)
    }

    fn bright_red(self) -> ColoredString {
        self.style(Style::BrightRed)
    }

    fn yellow(self) -> ColoredString {
        self.style(Style::Yellow)
    }
}

#[cfg(feature = "color")]
fn apply<S: colored::Colorize>(s: S, style: Style) -> ColoredString {
    match style {
        Style::Bold => colored::Colorize::bold(s),
        Style::BrightCyan => colored::Colorize::bright_cyan(s),
        Style::BrightRed => colored::Colorize::bright_red(s),
        Style::Yellow => colored::Colorize::yellow(s),
    }
}

#[cfg(feature = "color")]
impl Colorize for ColoredString {
    fn style(self, style: Style) -> ColoredString {
        apply(self, style)
    }
}

#[cfg(feature = "color")]
impl Colorize for &str {
    fn style(self, style: Style) -> ColoredString {
        apply(self, style)
    }
}

#[cfg(not(feature = "color"))]
impl Colorize for ColoredString {
    fn style(self, _: Style) -> ColoredString {
        self
    }
}

#[cfg(not(feature = "color"))]
impl Colorize for &str {
    fn style(self, _: Style) -> ColoredString {
        self.to_string()
    }
}
