use clap::builder::styling::{AnsiColor, Effects, Style, Styles};

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

const HEADER: Style = AnsiColor::Yellow.on_default().effects(Effects::BOLD);

const USAGE: Style = AnsiColor::Yellow.on_default().effects(Effects::BOLD);

const LITERAL: Style = AnsiColor::Cyan.on_default().effects(Effects::BOLD);

const PLACEHOLDER: Style = AnsiColor::Cyan.on_default();

const ERROR: Style = AnsiColor::Red.on_default().effects(Effects::BOLD);

const VALID: Style = AnsiColor::Green.on_default().effects(Effects::BOLD);

const INVALID: Style = AnsiColor::Red.on_default().effects(Effects::BOLD);

//--------------------------------------------------------------------------------------------------
// Traits
//--------------------------------------------------------------------------------------------------

/// Applies the help-text palette to strings printed outside of clap.
pub trait AnsiStyles {
    /// Styles a section header.
    fn header(&self) -> String;

    /// Styles a command, flag or other literal.
    fn literal(&self) -> String;

    /// Styles a value placeholder.
    fn placeholder(&self) -> String;

    /// Styles an error.
    fn error(&self) -> String;
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl<T: AsRef<str>> AnsiStyles for T {
    fn header(&self) -> String {
        paint(HEADER, self.as_ref())
    }

    fn literal(&self) -> String {
        paint(LITERAL, self.as_ref())
    }

    fn placeholder(&self) -> String {
        paint(PLACEHOLDER, self.as_ref())
    }

    fn error(&self) -> String {
        paint(ERROR, self.as_ref())
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// The clap help styles.
pub fn styles() -> Styles {
    Styles::styled()
        .header(HEADER)
        .usage(USAGE)
        .literal(LITERAL)
        .placeholder(PLACEHOLDER)
        .error(ERROR)
        .valid(VALID)
        .invalid(INVALID)
}

fn paint(style: Style, text: &str) -> String {
    if console::colors_enabled() {
        format!("{}{}{}", style.render(), text, style.render_reset())
    } else {
        text.to_string()
    }
}
