//! Terminal marks used when reporting command outcomes.

use std::sync::LazyLock;

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// A green check mark.
pub static CHECKMARK: LazyLock<String> =
    LazyLock::new(|| format!("{}", console::style("✓").green()));

/// A red cross mark.
pub static CROSSMARK: LazyLock<String> =
    LazyLock::new(|| format!("{}", console::style("✗").red()));

/// A yellow warning mark.
pub static WARNMARK: LazyLock<String> =
    LazyLock::new(|| format!("{}", console::style("!").yellow()));
