//! Spinners shown while long-running lifecycle steps execute.
//!
//! All spinners are attached to one global [`MultiProgress`] so that steps of a batch stack up
//! instead of overwriting each other.

use std::{
    sync::{Arc, LazyLock},
    time::Duration,
};

use indicatif::{MultiProgress, MultiProgressAlignment, ProgressBar, ProgressStyle};
use supafleet_utils::{CHECKMARK, CROSSMARK};

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

pub(crate) static MULTI_PROGRESS: LazyLock<Arc<MultiProgress>> = LazyLock::new(|| {
    let mp = MultiProgress::new();
    mp.set_alignment(MultiProgressAlignment::Top);
    Arc::new(mp)
});

pub(crate) static TICK_STRINGS: LazyLock<[&str; 11]> =
    LazyLock::new(|| ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", &CHECKMARK]);

pub(crate) static ERROR_TICK_STRINGS: LazyLock<[&str; 2]> =
    LazyLock::new(|| ["⠏", &CROSSMARK]);

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Creates a spinner with `message`, optionally inserted at a fixed position and with a length
/// for counted work.
pub fn create_spinner(
    message: String,
    insert_at_position: Option<usize>,
    len: Option<u64>,
) -> ProgressBar {
    let pb = match len {
        Some(len) => ProgressBar::new(len),
        None => ProgressBar::new_spinner(),
    };

    let pb = match insert_at_position {
        Some(position) => MULTI_PROGRESS.insert(position, pb),
        None => MULTI_PROGRESS.add(pb),
    };

    let template = if len.is_some() {
        "{spinner} {msg} {pos:.bold}/{len:.dim}"
    } else {
        "{spinner} {msg}"
    };

    let style = ProgressStyle::with_template(template)
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_strings(&*TICK_STRINGS);

    pb.set_style(style);
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

/// Stops a spinner and marks it as failed.
pub fn finish_with_error(pb: &ProgressBar) {
    let style = ProgressStyle::with_template("{spinner} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_strings(&*ERROR_TICK_STRINGS);

    pb.set_style(style);
    pb.finish();
}
