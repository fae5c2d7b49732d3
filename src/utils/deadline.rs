//! Cooperative deadline checking for polling loops
//!
//! The generation backend gives no completion callback, so every wait in
//! this crate is a poll loop. [`Deadline`] bounds such a loop: the loop
//! body calls [`Deadline::tick`] once per iteration and gets an error back
//! once the total elapsed time exceeds the maximum. There is no background
//! timer; cancellation is cooperative, so a loop that stops ticking also
//! stops being cancellable.

use crate::{Error, Result};
use std::time::{Duration, Instant};

/// A checked deadline for cooperative polling loops.
///
/// # Examples
///
/// ```rust
/// use std::time::Duration;
/// use perchance_gen_provider::utils::Deadline;
///
/// # tokio_test::block_on(async {
/// let deadline = Deadline::new(Duration::from_secs(20), "image generation polling");
/// loop {
///     deadline.tick()?;
///     // ... issue one poll request, break on terminal status ...
///     # break;
/// }
/// # Ok::<(), perchance_gen_provider::Error>(())
/// # });
/// ```
#[derive(Debug)]
pub struct Deadline {
    started: Instant,
    max: Duration,
    what: &'static str,
}

impl Deadline {
    /// Create a deadline of `max` duration. `what` names the awaited
    /// operation in the eventual error message.
    pub fn new(max: Duration, what: &'static str) -> Self {
        Self {
            started: Instant::now(),
            max,
            what,
        }
    }

    /// Check the deadline. Returns [`Error::Connection`] once cumulative
    /// elapsed time exceeds the maximum.
    pub fn tick(&self) -> Result<()> {
        if self.started.elapsed() > self.max {
            return Err(Error::connection(format!(
                "timed out after {:.1}s waiting for {}",
                self.max.as_secs_f64(),
                self.what
            )));
        }
        Ok(())
    }

    /// Time elapsed since the deadline was created
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Time remaining before `tick` starts failing
    pub fn remaining(&self) -> Duration {
        self.max.saturating_sub(self.started.elapsed())
    }
}
