//! The read-eval loop of the monitor.
use crate::backtrace::MAX_BACKTRACE_DEPTH;
use crate::command::{Env, MonitorError, Status, runcmd};
use crate::teletype::{LineBuffer, Teletype, TtyWriter, readline};
use abyss::interrupt::Registers;
use core::fmt::Write;

/// Settings of a monitor session.
///
/// ```
/// use kmon::monitor::MonitorConfig;
///
/// let config = MonitorConfig::new().prompt("kmon> ").banner(false);
/// assert_eq!(config.prompt, "kmon> ");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorConfig {
    /// Printed before each line is read.
    pub prompt: &'static str,
    /// Bound on the frames printed by `backtrace`.
    pub max_backtrace_depth: usize,
    /// Print the welcome text when the session starts.
    pub banner: bool,
}

impl MonitorConfig {
    /// The defaults: prompt `K> `, backtraces of up to
    /// [`MAX_BACKTRACE_DEPTH`] frames, with the banner.
    pub const fn new() -> Self {
        Self {
            prompt: "K> ",
            max_backtrace_depth: MAX_BACKTRACE_DEPTH,
            banner: true,
        }
    }

    /// Sets the prompt.
    pub const fn prompt(mut self, prompt: &'static str) -> Self {
        self.prompt = prompt;
        self
    }

    /// Sets the bound on backtrace length.
    pub const fn max_backtrace_depth(mut self, depth: usize) -> Self {
        self.max_backtrace_depth = depth;
        self
    }

    /// Enables or disables the banner.
    pub const fn banner(mut self, banner: bool) -> Self {
        self.banner = banner;
        self
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs a monitor session on `tty`.
///
/// Prints the banner and the trap frame `tf` if there is one, then reads and
/// runs commands until one returns [`Status::Exit`] or the input ends.
///
/// # Returns
/// - `Ok(())` when the session ends normally.
/// - `Err(MonitorError)` when the teletype fails.
pub fn monitor<T: Teletype + ?Sized>(
    env: &Env<'_>,
    tty: &mut T,
    tf: Option<&Registers>,
) -> Result<(), MonitorError> {
    if env.config.banner {
        let mut out = TtyWriter(&mut *tty);
        writeln!(out, "Welcome to the KeOS kernel monitor!")?;
        writeln!(out, "Type 'help' for a list of commands.")?;
    }
    if let Some(tf) = tf {
        writeln!(TtyWriter(&mut *tty), "{tf:?}")?;
    }

    let mut buf = LineBuffer::new();
    loop {
        let Some(line) = readline(&mut *tty, env.config.prompt, &mut buf)? else {
            info!("monitor: end of input");
            return Ok(());
        };
        if runcmd(env, &mut TtyWriter(&mut *tty), line, tf)? == Status::Exit {
            return Ok(());
        }
    }
}
