//! Monitor commands and the command interpreter.
//!
//! A command line is split into whitespace separated arguments; the first
//! one names the command. Commands live in the static [`COMMANDS`] table and
//! are run with the [`Env`] describing the machine being inspected.
use crate::backtrace::Backtrace;
use crate::debug_info::DebugInfo;
use crate::kerninfo::KernelLayout;
use crate::mm::memory::MemoryView;
use crate::mm::page_table::PageTableWalk;
use crate::monitor::MonitorConfig;
use crate::showmap::Mappings;
use crate::util::strtol;
use abyss::interrupt::Registers;
use arrayvec::ArrayVec;
use core::fmt::Write;
use num_enum::{IntoPrimitive, TryFromPrimitive};

/// Maximum number of arguments on a line, command name included, plus one.
pub const MAXARGS: usize = 16;

const WHITESPACE: [char; 4] = ['\t', '\r', '\n', ' '];

/// What the monitor does after a command.
///
/// The integer value is the status a command returns: negative values leave
/// the monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(isize)]
pub enum Status {
    /// Read the next command.
    Continue = 0,
    /// Leave the monitor.
    Exit = -1,
}

/// Errors of the monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorError {
    /// The line has too many arguments.
    TooManyArguments,
    /// No command has this name.
    UnknownCommand,
    /// The teletype failed.
    IOError,
    /// Formatting into the console failed.
    Console,
    /// The kernel has no debug info to resolve addresses with.
    NoDebugInfo,
}

impl core::fmt::Display for MonitorError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::TooManyArguments => write!(f, "Too many arguments (max {MAXARGS})"),
            Self::UnknownCommand => write!(f, "Unknown command"),
            Self::IOError => write!(f, "I/O error"),
            Self::Console => write!(f, "Console error"),
            Self::NoDebugInfo => write!(f, "No debug info"),
        }
    }
}

impl From<core::fmt::Error> for MonitorError {
    fn from(_: core::fmt::Error) -> Self {
        Self::Console
    }
}

/// The machine state commands inspect.
pub struct Env<'a> {
    /// Resolves return addresses; `None` if the kernel image carries no
    /// debug info.
    pub debug_info: Option<&'a dyn DebugInfo>,
    /// The active page table.
    pub page_table: &'a dyn PageTableWalk,
    /// The stack `backtrace` walks.
    pub stack: MemoryView<'a>,
    /// Returns the frame pointer to start a backtrace from. It is called by
    /// the `backtrace` handler and must return a frame that outlives the call.
    pub frame_pointer: fn() -> usize,
    /// Placement of the kernel image, if known.
    pub layout: Option<KernelLayout>,
    pub config: MonitorConfig,
}

/// A command handler.
///
/// `argv[0]` is the command name. `tf` is the trap frame the monitor was
/// entered with, if any.
pub type Handler =
    fn(&Env<'_>, &mut dyn Write, &[&str], Option<&Registers>) -> Result<Status, MonitorError>;

/// A monitor command.
pub struct Command {
    pub name: &'static str,
    /// One-line description shown by `help`.
    pub desc: &'static str,
    pub func: Handler,
}

/// The commands, sorted by name.
pub static COMMANDS: [Command; 5] = [
    Command {
        name: "backtrace",
        desc: "Display stack backtrace information",
        func: mon_backtrace,
    },
    Command {
        name: "exit",
        desc: "Leave the kernel monitor",
        func: mon_exit,
    },
    Command {
        name: "help",
        desc: "Display this list of commands",
        func: mon_help,
    },
    Command {
        name: "kerninfo",
        desc: "Display information about the kernel",
        func: mon_kerninfo,
    },
    Command {
        name: "showmap",
        desc: "Display the physical pages mapping a range of virtual addresses",
        func: mon_showmap,
    },
];

/// Finds the command called `name`.
pub fn lookup(name: &str) -> Result<&'static Command, MonitorError> {
    COMMANDS
        .binary_search_by(|command| command.name.cmp(name))
        .map(|idx| &COMMANDS[idx])
        .map_err(|_| MonitorError::UnknownCommand)
}

/// Splits `line` into whitespace separated arguments.
///
/// At most `MAXARGS - 1` arguments are accepted.
pub fn split(line: &str) -> Result<ArrayVec<&str, MAXARGS>, MonitorError> {
    let mut argv = ArrayVec::new();
    for arg in line.split(WHITESPACE).filter(|arg| !arg.is_empty()) {
        if argv.len() == MAXARGS - 1 {
            return Err(MonitorError::TooManyArguments);
        }
        argv.push(arg);
    }
    Ok(argv)
}

/// Runs the command on `line`, writing its output to `w`.
///
/// Problems with the line itself (too many arguments, an unknown command, a
/// command lacking debug info) are reported on `w` and the monitor goes on.
/// Only console failures are returned as errors.
pub fn runcmd(
    env: &Env<'_>,
    w: &mut dyn Write,
    line: &str,
    tf: Option<&Registers>,
) -> Result<Status, MonitorError> {
    let argv = match split(line) {
        Ok(argv) => argv,
        Err(e) => {
            writeln!(w, "{e}")?;
            return Ok(Status::Continue);
        }
    };
    let Some(&name) = argv.first() else {
        return Ok(Status::Continue);
    };
    let Ok(command) = lookup(name) else {
        writeln!(w, "Unknown command '{name}'")?;
        return Ok(Status::Continue);
    };
    match (command.func)(env, w, &argv, tf) {
        Err(e @ MonitorError::NoDebugInfo) => {
            writeln!(w, "{name}: {e}")?;
            Ok(Status::Continue)
        }
        result => result,
    }
}

fn mon_help(
    _env: &Env<'_>,
    w: &mut dyn Write,
    _argv: &[&str],
    _tf: Option<&Registers>,
) -> Result<Status, MonitorError> {
    for command in COMMANDS.iter() {
        writeln!(w, "{} - {}", command.name, command.desc)?;
    }
    Ok(Status::Continue)
}

fn mon_kerninfo(
    env: &Env<'_>,
    w: &mut dyn Write,
    _argv: &[&str],
    _tf: Option<&Registers>,
) -> Result<Status, MonitorError> {
    match env.layout {
        Some(layout) => layout.report(w)?,
        None => writeln!(w, "Kernel layout is unknown")?,
    }
    Ok(Status::Continue)
}

fn mon_backtrace(
    env: &Env<'_>,
    w: &mut dyn Write,
    _argv: &[&str],
    _tf: Option<&Registers>,
) -> Result<Status, MonitorError> {
    let debug_info = env.debug_info.ok_or(MonitorError::NoDebugInfo)?;
    writeln!(w, "Stack backtrace:")?;
    for entry in Backtrace::new(env.stack, debug_info, (env.frame_pointer)())
        .with_max_depth(env.config.max_backtrace_depth)
    {
        writeln!(w, "{entry}")?;
    }
    Ok(Status::Continue)
}

fn mon_showmap(
    env: &Env<'_>,
    w: &mut dyn Write,
    argv: &[&str],
    _tf: Option<&Registers>,
) -> Result<Status, MonitorError> {
    let Some(start) = argv.get(1) else {
        writeln!(w, "Usage: showmap <start> [<pages>]")?;
        writeln!(w, "<pages> counts 4KB pages, 1 if omitted")?;
        return Ok(Status::Continue);
    };
    let start = strtol(start);
    let pages = argv.get(2).map_or(1, |pages| strtol(pages));
    for row in Mappings::new(env.page_table, start, pages) {
        writeln!(w, "{row}")?;
    }
    Ok(Status::Continue)
}

fn mon_exit(
    _env: &Env<'_>,
    _w: &mut dyn Write,
    _argv: &[&str],
    _tf: Option<&Registers>,
) -> Result<Status, MonitorError> {
    Ok(Status::Exit)
}
