//! Kernel print utilities.
//!
//! Every byte printed by the kernel goes through a single console sink. The
//! sink is installed once at boot (the COM1 writer on bare metal); until then,
//! and on hosted builds that never install one, output is discarded.

use core::fmt::Write;
use crossbeam_utils::atomic::AtomicCell;

/// A console sink: receives already formatted text.
pub type Sink = fn(&str);

static SINK: AtomicCell<Option<Sink>> = AtomicCell::new(None);

/// Installs the console sink, replacing the previous one.
pub fn install_sink(sink: Sink) {
    SINK.store(Some(sink));
}

/// Removes the console sink. Subsequent output is discarded.
pub fn remove_sink() {
    SINK.store(None);
}

struct SinkWriter(Sink);

impl Write for SinkWriter {
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        (self.0)(s);
        Ok(())
    }
}

#[doc(hidden)]
pub fn _print(fmt: core::fmt::Arguments<'_>) {
    if let Some(sink) = SINK.load() {
        let _ = SinkWriter(sink).write_fmt(fmt);
    }
}

/// Prints out the message.
///
/// Use the format! syntax to write data to the console.
#[macro_export]
macro_rules! print {
    ($($arg:tt)*) => ($crate::kprint::_print(format_args!($($arg)*)));
}

/// Prints out the message with a newline.
///
/// Use the format! syntax to write data to the console.
#[macro_export]
macro_rules! println {
    () => ($crate::print!("\n"));
    ($($arg:tt)*) => ($crate::print!("{}\n", format_args!($($arg)*)));
}

/// Display an information message.
#[macro_export]
macro_rules! info {
    () => (if !$crate::QUIET.load(core::sync::atomic::Ordering::SeqCst) { $crate::print!("[INFO]\n") });
    ($($arg:tt)*) => (if !$crate::QUIET.load(core::sync::atomic::Ordering::SeqCst) { $crate::print!("[INFO] {}\n", format_args!($($arg)*)) });
}

/// Display a warning message.
#[macro_export]
macro_rules! warning {
    () => (if !$crate::QUIET.load(core::sync::atomic::Ordering::SeqCst) { $crate::print!("[WARN]\n") });
    ($($arg:tt)*) => (if !$crate::QUIET.load(core::sync::atomic::Ordering::SeqCst) { $crate::print!("[WARN] {}\n", format_args!($($arg)*)) });
}

/// Display a debug message.
#[macro_export]
macro_rules! debug {
    () => (if !$crate::QUIET.load(core::sync::atomic::Ordering::SeqCst) { $crate::print!("[DEBUG]\n") });
    ($($arg:tt)*) => (if !$crate::QUIET.load(core::sync::atomic::Ordering::SeqCst) { $crate::print!("[DEBUG] {}\n", format_args!($($arg)*))} );
}

#[cfg(test)]
mod tests {
    use std::string::String;
    use std::sync::Mutex;

    static CAPTURED: Mutex<String> = Mutex::new(String::new());

    fn capture(s: &str) {
        CAPTURED.lock().unwrap().push_str(s);
    }

    #[test]
    fn leveled_messages_reach_the_sink() {
        super::install_sink(capture);
        crate::info!("loaded {} symbols", 3);
        crate::warning!("depth limit");
        super::remove_sink();
        crate::info!("dropped");

        let out = CAPTURED.lock().unwrap();
        assert_eq!(*out, "[INFO] loaded 3 symbols\n[WARN] depth limit\n");
    }
}
