//! A teletype (TTY) interface for character-based I/O.
//!
//! This module provides a trait [`Teletype`] that defines an interface for
//! reading from and writing to a teletype device, such as a serial port.
//! The [`Serial`] struct implements this interface for x86_64 systems.
//!
//! On top of it, [`readline`] implements the monitor's line editor: echo,
//! backspace, and nothing more. [`Script`] plays a fixed input instead of a
//! device.
use crate::command::MonitorError;
use alloc::{borrow::Cow, collections::VecDeque, string::String, vec::Vec};
use arrayvec::ArrayVec;

/// Size of the line buffer, terminator included: a line holds at most
/// `CMDBUF_SIZE - 1` characters.
pub const CMDBUF_SIZE: usize = 80;

/// The `Teletype` trait represents a generic character-based input/output
/// device.
///
/// Implementations of this trait define methods for:
/// - Writing data to the teletype (`write`)
/// - Reading data from the teletype (`read`)
///
/// This abstraction allows for different kinds of terminal or serial interfaces
/// to implement their own communication methods.
pub trait Teletype {
    /// Writes data to the teletype.
    ///
    /// # Returns
    /// - `Ok(usize)`: The number of bytes successfully written.
    /// - `Err(MonitorError)`: If the write operation failed.
    fn write(&mut self, data: &[u8]) -> Result<usize, MonitorError>;

    /// Reads data from the teletype.
    ///
    /// # Returns
    /// - `Ok(usize)`: The number of bytes successfully read. `Ok(0)` means
    ///   the input is exhausted.
    /// - `Err(MonitorError)`: If the read operation failed.
    fn read(&mut self, data: &mut [u8]) -> Result<usize, MonitorError>;

    /// Writes all of `data`.
    fn write_all(&mut self, mut data: &[u8]) -> Result<(), MonitorError> {
        while !data.is_empty() {
            match self.write(data)? {
                0 => return Err(MonitorError::IOError),
                n => data = &data[n..],
            }
        }
        Ok(())
    }
}

/// Adapts a [`Teletype`] to [`core::fmt::Write`], so that `write!` can
/// target it.
pub struct TtyWriter<'a, T: Teletype + ?Sized>(pub &'a mut T);

impl<T: Teletype + ?Sized> core::fmt::Write for TtyWriter<'_, T> {
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        self.0.write_all(s.as_bytes()).map_err(|_| core::fmt::Error)
    }
}

const BACKSPACE: u8 = 0x08;
const DELETE: u8 = 0x7f;
const END_OF_TRANSMISSION: u8 = 0x04;

/// A line being edited.
pub type LineBuffer = ArrayVec<u8, CMDBUF_SIZE>;

/// Prints `prompt` and reads one line from `tty` into `buf`.
///
/// Printable characters are echoed and appended while the line has room;
/// extra characters are dropped. Backspace (`^H` or DEL) removes the last
/// character. Other control characters are ignored.
///
/// # Returns
/// - `Ok(Some(line))` when a newline (`\n` or `\r`) ends the line.
/// - `Ok(None)` when the input ends (a 0-byte read or `^D`).
pub fn readline<'b, T: Teletype + ?Sized>(
    tty: &mut T,
    prompt: &str,
    buf: &'b mut LineBuffer,
) -> Result<Option<&'b str>, MonitorError> {
    buf.clear();
    tty.write_all(prompt.as_bytes())?;
    loop {
        let mut c = [0u8];
        if tty.read(&mut c)? == 0 {
            return Ok(None);
        }
        match c[0] {
            END_OF_TRANSMISSION => return Ok(None),
            BACKSPACE | DELETE => {
                if buf.pop().is_some() {
                    tty.write_all(b"\x08 \x08")?;
                }
            }
            b'\n' | b'\r' => {
                tty.write_all(b"\n")?;
                // Only printable ASCII is ever pushed.
                return core::str::from_utf8(buf)
                    .map(Some)
                    .map_err(|_| MonitorError::IOError);
            }
            ch @ b' '..=b'~' if buf.len() < CMDBUF_SIZE - 1 => {
                buf.push(ch);
                tty.write_all(&c)?;
            }
            _ => (),
        }
    }
}

/// A serial teletype interface for x86_64 systems.
///
/// This struct provides a basic implementation of a serial TTY using the
/// **COM1** serial port. It implements the [`Teletype`] trait to allow
/// read and write operations over a serial interface.
#[cfg(target_arch = "x86_64")]
pub struct Serial {
    _p: (),
}

#[cfg(target_arch = "x86_64")]
impl Serial {
    /// Creates a new **COM1** serial interface instance.
    ///
    /// The port must have been initialized with
    /// [`abyss::dev::x86_64::serial::init`].
    pub const fn new() -> Self {
        Self { _p: () }
    }
}

#[cfg(target_arch = "x86_64")]
impl Default for Serial {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(target_arch = "x86_64")]
impl Teletype for Serial {
    fn write(&mut self, data: &[u8]) -> Result<usize, MonitorError> {
        for &b in data {
            abyss::dev::x86_64::serial::write_byte(b);
        }
        Ok(data.len())
    }

    /// Reads a single byte, waiting for it.
    fn read(&mut self, data: &mut [u8]) -> Result<usize, MonitorError> {
        match data.first_mut() {
            Some(slot) => {
                *slot = abyss::dev::x86_64::serial::read_byte_busywait();
                Ok(1)
            }
            None => Ok(0),
        }
    }
}

/// A teletype fed from a fixed script, recording everything written to it.
///
/// Runs monitor sessions without a serial line, e.g. in tests.
pub struct Script {
    input: VecDeque<u8>,
    output: Vec<u8>,
}

impl Script {
    /// Creates a teletype whose input is `input`, then end of input.
    pub fn new(input: &[u8]) -> Self {
        Self {
            input: input.iter().copied().collect(),
            output: Vec::new(),
        }
    }

    /// What has been written so far.
    pub fn output(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.output)
    }
}

impl Teletype for Script {
    fn write(&mut self, data: &[u8]) -> Result<usize, MonitorError> {
        self.output.extend_from_slice(data);
        Ok(data.len())
    }

    fn read(&mut self, data: &mut [u8]) -> Result<usize, MonitorError> {
        let mut n = 0;
        for slot in data.iter_mut() {
            match self.input.pop_front() {
                Some(b) => *slot = b,
                None => break,
            }
            n += 1;
        }
        Ok(n)
    }
}
