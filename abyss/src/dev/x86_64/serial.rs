//! Serial device driver for the first UART (COM1).
use crate::x86_64::pio::Pio;

const COM1: u16 = 0x3f8;

/// Line status: received data ready.
const LSR_DATA_READY: u8 = 0x01;
/// Line status: transmit holding register empty.
const LSR_TX_EMPTY: u8 = 0x20;

/// Initialize a serial.
///
/// 9600 baud, 8 data bits, no parity, one stop bit, FIFO off.
pub unsafe fn init() {
    Pio::new(COM1 + 2).write_u8(0);
    Pio::new(COM1 + 3).write_u8(0x80);
    Pio::new(COM1).write_u8((115200 / 9600) as u8);
    Pio::new(COM1 + 1).write_u8(0);
    Pio::new(COM1 + 3).write_u8(0x3 & !0x80);
    Pio::new(COM1 + 4).write_u8(0);
    Pio::new(COM1 + 1).write_u8(1);
    Pio::new(COM1 + 2).read_u8();
    Pio::new(COM1).read_u8();
}

/// Writes `s` to COM1, byte by byte.
///
/// Suitable as a [`crate::kprint::Sink`].
pub fn write_str(s: &str) {
    for b in s.as_bytes() {
        write_byte(*b);
    }
}

/// Writes a single byte to COM1, waiting a bounded time for the transmitter.
pub fn write_byte(b: u8) {
    for _ in 0..12800 {
        if Pio::new(COM1 + 5).read_u8() & LSR_TX_EMPTY != 0 {
            break;
        }
        // delay
        Pio::new(0x84).read_u8();
        Pio::new(0x84).read_u8();
        Pio::new(0x84).read_u8();
        Pio::new(0x84).read_u8();
    }
    Pio::new(COM1).write_u8(b);
}

/// Busy-waits for one byte from COM1.
pub fn read_byte_busywait() -> u8 {
    while Pio::new(COM1 + 5).read_u8() & LSR_DATA_READY == 0 {
        core::hint::spin_loop();
    }
    Pio::new(COM1).read_u8()
}
