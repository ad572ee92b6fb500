//! Character sink for board diagnostics.
//!
//! Terminals on the debug UART expect CR LF line endings, so every `\n`
//! written through [`CrlfWriter`] goes out as `\r\n`.

/// A byte-oriented output device, typically UART0.
pub trait SerialPort {
    fn write_byte(&mut self, byte: u8);
}

impl<P: SerialPort + ?Sized> SerialPort for &mut P {
    fn write_byte(&mut self, byte: u8) {
        (**self).write_byte(byte);
    }
}

/// Line-ending translating writer over a [`SerialPort`].
#[derive(Debug, Default)]
pub struct CrlfWriter<P> {
    port: P,
}

impl<P: SerialPort> CrlfWriter<P> {
    pub const fn new(port: P) -> Self {
        Self { port }
    }

    /// Emit one character and return it.
    pub fn putchar(&mut self, c: u8) -> u8 {
        if c == b'\n' {
            self.port.write_byte(b'\r');
        }
        self.port.write_byte(c);
        c
    }

    /// Emit every byte of `bytes`; returns the number of input bytes.
    pub fn write_bytes(&mut self, bytes: &[u8]) -> usize {
        for &b in bytes {
            self.putchar(b);
        }
        bytes.len()
    }

    pub fn port(&self) -> &P {
        &self.port
    }

    pub fn into_inner(self) -> P {
        self.port
    }
}

impl<P: SerialPort> core::fmt::Write for CrlfWriter<P> {
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        self.write_bytes(s.as_bytes());
        Ok(())
    }
}

#[cfg(feature = "std")]
pub use logger::SerialLogger;

#[cfg(feature = "std")]
mod logger {
    use core::fmt::Write;
    use std::boxed::Box;
    use std::sync::Mutex;

    use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};

    use super::{CrlfWriter, SerialPort};

    /// `log` backend that prints `[LEVEL target] message` lines to a port.
    pub struct SerialLogger<P> {
        writer: Mutex<CrlfWriter<P>>,
        level: LevelFilter,
    }

    impl<P: SerialPort + Send + 'static> SerialLogger<P> {
        pub fn new(port: P, level: LevelFilter) -> Self {
            Self {
                writer: Mutex::new(CrlfWriter::new(port)),
                level,
            }
        }

        /// Install as the global logger.
        pub fn install(self) -> Result<(), SetLoggerError> {
            let level = self.level;
            log::set_boxed_logger(Box::new(self))?;
            log::set_max_level(level);
            Ok(())
        }

        pub fn into_port(self) -> P {
            match self.writer.into_inner() {
                Ok(writer) => writer.into_inner(),
                Err(poisoned) => poisoned.into_inner().into_inner(),
            }
        }
    }

    impl<P: SerialPort + Send> Log for SerialLogger<P> {
        fn enabled(&self, metadata: &Metadata<'_>) -> bool {
            metadata.level() <= self.level
        }

        fn log(&self, record: &Record<'_>) {
            if !self.enabled(record.metadata()) {
                return;
            }
            if let Ok(mut writer) = self.writer.lock() {
                let _ = writeln!(writer, "[{} {}] {}", record.level(), record.target(), record.args());
            }
        }

        fn flush(&self) {}
    }
}
