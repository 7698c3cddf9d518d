//! `log` backend writing to a platform console.
//!
//! Records are formatted as `[LEVEL] target: message` lines. The console is
//! installed once; later calls to [`init`] fail.

use alloc::boxed::Box;
use core::fmt::{self, Write};
use kaya_hal::Console;
use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};
use spin::{Mutex, Once};

/// Logger over a boxed console.
pub struct ConsoleLogger {
    console: Mutex<Box<dyn Console + Send>>,
}

static LOGGER: Once<ConsoleLogger> = Once::new();

struct Sink<'a>(&'a mut dyn Console);

impl Write for Sink<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.0.write_str(s);
        Ok(())
    }
}

/// Format one record as a console line.
pub fn write_record(out: &mut impl Write, record: &Record) -> fmt::Result {
    writeln!(
        out,
        "[{:<5}] {}: {}",
        record.level(),
        record.target(),
        record.args()
    )
}

impl Log for ConsoleLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let mut console = self.console.lock();
        let _ = write_record(&mut Sink(console.as_mut()), record);
    }

    fn flush(&self) {}
}

/// Install `console` as the global log sink.
pub fn init<C>(console: C, level: LevelFilter) -> Result<(), SetLoggerError>
where
    C: Console + Send + 'static,
{
    let logger = LOGGER.call_once(|| ConsoleLogger {
        console: Mutex::new(Box::new(console)),
    });
    log::set_logger(logger)?;
    log::set_max_level(level);
    Ok(())
}
