//! Logger setup for applications built on the crate.
//!
//! The library itself only uses the `log` facade. [`init`] installs an
//! `env_logger` that writes `<time> - <target> - <LEVEL> - <message>` lines
//! to stdout and, optionally, appends them to a log file. `RUST_LOG`
//! overrides the default `debug` filter.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

use env_logger::{Builder, Env, Target};

/// Install the global logger. Calling it again is a no-op.
pub fn init(log_file: Option<&Path>) -> io::Result<()> {
    let file = log_file
        .map(|path| OpenOptions::new().create(true).append(true).open(path))
        .transpose()?;

    let result = Builder::from_env(Env::default().default_filter_or("debug"))
        .format(|buf, record| {
            writeln!(
                buf,
                "{} - {} - {} - {}",
                buf.timestamp_millis(),
                record.target(),
                record.level(),
                record.args()
            )
        })
        .target(Target::Pipe(Box::new(Tee { file })))
        .try_init();

    match result {
        Ok(()) => {
            match log_file {
                Some(path) => log::info!("Logging initialized. Log file: {}", path.display()),
                None => log::info!("Logging initialized"),
            }
            Ok(())
        }
        Err(_) => Ok(()),
    }
}

/// Writes to stdout and to the log file, if any.
struct Tee {
    file: Option<File>,
}

impl Write for Tee {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::stdout().write_all(buf)?;
        if let Some(file) = self.file.as_mut() {
            file.write_all(buf)?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stdout().flush()?;
        if let Some(file) = self.file.as_mut() {
            file.flush()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tee_copies_into_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reader.log");
        let mut tee = Tee {
            file: Some(File::create(&path).unwrap()),
        };
        tee.write_all(b"line one\n").unwrap();
        tee.flush().unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "line one\n");
    }

    #[test]
    fn init_twice_is_harmless() {
        init(None).unwrap();
        init(None).unwrap();
    }
}
