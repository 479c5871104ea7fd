//! The state writer loop: once per cadence, overwrite the target file with the
//! current counter, echo it, and increment, until shutdown is requested.
use crate::signals::Shutdown;
use nix::sys::signal::Signal;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::time::Duration;

/// How a run ended when no resource error occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOutcome {
    /// The termination signal that ended the loop.
    pub signal: Signal,
    /// Number of fully completed cycles (equal to the final counter value).
    pub cycles: u64,
}

/// Errors that stop the loop. Every one of them is fatal.
#[derive(Debug)]
pub enum WriterError {
    /// Failed to create or truncate the state file.
    Open {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Failed to write the counter through to the state file.
    Flush {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Failed to echo the counter to the output stream.
    Echo { source: std::io::Error },
}

impl std::fmt::Display for WriterError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WriterError::Open { path, source } => {
                write!(f, "failed to open state file {}: {}", path.display(), source)
            }
            WriterError::Flush { path, source } => {
                write!(
                    f,
                    "failed to flush state file {}: {}",
                    path.display(),
                    source
                )
            }
            WriterError::Echo { source } => {
                write!(f, "failed to write counter to output: {}", source)
            }
        }
    }
}

impl std::error::Error for WriterError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            WriterError::Open { source, .. } => Some(source),
            WriterError::Flush { source, .. } => Some(source),
            WriterError::Echo { source } => Some(source),
        }
    }
}

/// Owns the counter and drives the persist/wait cycle.
///
/// `out` receives the same `n\n` line that lands in the state file; the
/// binary hands it stdout.
pub struct StateWriter<W> {
    path: PathBuf,
    cadence: Duration,
    out: W,
    counter: u64,
}

impl<W: Write> StateWriter<W> {
    pub fn new(path: impl Into<PathBuf>, cadence: Duration, out: W) -> Self {
        Self {
            path: path.into(),
            cadence,
            out,
            counter: 0,
        }
    }

    /// The value the next cycle will persist.
    pub fn counter(&self) -> u64 {
        self.counter
    }

    /// Run one cycle: truncate the file, echo, write, flush, close, increment.
    ///
    /// The counter only advances when every step succeeded.
    pub fn persist_cycle(&mut self) -> Result<(), WriterError> {
        let file = File::create(&self.path).map_err(|e| WriterError::Open {
            path: self.path.clone(),
            source: e,
        })?;

        // The file is already truncated here; an echo failure leaves it empty.
        writeln!(self.out, "{}", self.counter).map_err(|e| WriterError::Echo { source: e })?;
        self.out
            .flush()
            .map_err(|e| WriterError::Echo { source: e })?;

        // Buffered writes only reach the OS on flush, so that is where
        // every write error surfaces.
        let mut file = BufWriter::new(file);
        writeln!(file, "{}", self.counter).map_err(|e| WriterError::Flush {
            path: self.path.clone(),
            source: e,
        })?;
        let file = file.into_inner().map_err(|e| WriterError::Flush {
            path: self.path.clone(),
            source: e.into_error(),
        })?;
        // Close errors are not reported: the flushed bytes are already with
        // the OS and there is no further write to retry.
        drop(file);

        tracing::debug!(counter = self.counter, path = %self.path.display(), "state persisted");
        self.counter += 1;
        Ok(())
    }

    /// Persist once per cadence until `shutdown` records a signal.
    ///
    /// Shutdown is checked before each cycle and raced against the cadence
    /// timer, so a signal never waits out a full idle period. A cycle that
    /// has started always completes.
    pub async fn run(&mut self, shutdown: &mut Shutdown) -> Result<RunOutcome, WriterError> {
        tracing::info!(
            path = %self.path.display(),
            interval_ms = self.cadence.as_millis() as u64,
            "state writer started"
        );

        loop {
            if let Some(signal) = shutdown.requested() {
                return Ok(self.finish(signal));
            }

            self.persist_cycle()?;

            tokio::select! {
                _ = tokio::time::sleep(self.cadence) => {}
                signal = shutdown.wait() => return Ok(self.finish(signal)),
            }
        }
    }

    fn finish(&self, signal: Signal) -> RunOutcome {
        tracing::info!(
            signal = signal.as_str(),
            cycles = self.counter,
            "state writer stopped"
        );
        RunOutcome {
            signal,
            cycles: self.counter,
        }
    }
}
