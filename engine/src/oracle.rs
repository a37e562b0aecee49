//! Talking to the enumeration oracle.
//!
//! The oracle is an external program that takes one argument, a decimal
//! modulus, prints progress to stdout and finishes with a summary line of
//! the form
//!
//! ```text
//! solution = <result> mod <modulus>
//! ```
//!
//! Only whitespace-separated token positions matter: token 2 is the result,
//! token 4 the modulus the oracle actually used.
//!
//! Process handling is behind [`OracleTransport`] so the client can be driven
//! by [`CannedTransport`] without spawning anything.

use std::ffi::OsString;
use std::io::{self, Cursor, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, Stdio};

use crate::crt::ResultSample;
use crate::error::{Error, Result};

/// Token index of the result in the summary line.
pub const RESULT_TOKEN: usize = 2;
/// Token index of the echoed modulus in the summary line.
pub const MODULUS_TOKEN: usize = 4;

/// Anything that can answer "what is the count modulo `modulus`".
pub trait Oracle {
    /// Runs one query.
    ///
    /// # Errors
    ///
    /// Any error means the oracle protocol was broken and the run must stop.
    fn query(&mut self, modulus: u64) -> Result<ResultSample>;
}

/// How an oracle session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExitState {
    /// Whether the process reported success.
    pub success: bool,
    /// Printable status, e.g. `exit status: 1`.
    pub description: String,
}

impl ExitState {
    /// A successful exit.
    #[must_use]
    pub fn success() -> Self {
        Self {
            success: true,
            description: "exit status: 0".to_owned(),
        }
    }

    /// A failed exit with the given exit code.
    #[must_use]
    pub fn failure(code: i32) -> Self {
        Self {
            success: false,
            description: format!("exit status: {code}"),
        }
    }
}

/// One running oracle invocation.
pub trait OracleSession {
    /// The invocation's standard output.
    fn output(&mut self) -> &mut dyn Read;

    /// Waits for the invocation to finish.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Spawn`] if the exit status cannot be collected.
    fn wait(self) -> Result<ExitState>;
}

/// Starts oracle invocations.
pub trait OracleTransport {
    /// Session type produced by [`launch`](OracleTransport::launch).
    type Session: OracleSession;

    /// Starts the oracle for one modulus.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Spawn`] if the oracle cannot be started.
    fn launch(&mut self, modulus: u64) -> Result<Self::Session>;
}

/// Runs the oracle as a child process.
#[derive(Debug, Clone)]
pub struct ProcessTransport {
    program: PathBuf,
    args: Vec<OsString>,
}

impl ProcessTransport {
    /// Runs `program <modulus>`.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Adds fixed arguments placed before the modulus.
    #[must_use]
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// The program being run.
    #[must_use]
    pub fn program(&self) -> &Path {
        &self.program
    }

    fn spawn_error(&self, source: io::Error) -> Error {
        Error::Spawn {
            program: self.program.display().to_string(),
            source,
        }
    }
}

impl OracleTransport for ProcessTransport {
    type Session = ProcessSession;

    fn launch(&mut self, modulus: u64) -> Result<ProcessSession> {
        log::debug!("launching {} {modulus}", self.program.display());
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .arg(modulus.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| self.spawn_error(e))?;
        let Some(stdout) = child.stdout.take() else {
            // Reap the child before reporting, it has nowhere to write to.
            let _ = child.kill();
            let _ = child.wait();
            return Err(self.spawn_error(io::Error::new(
                ErrorKind::BrokenPipe,
                "stdout was not captured",
            )));
        };
        Ok(ProcessSession {
            program: self.program.display().to_string(),
            child,
            stdout,
        })
    }
}

/// A running oracle child process.
#[derive(Debug)]
pub struct ProcessSession {
    program: String,
    child: Child,
    stdout: ChildStdout,
}

impl OracleSession for ProcessSession {
    fn output(&mut self) -> &mut dyn Read {
        &mut self.stdout
    }

    fn wait(mut self) -> Result<ExitState> {
        drop(self.stdout);
        let status = self.child.wait().map_err(|source| Error::Spawn {
            program: self.program,
            source,
        })?;
        log::debug!("oracle exited with {status}");
        Ok(ExitState {
            success: status.success(),
            description: status.to_string(),
        })
    }
}

/// Scripted output of one canned invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CannedRun {
    /// Everything the invocation prints.
    pub output: String,
    /// How it exits.
    pub exit: ExitState,
}

impl CannedRun {
    /// Prints `output` and exits successfully.
    pub fn ok(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            exit: ExitState::success(),
        }
    }

    /// Prints `output` and exits with `code`.
    pub fn failing(output: impl Into<String>, code: i32) -> Self {
        Self {
            output: output.into(),
            exit: ExitState::failure(code),
        }
    }
}

/// In-memory transport replaying scripted runs.
pub struct CannedTransport<F> {
    script: F,
    launches: Vec<u64>,
}

impl<F> CannedTransport<F>
where
    F: FnMut(u64) -> CannedRun,
{
    /// Answers each launch with `script(modulus)`.
    pub fn new(script: F) -> Self {
        Self {
            script,
            launches: Vec::new(),
        }
    }

    /// Moduli launched so far, in order.
    #[must_use]
    pub fn launches(&self) -> &[u64] {
        &self.launches
    }
}

impl<F> OracleTransport for CannedTransport<F>
where
    F: FnMut(u64) -> CannedRun,
{
    type Session = CannedSession;

    fn launch(&mut self, modulus: u64) -> Result<CannedSession> {
        self.launches.push(modulus);
        let run = (self.script)(modulus);
        Ok(CannedSession {
            output: Cursor::new(run.output.into_bytes()),
            exit: run.exit,
        })
    }
}

/// Session of a [`CannedTransport`].
#[derive(Debug)]
pub struct CannedSession {
    output: Cursor<Vec<u8>>,
    exit: ExitState,
}

impl OracleSession for CannedSession {
    fn output(&mut self) -> &mut dyn Read {
        &mut self.output
    }

    fn wait(self) -> Result<ExitState> {
        Ok(self.exit)
    }
}

/// Remembers the last non-blank line of a byte stream.
///
/// Lines end at `\n`. A trailing line without a terminator still counts once
/// the stream is finished. Only truly empty lines are skipped; a line of
/// spaces is kept and fails to parse later.
#[derive(Debug, Default)]
pub struct LastLine {
    buffer: Vec<u8>,
    last: Option<String>,
}

impl LastLine {
    /// Creates an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds more bytes.
    pub fn feed(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            if byte == b'\n' {
                self.end_line();
            } else {
                self.buffer.push(byte);
            }
        }
    }

    /// Ends the stream and returns the last non-blank line, if any.
    #[must_use]
    pub fn finish(mut self) -> Option<String> {
        self.end_line();
        self.last
    }

    fn end_line(&mut self) {
        let line = String::from_utf8_lossy(&self.buffer);
        if !line.is_empty() {
            self.last = Some(line.into_owned());
        }
        self.buffer.clear();
    }
}

/// Copies `output` to `echo` as it arrives and returns the last non-blank
/// line.
///
/// # Errors
///
/// Returns the first I/O error from either side.
pub fn drain(output: &mut dyn Read, echo: &mut dyn Write) -> io::Result<Option<String>> {
    let mut tracker = LastLine::new();
    let mut chunk = [0u8; 1024];
    loop {
        let n = match output.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        echo.write_all(&chunk[..n])?;
        echo.flush()?;
        tracker.feed(&chunk[..n]);
    }
    Ok(tracker.finish())
}

/// Extracts `(result, modulus)` from the oracle's summary line.
///
/// # Errors
///
/// Returns [`Error::MalformedOutput`] if token 2 or 4 is missing or is not a
/// non-negative integer.
pub fn parse_summary(line: &str) -> Result<(u64, u64)> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let token = |index: usize| -> Result<u64> {
        let raw = tokens.get(index).ok_or_else(|| Error::MalformedOutput {
            line: line.to_owned(),
            reason: format!("expected at least {} tokens, found {}", index + 1, tokens.len()),
        })?;
        raw.parse().map_err(|_| Error::MalformedOutput {
            line: line.to_owned(),
            reason: format!("token {index} `{raw}` is not an integer"),
        })
    };
    Ok((token(RESULT_TOKEN)?, token(MODULUS_TOKEN)?))
}

/// Runs the oracle through a transport, echoing its output.
pub struct OracleClient<T, W> {
    transport: T,
    echo: W,
}

impl<T, W> OracleClient<T, W>
where
    T: OracleTransport,
    W: Write,
{
    /// Creates a client writing oracle output to `echo`.
    pub fn new(transport: T, echo: W) -> Self {
        Self { transport, echo }
    }

    /// The underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Consumes the client, returning the transport and echo sink.
    pub fn into_parts(self) -> (T, W) {
        (self.transport, self.echo)
    }

    /// Runs the oracle once for `modulus`.
    ///
    /// The full output is drained and the process reaped before anything is
    /// parsed, so the summary line always comes from a finished process.
    ///
    /// # Errors
    ///
    /// - [`Error::Spawn`] if the oracle cannot be started or read from;
    /// - [`Error::OracleProcess`] if it exits unsuccessfully;
    /// - [`Error::OracleSilent`] if it printed no non-blank line;
    /// - [`Error::MalformedOutput`] if the last line does not parse or the
    ///   result is not below the modulus;
    /// - [`Error::ModulusMismatch`] if it used a different modulus.
    pub fn invoke(&mut self, modulus: u64) -> Result<ResultSample> {
        let mut session = self.transport.launch(modulus)?;
        let drained = drain(session.output(), &mut self.echo);
        let exit = session.wait()?;
        let last_line = drained.map_err(|source| Error::Spawn {
            program: format!("oracle for modulus {modulus}"),
            source,
        })?;

        if !exit.success {
            log::warn!("oracle for modulus {modulus} failed: {}", exit.description);
            return Err(Error::OracleProcess {
                modulus,
                status: exit.description,
            });
        }
        let line = last_line.ok_or(Error::OracleSilent(modulus))?;
        log::debug!("oracle summary line: {line:?}");

        let (result, used) = parse_summary(&line)?;
        if used != modulus {
            log::warn!("oracle answered for modulus {used}, asked for {modulus}");
            return Err(Error::ModulusMismatch {
                requested: modulus,
                used,
            });
        }
        ResultSample::new(result, used)
    }
}

impl<T, W> Oracle for OracleClient<T, W>
where
    T: OracleTransport,
    W: Write,
{
    fn query(&mut self, modulus: u64) -> Result<ResultSample> {
        self.invoke(modulus)
    }
}
