//! Problem parameters and the oracle build step.
//!
//! The oracle is compiled per problem: grid size, counter width, thread
//! count and enumeration mode are all baked in by `make`. The reconstruction
//! itself only ever sees the resulting binary and the width.

use std::fmt;
use std::path::Path;
use std::process::Command;
use std::str::FromStr;

use serde::Serialize;

use crate::error::{Error, Result};
use crate::schedule::WordWidth;

/// Smallest supported grid size.
pub const MIN_N: u32 = 4;
/// Largest supported grid size.
pub const MAX_N: u32 = 30;

/// What the oracle counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EnumerationMode {
    /// Corner-to-corner self-avoiding paths.
    #[default]
    Paths,
    /// Self-avoiding cycles.
    Cycles,
    /// Hamiltonian cycles.
    Hamiltonian,
}

impl EnumerationMode {
    /// Whether the oracle is built in cycle mode. Hamiltonian implies it.
    #[must_use]
    pub const fn cycles(self) -> bool {
        matches!(self, EnumerationMode::Cycles | EnumerationMode::Hamiltonian)
    }

    /// Whether only Hamiltonian cycles are counted.
    #[must_use]
    pub const fn hamiltonian(self) -> bool {
        matches!(self, EnumerationMode::Hamiltonian)
    }

    /// Lenient parse: `cycles` and `hamiltonian` select those modes, any
    /// other word counts paths.
    #[must_use]
    pub fn from_arg(arg: Option<&str>) -> Self {
        arg.and_then(|a| a.parse().ok()).unwrap_or_default()
    }
}

impl FromStr for EnumerationMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "paths" => Ok(EnumerationMode::Paths),
            "cycles" => Ok(EnumerationMode::Cycles),
            "hamiltonian" => Ok(EnumerationMode::Hamiltonian),
            other => Err(Error::InvalidProblem(format!(
                "unknown mode `{other}` (expected paths, cycles or hamiltonian)"
            ))),
        }
    }
}

impl fmt::Display for EnumerationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EnumerationMode::Paths => "paths",
            EnumerationMode::Cycles => "cycles",
            EnumerationMode::Hamiltonian => "hamiltonian",
        })
    }
}

/// A validated counting problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Problem {
    n: u32,
    width: WordWidth,
    threads: u32,
    mode: EnumerationMode,
}

impl Problem {
    /// Validates the parameters.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidProblem`] if `n` is outside `[4, 30]` or
    /// `threads` is zero.
    pub fn new(n: u32, width: WordWidth, threads: u32, mode: EnumerationMode) -> Result<Self> {
        if !(MIN_N..=MAX_N).contains(&n) {
            return Err(Error::InvalidProblem(format!(
                "n is out of range [{MIN_N}, {MAX_N}]"
            )));
        }
        if threads == 0 {
            return Err(Error::InvalidProblem("threads must be at least 1".to_owned()));
        }
        Ok(Self {
            n,
            width,
            threads,
            mode,
        })
    }

    /// Grid size.
    #[must_use]
    pub const fn n(&self) -> u32 {
        self.n
    }

    /// Counter width.
    #[must_use]
    pub const fn width(&self) -> WordWidth {
        self.width
    }

    /// Oracle worker threads.
    #[must_use]
    pub const fn threads(&self) -> u32 {
        self.threads
    }

    /// Enumeration mode.
    #[must_use]
    pub const fn mode(&self) -> EnumerationMode {
        self.mode
    }

    /// `make` variables selecting this problem.
    #[must_use]
    pub fn make_variables(&self) -> Vec<String> {
        vec![
            format!("N={}", self.n),
            format!("BITS={}", self.width.bits()),
            format!("CYCLES={}", u8::from(self.mode.cycles())),
            format!("HAMILTONIAN={}", u8::from(self.mode.hamiltonian())),
            format!("N_THREADS={}", self.threads),
        ]
    }
}

/// Builds the oracle for `problem` by running `make` in `source_dir`.
///
/// # Errors
///
/// Returns [`Error::Build`] if `make` cannot be started or fails.
pub fn build_oracle(problem: &Problem, source_dir: &Path) -> Result<()> {
    let vars = problem.make_variables();
    log::info!("building oracle in {}: make {}", source_dir.display(), vars.join(" "));

    let output = Command::new("make")
        .args(&vars)
        .current_dir(source_dir)
        .output()
        .map_err(|e| Error::Build(format!("cannot run make: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        log::warn!("make failed with {}:\n{stderr}", output.status);
        return Err(Error::Build(format!("make exited with {}", output.status)));
    }
    log::debug!("make output:\n{}", String::from_utf8_lossy(&output.stdout));
    Ok(())
}
