//! Error taxonomy for a reconstruction run.
//!
//! Every variant is fatal: the run stops at the first one. Running out of
//! moduli without convergence is not an error, see
//! [`RunOutcome::Exhausted`](crate::driver::RunOutcome::Exhausted).

use std::io;

use thiserror::Error;

/// Errors raised by the engine.
#[derive(Debug, Error)]
pub enum Error {
    /// No modulus schedule is registered for the requested word width.
    #[error("unsupported word width: {0} bits (expected one of 8, 16, 32, 64)")]
    UnsupportedWidth(u32),

    /// The oracle exited with a non-success status.
    #[error("oracle for modulus {modulus} exited with {status}")]
    OracleProcess {
        /// Modulus the failed invocation was asked for.
        modulus: u64,
        /// Human-readable exit status.
        status: String,
    },

    /// The oracle finished without printing a single non-empty line.
    #[error("oracle for modulus {0} produced no output")]
    OracleSilent(u64),

    /// The oracle's last line does not match `<_> <_> <result> <_> <modulus>`.
    #[error("malformed oracle output {line:?}: {reason}")]
    MalformedOutput {
        /// The offending line.
        line: String,
        /// What was wrong with it.
        reason: String,
    },

    /// The oracle reports a different modulus from the one it was given.
    #[error("mod mismatch {used} != {requested}")]
    ModulusMismatch {
        /// Modulus passed to the oracle.
        requested: u64,
        /// Modulus echoed back by the oracle.
        used: u64,
    },

    /// A modulus was sampled twice within one run.
    #[error("modulus {0} sampled twice")]
    DuplicateModulus(u64),

    /// Two moduli share a factor, so no inverse exists.
    #[error("{a} has no inverse modulo {m}")]
    NotCoprime {
        /// Value whose inverse was requested.
        a: String,
        /// Modulus.
        m: String,
    },

    /// The oracle could not be started or its output could not be read.
    #[error("failed to run oracle `{program}`: {source}")]
    Spawn {
        /// Program that was being run.
        program: String,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// Problem parameters outside the supported range.
    #[error("{0}")]
    InvalidProblem(String),

    /// Building the oracle binary failed.
    #[error("oracle build failed: {0}")]
    Build(String),

    /// The run report could not be encoded.
    #[error("failed to encode run report: {0}")]
    Report(#[from] serde_json::Error),
}

/// Result alias used throughout the engine.
pub type Result<T> = std::result::Result<T, Error>;
