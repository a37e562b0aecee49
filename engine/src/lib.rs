//! Exact combinatorial counts from a modular oracle.
//!
//! The grid path counts this crate targets are far too large for any machine
//! word, but an external enumeration oracle can compute them modulo a prime.
//! The engine queries the oracle under a fixed schedule of distinct primes,
//! rebuilds the count with the Chinese remainder theorem after every answer
//! and stops once two consecutive reconstructions agree.
//!
//! # Entry Point
//!
//! ```no_run
//! use gridcount_engine::{schedule_for, OracleClient, ProcessTransport, ReconstructionLoop};
//!
//! let schedule = schedule_for(64).expect("64-bit schedule");
//! let mut oracle = OracleClient::new(ProcessTransport::new("./path-counter"), std::io::stdout());
//! let outcome = ReconstructionLoop::from_schedule(schedule)
//!     .run(&mut oracle, |step| println!("step {}: {}", step.index, step.value))
//!     .expect("oracle failed");
//! match outcome.value() {
//!     Some(value) => println!("final result: {value}"),
//!     None => println!("failed to find a solution"),
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Role |
//! |--------|------|
//! | [`schedule`] | Prime schedules per counter width |
//! | [`arith`] | Extended Euclidean inverse |
//! | [`crt`] | Samples and CRT reconstruction |
//! | [`oracle`] | Oracle protocol and transports |
//! | [`driver`] | The convergence loop |
//! | [`problem`] | Problem parameters and oracle build |
//! | [`report`] | JSON run report |

#![deny(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    missing_docs,
    clippy::missing_errors_doc
)]

pub mod arith;
pub mod crt;
pub mod driver;
pub mod error;
pub mod oracle;
pub mod problem;
pub mod report;
pub mod schedule;

pub use crt::{reconstruct, AccumulatedSet, ResultSample};
pub use driver::{Accumulator, ReconstructionLoop, RunOutcome, Step};
pub use error::{Error, Result};
pub use oracle::{
    CannedRun, CannedTransport, ExitState, Oracle, OracleClient, OracleSession, OracleTransport,
    ProcessTransport,
};
pub use problem::{build_oracle, EnumerationMode, Problem};
pub use report::RunReport;
pub use schedule::{schedule_for, Schedule, WordWidth};
