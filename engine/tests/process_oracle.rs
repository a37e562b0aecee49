//! Drives the real subprocess transport through `sh`.
//!
//! The scripts stand in for the compiled oracle: `$1` is the modulus the
//! client appends after the fixed `-c <script> oracle` arguments.

#![cfg(unix)]

use gridcount_engine::{Error, OracleClient, ProcessTransport, ReconstructionLoop, RunOutcome};
use num_bigint::BigUint;

fn sh(script: &str) -> ProcessTransport {
    ProcessTransport::new("sh").with_args(["-c", script, "oracle"])
}

/// Prints progress like the real oracle, then `truth mod $1`.
const TRUTH_52: &str = r#"
echo "N        = 5"
echo "mod      = $1"
printf 'counting = 1/5 (1) \rcounting = 1/5 (2) \r'
echo
echo "solution = $((52 % $1)) mod $1"
echo
"#;

#[test]
fn echoes_and_parses_a_real_process() {
    let mut client = OracleClient::new(sh(TRUTH_52), Vec::new());
    let sample = client.invoke(7).ok();
    assert_eq!(sample.map(|s| (s.remainder, s.modulus)), Some((3, 7)));

    let (_, echo) = client.into_parts();
    let echo = String::from_utf8_lossy(&echo);
    assert!(echo.starts_with("N        = 5\nmod      = 7\n"));
    assert!(echo.contains("counting = 1/5 (2) \r"));
    assert!(echo.ends_with("solution = 3 mod 7\n\n"));
}

#[test]
fn loop_over_real_processes_matches_the_scripted_trace() {
    let mut client = OracleClient::new(sh(TRUTH_52), Vec::new());
    let mut values = Vec::new();
    let outcome = ReconstructionLoop::new([7, 5, 3])
        .run(&mut client, |step| values.push(step.value.clone()));

    assert_eq!(
        outcome.ok(),
        Some(RunOutcome::Exhausted {
            last: Some(BigUint::from(52u8)),
            queries: 3
        })
    );
    assert_eq!(
        values,
        vec![BigUint::from(3u8), BigUint::from(17u8), BigUint::from(52u8)]
    );
}

#[test]
fn converges_with_a_roomier_schedule() {
    let mut client = OracleClient::new(sh(TRUTH_52), Vec::new());
    let outcome = ReconstructionLoop::new([11, 7, 5, 3]).run(&mut client, |_| {});
    assert_eq!(outcome.ok().and_then(|o| o.value().cloned()), Some(BigUint::from(52u8)));
}

#[test]
fn failing_exit_status_aborts() {
    let mut client = OracleClient::new(sh("echo \"solution = 1 mod $1\"; exit 3"), Vec::new());
    assert!(matches!(
        client.invoke(7),
        Err(Error::OracleProcess { modulus: 7, .. })
    ));
}

#[test]
fn silent_process_is_reported() {
    let mut client = OracleClient::new(sh("exit 0"), Vec::new());
    assert!(matches!(client.invoke(7), Err(Error::OracleSilent(7))));
}

#[test]
fn process_reporting_another_modulus_is_rejected() {
    let mut client = OracleClient::new(sh("echo \"solution = 1 mod 13\""), Vec::new());
    assert!(matches!(
        client.invoke(7),
        Err(Error::ModulusMismatch { requested: 7, used: 13 })
    ));
}

#[test]
fn missing_program_is_a_spawn_error() {
    let mut client = OracleClient::new(
        ProcessTransport::new("/nonexistent/path-counter"),
        Vec::new(),
    );
    assert!(matches!(client.invoke(7), Err(Error::Spawn { .. })));
}
