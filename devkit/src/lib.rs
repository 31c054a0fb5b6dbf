/*!
# Nexus DevKit - fixtures for kernel tests

- `LogFixture`: a prover log in a temporary directory that tests can grow,
  truncate, replace or delete
- `LogScript`: builder for well-formed (and deliberately malformed) log lines
- `init_test_logging`: tracing output routed through the test harness
*/

pub mod line_builder;
pub mod test_utils;

pub use line_builder::{line_at, LogScript};
pub use test_utils::{init_test_logging, LogFixture};
