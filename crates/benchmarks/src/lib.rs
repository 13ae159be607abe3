//! Benchmark crate. The benches live under `benches/`; run them with
//! `cargo bench --package benchmarks`.
