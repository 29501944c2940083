//! javelin-lib: module-descriptor resolution and JVM toolchain forking
//!
//! This crate provides the two subsystems behind the `javelin` tool:
//! - [`descriptor`], [`module`] and [`reader`]: parse hierarchical module
//!   descriptors and flatten their (possibly cyclic) inheritance graph into
//!   deterministic aggregate views — entry points, servlet mappings, source
//!   and public paths.
//! - [`command`]: assemble and fork one JVM toolchain invocation, with
//!   classpath post-processing, merged environment, line-oriented output
//!   sinks, and an optional wall-clock timeout that reaps rather than
//!   fails.

pub mod command;
pub mod descriptor;
pub mod module;
pub mod reader;
pub mod util;
