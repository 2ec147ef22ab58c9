//! Input readers - parse source code into the syntax tree.

pub mod python;

pub use python::read_python;
