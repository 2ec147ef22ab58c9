//! Output writers - emit the syntax tree as Berry source.

pub mod buffer;
pub mod expr;
pub mod stmt;

pub use buffer::OutputBuffer;
pub use expr::ExprWriter;
pub use stmt::{EmitOptions, emit};
