pub mod ast;
pub mod values;

pub use ast::*;
pub use values::*;
