pub mod outcome;
pub mod testcase;

pub use outcome::*;
pub use testcase::*;
