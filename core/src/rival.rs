pub mod cache;
pub mod toolchain;

pub use cache::RivalCache;
pub use toolchain::{RivalBuild, RivalCompiler};
