pub mod answer;
pub mod config;
pub mod driver;
pub mod executor;
pub mod orchestrator;
pub mod process;
pub mod rival;
pub mod score;
pub mod style;
pub mod template;
pub mod testing;

pub use crate::config::Config;

pub mod error {
    pub(crate) use anyhow::{bail, ensure, Context as _};
    pub use anyhow::{Error, Result};
}
