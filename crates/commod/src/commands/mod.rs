mod check;
mod config;
mod install;
mod mods;
mod plan;
mod probe;
mod validate;

pub use check::*;
pub use config::*;
pub use install::*;
pub use mods::*;
pub use plan::*;
pub use probe::*;
pub use validate::*;
