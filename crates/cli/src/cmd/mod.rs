mod inspect;
mod modules;
mod run;

pub use inspect::cmd_inspect;
pub use modules::cmd_modules;
pub use run::{RunOptions, cmd_run};
