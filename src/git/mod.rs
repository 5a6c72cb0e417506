//! Git CLI wrapper used by the branch sub-flow.

mod cli;

pub use cli::GitCli;
