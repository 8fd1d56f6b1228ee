//! Command implementations for the CLI.

mod info;
mod pull;
mod reset;
mod scan;
mod session;
mod stream;

pub use info::cmd_info;
pub use pull::cmd_pull;
pub use reset::cmd_reset;
pub use scan::cmd_scan;
pub use session::{cmd_session_start, cmd_session_stop};
pub use stream::cmd_stream;
