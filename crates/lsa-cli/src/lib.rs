//! Library side of the `lsa` command line tool.

pub mod logging;
pub mod output;
pub mod pipeline;
