//! Input and output plumbing shared by the `sift` command line tools.

pub mod printer;
pub mod reader;
