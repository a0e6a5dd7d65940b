pub mod authors;
pub mod cli;
pub mod import;
pub mod logging;
pub mod recalculate;
pub mod report;
