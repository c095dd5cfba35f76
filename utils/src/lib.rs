pub mod string;
pub mod surf_logging;
