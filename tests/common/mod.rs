mod setup_monitor;

pub use setup_monitor::*;
