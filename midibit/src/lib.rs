pub mod clock;
pub mod config;
pub mod dispatch;
pub mod display;
pub mod event;
pub mod midi;
pub mod monitor;
pub mod sequence;
pub mod session;
pub mod store;

pub use config::Config;
pub use event::Event;
pub use monitor::Monitor;
