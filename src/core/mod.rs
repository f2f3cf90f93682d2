pub mod coords;
pub mod frame;
pub mod platform;
pub mod screen_capture;
pub mod target_parser;
pub mod worker;

#[cfg(windows)]
pub mod input;
#[cfg(windows)]
pub mod window;
