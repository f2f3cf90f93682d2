pub mod app_header;
pub mod log_panel;
pub mod share_panel;
pub mod status;
