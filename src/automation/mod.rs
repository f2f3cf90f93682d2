pub mod context;
pub mod correlation;
pub mod detection;
pub mod interaction;
pub mod pipeline;
pub mod templates;
