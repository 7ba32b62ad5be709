pub mod core;
pub mod models;
pub mod platforms;
pub mod storage;

pub use mediafetch_core::core::events::ProgressSnapshot;
pub use mediafetch_core::models::settings::AppSettings;
