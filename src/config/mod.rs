pub mod app;
pub mod sources;

pub use app::AppConfig;
