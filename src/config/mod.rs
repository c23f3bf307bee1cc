pub mod app;

pub use app::{
    AppConfig, ClassifySettings, FeedSpec, FilterSettings, HistorySettings, LlmSettings,
    OutputSettings, PublishSettings,
};
