pub mod api;
pub mod config;
pub mod navigator;
pub mod reasoning;
pub mod scene;
pub mod spatial;
pub mod state;
pub mod stt;
pub mod tts;
pub mod vision;
