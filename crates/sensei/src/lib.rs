pub mod asset;
pub mod caption;
pub mod catalog;
pub mod config;
pub mod decrypt;
pub mod downloader;
pub mod error;
pub mod fetch;
pub mod keystore;
pub mod manifest;
pub mod media;
pub mod mux;
pub mod orchestrator;
pub mod pipeline;
pub mod process;
pub mod quality;
pub mod util;

pub use config::RunConfig;
pub use error::*;
pub use keystore::KeyStore;
pub use sensei_pssh::KeyId;
pub use util::http::HttpClient;

///  catalog JSON ──► ParsedLecture ──► ManifestResolver ──► MediaAsset
///                                                              │ select_rendition
///                                                              ▼
///        ┌──────────────── Progressive ◄──┬──► Segmented (HLS) ──► ffmpeg remux
///        │                                │
///        ▼                                ▼
///   <lecture>.mp4 ◄── ffmpeg mux ◄── decrypt ◄── KeyStore ◄── KID ◄── Dash tracks
pub use pipeline::Pipeline;
