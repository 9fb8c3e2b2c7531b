// Library exports for LocalLens
// The binary and integration tests both drive the client through these modules

pub mod api;
pub mod comments;
pub mod compose;
pub mod config;
pub mod error;
pub mod feed;
pub mod geolocation;
pub mod interaction;
pub mod models;
pub mod render;
pub mod session;
pub mod state;
