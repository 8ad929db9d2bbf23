// handlers/public/mod.rs - Public handlers (no authentication required)
//
// Token acquisition and the public video feed.

pub mod auth;
pub mod videos;
