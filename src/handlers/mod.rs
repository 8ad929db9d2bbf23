// handlers/mod.rs - Two-tier handler layout
//
// Public (no auth) → Protected (bearer token, optionally with permissions).
// Protected handlers authenticate through `state.auth`; nothing is injected
// into the request by an outer layer.

pub mod protected; // /api/user/*, /api/roles/*, /api/permissions
pub mod public; // /api/auth/*, /api/videos, /api/fallback-videos
pub mod utils;
