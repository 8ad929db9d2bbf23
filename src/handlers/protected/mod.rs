// handlers/protected/mod.rs - Protected handlers (bearer token required)
//
// Profile routes accept any authenticated caller through the `Authenticated`
// extractor. Administrative routes call `state.auth.authenticate` with the
// permissions they need; all of them must be granted unless the caller is
// an admin.

pub mod permissions; // GET /api/permissions
pub mod profile; // GET/PUT /api/user/profile
pub mod roles; // /api/roles, /api/roles/:id
pub mod users; // GET/POST/PUT/DELETE /api/user
