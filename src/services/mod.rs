//! Domain services used by the websocket route.
//!
//! ARCHITECTURE
//! ============
//! Service modules own identity, access, and room-registry logic so the
//! route handler can stay focused on protocol translation and session
//! plumbing. Upstream HTTP collaborators sit behind traits (`projects`,
//! `directory`) so everything above them tests against stubs.

pub mod access;
pub mod directory;
pub mod identity;
pub mod projects;
pub mod room;
pub mod session;
