//! Application services: the post store, uploads and the editor workflows.

pub mod assets;
pub mod auth;
pub mod deferred;
pub mod editor;
pub mod error;
pub mod post_store;
pub mod repos;
