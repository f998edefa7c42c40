//! Application services: the render pipeline and the collaborators it needs.

pub mod error;
pub mod render;
pub mod repos;
