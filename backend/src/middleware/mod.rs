//! Request middleware

pub mod auth;

pub use auth::{auth_middleware, authenticate, Actor, CurrentActor};
