//! Vastra AI stylist: collects quiz answers, a body-type description and a
//! photo, and turns them into personalized style suggestions.

pub mod composer;
pub mod config;
pub mod error;
pub mod gemini;
pub mod models;
pub mod photo;
pub mod routes;
pub mod wizard;
