pub mod comment;
pub mod edge;
pub mod poll;
pub mod post;
pub mod profile;
