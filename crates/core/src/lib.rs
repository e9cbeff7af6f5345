//! Core types for invitey: configuration, the signup form model and the
//! profile verification heuristic. Nothing in this crate performs I/O beyond
//! reading the config file.

pub mod config;
pub mod domain;
pub mod errors;

pub use domain::profile::{ProfilePage, ProfileValidation};
pub use domain::signup::{FieldError, Signup, SignupField, SignupForm, ValidationErrors};
pub use errors::{ApplicationError, DomainError, InterfaceError};
