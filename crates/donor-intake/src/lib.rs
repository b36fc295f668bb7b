//! `donor-intake` - A kiosk client for blood-donation intake
//!
//! This library provides the pieces of the intake flow: QR acquisition of a
//! donor identifier, lookup of the donor record, the intake form with its
//! two-step submission, and the confirmation view, tied together by the
//! terminal [`Kiosk`].

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod api;
pub mod cli;
pub mod config;
pub mod confirmation;
pub mod donor;
pub mod error;
pub mod fetch;
pub mod form;
pub mod kiosk;
pub mod logging;
pub mod route;
pub mod scanner;
pub mod session;
pub mod signature;

pub use api::{DonorApi, HttpDonorApi};
pub use config::Config;
pub use confirmation::ConfirmationView;
pub use donor::{BloodType, Condition, DonorId, DonorRecord};
pub use error::{Error, Result};
pub use form::{Field, FormMode, IntakeForm};
pub use kiosk::Kiosk;
pub use logging::init_logging;
pub use route::Route;
pub use session::DonorSession;
