//! Kiosk screens and their paths.

use std::fmt;
use std::str::FromStr;

use crate::donor::DonorId;
use crate::error::{Error, Result};

/// A screen of the kiosk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// `/`: scan or choose manual entry.
    Home,
    /// `/donor/{id}`: the intake form. `/donor/new` opens it in New mode.
    Donor(DonorId),
    /// `/confirmation`: the finalized record.
    Confirmation,
}

impl Route {
    /// The form for a donor who is not registered yet.
    #[must_use]
    pub fn new_donor() -> Self {
        Self::Donor(DonorId::new_donor())
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Home => f.write_str("/"),
            Self::Donor(id) => write!(f, "/donor/{id}"),
            Self::Confirmation => f.write_str("/confirmation"),
        }
    }
}

impl FromStr for Route {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let segments: Vec<&str> = s.trim().split('/').filter(|seg| !seg.is_empty()).collect();
        match segments.as_slice() {
            [] => Ok(Self::Home),
            ["confirmation"] => Ok(Self::Confirmation),
            ["donor", id] => Ok(Self::Donor(DonorId::parse(id)?)),
            _ => Err(Error::validation("route", format!("Unknown route '{}'.", s.trim()))),
        }
    }
}
