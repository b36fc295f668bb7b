//! Confirmation view.

use std::fmt;

use crate::donor::DonorRecord;
use crate::error::{Error, Result};
use crate::session::DonorSession;

/// Read-only rendering of a finalized donor record.
#[derive(Debug, Clone, Copy)]
pub struct ConfirmationView<'a> {
    record: &'a DonorRecord,
}

impl<'a> ConfirmationView<'a> {
    /// View the session's current record.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingRecord`] if the session holds no record; the
    /// caller should send the user back to the start.
    pub fn from_session(session: &'a DonorSession) -> Result<Self> {
        session
            .current()
            .map(|record| Self { record })
            .ok_or(Error::MissingRecord)
    }

    /// The record being shown.
    #[must_use]
    pub fn record(&self) -> &DonorRecord {
        self.record
    }
}

impl fmt::Display for ConfirmationView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let record = self.record;
        let identity = &record.identity;
        writeln!(f, "Donor details")?;
        writeln!(f, "-------------")?;
        writeln!(f, "Donor ID:         {}", record.id())?;
        writeln!(f, "Full name:        {}", identity.full_name)?;
        writeln!(f, "Address:          {}", identity.address)?;
        writeln!(f, "Phone:            {}", identity.phone)?;
        writeln!(f, "Email:            {}", identity.email)?;
        writeln!(f, "Blood type:       {}", identity.blood_type)?;
        writeln!(f, "Conditions:       {}", record.conditions)?;
        writeln!(f, "Donations:        {}", record.donation_count)?;
        match record.last_donation_date {
            Some(date) => writeln!(f, "Last donation:    {}", date.format("%d/%m/%Y"))?,
            None => writeln!(f, "Last donation:    never")?,
        }
        let signature = if record.signature.is_some() {
            "captured"
        } else {
            "not provided"
        };
        writeln!(f, "Signature:        {signature}")
    }
}
