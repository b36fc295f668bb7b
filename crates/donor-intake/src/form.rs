//! The intake form controller.
//!
//! The form owns a working copy of the donor's details plus the donation
//! being recorded, and runs the two-step submission:
//!
//! 1. in [`FormMode::New`], register the donor and adopt the identifier the
//!    server assigns;
//! 2. record the donation against that identifier.
//!
//! Validation happens before either step, so an incomplete form never
//! reaches the network. Every failure leaves the form interactive with a
//! message in [`IntakeForm::error`].

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use chrono::{NaiveDate, Utc};
use regex::Regex;
use tracing::{debug, info, instrument, warn};

use crate::api::{CreateDonorRequest, DonorApi};
use crate::donor::{
    BloodType, Condition, ConditionSet, DonationSubmission, DonorId, DonorIdentity, DonorRecord,
};
use crate::error::{Error, Result};
use crate::session::DonorSession;
use crate::signature::SignaturePad;

/// Whether the form is registering a donor or updating a known one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormMode {
    /// No identifier is known yet; submission registers the donor first.
    New,
    /// The donor exists on the server under this identifier.
    Existing(DonorId),
}

/// A named, editable field of the form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    /// Full name.
    FullName,
    /// Postal address.
    Address,
    /// Phone number.
    Phone,
    /// Email address.
    Email,
    /// Blood group.
    BloodType,
    /// Donation location.
    Location,
    /// Donated volume in milliliters.
    Amount,
}

impl Field {
    /// Every field, in the order the form asks for them.
    pub const ALL: [Self; 7] = [
        Self::FullName,
        Self::Address,
        Self::Phone,
        Self::Email,
        Self::BloodType,
        Self::Location,
        Self::Amount,
    ];

    /// Label shown next to the field.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::FullName => "Full name",
            Self::Address => "Address",
            Self::Phone => "Phone",
            Self::Email => "Email",
            Self::BloodType => "Blood type",
            Self::Location => "Donation location",
            Self::Amount => "Amount donated (ml)",
        }
    }

    fn key(self) -> &'static str {
        match self {
            Self::FullName => "full name",
            Self::Address => "address",
            Self::Phone => "phone",
            Self::Email => "email",
            Self::BloodType => "blood type",
            Self::Location => "location",
            Self::Amount => "amount",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Field {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let normalized: String = s
            .trim()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_lowercase())
            .collect();
        match normalized.as_str() {
            "fullname" | "name" => Ok(Self::FullName),
            "address" => Ok(Self::Address),
            "phone" => Ok(Self::Phone),
            "email" => Ok(Self::Email),
            "bloodtype" | "blood" => Ok(Self::BloodType),
            "location" => Ok(Self::Location),
            "amount" | "volume" => Ok(Self::Amount),
            _ => Err(Error::validation("field", format!("Unknown field '{}'.", s.trim()))),
        }
    }
}

/// The intake form for one donor.
#[derive(Debug)]
pub struct IntakeForm {
    mode: FormMode,
    full_name: String,
    address: String,
    phone: String,
    email: String,
    blood_type: Option<BloodType>,
    conditions: ConditionSet,
    donation_count: u32,
    last_donation_date: Option<NaiveDate>,
    location: String,
    amount: String,
    signature: SignaturePad,
    error: Option<String>,
    submitting: bool,
}

impl Default for IntakeForm {
    fn default() -> Self {
        Self::new_donor()
    }
}

impl IntakeForm {
    /// An empty form for a donor the server does not know yet.
    #[must_use]
    pub fn new_donor() -> Self {
        Self {
            mode: FormMode::New,
            full_name: String::new(),
            address: String::new(),
            phone: String::new(),
            email: String::new(),
            blood_type: None,
            conditions: ConditionSet::new(),
            donation_count: 0,
            last_donation_date: None,
            location: String::new(),
            amount: String::new(),
            signature: SignaturePad::default(),
            error: None,
            submitting: false,
        }
    }

    /// A form pre-filled from an existing record.
    #[must_use]
    pub fn existing(record: &DonorRecord) -> Self {
        let identity = &record.identity;
        Self {
            mode: FormMode::Existing(record.id().clone()),
            full_name: identity.full_name.clone(),
            address: identity.address.clone(),
            phone: identity.phone.clone(),
            email: identity.email.clone(),
            blood_type: Some(identity.blood_type),
            conditions: record.conditions.clone(),
            donation_count: record.donation_count,
            last_donation_date: record.last_donation_date,
            ..Self::new_donor()
        }
    }

    /// Pre-fill the donation location.
    #[must_use]
    pub fn with_location(mut self, location: Option<&str>) -> Self {
        if let Some(location) = location {
            self.location = location.trim().to_string();
        }
        self
    }

    /// Current mode.
    #[must_use]
    pub fn mode(&self) -> &FormMode {
        &self.mode
    }

    /// Whether submission will register a new donor.
    #[must_use]
    pub fn is_new(&self) -> bool {
        self.mode == FormMode::New
    }

    /// The message to show above the form, if any.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Show a message above the form.
    pub fn set_error(&mut self, message: impl Into<String>) {
        self.error = Some(message.into());
    }

    /// Hide the current message.
    pub fn dismiss_error(&mut self) {
        self.error = None;
    }

    /// Whether a submission was started and has not finished.
    ///
    /// Only observable after a submission future was dropped part-way.
    #[must_use]
    pub fn is_submitting(&self) -> bool {
        self.submitting
    }

    /// Donations recorded before this visit.
    #[must_use]
    pub fn donation_count(&self) -> u32 {
        self.donation_count
    }

    /// Date of the most recent donation before this visit.
    #[must_use]
    pub fn last_donation_date(&self) -> Option<NaiveDate> {
        self.last_donation_date
    }

    /// The current text of a field.
    #[must_use]
    pub fn value(&self, field: Field) -> String {
        match field {
            Field::FullName => self.full_name.clone(),
            Field::Address => self.address.clone(),
            Field::Phone => self.phone.clone(),
            Field::Email => self.email.clone(),
            Field::BloodType => self
                .blood_type
                .map(|bt| bt.label().to_string())
                .unwrap_or_default(),
            Field::Location => self.location.clone(),
            Field::Amount => self.amount.clone(),
        }
    }

    /// Replace one field of the working copy.
    ///
    /// # Errors
    ///
    /// Returns a validation error if a blood type is not one of the eight
    /// groups. Other fields accept any text and are checked on submit.
    pub fn set_field(&mut self, field: Field, value: &str) -> Result<()> {
        let value = value.trim().to_string();
        match field {
            Field::FullName => self.full_name = value,
            Field::Address => self.address = value,
            Field::Phone => self.phone = value,
            Field::Email => self.email = value,
            Field::BloodType => {
                self.blood_type = if value.is_empty() {
                    None
                } else {
                    Some(value.parse()?)
                };
            }
            Field::Location => self.location = value,
            Field::Amount => self.amount = value,
        }
        Ok(())
    }

    /// Select or deselect a condition. Returns whether it is now selected.
    pub fn toggle_condition(&mut self, condition: Condition) -> bool {
        self.conditions.toggle(condition)
    }

    /// The selected conditions.
    #[must_use]
    pub fn conditions(&self) -> &ConditionSet {
        &self.conditions
    }

    /// The signature surface.
    pub fn signature_pad(&mut self) -> &mut SignaturePad {
        &mut self.signature
    }

    /// Whether anything has been signed.
    #[must_use]
    pub fn has_signature(&self) -> bool {
        !self.signature.is_empty()
    }

    /// Wipe the signature without touching any other field.
    pub fn clear_signature(&mut self) {
        self.signature.clear();
    }

    /// Submit the form.
    ///
    /// On success the session holds the finalized record, which is also
    /// returned; the caller moves on to the confirmation screen. On failure
    /// the message is kept in [`IntakeForm::error`] and the form is left as
    /// it was, apart from adopting a newly registered identifier.
    ///
    /// # Errors
    ///
    /// Returns the validation, backend, or transport error that stopped the
    /// submission, or [`Error::SubmissionInFlight`] if an earlier submission
    /// was abandoned before it finished.
    #[instrument(skip_all, fields(new_donor = self.is_new()))]
    pub async fn submit(
        &mut self,
        api: &dyn DonorApi,
        session: &mut DonorSession,
        today: NaiveDate,
    ) -> Result<DonorRecord> {
        self.error = None;
        // `&mut self` keeps calls from overlapping. The flag stays set only
        // when a submission future is dropped part-way, and then whether the
        // donor was registered is unknown.
        let result = if self.submitting {
            Err(Error::SubmissionInFlight)
        } else {
            self.submitting = true;
            let result = self.run_submission(api, session, today).await;
            self.submitting = false;
            result
        };
        if let Err(err) = &result {
            if err.is_validation() {
                debug!(%err, "Submission blocked by validation");
            } else {
                warn!(%err, "Submission failed");
            }
            self.error = Some(err.user_message());
        }
        result
    }

    async fn run_submission(
        &mut self,
        api: &dyn DonorApi,
        session: &mut DonorSession,
        today: NaiveDate,
    ) -> Result<DonorRecord> {
        let donation = DonationSubmission::from_form(today, &self.location, &self.amount)?;
        let identity = self.identity()?;
        let signature = self.signature.to_signature();

        let donor_id = match &self.mode {
            FormMode::Existing(id) => id.clone(),
            FormMode::New => {
                let request = CreateDonorRequest {
                    id: session.issue_temporary_id(Utc::now()),
                    identity: identity.clone(),
                };
                let created = api.create_donor(&request).await?;
                info!(
                    temporary_id = %request.id,
                    donor_id = %created.id(),
                    "Donor registered"
                );
                session.replace(created.clone());
                self.mode = FormMode::Existing(created.id().clone());
                created.id().clone()
            }
        };

        api.record_donation(&donor_id, &donation).await?;
        info!(donor_id = %donor_id, amount_ml = donation.amount_ml, "Donation recorded");

        let mut before = DonorRecord::new(donor_id, identity);
        before.conditions = self.conditions.clone();
        before.donation_count = self.donation_count;
        before.last_donation_date = self.last_donation_date;

        let finalized = before.with_donation(today, signature);
        self.donation_count = finalized.donation_count;
        self.last_donation_date = finalized.last_donation_date;
        session.replace(finalized.clone());
        Ok(finalized)
    }

    /// Check the identity fields and assemble them.
    fn identity(&self) -> Result<DonorIdentity> {
        for field in [Field::FullName, Field::Address, Field::Phone, Field::Email] {
            if self.value(field).is_empty() {
                return Err(Error::validation(
                    field.key(),
                    format!("Please enter your {}.", field.key()),
                ));
            }
        }
        if !email_pattern().is_match(&self.email) {
            return Err(Error::validation(
                Field::Email.key(),
                format!("'{}' is not a valid email address.", self.email),
            ));
        }
        if !phone_pattern().is_match(&self.phone) {
            return Err(Error::validation(
                Field::Phone.key(),
                format!("'{}' is not a valid phone number.", self.phone),
            ));
        }
        let blood_type = self.blood_type.ok_or_else(|| {
            Error::validation(Field::BloodType.key(), "Please choose your blood type.")
        })?;

        Ok(DonorIdentity {
            full_name: self.full_name.clone(),
            address: self.address.clone(),
            phone: self.phone.clone(),
            email: self.email.clone(),
            blood_type,
        })
    }
}

/// # Panics
///
/// Panics if the built-in pattern is invalid.
fn email_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("Invalid email pattern")
    })
}

/// # Panics
///
/// Panics if the built-in pattern is invalid.
fn phone_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^\+?[0-9][0-9 ().-]{5,19}$").expect("Invalid phone pattern")
    })
}
