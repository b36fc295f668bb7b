//! Core donor types for donor-intake.
//!
//! This module defines the record that flows between every screen of the
//! kiosk: who the donor is, what conditions they reported, and how often they
//! have donated. Values are validated when they are built, so the rest of the
//! crate can pass them around without re-checking.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Identifier value that means "no existing donor yet".
pub const NEW_DONOR_SENTINEL: &str = "new";

/// Identifier of a donor.
///
/// Either assigned by the backend or issued by the session as a temporary
/// value for a donor that is about to be created. There is no way to change
/// the identifier of an existing [`DonorRecord`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DonorId(String);

impl DonorId {
    /// Parse an identifier, trimming surrounding whitespace.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the identifier is empty or contains a
    /// path separator or whitespace.
    pub fn parse(raw: &str) -> Result<Self> {
        let id = raw.trim();
        if id.is_empty() {
            return Err(Error::validation("donor id", "Donor identifier is empty."));
        }
        if id.contains('/') || id.chars().any(char::is_whitespace) {
            return Err(Error::validation(
                "donor id",
                format!("'{id}' is not a valid donor identifier."),
            ));
        }
        Ok(Self(id.to_string()))
    }

    /// The "new donor" sentinel.
    #[must_use]
    pub fn new_donor() -> Self {
        Self(NEW_DONOR_SENTINEL.to_string())
    }

    /// Build an identifier from a prefix and a timestamp.
    pub(crate) fn temporary(prefix: &str, millis: i64) -> Self {
        Self(format!("{prefix}{millis}"))
    }

    /// Whether this identifier is the "new donor" sentinel.
    #[must_use]
    pub fn is_new_sentinel(&self) -> bool {
        self.0 == NEW_DONOR_SENTINEL
    }

    /// The identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DonorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for DonorId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<DonorId> for String {
    fn from(id: DonorId) -> Self {
        id.0
    }
}

/// ABO/Rh blood group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BloodType {
    /// A, Rh positive.
    #[serde(rename = "A+")]
    APositive,
    /// A, Rh negative.
    #[serde(rename = "A-")]
    ANegative,
    /// B, Rh positive.
    #[serde(rename = "B+")]
    BPositive,
    /// B, Rh negative.
    #[serde(rename = "B-")]
    BNegative,
    /// AB, Rh positive.
    #[serde(rename = "AB+")]
    AbPositive,
    /// AB, Rh negative.
    #[serde(rename = "AB-")]
    AbNegative,
    /// O, Rh positive.
    #[serde(rename = "O+")]
    OPositive,
    /// O, Rh negative.
    #[serde(rename = "O-")]
    ONegative,
}

impl BloodType {
    /// Every blood type, in the order the form lists them.
    pub const ALL: [Self; 8] = [
        Self::APositive,
        Self::ANegative,
        Self::BPositive,
        Self::BNegative,
        Self::AbPositive,
        Self::AbNegative,
        Self::OPositive,
        Self::ONegative,
    ];

    /// The conventional label, e.g. `AB-`.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::APositive => "A+",
            Self::ANegative => "A-",
            Self::BPositive => "B+",
            Self::BNegative => "B-",
            Self::AbPositive => "AB+",
            Self::AbNegative => "AB-",
            Self::OPositive => "O+",
            Self::ONegative => "O-",
        }
    }
}

impl fmt::Display for BloodType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for BloodType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_ascii_uppercase();
        Self::ALL
            .into_iter()
            .find(|bt| bt.label() == wanted)
            .ok_or_else(|| {
                Error::validation(
                    "blood type",
                    format!("'{}' is not a blood type (A+, A-, B+, B-, AB+, AB-, O+, O-).", s.trim()),
                )
            })
    }
}

/// A condition the donor may report on the intake form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    /// Hepatitis.
    #[serde(alias = "Viêm gan")]
    Hepatitis,
    /// Tuberculosis.
    #[serde(alias = "Lao")]
    Tuberculosis,
    /// Cancer.
    #[serde(alias = "Ung thư")]
    Cancer,
}

impl Condition {
    /// The fixed vocabulary offered on the form.
    pub const ALL: [Self; 3] = [Self::Hepatitis, Self::Tuberculosis, Self::Cancer];

    /// The Vietnamese label records created by the web form carry.
    #[must_use]
    pub const fn local_label(self) -> &'static str {
        match self {
            Self::Hepatitis => "Viêm gan",
            Self::Tuberculosis => "Lao",
            Self::Cancer => "Ung thư",
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hepatitis => write!(f, "hepatitis"),
            Self::Tuberculosis => write!(f, "tuberculosis"),
            Self::Cancer => write!(f, "cancer"),
        }
    }
}

impl FromStr for Condition {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|c| c.to_string() == wanted || c.local_label().to_lowercase() == wanted)
            .ok_or_else(|| {
                Error::validation(
                    "conditions",
                    format!("'{}' is not a listed condition.", s.trim()),
                )
            })
    }
}

/// The set of conditions a donor reported.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConditionSet(BTreeSet<Condition>);

impl ConditionSet {
    /// Create an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the condition if absent, remove it if present.
    ///
    /// Returns `true` if the condition is selected afterwards.
    pub fn toggle(&mut self, condition: Condition) -> bool {
        if self.0.remove(&condition) {
            false
        } else {
            self.0.insert(condition);
            true
        }
    }

    /// Check whether a condition is selected.
    #[must_use]
    pub fn contains(&self, condition: Condition) -> bool {
        self.0.contains(&condition)
    }

    /// Iterate the selected conditions in vocabulary order.
    pub fn iter(&self) -> impl Iterator<Item = Condition> + '_ {
        self.0.iter().copied()
    }

    /// Number of selected conditions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether nothing is selected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<Condition> for ConditionSet {
    fn from_iter<I: IntoIterator<Item = Condition>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl fmt::Display for ConditionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("none");
        }
        let names: Vec<String> = self.iter().map(|c| c.to_string()).collect();
        f.write_str(&names.join(", "))
    }
}

/// An encoded signature image (a `data:` URL).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Signature(String);

impl Signature {
    /// Wrap an already-encoded image.
    #[must_use]
    pub fn from_data_url(data_url: String) -> Self {
        Self(data_url)
    }

    /// The encoded image.
    #[must_use]
    pub fn as_data_url(&self) -> &str {
        &self.0
    }
}

/// The identifying details of a donor, as typed on the form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DonorIdentity {
    /// Full name.
    pub full_name: String,
    /// Postal address.
    pub address: String,
    /// Phone number.
    pub phone: String,
    /// Email address.
    pub email: String,
    /// Blood group.
    pub blood_type: BloodType,
}

/// Everything the kiosk knows about one donor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DonorRecord {
    id: DonorId,

    /// Identifying details.
    #[serde(flatten)]
    pub identity: DonorIdentity,

    /// Reported conditions.
    #[serde(default)]
    pub conditions: ConditionSet,

    /// Number of donations recorded so far.
    #[serde(default)]
    pub donation_count: u32,

    /// Date of the most recent donation, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_donation_date: Option<NaiveDate>,

    /// Signature captured at the last donation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<Signature>,
}

impl DonorRecord {
    /// Create a record for a donor with no donation history.
    #[must_use]
    pub fn new(id: DonorId, identity: DonorIdentity) -> Self {
        Self {
            id,
            identity,
            conditions: ConditionSet::new(),
            donation_count: 0,
            last_donation_date: None,
            signature: None,
        }
    }

    /// The donor's identifier.
    #[must_use]
    pub fn id(&self) -> &DonorId {
        &self.id
    }

    /// Produce the record as it stands after one more successful donation.
    ///
    /// The count goes up by exactly one, the last donation date becomes
    /// `date`, and the signature is replaced.
    #[must_use]
    pub fn with_donation(&self, date: NaiveDate, signature: Option<Signature>) -> Self {
        Self {
            donation_count: self.donation_count.saturating_add(1),
            last_donation_date: Some(date),
            signature,
            ..self.clone()
        }
    }
}

/// One donation event, as sent to the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DonationSubmission {
    /// Day of the donation.
    pub date: NaiveDate,
    /// Where the donation took place.
    pub location: String,
    /// Volume in milliliters.
    #[serde(rename = "amount")]
    pub amount_ml: u32,
}

impl DonationSubmission {
    /// Build a submission from the raw form values.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the location is blank or the amount is
    /// missing, not a whole number, or zero.
    pub fn from_form(date: NaiveDate, location: &str, amount: &str) -> Result<Self> {
        let location = location.trim();
        let amount = amount.trim();
        if location.is_empty() || amount.is_empty() {
            return Err(Error::validation(
                "donation",
                "Please enter the donation location and the amount of blood donated.",
            ));
        }
        let amount_ml = amount.parse::<u32>().ok().filter(|ml| *ml > 0).ok_or_else(|| {
            Error::validation(
                "amount",
                format!("'{amount}' is not a valid amount in milliliters."),
            )
        })?;
        Ok(Self {
            date,
            location: location.to_string(),
            amount_ml,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn identity() -> DonorIdentity {
        DonorIdentity {
            full_name: "Nguyen Van An".to_string(),
            address: "12 Tran Phu, Hue".to_string(),
            phone: "0905123456".to_string(),
            email: "an@example.com".to_string(),
            blood_type: BloodType::OPositive,
        }
    }

    #[test]
    fn test_donor_id_parse() {
        assert_eq!(DonorId::parse(" 12345 ").unwrap().as_str(), "12345");
        assert!(DonorId::parse("").is_err());
        assert!(DonorId::parse("   ").is_err());
        assert!(DonorId::parse("a/b").is_err());
        assert!(DonorId::parse("a b").is_err());
    }

    #[test]
    fn test_donor_id_sentinel() {
        assert!(DonorId::parse("new").unwrap().is_new_sentinel());
        assert!(!DonorId::parse("12345").unwrap().is_new_sentinel());
        assert!(DonorId::new_donor().is_new_sentinel());
    }

    #[test]
    fn test_donor_id_rejected_during_deserialize() {
        let result: std::result::Result<DonorId, _> = serde_json::from_str(r#""""#);
        assert!(result.is_err());
    }

    #[test]
    fn test_blood_type_parse_and_display() {
        for bt in BloodType::ALL {
            assert_eq!(bt.label().parse::<BloodType>().unwrap(), bt);
            assert_eq!(bt.to_string(), bt.label());
        }
        assert_eq!("ab-".parse::<BloodType>().unwrap(), BloodType::AbNegative);
        assert!("C+".parse::<BloodType>().is_err());
        assert!("".parse::<BloodType>().is_err());
    }

    #[test]
    fn test_blood_type_serialization() {
        let json = serde_json::to_string(&BloodType::AbPositive).unwrap();
        assert_eq!(json, r#""AB+""#);
        let parsed: BloodType = serde_json::from_str(r#""O-""#).unwrap();
        assert_eq!(parsed, BloodType::ONegative);
    }

    #[test]
    fn test_condition_toggle_adds_and_removes() {
        let mut set = ConditionSet::new();
        assert!(set.toggle(Condition::Cancer));
        assert!(set.contains(Condition::Cancer));
        assert!(!set.toggle(Condition::Cancer));
        assert!(!set.contains(Condition::Cancer));
    }

    #[test]
    fn test_condition_toggle_twice_restores_original() {
        let original: ConditionSet = [Condition::Hepatitis].into_iter().collect();
        for condition in Condition::ALL {
            let mut set = original.clone();
            set.toggle(condition);
            set.toggle(condition);
            assert_eq!(set, original);
        }
    }

    #[test]
    fn test_condition_set_never_duplicates() {
        let set: ConditionSet = [Condition::Cancer, Condition::Cancer].into_iter().collect();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_condition_set_display() {
        assert_eq!(ConditionSet::new().to_string(), "none");
        let set: ConditionSet = [Condition::Tuberculosis, Condition::Hepatitis]
            .into_iter()
            .collect();
        assert_eq!(set.to_string(), "hepatitis, tuberculosis");
    }

    #[test]
    fn test_condition_parse() {
        assert_eq!("Cancer".parse::<Condition>().unwrap(), Condition::Cancer);
        assert!("flu".parse::<Condition>().is_err());
    }

    #[test]
    fn test_condition_accepts_local_labels() {
        assert_eq!("Viêm gan".parse::<Condition>().unwrap(), Condition::Hepatitis);
        assert_eq!("lao".parse::<Condition>().unwrap(), Condition::Tuberculosis);

        let parsed: Vec<Condition> =
            serde_json::from_str(r#"["Ung thư", "hepatitis", "Lao"]"#).unwrap();
        assert_eq!(
            parsed,
            vec![Condition::Cancer, Condition::Hepatitis, Condition::Tuberculosis]
        );
        // Always written back in the canonical form.
        assert_eq!(
            serde_json::to_string(&Condition::Cancer).unwrap(),
            r#""cancer""#
        );
    }

    #[test]
    fn test_with_donation_increments_by_one() {
        let mut record = DonorRecord::new(DonorId::parse("42").unwrap(), identity());
        record.donation_count = 3;

        let signature = Signature::from_data_url("data:image/svg+xml,x".to_string());
        let updated = record.with_donation(day(2026, 10, 18), Some(signature.clone()));

        assert_eq!(updated.donation_count, 4);
        assert_eq!(updated.last_donation_date, Some(day(2026, 10, 18)));
        assert_eq!(updated.signature, Some(signature));
        assert_eq!(updated.id(), record.id());
        assert_eq!(updated.identity, record.identity);
    }

    #[test]
    fn test_record_serializes_camel_case() {
        let record = DonorRecord::new(DonorId::parse("42").unwrap(), identity());
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["id"], "42");
        assert_eq!(json["fullName"], "Nguyen Van An");
        assert_eq!(json["bloodType"], "O+");
        assert_eq!(json["donationCount"], 0);
        assert!(json.get("lastDonationDate").is_none());
    }

    #[test]
    fn test_donation_from_form() {
        let donation = DonationSubmission::from_form(day(2026, 1, 2), " Hue ", "350").unwrap();
        assert_eq!(donation.location, "Hue");
        assert_eq!(donation.amount_ml, 350);

        let json = serde_json::to_value(&donation).unwrap();
        assert_eq!(json["date"], "2026-01-02");
        assert_eq!(json["amount"], 350);
    }

    #[test]
    fn test_donation_from_form_rejects_missing_values() {
        let today = day(2026, 1, 2);
        assert!(DonationSubmission::from_form(today, "", "350")
            .unwrap_err()
            .is_validation());
        assert!(DonationSubmission::from_form(today, "Hue", "")
            .unwrap_err()
            .is_validation());
        assert!(DonationSubmission::from_form(today, "Hue", "0").is_err());
        assert!(DonationSubmission::from_form(today, "Hue", "-5").is_err());
        assert!(DonationSubmission::from_form(today, "Hue", "lots").is_err());
    }
}
