//! Donor record fetch.
//!
//! Opening the form for a scanned or typed identifier asks the backend for
//! the donor first. Any failure falls back to an empty form in New mode with
//! a message, so the donor can always carry on by hand.

use tracing::{info, instrument, warn};

use crate::api::DonorApi;
use crate::donor::DonorId;
use crate::form::IntakeForm;
use crate::session::DonorSession;

/// Shown when the lookup fails for any reason other than "not found".
pub const FETCH_FAILED_MESSAGE: &str =
    "Could not load your donor record. Please fill in your details by hand.";

/// Open the intake form for `id`.
///
/// The "new" sentinel skips the lookup. A found donor replaces the session
/// record and pre-fills the form; otherwise the session is cleared and the
/// form starts empty in New mode with a message set.
#[instrument(skip(api, session), fields(donor_id = %id))]
pub async fn open_form(api: &dyn DonorApi, session: &mut DonorSession, id: &DonorId) -> IntakeForm {
    if id.is_new_sentinel() {
        session.reset();
        return IntakeForm::new_donor();
    }

    match api.fetch_donor(id).await {
        Ok(record) => {
            info!(donations = record.donation_count, "Donor record loaded");
            let form = IntakeForm::existing(&record);
            session.replace(record);
            form
        }
        Err(err) => {
            warn!(%err, "Donor lookup failed, continuing as new donor");
            session.reset();
            let mut form = IntakeForm::new_donor();
            if err.is_not_found() {
                form.set_error(err.user_message());
            } else {
                form.set_error(FETCH_FAILED_MESSAGE);
            }
            form
        }
    }
}
