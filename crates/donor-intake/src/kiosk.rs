//! The kiosk screen loop.
//!
//! [`Kiosk`] walks the donor through Home, the intake form, and the
//! confirmation screen over any line-oriented reader and writer. In
//! production that is buffered stdin and stdout, with the QR scanner typing
//! into the same terminal; tests drive it with scripted input.

use std::fmt::{self, Write as _};
use std::str::FromStr;

use chrono::{Local, NaiveDate};
use tokio::io::{AsyncBufRead, AsyncWrite, AsyncWriteExt};
use tracing::{debug, error, info, warn};

use crate::api::DonorApi;
use crate::confirmation::ConfirmationView;
use crate::donor::{Condition, DonorId};
use crate::error::{Error, Result};
use crate::fetch;
use crate::form::{Field, FormMode, IntakeForm};
use crate::route::Route;
use crate::scanner::{
    read_bounded_line, KeyboardWedgeSource, LineRead, ScanEvent, ScanFailure, Scanner,
};
use crate::session::DonorSession;

const HOME_BANNER: &str = "\
=== Blood donation intake ===
Scan your donor QR code, or type 'new' to register by hand.
Type 'quit' to close the kiosk.
";

const FORM_HELP: &str = "\
Commands:
  <field> = <value>   set a field (name, address, phone, email, blood, location, amount)
  toggle <condition>  select or clear hepatitis, tuberculosis or cancer
  sign <text>         sign the form
  clear-signature     wipe the signature
  show                show the form again
  submit              record the donation
  back                return to the start screen
";

const QUIT_WORD: &str = "quit";

const UNREADABLE_LINE: &str = "That line could not be read. Please type it again.";

/// Longest line accepted on the form and confirmation screens, in bytes.
const MAX_LINE_LEN: usize = 4_096;

/// Device errors in a row after which the start screen gives up.
const MAX_SCANNER_ERRORS: u32 = 3;

/// A line typed on the form or confirmation screen.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Input {
    Line(String),
    /// Not valid UTF-8, or longer than [`MAX_LINE_LEN`].
    Unreadable,
    Closed,
}

/// One line typed on the form screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormCommand {
    /// `<field> = <value>`
    Set(Field, String),
    /// `toggle <condition>`
    Toggle(Condition),
    /// `sign <text>`
    Sign(String),
    /// `clear-signature`
    ClearSignature,
    /// `show`
    Show,
    /// `submit`
    Submit,
    /// `back`
    Back,
    /// `help`
    Help,
}

impl FromStr for FormCommand {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let line = s.trim();
        if let Some((field, value)) = line.split_once('=') {
            return Ok(Self::Set(field.parse()?, value.trim().to_string()));
        }

        let (word, rest) = line
            .split_once(char::is_whitespace)
            .map_or((line, ""), |(word, rest)| (word, rest.trim()));
        match word.to_ascii_lowercase().as_str() {
            "toggle" => Ok(Self::Toggle(rest.parse()?)),
            "sign" if rest.is_empty() => Err(Error::validation(
                "signature",
                "Type your name after 'sign' to sign the form.",
            )),
            "sign" => Ok(Self::Sign(rest.to_string())),
            "clear-signature" | "unsign" => Ok(Self::ClearSignature),
            "show" => Ok(Self::Show),
            "submit" => Ok(Self::Submit),
            "back" | "cancel" => Ok(Self::Back),
            "help" | "?" => Ok(Self::Help),
            _ => Err(Error::validation(
                "command",
                format!("Unknown command '{line}'. Type 'help' for a list."),
            )),
        }
    }
}

/// The kiosk: one donor session driven through the screens.
pub struct Kiosk<'a, R, W> {
    api: &'a dyn DonorApi,
    scanner: Scanner,
    session: DonorSession,
    input: R,
    output: W,
    default_location: Option<String>,
    today: Option<NaiveDate>,
}

impl<R, W> fmt::Debug for Kiosk<'_, R, W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Kiosk")
            .field("scanner", &self.scanner)
            .field("session", &self.session)
            .field("default_location", &self.default_location)
            .finish_non_exhaustive()
    }
}

impl<'a, R, W> Kiosk<'a, R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    /// Create a kiosk talking to `api` over `input` and `output`.
    pub fn new(api: &'a dyn DonorApi, input: R, output: W) -> Self {
        Self {
            api,
            scanner: Scanner::default(),
            session: DonorSession::new(),
            input,
            output,
            default_location: None,
            today: None,
        }
    }

    /// Use these scanner settings.
    #[must_use]
    pub fn with_scanner(mut self, scanner: Scanner) -> Self {
        self.scanner = scanner;
        self
    }

    /// Pre-fill the donation location on every form.
    #[must_use]
    pub fn with_default_location(mut self, location: Option<String>) -> Self {
        self.default_location = location.filter(|l| !l.trim().is_empty());
        self
    }

    /// Record donations on a fixed date instead of the local date.
    #[must_use]
    pub fn with_date(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    /// The current donor session.
    #[must_use]
    pub fn session(&self) -> &DonorSession {
        &self.session
    }

    /// The writer the kiosk prints to.
    pub fn output(&self) -> &W {
        &self.output
    }

    /// Run from the start screen until the input ends or the kiosk is closed.
    ///
    /// # Errors
    ///
    /// Returns an error only for I/O failures on the terminal itself.
    pub async fn run(&mut self) -> Result<()> {
        self.run_from(Route::Home).await
    }

    /// Run starting at `route`.
    ///
    /// # Errors
    ///
    /// Returns an error only for I/O failures on the terminal itself.
    pub async fn run_from(&mut self, start: Route) -> Result<()> {
        let mut route = start;
        loop {
            info!(%route, "Showing screen");
            let next = match &route {
                Route::Home => self.home_screen().await?,
                Route::Donor(id) => self.form_screen(id).await?,
                Route::Confirmation => self.confirmation_screen().await?,
            };
            match next {
                Some(next) => route = next,
                None => {
                    info!("Kiosk closed");
                    return Ok(());
                }
            }
        }
    }

    fn today(&self) -> NaiveDate {
        self.today.unwrap_or_else(|| Local::now().date_naive())
    }

    async fn home_screen(&mut self) -> Result<Option<Route>> {
        self.session.reset();
        write_text(&mut self.output, HOME_BANNER).await?;

        let source = KeyboardWedgeSource::new(&mut self.input)
            .with_max_len(self.scanner.max_payload_len());
        let mut scan = self.scanner.open(source).await?;
        let mut device_errors = 0;
        loop {
            let failure = match scan.next_event().await {
                Ok(ScanEvent::Decoded(id)) if id.as_str().eq_ignore_ascii_case(QUIT_WORD) => {
                    return Ok(None);
                }
                Ok(ScanEvent::Decoded(id)) => return Ok(Some(Route::Donor(id))),
                Ok(ScanEvent::Failed(failure)) => {
                    device_errors = 0;
                    failure
                }
                Err(Error::ScannerClosed { .. }) => return Ok(None),
                Err(err) => {
                    device_errors += 1;
                    if device_errors >= MAX_SCANNER_ERRORS {
                        error!(%err, "Scanner keeps failing, closing the kiosk");
                        return Ok(None);
                    }
                    warn!(%err, "Scanner read failed");
                    ScanFailure::Other(err.to_string())
                }
            };
            write_line(&mut self.output, failure.user_message()).await?;
        }
    }

    async fn form_screen(&mut self, id: &DonorId) -> Result<Option<Route>> {
        let mut form = fetch::open_form(self.api, &mut self.session, id)
            .await
            .with_location(self.default_location.as_deref());
        write_text(&mut self.output, &render_form(&form)).await?;
        write_line(&mut self.output, "Type 'help' for commands.").await?;

        loop {
            let line = match read_line(&mut self.input).await? {
                Input::Line(line) => line,
                Input::Unreadable => {
                    write_line(&mut self.output, UNREADABLE_LINE).await?;
                    continue;
                }
                Input::Closed => return Ok(None),
            };
            if line.is_empty() {
                continue;
            }
            let command = match line.parse::<FormCommand>() {
                Ok(command) => command,
                Err(err) => {
                    write_line(&mut self.output, &err.user_message()).await?;
                    continue;
                }
            };
            debug!(?command, "Form command");

            match command {
                FormCommand::Set(field, value) => {
                    if let Err(err) = form.set_field(field, &value) {
                        write_line(&mut self.output, &err.user_message()).await?;
                    }
                }
                FormCommand::Toggle(condition) => {
                    let state = if form.toggle_condition(condition) {
                        "selected"
                    } else {
                        "cleared"
                    };
                    write_line(&mut self.output, &format!("{condition}: {state}")).await?;
                }
                FormCommand::Sign(text) => form.signature_pad().write_text(&text),
                FormCommand::ClearSignature => form.clear_signature(),
                FormCommand::Show => {
                    write_text(&mut self.output, &render_form(&form)).await?;
                }
                FormCommand::Help => write_text(&mut self.output, FORM_HELP).await?,
                FormCommand::Back => return Ok(Some(Route::Home)),
                FormCommand::Submit => {
                    let today = self.today();
                    match form.submit(self.api, &mut self.session, today).await {
                        Ok(_) => return Ok(Some(Route::Confirmation)),
                        Err(_) => {
                            let message = form.error().unwrap_or_default().to_string();
                            write_line(&mut self.output, &format!("! {message}")).await?;
                        }
                    }
                }
            }
        }
    }

    async fn confirmation_screen(&mut self) -> Result<Option<Route>> {
        let text = match ConfirmationView::from_session(&self.session) {
            Ok(view) => view.to_string(),
            Err(err) => {
                warn!(%err, "Nothing to confirm, returning home");
                write_line(&mut self.output, &err.user_message()).await?;
                return Ok(Some(Route::Home));
            }
        };
        write_text(&mut self.output, "\nThank you for donating!\n\n").await?;
        write_text(&mut self.output, &text).await?;
        write_line(&mut self.output, "Press Enter to finish.").await?;

        match read_line(&mut self.input).await? {
            Input::Line(_) | Input::Unreadable => Ok(Some(Route::Home)),
            Input::Closed => Ok(None),
        }
    }
}

fn render_form(form: &IntakeForm) -> String {
    let mut text = String::new();
    let _ = match form.mode() {
        FormMode::New => writeln!(text, "\n--- New donor ---"),
        FormMode::Existing(id) => writeln!(text, "\n--- Donor {id} ---"),
    };
    if let Some(message) = form.error() {
        let _ = writeln!(text, "! {message}");
    }
    for field in Field::ALL {
        let label = format!("{}:", field.label());
        let _ = writeln!(text, "  {label:<22}{}", form.value(field));
    }
    let _ = writeln!(text, "  {:<22}{}", "Conditions:", form.conditions());
    let _ = writeln!(text, "  {:<22}{}", "Previous donations:", form.donation_count());
    if let Some(date) = form.last_donation_date() {
        let _ = writeln!(text, "  {:<22}{}", "Last donation:", date.format("%d/%m/%Y"));
    }
    let signed = if form.has_signature() { "signed" } else { "not signed" };
    let _ = writeln!(text, "  {:<22}{signed}", "Signature:");
    text
}

async fn write_text<W: AsyncWrite + Unpin>(output: &mut W, text: &str) -> Result<()> {
    output.write_all(text.as_bytes()).await?;
    output.flush().await?;
    Ok(())
}

async fn write_line<W: AsyncWrite + Unpin>(output: &mut W, line: &str) -> Result<()> {
    write_text(output, &format!("{line}\n")).await
}

async fn read_line<R: AsyncBufRead + Unpin>(input: &mut R) -> Result<Input> {
    let mut buf = Vec::new();
    match read_bounded_line(input, &mut buf, MAX_LINE_LEN).await? {
        LineRead::Eof => return Ok(Input::Closed),
        LineRead::Truncated => {
            debug!(max = MAX_LINE_LEN, "Discarding overlong input line");
            return Ok(Input::Unreadable);
        }
        LineRead::Complete => {}
    }
    Ok(match String::from_utf8(buf) {
        Ok(line) => Input::Line(line.trim().to_string()),
        Err(_) => {
            debug!("Discarding input line that is not UTF-8");
            Input::Unreadable
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::fake::{ApiCall, FakeDonorApi};
    use crate::donor::{BloodType, DonorIdentity, DonorRecord};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 18).unwrap()
    }

    fn record() -> DonorRecord {
        let mut record = DonorRecord::new(
            DonorId::parse("12345").unwrap(),
            DonorIdentity {
                full_name: "Nguyen Thi Hoa".to_string(),
                address: "12 Le Loi, Hue".to_string(),
                phone: "0905123456".to_string(),
                email: "hoa@example.com".to_string(),
                blood_type: BloodType::APositive,
            },
        );
        record.donation_count = 5;
        record
    }

    async fn run_script(api: &FakeDonorApi, script: &str) -> (String, Option<DonorRecord>) {
        run_bytes(api, script.as_bytes()).await
    }

    async fn run_bytes(api: &FakeDonorApi, script: &[u8]) -> (String, Option<DonorRecord>) {
        crate::logging::init_test_logging();
        let mut kiosk = Kiosk::new(api, script, Vec::new()).with_date(today());
        kiosk.run().await.unwrap();
        let session = kiosk.session().current().cloned();
        let output = String::from_utf8(kiosk.output().clone()).unwrap();
        (output, session)
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(
            "name = Tran Van Binh".parse::<FormCommand>().unwrap(),
            FormCommand::Set(Field::FullName, "Tran Van Binh".to_string())
        );
        assert_eq!(
            "amount=350".parse::<FormCommand>().unwrap(),
            FormCommand::Set(Field::Amount, "350".to_string())
        );
        assert_eq!(
            "toggle Hepatitis".parse::<FormCommand>().unwrap(),
            FormCommand::Toggle(Condition::Hepatitis)
        );
        assert_eq!(
            "sign Binh".parse::<FormCommand>().unwrap(),
            FormCommand::Sign("Binh".to_string())
        );
        assert_eq!("SUBMIT".parse::<FormCommand>().unwrap(), FormCommand::Submit);
        assert_eq!("back".parse::<FormCommand>().unwrap(), FormCommand::Back);
    }

    #[test]
    fn test_parse_rejects_unknown() {
        assert!("dance".parse::<FormCommand>().is_err());
        assert!("sign".parse::<FormCommand>().is_err());
        assert!("toggle flu".parse::<FormCommand>().is_err());
        assert!("colour = red".parse::<FormCommand>().is_err());
    }

    #[tokio::test]
    async fn test_scanned_donor_submits_and_confirms() {
        let api = FakeDonorApi::new().with_record(record());
        let script = "\
http://kiosk.example/donor/12345
location = Hue Central Hospital
amount = 250
sign Hoa
submit

quit
";
        let (output, session) = run_script(&api, script).await;

        assert!(output.contains("--- Donor 12345 ---"));
        assert!(output.contains("Nguyen Thi Hoa"));
        assert!(output.contains("Thank you for donating!"));
        assert!(output.contains("Donations:        6"));
        assert!(output.contains("captured"));
        assert_eq!(api.calls().len(), 2);
        assert_eq!(api.record("12345").unwrap().donation_count, 6);
        // Home clears the session before the kiosk closes.
        assert!(session.is_none());
    }

    #[tokio::test]
    async fn test_manual_entry_registers_new_donor() {
        let api = FakeDonorApi::new();
        let script = "\
new
name = Le Van Tam
address = 5 Tran Phu, Hue
phone = 0905 765 432
email = tam@example.com
blood = AB+
toggle cancer
location = Hue
amount = 300
submit
";
        let (output, session) = run_script(&api, script).await;

        assert!(output.contains("--- New donor ---"));
        assert!(output.contains("cancer: selected"));
        assert!(output.contains("Le Van Tam"));
        assert!(output.contains("5 Tran Phu, Hue"));
        assert!(output.contains("Donations:        1"));
        assert!(matches!(api.calls()[0], ApiCall::Create(_)));

        let session = session.unwrap();
        assert_eq!(session.id().as_str(), "D-1001");
        assert_eq!(session.donation_count, 1);
    }

    #[tokio::test]
    async fn test_incomplete_form_stays_on_screen() {
        let api = FakeDonorApi::new().with_record(record());
        let script = "\
12345
submit
back
";
        let (output, _) = run_script(&api, script).await;

        assert!(output.contains("! Please enter the donation location"));
        assert_eq!(api.calls(), vec![ApiCall::Fetch(DonorId::parse("12345").unwrap())]);
        assert_eq!(output.matches("=== Blood donation intake ===").count(), 2);
    }

    #[tokio::test]
    async fn test_unknown_donor_falls_back_to_new_form() {
        let api = FakeDonorApi::new();
        let (output, session) = run_script(&api, "99999\n").await;

        assert!(output.contains("--- New donor ---"));
        assert!(output.contains("No donor record was found"));
        assert!(session.is_none());
    }

    #[tokio::test]
    async fn test_empty_scan_reports_no_code() {
        let api = FakeDonorApi::new();
        let (output, _) = run_script(&api, "\nquit\n").await;

        assert!(output.contains("No QR code was found"));
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn test_confirmation_without_record_redirects_home() {
        let api = FakeDonorApi::new();
        let mut kiosk = Kiosk::new(&api, &b""[..], Vec::new());

        kiosk.run_from(Route::Confirmation).await.unwrap();

        let output = String::from_utf8(kiosk.output().clone()).unwrap();
        assert!(!output.contains("Thank you"));
        assert!(output.contains("There is nothing to confirm yet."));
        assert!(output.contains("=== Blood donation intake ==="));
    }

    #[tokio::test]
    async fn test_default_location_prefills_form() {
        let api = FakeDonorApi::new().with_record(record());
        let mut kiosk = Kiosk::new(&api, "12345\namount = 200\nsubmit\n".as_bytes(), Vec::new())
            .with_default_location(Some("Mobile unit 3".to_string()))
            .with_date(today());

        kiosk.run().await.unwrap();

        let donation = api
            .calls()
            .into_iter()
            .find_map(|call| match call {
                ApiCall::Donation(_, donation) => Some(donation),
                _ => None,
            })
            .unwrap();
        assert_eq!(donation.location, "Mobile unit 3");
        assert_eq!(donation.amount_ml, 200);
    }

    #[tokio::test]
    async fn test_garbled_scan_is_reported_and_scanning_continues() {
        let api = FakeDonorApi::new().with_record(record());
        let (output, _) = run_bytes(&api, b"\xff\xfe\n12345\nback\nquit\n").await;

        assert!(output.contains("Something went wrong while scanning the QR code"));
        assert!(output.contains("--- Donor 12345 ---"));
        assert_eq!(
            api.calls(),
            vec![ApiCall::Fetch(DonorId::parse("12345").unwrap())]
        );
    }

    #[tokio::test]
    async fn test_garbled_form_line_keeps_form_open() {
        let api = FakeDonorApi::new();
        let (output, _) = run_bytes(&api, b"new\nname = L\xe9\nname = Le Van Tam\nshow\n").await;

        assert!(output.contains(UNREADABLE_LINE));
        assert!(output.contains("Le Van Tam"));
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn test_overlong_form_line_is_discarded() {
        let api = FakeDonorApi::new();
        let mut script = b"new\nname = ".to_vec();
        script.extend(std::iter::repeat(b'x').take(MAX_LINE_LEN * 2));
        script.extend_from_slice(b"\nname = Le Van Tam\nshow\n");
        let (output, _) = run_bytes(&api, &script).await;

        assert!(output.contains(UNREADABLE_LINE));
        assert!(output.contains("Le Van Tam"));
        assert!(!output.contains(&"x".repeat(64)));
    }
}
