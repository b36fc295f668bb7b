//! Signature capture.
//!
//! The pad collects pen strokes (and, on a terminal kiosk, typed marks) and
//! encodes them as an SVG `data:` URL when the form is submitted.

use std::fmt::Write as _;

use crate::donor::Signature;

/// Default pad width in pixels.
pub const DEFAULT_WIDTH: u32 = 300;

/// Default pad height in pixels.
pub const DEFAULT_HEIGHT: u32 = 150;

const DATA_URL_PREFIX: &str = "data:image/svg+xml;charset=utf-8,";

/// A point on the pad, in pixels from the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    /// Horizontal offset.
    pub x: f32,
    /// Vertical offset.
    pub y: f32,
}

/// A drawing surface for the donor's signature.
#[derive(Debug, Clone, PartialEq)]
pub struct SignaturePad {
    width: u32,
    height: u32,
    strokes: Vec<Vec<Point>>,
    marks: Vec<String>,
}

impl Default for SignaturePad {
    fn default() -> Self {
        Self::new(DEFAULT_WIDTH, DEFAULT_HEIGHT)
    }
}

impl SignaturePad {
    /// Create an empty pad of the given size.
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
            strokes: Vec::new(),
            marks: Vec::new(),
        }
    }

    /// Put the pen down at `(x, y)`, starting a new stroke.
    pub fn begin_stroke(&mut self, x: f32, y: f32) {
        let point = self.clamp(x, y);
        self.strokes.push(vec![point]);
    }

    /// Drag the pen to `(x, y)`. Starts a stroke if none is open.
    pub fn line_to(&mut self, x: f32, y: f32) {
        let point = self.clamp(x, y);
        match self.strokes.last_mut() {
            Some(stroke) => stroke.push(point),
            None => self.strokes.push(vec![point]),
        }
    }

    /// Add a typed mark, rendered in a handwriting font.
    pub fn write_text(&mut self, text: &str) {
        let text = text.trim();
        if !text.is_empty() {
            self.marks.push(text.to_string());
        }
    }

    /// Wipe the pad.
    pub fn clear(&mut self) {
        self.strokes.clear();
        self.marks.clear();
    }

    /// Whether nothing has been drawn or typed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.strokes.is_empty() && self.marks.is_empty()
    }

    /// Encode the pad as an image, or `None` if it is empty.
    #[must_use]
    pub fn to_signature(&self) -> Option<Signature> {
        if self.is_empty() {
            return None;
        }
        let svg = self.to_svg();
        Some(Signature::from_data_url(format!(
            "{DATA_URL_PREFIX}{}",
            percent_encode(&svg)
        )))
    }

    fn clamp(&self, x: f32, y: f32) -> Point {
        #[allow(clippy::cast_precision_loss)]
        let (w, h) = (self.width as f32, self.height as f32);
        Point {
            x: if x.is_finite() { x.clamp(0.0, w) } else { 0.0 },
            y: if y.is_finite() { y.clamp(0.0, h) } else { 0.0 },
        }
    }

    fn to_svg(&self) -> String {
        let mut svg = format!(
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
            w = self.width,
            h = self.height
        );
        for stroke in &self.strokes {
            let points: Vec<String> = stroke
                .iter()
                .map(|p| format!("{:.1},{:.1}", p.x, p.y))
                .collect();
            let _ = write!(
                svg,
                r#"<polyline fill="none" stroke="black" stroke-width="2" points="{}"/>"#,
                points.join(" ")
            );
        }
        let line_height = self.height / 3;
        for (i, mark) in (1u32..).zip(&self.marks) {
            let _ = write!(
                svg,
                r#"<text x="10" y="{}" font-family="cursive" font-size="{}">{}</text>"#,
                line_height * i,
                line_height * 2 / 3,
                xml_escape(mark)
            );
        }
        svg.push_str("</svg>");
        svg
    }
}

fn xml_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            other => out.push(other),
        }
    }
    out
}

/// Percent-encode everything outside the RFC 3986 unreserved set.
fn percent_encode(text: &str) -> String {
    let mut out = String::with_capacity(text.len() * 2);
    for byte in text.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'.' | b'_' | b'~') {
            out.push(char::from(byte));
        } else {
            let _ = write!(out, "%{byte:02X}");
        }
    }
    out
}
