//! # Shared Bulletin-Board Library
//!
//! This crate contains everything a peer needs to speak the bulletin-board
//! wire protocol: the value types describing the board, the command parser,
//! the error taxonomy, and the reply formatter. The server consumes it for
//! its protocol surface; the bundled test client consumes it the same way,
//! which keeps both ends of the socket agreeing on one vocabulary.
//!
//! ## Protocol summary
//!
//! The protocol is line-oriented UTF-8 text over TCP. After the handshake
//! (`BOARD`, `NOTE`, `COLORS`, `OK READY`) the client sends one command per
//! line and receives exactly one reply message per command: a single
//! `OK …` / `ERROR …` line, or a `DATA BEGIN` … `DATA END` block for
//! queries. Command keywords and criterion names are case-insensitive;
//! color values are canonicalized to upper case.
//!
//! ## Geometry model
//!
//! The board is a finite 2D integer grid. Notes are axis-aligned rectangles
//! of one fixed size. Point-in-note containment uses half-open intervals on
//! both axes, so a note occupies `[x, x + w) × [y, y + h)`. Rectangle
//! containment for the overlap rule uses closed edges: two rectangles with
//! coincident borders still count as one containing the other.
//!
//! ## Error taxonomy
//!
//! Every failure a client can cause maps to one of the categories in
//! [`ErrorCategory`] and renders as a single `ERROR <CATEGORY> <message>`
//! line. The category tokens are part of the wire contract and must not
//! change spelling.

use std::collections::BTreeSet;
use std::fmt;
use std::time::SystemTime;

use thiserror::Error;

// ---------------------------------------------------------------------------
// Error taxonomy
// ---------------------------------------------------------------------------

/// Well-known error categories carried on the wire.
///
/// The `Display` form is the exact uppercase token clients parse, e.g.
/// `INVALID_FORMAT`. `ServerError` is reserved for unexpected internal
/// failures and should be exceedingly rare in practice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Command syntax, arity, unknown token, or malformed number.
    InvalidFormat,
    /// Note placement would leave the board.
    OutOfBounds,
    /// Color not in the configured set (POST or GET filter).
    InvalidColor,
    /// Complete overlap with an existing note in either direction.
    OverlapError,
    /// PIN at a coordinate covered by no note.
    PinMiss,
    /// UNPIN at a coordinate with no pin.
    NoPin,
    /// Unexpected internal failure; the session continues.
    ServerError,
}

impl ErrorCategory {
    /// The wire token for this category.
    pub fn token(self) -> &'static str {
        match self {
            ErrorCategory::InvalidFormat => "INVALID_FORMAT",
            ErrorCategory::OutOfBounds => "OUT_OF_BOUNDS",
            ErrorCategory::InvalidColor => "INVALID_COLOR",
            ErrorCategory::OverlapError => "OVERLAP_ERROR",
            ErrorCategory::PinMiss => "PIN_MISS",
            ErrorCategory::NoPin => "NO_PIN",
            ErrorCategory::ServerError => "SERVER_ERROR",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// A protocol-level failure: category plus a human-readable message.
///
/// These surface to the client as one `ERROR …` line (see
/// [`wire::error_line`]) and never terminate the session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{category} {message}")]
pub struct ProtocolError {
    pub category: ErrorCategory,
    pub message: String,
}

impl ProtocolError {
    pub fn new(category: ErrorCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
        }
    }

    pub fn invalid_format(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::InvalidFormat, message)
    }

    pub fn out_of_bounds(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::OutOfBounds, message)
    }

    pub fn invalid_color(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::InvalidColor, message)
    }

    pub fn overlap(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::OverlapError, message)
    }

    pub fn pin_miss(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::PinMiss, message)
    }

    pub fn no_pin(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::NoPin, message)
    }
}

// ---------------------------------------------------------------------------
// Geometry & model
// ---------------------------------------------------------------------------

/// A coordinate on the board grid.
///
/// Used both as a note origin and as a pin location. Equality is
/// componentwise; ordering for output is imposed by the reader (pins list
/// by `(y, x)`), not by this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Point {
    pub x: u32,
    pub y: u32,
}

impl Point {
    pub fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }
}

/// An immutable note placed on the board.
///
/// Ids are assigned by the server from a monotonic counter and are never
/// reused within a process lifetime, even after the note is removed. The
/// message is the raw remainder of the POST line and may contain spaces.
/// `created_at` is informational only.
#[derive(Debug, Clone)]
pub struct Note {
    pub id: u32,
    pub x: u32,
    pub y: u32,
    /// Canonical upper-case color name.
    pub color: String,
    pub message: String,
    pub created_at: SystemTime,
}

impl Note {
    pub fn new(id: u32, x: u32, y: u32, color: String, message: String) -> Self {
        Self {
            id,
            x,
            y,
            color,
            message,
            created_at: SystemTime::now(),
        }
    }
}

/// Closed-rectangle containment: does A contain B, edges allowed to coincide?
///
/// Arithmetic widens to `u64` so origins near `u32::MAX` cannot overflow.
pub fn rect_contains(
    ax: u32,
    ay: u32,
    aw: u32,
    ah: u32,
    bx: u32,
    by: u32,
    bw: u32,
    bh: u32,
) -> bool {
    bx >= ax
        && by >= ay
        && bx as u64 + bw as u64 <= ax as u64 + aw as u64
        && by as u64 + bh as u64 <= ay as u64 + ah as u64
}

/// Immutable board configuration, fixed at startup.
///
/// Colors are canonicalized to upper case on construction and stored in a
/// `BTreeSet`, so iteration yields the ascending lexicographic order the
/// handshake promises.
#[derive(Debug, Clone)]
pub struct BoardConfig {
    pub board_width: u32,
    pub board_height: u32,
    pub note_width: u32,
    pub note_height: u32,
    colors: BTreeSet<String>,
}

impl BoardConfig {
    pub fn new(
        board_width: u32,
        board_height: u32,
        note_width: u32,
        note_height: u32,
        colors: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            board_width,
            board_height,
            note_width,
            note_height,
            colors: colors.into_iter().map(|c| c.to_uppercase()).collect(),
        }
    }

    /// Exact membership test against the canonical color set.
    ///
    /// The argument must already be upper case; the parser canonicalizes
    /// color values before they reach this point.
    pub fn is_valid_color(&self, color: &str) -> bool {
        self.colors.contains(color)
    }

    /// Configured colors in ascending lexicographic order.
    pub fn colors(&self) -> impl Iterator<Item = &str> {
        self.colors.iter().map(String::as_str)
    }

    /// Whether a note placed at `(x, y)` lies completely inside the board.
    pub fn inside_board(&self, x: u32, y: u32) -> bool {
        x as u64 + self.note_width as u64 <= self.board_width as u64
            && y as u64 + self.note_height as u64 <= self.board_height as u64
    }

    /// Whether `note` contains the point `(px, py)`, half-open on both axes.
    pub fn note_contains(&self, note: &Note, px: u32, py: u32) -> bool {
        (px as u64) >= (note.x as u64)
            && (px as u64) < note.x as u64 + self.note_width as u64
            && (py as u64) >= (note.y as u64)
            && (py as u64) < note.y as u64 + self.note_height as u64
    }

    /// Complete-overlap test between two note origins of the uniform size:
    /// true when either rectangle contains the other. With one shared size
    /// this reduces to equal origins, but the general containment test is
    /// the definition.
    pub fn complete_overlap(&self, a: Point, b: Point) -> bool {
        let (w, h) = (self.note_width, self.note_height);
        rect_contains(a.x, a.y, w, h, b.x, b.y, w, h)
            || rect_contains(b.x, b.y, w, h, a.x, a.y, w, h)
    }
}

// ---------------------------------------------------------------------------
// Commands & parser
// ---------------------------------------------------------------------------

/// Filter criteria for the general GET command. Absent criteria match
/// everything; present criteria are ANDed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NoteQuery {
    /// Equality on the canonical upper-case color.
    pub color: Option<String>,
    /// Point the note's rectangle must contain (half-open).
    pub contains: Option<Point>,
    /// Case-insensitive substring of the note's message.
    pub refers_to: Option<String>,
}

/// One parsed client command with validated arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Post {
        x: u32,
        y: u32,
        /// Canonical upper-case color value.
        color: String,
        /// Raw remainder of the line; embedded spaces preserved.
        message: String,
    },
    Pin {
        x: u32,
        y: u32,
    },
    Unpin {
        x: u32,
        y: u32,
    },
    Shake,
    Clear,
    GetPins,
    Get(NoteQuery),
    Disconnect,
}

/// Parses one trimmed, non-empty request line into a [`Command`].
///
/// Keywords dispatch case-insensitively. Arity violations, malformed
/// numbers, unknown keywords, and unknown or duplicated GET criteria all
/// come back as `INVALID_FORMAT`; semantic checks (color membership,
/// bounds, overlap) are left to the board.
pub fn parse_command(line: &str) -> Result<Command, ProtocolError> {
    let line = line.trim();
    let (keyword, rest) = match line.find(char::is_whitespace) {
        Some(idx) => (&line[..idx], line[idx..].trim_start()),
        None => (line, ""),
    };

    match keyword.to_uppercase().as_str() {
        "POST" => parse_post(rest),
        "PIN" => parse_pin(rest, true),
        "UNPIN" => parse_pin(rest, false),
        "SHAKE" => parse_bare(rest, "SHAKE", Command::Shake),
        "CLEAR" => parse_bare(rest, "CLEAR", Command::Clear),
        "DISCONNECT" => parse_bare(rest, "DISCONNECT", Command::Disconnect),
        "GET" => parse_get(rest),
        _ => Err(ProtocolError::invalid_format("Unknown command")),
    }
}

/// Parses a base-10 non-negative coordinate, naming the offending field on
/// failure.
fn parse_coord(token: &str, field: &str) -> Result<u32, ProtocolError> {
    let value: i64 = token
        .parse()
        .map_err(|_| ProtocolError::invalid_format(format!("Invalid integer for {field}")))?;
    if value < 0 {
        return Err(ProtocolError::invalid_format(format!(
            "Negative value for {field}"
        )));
    }
    u32::try_from(value)
        .map_err(|_| ProtocolError::invalid_format(format!("Value too large for {field}")))
}

// POST <x> <y> <color> <message...>; the message is the raw remainder and
// may contain spaces.
fn parse_post(rest: &str) -> Result<Command, ProtocolError> {
    let usage = || ProtocolError::invalid_format("Usage: POST <x> <y> <color> <message>");

    let mut remainder = rest;
    let mut fields = [""; 3];
    for slot in &mut fields {
        let end = remainder.find(char::is_whitespace).ok_or_else(usage)?;
        *slot = &remainder[..end];
        remainder = remainder[end..].trim_start();
    }
    if remainder.is_empty() {
        return Err(usage());
    }

    Ok(Command::Post {
        x: parse_coord(fields[0], "x")?,
        y: parse_coord(fields[1], "y")?,
        color: fields[2].to_uppercase(),
        message: remainder.to_string(),
    })
}

// PIN <x> <y> and UNPIN <x> <y>: exactly two coordinate tokens.
fn parse_pin(rest: &str, is_pin: bool) -> Result<Command, ProtocolError> {
    let name = if is_pin { "PIN" } else { "UNPIN" };
    let tokens: Vec<&str> = rest.split_whitespace().collect();
    if tokens.len() != 2 {
        return Err(ProtocolError::invalid_format(format!(
            "Usage: {name} <x> <y>"
        )));
    }
    let x = parse_coord(tokens[0], "x")?;
    let y = parse_coord(tokens[1], "y")?;
    Ok(if is_pin {
        Command::Pin { x, y }
    } else {
        Command::Unpin { x, y }
    })
}

// SHAKE, CLEAR, and DISCONNECT take no arguments.
fn parse_bare(rest: &str, name: &str, command: Command) -> Result<Command, ProtocolError> {
    if rest.is_empty() {
        Ok(command)
    } else {
        Err(ProtocolError::invalid_format(format!(
            "{name} takes no arguments"
        )))
    }
}

/// Case-insensitive `key=` prefix strip; returns the attached value.
fn strip_key<'a>(token: &'a str, key: &str) -> Option<&'a str> {
    let prefix = token.get(..key.len())?;
    if prefix.eq_ignore_ascii_case(key) {
        Some(&token[key.len()..])
    } else {
        None
    }
}

// GET PINS, or GET with optional color= / contains= / refersTo= criteria in
// any order. `contains=` accepts its coordinates attached ("contains=4 6")
// or detached ("contains= 4 6"). Each criterion may appear at most once.
fn parse_get(rest: &str) -> Result<Command, ProtocolError> {
    if rest.eq_ignore_ascii_case("PINS") {
        return Ok(Command::GetPins);
    }

    let mut query = NoteQuery::default();
    let tokens: Vec<&str> = rest.split_whitespace().collect();
    let mut i = 0;
    while i < tokens.len() {
        let token = tokens[i];

        if let Some(value) = strip_key(token, "color=") {
            if query.color.is_some() {
                return Err(ProtocolError::invalid_format("Duplicate criterion: color"));
            }
            if value.is_empty() {
                return Err(ProtocolError::invalid_format("color=<color> missing value"));
            }
            query.color = Some(value.to_uppercase());
        } else if let Some(value) = strip_key(token, "contains=") {
            if query.contains.is_some() {
                return Err(ProtocolError::invalid_format(
                    "Duplicate criterion: contains",
                ));
            }
            let (x, y) = if value.is_empty() {
                let x = *tokens.get(i + 1).ok_or_else(|| {
                    ProtocolError::invalid_format("contains=<x> <y> missing coords")
                })?;
                let y = *tokens.get(i + 2).ok_or_else(|| {
                    ProtocolError::invalid_format("contains=<x> <y> missing coords")
                })?;
                i += 2;
                (parse_coord(x, "contains.x")?, parse_coord(y, "contains.y")?)
            } else {
                let y = *tokens
                    .get(i + 1)
                    .ok_or_else(|| ProtocolError::invalid_format("contains=<x> <y> missing y"))?;
                i += 1;
                (
                    parse_coord(value, "contains.x")?,
                    parse_coord(y, "contains.y")?,
                )
            };
            query.contains = Some(Point::new(x, y));
        } else if let Some(value) = strip_key(token, "refersTo=") {
            if query.refers_to.is_some() {
                return Err(ProtocolError::invalid_format(
                    "Duplicate criterion: refersTo",
                ));
            }
            if value.is_empty() {
                return Err(ProtocolError::invalid_format(
                    "refersTo=<substring> missing value",
                ));
            }
            query.refers_to = Some(value.to_string());
        } else {
            return Err(ProtocolError::invalid_format(format!(
                "Unknown GET criterion: {token}"
            )));
        }

        i += 1;
    }

    Ok(Command::Get(query))
}

// ---------------------------------------------------------------------------
// Wire formatter
// ---------------------------------------------------------------------------

/// Reply line builders shared by the server and the tests.
///
/// Multi-line replies are returned as one string with embedded newlines and
/// no trailing newline; the session writer appends the final line
/// terminator and flushes once per reply.
pub mod wire {
    use super::{BoardConfig, Note, Point, ProtocolError};

    pub const DATA_BEGIN: &str = "DATA BEGIN";
    pub const DATA_END: &str = "DATA END";

    /// The four handshake lines, in order: board size, note size, colors in
    /// ascending order, readiness.
    pub fn handshake(config: &BoardConfig) -> String {
        let colors: Vec<&str> = config.colors().collect();
        format!(
            "BOARD {} {}\nNOTE {} {}\nCOLORS {}\nOK READY",
            config.board_width,
            config.board_height,
            config.note_width,
            config.note_height,
            colors.join(" ")
        )
    }

    pub fn posted(id: u32) -> String {
        format!("OK POSTED {id}")
    }

    pub fn pinned(x: u32, y: u32) -> String {
        format!("OK PINNED {x} {y}")
    }

    pub fn unpinned(x: u32, y: u32) -> String {
        format!("OK UNPINNED {x} {y}")
    }

    pub fn shaken(removed: usize) -> String {
        format!("OK SHAKEN REMOVED {removed}")
    }

    pub fn cleared() -> String {
        "OK CLEARED".to_string()
    }

    pub fn bye() -> String {
        "OK BYE".to_string()
    }

    pub fn error_line(error: &ProtocolError) -> String {
        format!("ERROR {} {}", error.category, error.message)
    }

    /// One `PIN <x> <y>` line inside a GET PINS block.
    pub fn pin_line(point: Point) -> String {
        format!("PIN {} {}", point.x, point.y)
    }

    /// One `NOTE …` line inside a GET block. The message is the final field
    /// and runs to end of line with its spaces intact.
    pub fn note_line(note: &Note, pinned: bool) -> String {
        let status = if pinned { "PINNED" } else { "UNPINNED" };
        format!(
            "NOTE {} {} {} {} {} {}",
            note.id, note.x, note.y, note.color, status, note.message
        )
    }

    /// Wraps body lines in the `DATA BEGIN` / `DATA END` envelope.
    pub fn data_block(lines: &[String]) -> String {
        let mut out = String::from(DATA_BEGIN);
        for line in lines {
            out.push('\n');
            out.push_str(line);
        }
        out.push('\n');
        out.push_str(DATA_END);
        out
    }
}
