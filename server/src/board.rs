//! In-memory board state and the operations the protocol exposes over it.
//!
//! `BoardState` is a plain mutable structure; the session layer wraps it in
//! an `Arc<RwLock<…>>` and acquires the write side for mutators and the
//! read side for queries, so every operation here runs atomically with
//! respect to every other. Nothing in this module performs I/O.
//!
//! Pinned-ness is derived: a note is pinned while at least one pin
//! coordinate falls inside its rectangle. There is no stored flag to keep
//! in sync, which is what makes SHAKE's atomicity trivial.

use log::{debug, info};
use shared::{BoardConfig, Note, NoteQuery, Point, ProtocolError};
use std::collections::{HashMap, HashSet};

/// The single shared store behind the whole server.
///
/// Invariants held between operations: every note lies completely inside
/// the board, no two notes completely overlap, every note's color is in
/// the configured set, and `next_id` exceeds every id ever issued. Ids are
/// never reused, even after SHAKE or CLEAR.
pub struct BoardState {
    config: BoardConfig,
    notes: HashMap<u32, Note>,
    pins: HashSet<Point>,
    next_id: u32,
}

impl BoardState {
    pub fn new(config: BoardConfig) -> Self {
        Self {
            config,
            notes: HashMap::new(),
            pins: HashSet::new(),
            next_id: 1,
        }
    }

    pub fn config(&self) -> &BoardConfig {
        &self.config
    }

    /// Whether `note` currently contains at least one pin coordinate.
    pub fn is_pinned(&self, note: &Note) -> bool {
        self.pins
            .iter()
            .any(|p| self.config.note_contains(note, p.x, p.y))
    }

    /// Places a new note. Preconditions are checked in order: color
    /// membership, board fit, complete overlap against every existing
    /// note. The first failing check aborts before any mutation.
    pub fn post(
        &mut self,
        x: u32,
        y: u32,
        color: String,
        message: String,
    ) -> Result<u32, ProtocolError> {
        if !self.config.is_valid_color(&color) {
            return Err(ProtocolError::invalid_color(format!(
                "Invalid color: {color}"
            )));
        }
        if !self.config.inside_board(x, y) {
            return Err(ProtocolError::out_of_bounds("Note out of bounds"));
        }
        let origin = Point::new(x, y);
        for existing in self.notes.values() {
            if self
                .config
                .complete_overlap(origin, Point::new(existing.x, existing.y))
            {
                return Err(ProtocolError::overlap(format!(
                    "Complete overlap not allowed with note id={}",
                    existing.id
                )));
            }
        }

        let id = self.next_id;
        self.next_id += 1;
        self.notes.insert(id, Note::new(id, x, y, color, message));
        debug!("Posted note {id} at ({x}, {y})");
        Ok(id)
    }

    /// Places a pin at `(x, y)`. The coordinate must fall inside at least
    /// one existing note. Re-pinning a pinned coordinate succeeds silently.
    pub fn pin(&mut self, x: u32, y: u32) -> Result<(), ProtocolError> {
        let hit = self
            .notes
            .values()
            .any(|n| self.config.note_contains(n, x, y));
        if !hit {
            return Err(ProtocolError::pin_miss(format!(
                "PIN hit no notes at ({x},{y})"
            )));
        }
        self.pins.insert(Point::new(x, y));
        Ok(())
    }

    /// Removes the pin at exactly `(x, y)`.
    pub fn unpin(&mut self, x: u32, y: u32) -> Result<(), ProtocolError> {
        if !self.pins.remove(&Point::new(x, y)) {
            return Err(ProtocolError::no_pin(format!("No pin at ({x},{y})")));
        }
        Ok(())
    }

    /// Removes every note that is not currently pinned and returns how many
    /// were removed. Pins stay where they are; a pin left covering nothing
    /// is retained and will hold the next note posted over it.
    pub fn shake(&mut self) -> usize {
        let before = self.notes.len();
        let pins = &self.pins;
        let config = &self.config;
        self.notes
            .retain(|_, note| pins.iter().any(|p| config.note_contains(note, p.x, p.y)));
        let removed = before - self.notes.len();
        info!("Shake removed {removed} of {before} notes");
        removed
    }

    /// Removes all notes and all pins. The id counter is not reset.
    pub fn clear(&mut self) {
        info!(
            "Cleared {} notes and {} pins",
            self.notes.len(),
            self.pins.len()
        );
        self.notes.clear();
        self.pins.clear();
    }

    /// Snapshot of all pins, sorted ascending by `(y, x)`.
    pub fn pins_sorted(&self) -> Vec<Point> {
        let mut out: Vec<Point> = self.pins.iter().copied().collect();
        out.sort_by_key(|p| (p.y, p.x));
        out
    }

    /// Snapshot of notes matching `query`, paired with their derived
    /// pinned status. Criteria are ANDed; an unknown color filter fails
    /// before anything is scanned. Ordering: pinned notes first, then by
    /// descending id.
    pub fn notes_filtered(&self, query: &NoteQuery) -> Result<Vec<(Note, bool)>, ProtocolError> {
        if let Some(color) = &query.color {
            if !self.config.is_valid_color(color) {
                return Err(ProtocolError::invalid_color(format!(
                    "Invalid color: {color}"
                )));
            }
        }
        let refers_to = query.refers_to.as_ref().map(|s| s.to_lowercase());

        let mut out: Vec<(Note, bool)> = self
            .notes
            .values()
            .filter(|n| match &query.color {
                Some(color) => &n.color == color,
                None => true,
            })
            .filter(|n| match query.contains {
                Some(p) => self.config.note_contains(n, p.x, p.y),
                None => true,
            })
            .filter(|n| match &refers_to {
                Some(needle) => n.message.to_lowercase().contains(needle),
                None => true,
            })
            .map(|n| (n.clone(), self.is_pinned(n)))
            .collect();

        out.sort_by(|(a, a_pinned), (b, b_pinned)| {
            b_pinned.cmp(a_pinned).then(b.id.cmp(&a.id))
        });
        Ok(out)
    }

    #[allow(dead_code)]
    pub fn note_count(&self) -> usize {
        self.notes.len()
    }
}
