//! # Bulletin-Board Server Library
//!
//! The authoritative server for the networked bulletin board. Many
//! concurrent clients hold long-lived TCP sessions, post fixed-size notes
//! onto one shared board, pin them in place, query with filters, and
//! destructively shake or clear the board. State is volatile: it lives
//! only for the process lifetime.
//!
//! ## Architecture
//!
//! The server is a small stack of independent layers over one shared
//! store:
//!
//! - [`board`] owns the in-memory state (notes, pins, the monotonic id
//!   counter) and enforces every geometric invariant. It performs no I/O.
//! - [`session`] runs one task per connection: handshake, line dispatch
//!   through the shared parser, reply rendering.
//! - [`acceptor`] listens, bounds concurrent sessions with a semaphore,
//!   and coordinates shutdown.
//!
//! The protocol surface itself (value types, parser, error taxonomy, wire
//! formatter) lives in the `shared` crate so any conforming peer can reuse
//! it.
//!
//! ## Concurrency discipline
//!
//! The board sits behind a single readers/writer lock. POST, PIN, UNPIN,
//! SHAKE, and CLEAR take the write side and are therefore fully atomic; no
//! session observes intermediate state. Queries take the read side and may
//! proceed in parallel with each other but never overlap a mutator.
//! Nothing inside a critical section performs blocking I/O.

pub mod acceptor;
pub mod board;
pub mod session;
