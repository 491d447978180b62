//! A durable, append-only, segmented commit log.
//!
//! This crate is the storage core only: it assigns monotonically
//! increasing offsets to opaque byte payloads, persists them to disk in
//! fixed-layout segment files, and serves point reads by offset plus a
//! raw byte stream of the whole log. Replication, RPC, authentication
//! and service wiring are left to whatever binds this crate in.
//!
//! The composition, leaves first: [`store::Store`] is an append-only
//! framed byte container; [`index::Index`] is a memory-mapped
//! offset→position table; [`segment::Segment`] pairs one of each;
//! [`log::Log`] owns an ordered collection of segments and is the type
//! most callers want.

pub mod codec;
pub mod config;
pub mod error;
pub mod frame;
pub mod index;
pub mod log;
pub mod reader;
pub mod segment;
pub mod store;

pub use codec::{BytesCodec, ProstCodec, RecordCodec, TypedLog};
pub use config::{Config, ConfigBuilder, SegmentConfig};
pub use error::{IndexError, LogError, SegmentError, StoreError};
pub use log::Log;
pub use reader::LogReader;
