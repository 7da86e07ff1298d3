//! Streaming output for routed collar records.
//!
//! This module provides the rolling per-destination CSV writer and the
//! demultiplexer that routes each input record to its tag's writer, or to the
//! orphan records writer when the tag is missing or unknown.

mod chunked_writer;
mod demux;

pub use chunked_writer::{ChunkedWriter, WriterSummary};
pub use demux::{Demultiplexer, DemuxState, DemuxSummary};
