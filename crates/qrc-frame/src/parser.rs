use std::fmt;

use bytes::{Bytes, BytesMut};

use crate::codec::{decode, Packet, START, TAG_MASK};
use crate::error::FrameError;

/// Tag of the final byte of every frame (low half of the checksum).
const END_TAG: u8 = 0x20;

const INITIAL_BUFFER_CAPACITY: usize = 256;

/// Result of one extraction step over the receive buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseOutcome {
    /// No complete candidate frame yet; the buffer was left untouched.
    NeedMoreData,
    /// A frame decoded cleanly.
    Success(Packet),
    /// Bytes preceding the next start byte were dropped.
    Skipped(Bytes),
    /// The candidate frame had an invalid length.
    SizeError(Bytes),
    /// The candidate frame had a mistagged byte.
    TagError(Bytes),
    /// The candidate frame failed checksum verification.
    ChecksumError(Bytes),
}

impl ParseOutcome {
    /// Map a decode result onto an outcome, keeping `frame` for error cases.
    pub fn from_decode(result: Result<Packet, FrameError>, frame: Bytes) -> Self {
        match result {
            Ok(packet) => Self::Success(packet),
            Err(FrameError::Size { .. }) => Self::SizeError(frame),
            Err(FrameError::Tag { .. }) => Self::TagError(frame),
            Err(FrameError::Checksum { .. }) => Self::ChecksumError(frame),
        }
    }

    /// True for outcomes that end a request/reply exchange.
    ///
    /// `Skipped` is a diagnostic only; the exchange keeps waiting after it.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::NeedMoreData | Self::Skipped(_))
    }

    /// The error kind and offending bytes, if this outcome is not a success.
    pub fn error(&self) -> Option<(ParseErrorKind, &Bytes)> {
        match self {
            Self::Skipped(b) => Some((ParseErrorKind::Skipped, b)),
            Self::SizeError(b) => Some((ParseErrorKind::Size, b)),
            Self::TagError(b) => Some((ParseErrorKind::Tag, b)),
            Self::ChecksumError(b) => Some((ParseErrorKind::Checksum, b)),
            Self::NeedMoreData | Self::Success(_) => None,
        }
    }
}

/// Kind of parse diagnostic reported to subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParseErrorKind {
    Skipped,
    Size,
    Tag,
    Checksum,
}

impl ParseErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Skipped => "skipped",
            Self::Size => "size",
            Self::Tag => "tag",
            Self::Checksum => "checksum",
        }
    }
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Extract at most one outcome from the front of `buf`.
///
/// Garbage ahead of the next start byte comes back as `Skipped` (the whole
/// buffer when there is no start byte). Otherwise the candidate frame runs
/// from the start byte through the first end-tagged byte and is removed and
/// decoded. Without an end-tagged byte the buffer is left as it was.
pub fn parse_next(buf: &mut BytesMut) -> ParseOutcome {
    if buf.is_empty() {
        return ParseOutcome::NeedMoreData;
    }

    let start = buf
        .iter()
        .position(|&b| b & TAG_MASK == START)
        .unwrap_or(buf.len());
    if start > 0 {
        return ParseOutcome::Skipped(buf.split_to(start).freeze());
    }

    let Some(end) = buf.iter().position(|&b| b & TAG_MASK == END_TAG) else {
        return ParseOutcome::NeedMoreData;
    };

    let frame = buf.split_to(end + 1).freeze();
    let result = decode(&frame);
    if let Err(err) = &result {
        tracing::debug!(len = frame.len(), error = %err, "discarding candidate frame");
    }
    ParseOutcome::from_decode(result, frame)
}

/// Incremental frame extractor over a growing receive buffer.
///
/// Feeding bytes one at a time yields the same terminal outcomes, in the
/// same order, as feeding them all at once. Never blocks.
#[derive(Debug, Default)]
pub struct StreamParser {
    buf: BytesMut,
}

impl StreamParser {
    pub fn new() -> Self {
        Self {
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
        }
    }

    /// Append received bytes.
    pub fn extend(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Extract the next outcome, if any.
    pub fn next_outcome(&mut self) -> ParseOutcome {
        parse_next(&mut self.buf)
    }

    /// Collect outcomes until the buffer needs more data.
    pub fn drain_outcomes(&mut self) -> Vec<ParseOutcome> {
        let mut outcomes = Vec::new();
        loop {
            match self.next_outcome() {
                ParseOutcome::NeedMoreData => return outcomes,
                outcome => outcomes.push(outcome),
            }
        }
    }

    /// Drop everything buffered.
    pub fn clear(&mut self) {
        self.buf.clear();
    }

    /// Number of buffered bytes.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Bytes still waiting to complete a frame.
    pub fn pending(&self) -> &[u8] {
        &self.buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::encode;
    use crate::command;
    use proptest::prelude::*;

    fn terminal(outcomes: Vec<ParseOutcome>) -> Vec<ParseOutcome> {
        outcomes.into_iter().filter(ParseOutcome::is_terminal).collect()
    }

    #[test]
    fn empty_buffer_needs_more_data() {
        let mut parser = StreamParser::new();
        assert_eq!(parser.next_outcome(), ParseOutcome::NeedMoreData);
    }

    #[test]
    fn single_frame() {
        let mut parser = StreamParser::new();
        parser.extend(&encode(1, command::SUCCESS, &[]));
        assert_eq!(
            parser.next_outcome(),
            ParseOutcome::Success(Packet::new(1, command::SUCCESS, Bytes::new()))
        );
        assert!(parser.is_empty());
    }

    #[test]
    fn garbage_then_frame() {
        let mut parser = StreamParser::new();
        parser.extend(&[0x01, 0x02, 0x03]);
        parser.extend(&encode(1, command::HELLO, &[]));

        assert_eq!(
            parser.next_outcome(),
            ParseOutcome::Skipped(Bytes::from_static(&[0x01, 0x02, 0x03]))
        );
        assert!(matches!(parser.next_outcome(), ParseOutcome::Success(_)));
        assert_eq!(parser.next_outcome(), ParseOutcome::NeedMoreData);
    }

    #[test]
    fn buffer_without_start_is_skipped_whole() {
        let mut parser = StreamParser::new();
        parser.extend(&[0x41, 0x21, 0x00]);
        assert_eq!(
            parser.next_outcome(),
            ParseOutcome::Skipped(Bytes::from_static(&[0x41, 0x21, 0x00]))
        );
        assert!(parser.is_empty());
    }

    #[test]
    fn partial_frame_is_kept() {
        let frame = encode(4, command::GET_KEYS, &[1, 2, 3]);
        let mut parser = StreamParser::new();
        parser.extend(&frame[..frame.len() - 1]);

        assert_eq!(parser.next_outcome(), ParseOutcome::NeedMoreData);
        assert_eq!(parser.len(), frame.len() - 1);

        parser.extend(&frame[frame.len() - 1..]);
        match parser.next_outcome() {
            ParseOutcome::Success(packet) => {
                assert_eq!(packet.address, 4);
                assert_eq!(packet.payload.as_ref(), &[1, 2, 3]);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn truncated_frame_is_size_error() {
        // Start byte, one command byte, then the end tag: length 3.
        let mut parser = StreamParser::new();
        parser.extend(&[0x81, 0x40, 0x21]);
        assert_eq!(
            parser.next_outcome(),
            ParseOutcome::SizeError(Bytes::from_static(&[0x81, 0x40, 0x21]))
        );
    }

    #[test]
    fn interrupted_frame_swallows_the_next_one() {
        let mut wire = vec![0x81, 0x40, 0x00];
        wire.extend_from_slice(&encode(2, command::SUCCESS, &[]));
        let mut parser = StreamParser::new();
        parser.extend(&wire);

        // The fragment has no end tag, so it is sliced together with the
        // following frame and rejected as one candidate.
        assert_eq!(parser.next_outcome(), ParseOutcome::SizeError(Bytes::from(wire)));
        assert_eq!(parser.next_outcome(), ParseOutcome::NeedMoreData);
    }

    #[test]
    fn corrupted_checksum() {
        let mut frame = encode(1, command::HELLO, &[]).to_vec();
        frame[3] ^= 0x01;
        let mut parser = StreamParser::new();
        parser.extend(&frame);
        assert_eq!(
            parser.next_outcome(),
            ParseOutcome::ChecksumError(Bytes::from(frame))
        );
    }

    #[test]
    fn drain_collects_everything_available() {
        let mut parser = StreamParser::new();
        parser.extend(&[0xFF]);
        parser.extend(&encode(1, command::SUCCESS, &[]));
        parser.extend(&encode(1, command::UNKNOWN, &[]));
        parser.extend(&[0x81, 0x40]);

        let outcomes = parser.drain_outcomes();
        assert_eq!(outcomes.len(), 3);
        assert!(matches!(outcomes[0], ParseOutcome::Skipped(_)));
        assert!(matches!(outcomes[1], ParseOutcome::Success(_)));
        assert!(matches!(outcomes[2], ParseOutcome::Success(_)));
        assert_eq!(parser.pending(), &[0x81, 0x40]);

        parser.clear();
        assert!(parser.is_empty());
    }

    #[test]
    fn outcome_error_kinds() {
        let bytes = Bytes::from_static(&[0x00]);
        assert_eq!(
            ParseOutcome::TagError(bytes.clone()).error(),
            Some((ParseErrorKind::Tag, &bytes))
        );
        assert!(ParseOutcome::NeedMoreData.error().is_none());
        assert!(!ParseOutcome::Skipped(bytes.clone()).is_terminal());
        assert!(ParseOutcome::ChecksumError(bytes).is_terminal());
        assert_eq!(ParseErrorKind::Checksum.to_string(), "checksum");
    }

    fn wire_strategy() -> impl Strategy<Value = Vec<u8>> {
        let frame = (0u8..=15, any::<u8>(), prop::collection::vec(any::<u8>(), 0..12))
            .prop_map(|(a, c, p)| encode(a, c, &p).to_vec());
        let noise = prop::collection::vec(any::<u8>(), 0..6);
        prop::collection::vec(prop_oneof![frame, noise], 1..8)
            .prop_map(|chunks| chunks.concat())
    }

    proptest! {
        #[test]
        fn prop_incremental_equivalence(wire in wire_strategy()) {
            let mut whole = StreamParser::new();
            whole.extend(&wire);
            let expected = terminal(whole.drain_outcomes());

            let mut incremental = StreamParser::new();
            let mut actual = Vec::new();
            for byte in &wire {
                incremental.extend(std::slice::from_ref(byte));
                actual.extend(incremental.drain_outcomes());
            }

            prop_assert_eq!(terminal(actual), expected);
            prop_assert_eq!(incremental.pending(), whole.pending());
        }

        #[test]
        fn prop_clean_frames_all_decode(
            packets in prop::collection::vec(
                (0u8..=15, any::<u8>(), prop::collection::vec(any::<u8>(), 0..16)),
                1..6,
            )
        ) {
            let mut parser = StreamParser::new();
            for (a, c, p) in &packets {
                parser.extend(&encode(*a, *c, p));
            }
            let outcomes = parser.drain_outcomes();
            prop_assert_eq!(outcomes.len(), packets.len());
            for (outcome, (a, c, p)) in outcomes.iter().zip(&packets) {
                prop_assert_eq!(outcome, &ParseOutcome::Success(Packet::new(*a, *c, p.clone())));
            }
        }
    }
}
