//! Replay protection (RFC 3711, 3.3.1 and 3.3.2).
//!
//! [`SequenceState`] tracks the roll-over counter and highest sequence number
//! of an RTP stream and turns a 16-bit sequence number into a 48-bit packet
//! index estimate. [`ReplayWindow`] is the 64-entry bitmask behind the highest
//! accepted index, shared by the RTP and RTCP contexts.

use super::error::{Result, SrtpError};
use super::REPLAY_WINDOW_SIZE;

const SEQ_HALF: i32 = 1 << 15;

/// An estimated packet index: guessed ROC plus the received sequence number.
///
/// The ROC is signed because a packet from before a roll-over may guess
/// `roc - 1` while `roc` is still zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexGuess {
    pub roc: i64,
    pub seq: u16,
}

impl IndexGuess {
    /// `(roc << 16) | seq`, negative only when the guessed ROC is.
    pub fn index(&self) -> i64 {
        (self.roc << 16) | self.seq as i64
    }

    /// The guessed ROC as it goes on the wire, if it is a valid one.
    pub fn wire_roc(&self) -> Option<u32> {
        u32::try_from(self.roc).ok()
    }
}

/// Roll-over counter and highest received sequence number (`s_l`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SequenceState {
    roc: u32,
    highest_seq: u16,
    seq_num_set: bool,
}

impl SequenceState {
    pub fn new(roc: u32) -> Self {
        Self {
            roc,
            highest_seq: 0,
            seq_num_set: false,
        }
    }

    pub fn roc(&self) -> u32 {
        self.roc
    }

    pub fn set_roc(&mut self, roc: u32) {
        self.roc = roc;
    }

    pub fn highest_seq(&self) -> u16 {
        self.highest_seq
    }

    /// False until the first packet has been committed.
    pub fn is_started(&self) -> bool {
        self.seq_num_set
    }

    /// `s_l`, or `new_seq` itself before the first packet.
    fn effective_highest(&self, new_seq: u16) -> u16 {
        if self.seq_num_set {
            self.highest_seq
        } else {
            new_seq
        }
    }

    /// Estimate the index of `new_seq` (RFC 3711, Appendix A).
    pub fn guess(&self, new_seq: u16) -> IndexGuess {
        let s_l = self.effective_highest(new_seq) as i32;
        let seq = new_seq as i32;
        let roc = self.roc as i64;

        let guessed = if s_l < SEQ_HALF {
            if seq - s_l > SEQ_HALF {
                roc - 1
            } else {
                roc
            }
        } else if s_l - SEQ_HALF > seq {
            roc + 1
        } else {
            roc
        };
        IndexGuess {
            roc: guessed,
            seq: new_seq,
        }
    }

    /// Index of the highest packet accepted so far.
    pub fn local_index(&self) -> i64 {
        ((self.roc as i64) << 16) | self.highest_seq as i64
    }

    /// Signed distance from the highest accepted index to the guessed one.
    pub fn delta(&self, new_seq: u16) -> i64 {
        if !self.seq_num_set {
            return 0;
        }
        self.guess(new_seq).index() - self.local_index()
    }

    /// Commit an authenticated packet. Returns true when the ROC rolled over.
    ///
    /// `s_l` only moves forward within the current ROC, or jumps to
    /// `new_seq` on a roll-over.
    pub fn commit(&mut self, new_seq: u16) -> bool {
        let guess = self.guess(new_seq);
        if !self.seq_num_set {
            self.seq_num_set = true;
            self.highest_seq = new_seq;
            return false;
        }

        let roc = self.roc as i64;
        if guess.roc > roc {
            if let Some(next) = guess.wire_roc() {
                self.roc = next;
                self.highest_seq = new_seq;
                return true;
            }
        } else if guess.roc == roc && new_seq > self.highest_seq {
            self.highest_seq = new_seq;
        }
        false
    }
}

/// Bitmask of accepted indices: bit `i` is the packet `i` behind the highest one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayWindow {
    bitmap: u64,
}

impl ReplayWindow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bitmap(&self) -> u64 {
        self.bitmap
    }

    /// Classify a packet `delta` indices away from the highest accepted one.
    /// `index` is only used to describe the rejection.
    pub fn check(&self, delta: i64, index: u64) -> Result<()> {
        if delta > 0 {
            return Ok(());
        }
        let offset = delta.unsigned_abs();
        if offset >= REPLAY_WINDOW_SIZE {
            return Err(SrtpError::ReplayTooOld { index });
        }
        if self.bitmap & (1u64 << offset) != 0 {
            return Err(SrtpError::ReplayDuplicate { index });
        }
        Ok(())
    }

    /// Record an accepted packet.
    pub fn update(&mut self, delta: i64) {
        if delta > 0 {
            self.bitmap = if delta as u64 >= REPLAY_WINDOW_SIZE {
                0
            } else {
                self.bitmap << delta
            };
            self.bitmap |= 1;
        } else {
            let offset = delta.unsigned_abs();
            if offset < REPLAY_WINDOW_SIZE {
                self.bitmap |= 1u64 << offset;
            }
        }
    }
}
