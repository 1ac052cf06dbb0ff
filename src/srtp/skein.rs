//! Skein-512-MAC (Skein 1.3, keyed UBI chaining over Threefish-512).
//!
//! Only the single-output-block form is needed: tags are at most 64 bytes.

use threefish::Threefish512;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use super::error::{Result, SrtpError};

const STATE_WORDS: usize = 8;
const BLOCK_BYTES: usize = 64;

// UBI block types
const TYPE_KEY: u64 = 0;
const TYPE_CFG: u64 = 4;
const TYPE_MSG: u64 = 48;
const TYPE_OUT: u64 = 63;

const FLAG_FIRST: u64 = 1 << 62;
const FLAG_FINAL: u64 = 1 << 63;

const SCHEMA_ID: &[u8; 4] = b"SHA3";
const SCHEMA_VERSION: u16 = 1;

/// A keyed Skein-512 MAC with a fixed output length.
///
/// The chaining value after the key and configuration blocks is computed
/// once; every tag starts from it.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SkeinMac {
    chain: [u64; STATE_WORDS],
    output_len: usize,
}

impl SkeinMac {
    /// `output_len` is in bytes, 1..=64.
    pub fn new(key: &[u8], output_len: usize) -> Result<Self> {
        if output_len == 0 || output_len > BLOCK_BYTES {
            return Err(SrtpError::InvalidKeyLength {
                what: "Skein MAC output",
                len: output_len,
            });
        }

        let mut chain = [0u64; STATE_WORDS];
        if !key.is_empty() {
            Ubi::new(&mut chain, TYPE_KEY).absorb(key).finish();
        }

        let mut config = [0u8; 32];
        config[..4].copy_from_slice(SCHEMA_ID);
        config[4..6].copy_from_slice(&SCHEMA_VERSION.to_le_bytes());
        config[8..16].copy_from_slice(&((output_len as u64) * 8).to_le_bytes());
        Ubi::new(&mut chain, TYPE_CFG).absorb(&config).finish();

        Ok(Self { chain, output_len })
    }

    pub fn output_len(&self) -> usize {
        self.output_len
    }

    /// MAC over the concatenation of `chunks`, written to `out[..output_len]`.
    pub fn compute(&self, chunks: &[&[u8]], out: &mut [u8]) -> Result<()> {
        if out.len() < self.output_len {
            return Err(SrtpError::TagBufferTooSmall {
                len: out.len(),
                need: self.output_len,
            });
        }

        let mut chain = Zeroizing::new(self.chain);
        let mut msg = Ubi::new(&mut chain, TYPE_MSG);
        for chunk in chunks {
            msg = msg.absorb(chunk);
        }
        msg.finish();
        Ubi::new(&mut chain, TYPE_OUT)
            .absorb(&0u64.to_le_bytes())
            .finish();

        let mut bytes = Zeroizing::new([0u8; BLOCK_BYTES]);
        for (dst, word) in bytes.chunks_exact_mut(8).zip(chain.iter()) {
            dst.copy_from_slice(&word.to_le_bytes());
        }
        out[..self.output_len].copy_from_slice(&bytes[..self.output_len]);
        Ok(())
    }
}

/// One UBI invocation: G' = UBI(G, M, T).
struct Ubi<'a> {
    chain: &'a mut [u64; STATE_WORDS],
    block: [u8; BLOCK_BYTES],
    fill: usize,
    position: u64,
    first: bool,
    block_type: u64,
}

impl<'a> Ubi<'a> {
    fn new(chain: &'a mut [u64; STATE_WORDS], block_type: u64) -> Self {
        Self {
            chain,
            block: [0u8; BLOCK_BYTES],
            fill: 0,
            position: 0,
            first: true,
            block_type,
        }
    }

    fn absorb(mut self, mut data: &[u8]) -> Self {
        while !data.is_empty() {
            // A full block is only processed once more input shows it is not the last.
            if self.fill == BLOCK_BYTES {
                self.process(false);
            }
            let take = (BLOCK_BYTES - self.fill).min(data.len());
            self.block[self.fill..self.fill + take].copy_from_slice(&data[..take]);
            self.fill += take;
            data = &data[take..];
        }
        self
    }

    fn finish(mut self) {
        self.block[self.fill..].fill(0);
        self.process(true);
        self.block.zeroize();
    }

    fn process(&mut self, last: bool) {
        self.position += self.fill as u64;
        let mut tweak_hi = self.block_type << 56;
        if self.first {
            tweak_hi |= FLAG_FIRST;
        }
        if last {
            tweak_hi |= FLAG_FINAL;
        }

        let mut words = [0u64; STATE_WORDS];
        for (w, chunk) in words.iter_mut().zip(self.block.chunks_exact(8)) {
            let mut le = [0u8; 8];
            le.copy_from_slice(chunk);
            *w = u64::from_le_bytes(le);
        }

        let cipher = Threefish512::new_with_tweak_u64(&*self.chain, &[self.position, tweak_hi]);
        let mut out = words;
        cipher.encrypt_block_u64(&mut out);
        for (c, (o, m)) in self.chain.iter_mut().zip(out.iter().zip(words.iter())) {
            *c = o ^ m;
        }

        words.zeroize();
        out.zeroize();
        self.block = [0u8; BLOCK_BYTES];
        self.fill = 0;
        self.first = false;
    }
}
