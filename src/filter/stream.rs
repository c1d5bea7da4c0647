//! The streaming pump between host buffers and the block codec.
//!
//! The host hands the filter input and output buffers of whatever sizes
//! it happens to have. This module bridges them to the fixed block size
//! the codec wants: input bytes are staged into a fixed-capacity window
//! until a full block (or the end of the stream) triggers the codec, and
//! codec output is held in a second window that drains into the caller's
//! buffer across as many `Repeat` rounds as its capacity requires.
//!
//! Block sizes differ by direction. Uploads stage
//! [`FILTER_BLOCK_SIZE`] plaintext bytes per codec call; downloads stage
//! one full framed block ([`MAX_FRAME_SIZE`]), which works because every
//! frame except the last is exactly that size.

use zeroize::Zeroize;

use super::{Action, Mode};
use crate::crypto::codec::{BlockCodec, MAX_FRAME_SIZE};
use crate::crypto::FILTER_BLOCK_SIZE;
use crate::{Error, Result};

/// Cipher faults latch the session; the kind is kept so repeated calls
/// fail with the same error.
#[derive(Debug, Clone, Copy)]
enum Fault {
    Auth,
    Decrypt,
}

impl Fault {
    fn to_error(self) -> Error {
        match self {
            Fault::Auth => Error::AuthFailed,
            Fault::Decrypt => Error::DecryptFailed,
        }
    }
}

/// Per-session streaming state.
pub(crate) struct StreamFilter {
    mode: Mode,
    codec: BlockCodec,
    /// Staging window for input toward the next codec call.
    in_buf: Box<[u8]>,
    /// Codec output awaiting emission.
    out_buf: Box<[u8]>,
    /// Live bytes in `in_buf`.
    in_bytes: usize,
    /// Live bytes in `out_buf`.
    blk_bytes: usize,
    /// Bytes of the current caller input already consumed.
    data_in: usize,
    /// Bytes of `out_buf` not yet emitted.
    data_out_left: usize,
    /// Latched once the host signals the end of the stream.
    data_end: bool,
    fault: Option<Fault>,
}

impl StreamFilter {
    pub(crate) fn new(mode: Mode, codec: BlockCodec) -> Self {
        Self {
            mode,
            codec,
            in_buf: vec![0u8; MAX_FRAME_SIZE].into_boxed_slice(),
            out_buf: vec![0u8; MAX_FRAME_SIZE].into_boxed_slice(),
            in_bytes: 0,
            blk_bytes: 0,
            data_in: 0,
            data_out_left: 0,
            data_end: false,
            fault: None,
        }
    }

    fn block_size(&self) -> usize {
        match self.mode {
            Mode::Upload => FILTER_BLOCK_SIZE,
            Mode::Download => MAX_FRAME_SIZE,
        }
    }

    /// One pump round. Returns the bytes written into `output` and the
    /// action the host must pass back on its next call.
    pub(crate) fn process(
        &mut self,
        input: &[u8],
        output: &mut [u8],
        action: Action,
    ) -> Result<(usize, Action)> {
        if let Some(fault) = self.fault {
            return Err(fault.to_error());
        }

        // Drain output left over from a previous short write.
        if action == Action::Repeat && self.data_out_left > 0 {
            let n = output.len().min(self.data_out_left);
            let start = self.blk_bytes - self.data_out_left;
            output[..n].copy_from_slice(&self.out_buf[start..start + n]);
            self.data_out_left -= n;

            let mut next = Action::Repeat;
            if self.data_out_left == 0 {
                self.blk_bytes = 0;
                if self.data_in == input.len() {
                    self.data_in = 0;
                    next = self.end_or_normal();
                }
            }
            return Ok((n, next));
        }

        if action == Action::DataEnd {
            self.data_end = true;
        }

        // Stage input toward the next full block.
        let bsize = self.block_size();
        let take = (input.len() - self.data_in).min(bsize - self.in_bytes);
        self.in_buf[self.in_bytes..self.in_bytes + take]
            .copy_from_slice(&input[self.data_in..self.data_in + take]);
        self.in_bytes += take;
        self.data_in += take;

        if self.in_bytes == bsize || (self.in_bytes > 0 && self.data_end) {
            self.blk_bytes = self.run_codec()?;
            self.in_bytes = 0;

            if self.blk_bytes <= output.len() {
                output[..self.blk_bytes].copy_from_slice(&self.out_buf[..self.blk_bytes]);
                let written = self.blk_bytes;
                self.blk_bytes = 0;

                let next = if self.data_in == input.len() {
                    self.data_in = 0;
                    self.end_or_normal()
                } else {
                    Action::Repeat
                };
                return Ok((written, next));
            }

            // Output window exceeds the caller's buffer; emit what fits
            // and keep the rest for the Repeat rounds.
            let cap = output.len();
            output.copy_from_slice(&self.out_buf[..cap]);
            self.data_out_left = self.blk_bytes - cap;
            return Ok((cap, Action::Repeat));
        }

        // Starved: everything staged, no block to run yet.
        self.data_in = 0;
        Ok((0, Action::Normal))
    }

    fn end_or_normal(&self) -> Action {
        if self.data_end {
            Action::DataEnd
        } else {
            Action::Normal
        }
    }

    fn run_codec(&mut self) -> Result<usize> {
        let staged = &self.in_buf[..self.in_bytes];
        let result = match self.mode {
            Mode::Upload => self.codec.encrypt_block(staged, &mut self.out_buf),
            Mode::Download => self.codec.decrypt_block(staged, &mut self.out_buf),
        };
        match result {
            Ok(n) => Ok(n),
            Err(e) => {
                match e {
                    Error::AuthFailed => self.fault = Some(Fault::Auth),
                    Error::DecryptFailed => self.fault = Some(Fault::Decrypt),
                    _ => {}
                }
                Err(e)
            }
        }
    }
}

impl Drop for StreamFilter {
    fn drop(&mut self) {
        // The windows hold plaintext; wipe them with the session.
        self.in_buf.zeroize();
        self.out_buf.zeroize();
    }
}

impl std::fmt::Debug for StreamFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamFilter")
            .field("mode", &self.mode)
            .field("in_bytes", &self.in_bytes)
            .field("blk_bytes", &self.blk_bytes)
            .field("data_end", &self.data_end)
            .finish_non_exhaustive()
    }
}
