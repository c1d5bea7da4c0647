//! Per-block encrypt-then-MAC codec with a chained IV.
//!
//! Each plaintext block is framed as `iv(16) ‖ ciphertext ‖ mac(32)`.
//! The IV is not random: it is the first 16 bytes of an HMAC-SHA-1 over
//! the previous chain state and the current plaintext, so identical
//! plaintext streams produce identical ciphertext streams while repeated
//! plaintext blocks still get distinct IVs. The chain seed is all zeros
//! and is part of the wire format.
//!
//! The MAC is HMAC-SHA-512 over `iv ‖ ciphertext`, truncated to its first
//! 32 bytes. Decryption verifies the MAC in constant time before touching
//! the cipher and never advances the chain; the framed IV on the wire is
//! self-describing.

use aes::Aes256;
use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use constant_time_eq::constant_time_eq;
use hmac::{Hmac, Mac};
use sha1::Sha1;
use sha2::Sha512;
use zeroize::Zeroize;

use super::secure::SecretBytes;
use super::{AES_BLOCK_SIZE, FILTER_BLOCK_SIZE, IV_CHAIN_WIDTH, IV_SIZE, KEY_SIZE, MAC_SIZE};
use crate::{Error, Result};

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;
type HmacSha1 = Hmac<Sha1>;
type HmacSha512 = Hmac<Sha512>;

/// Maximum framed size of a single block:
/// IV, a full plaintext block rounded up by padding, and the MAC.
pub const MAX_FRAME_SIZE: usize = IV_SIZE + FILTER_BLOCK_SIZE + AES_BLOCK_SIZE + MAC_SIZE;

/// Minimum framed size of a single block: IV, one cipher block, MAC.
pub const MIN_FRAME_SIZE: usize = IV_SIZE + AES_BLOCK_SIZE + MAC_SIZE;

/// Per-session block cipher and MAC state.
///
/// The 64-byte session key is split in half: bytes `[0..32)` key the HMAC
/// states (both the SHA-1 IV chain and the SHA-512 block MAC), bytes
/// `[32..64)` key AES-256. The codec owns the key for the session's
/// lifetime; it is wiped when the codec is dropped.
pub struct BlockCodec {
    key: SecretBytes,
    iv_chain: [u8; IV_CHAIN_WIDTH],
}

impl BlockCodec {
    /// Creates a codec from a 64-byte session key.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Crypto`] if the key is not [`KEY_SIZE`] bytes.
    pub fn new(key: SecretBytes) -> Result<Self> {
        if key.len() != KEY_SIZE {
            return Err(Error::Crypto(format!(
                "session key length {} (expected {})",
                key.len(),
                KEY_SIZE
            )));
        }
        Ok(Self {
            key,
            iv_chain: [0u8; IV_CHAIN_WIDTH],
        })
    }

    fn mac_key(&self) -> &[u8] {
        &self.key.as_slice()[..KEY_SIZE / 2]
    }

    fn aes_key(&self) -> &[u8] {
        &self.key.as_slice()[KEY_SIZE / 2..]
    }

    /// Returns the framed size a plaintext of `len` bytes encrypts to.
    pub fn framed_len(len: usize) -> usize {
        let padded = len + (AES_BLOCK_SIZE - len % AES_BLOCK_SIZE);
        IV_SIZE + padded + MAC_SIZE
    }

    /// Encrypts one plaintext block into `out`, returning the frame length.
    ///
    /// `plaintext` must be at most [`FILTER_BLOCK_SIZE`] bytes and `out`
    /// must have room for [`BlockCodec::framed_len`] of it. Advances the
    /// IV chain; on error the chain is left untouched and the session must
    /// be considered terminal.
    pub fn encrypt_block(&mut self, plaintext: &[u8], out: &mut [u8]) -> Result<usize> {
        debug_assert!(plaintext.len() <= FILTER_BLOCK_SIZE);
        let frame_len = Self::framed_len(plaintext.len());
        debug_assert!(out.len() >= frame_len);

        // Chain: HMAC-SHA-1(previous chain state ‖ plaintext)
        let mut prf = HmacSha1::new_from_slice(self.mac_key())
            .map_err(|e| Error::Crypto(e.to_string()))?;
        prf.update(&self.iv_chain);
        prf.update(plaintext);
        let chain = prf.finalize().into_bytes();

        let mut iv = [0u8; IV_SIZE];
        iv.copy_from_slice(&chain[..IV_SIZE]);

        let ct_len = frame_len - IV_SIZE - MAC_SIZE;
        out[..IV_SIZE].copy_from_slice(&iv);
        let ct_region = &mut out[IV_SIZE..IV_SIZE + ct_len];
        ct_region[..plaintext.len()].copy_from_slice(plaintext);

        let cipher = Aes256CbcEnc::new_from_slices(self.aes_key(), &iv)
            .map_err(|e| Error::Crypto(e.to_string()))?;
        cipher
            .encrypt_padded_mut::<Pkcs7>(ct_region, plaintext.len())
            .map_err(|e| Error::Crypto(e.to_string()))?;

        let mut mac = HmacSha512::new_from_slice(self.mac_key())
            .map_err(|e| Error::Crypto(e.to_string()))?;
        mac.update(&out[..IV_SIZE + ct_len]);
        let tag = mac.finalize().into_bytes();
        out[IV_SIZE + ct_len..frame_len].copy_from_slice(&tag[..MAC_SIZE]);

        // Only a fully encoded block advances the chain.
        self.iv_chain.copy_from_slice(&chain);
        Ok(frame_len)
    }

    /// Verifies and decrypts one framed block into `out`, returning the
    /// plaintext length.
    ///
    /// `out` must have room for `frame.len() - IV_SIZE - MAC_SIZE` bytes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AuthFailed`] on MAC mismatch (before any cipher
    /// work) and [`Error::DecryptFailed`] on a truncated or mispadded
    /// block. Both are terminal for the session.
    pub fn decrypt_block(&mut self, frame: &[u8], out: &mut [u8]) -> Result<usize> {
        if frame.len() < MIN_FRAME_SIZE {
            return Err(Error::DecryptFailed);
        }

        let (authed, tag) = frame.split_at(frame.len() - MAC_SIZE);
        let (iv, ciphertext) = authed.split_at(IV_SIZE);

        let mut mac = HmacSha512::new_from_slice(self.mac_key())
            .map_err(|e| Error::Crypto(e.to_string()))?;
        mac.update(authed);
        let expected = mac.finalize().into_bytes();
        if !constant_time_eq(&expected[..MAC_SIZE], tag) {
            return Err(Error::AuthFailed);
        }

        if ciphertext.len() % AES_BLOCK_SIZE != 0 {
            return Err(Error::DecryptFailed);
        }

        debug_assert!(out.len() >= ciphertext.len());
        let pt_region = &mut out[..ciphertext.len()];
        pt_region.copy_from_slice(ciphertext);

        let cipher = Aes256CbcDec::new_from_slices(self.aes_key(), iv)
            .map_err(|e| Error::Crypto(e.to_string()))?;
        let plaintext = cipher
            .decrypt_padded_mut::<Pkcs7>(pt_region)
            .map_err(|_| Error::DecryptFailed)?;
        Ok(plaintext.len())
    }
}

impl Drop for BlockCodec {
    fn drop(&mut self) {
        self.iv_chain.zeroize();
    }
}

impl std::fmt::Debug for BlockCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockCodec").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codec() -> BlockCodec {
        BlockCodec::new(SecretBytes::from_slice(&[0x11u8; KEY_SIZE])).unwrap()
    }

    #[test]
    fn test_new_rejects_short_key() {
        let err = BlockCodec::new(SecretBytes::from_slice(&[0u8; 32])).unwrap_err();
        assert!(matches!(err, Error::Crypto(_)));
    }

    #[test]
    fn test_framed_len_always_pads() {
        // Padding always adds at least one byte
        assert_eq!(BlockCodec::framed_len(0), IV_SIZE + 16 + MAC_SIZE);
        assert_eq!(BlockCodec::framed_len(12), IV_SIZE + 16 + MAC_SIZE);
        assert_eq!(BlockCodec::framed_len(16), IV_SIZE + 32 + MAC_SIZE);
        assert_eq!(
            BlockCodec::framed_len(FILTER_BLOCK_SIZE),
            IV_SIZE + FILTER_BLOCK_SIZE + AES_BLOCK_SIZE + MAC_SIZE
        );
    }

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let mut enc = codec();
        let mut dec = codec();

        let plaintext = b"hello, world";
        let mut frame = [0u8; MAX_FRAME_SIZE];
        let n = enc.encrypt_block(plaintext, &mut frame).unwrap();
        assert_eq!(n, 64);

        let mut out = [0u8; MAX_FRAME_SIZE];
        let m = dec.decrypt_block(&frame[..n], &mut out).unwrap();
        assert_eq!(&out[..m], plaintext);
    }

    #[test]
    fn test_chained_iv_is_deterministic() {
        let blocks: &[&[u8]] = &[b"first block", b"second block"];

        let run = || {
            let mut enc = codec();
            let mut all = Vec::new();
            let mut frame = [0u8; MAX_FRAME_SIZE];
            for b in blocks {
                let n = enc.encrypt_block(b, &mut frame).unwrap();
                all.extend_from_slice(&frame[..n]);
            }
            all
        };

        assert_eq!(run(), run());
    }

    #[test]
    fn test_repeated_plaintext_gets_distinct_ivs() {
        let mut enc = codec();
        let mut frame1 = [0u8; MAX_FRAME_SIZE];
        let mut frame2 = [0u8; MAX_FRAME_SIZE];
        enc.encrypt_block(b"same bytes", &mut frame1).unwrap();
        enc.encrypt_block(b"same bytes", &mut frame2).unwrap();
        assert_ne!(frame1[..IV_SIZE], frame2[..IV_SIZE]);
    }

    #[test]
    fn test_tampered_ciphertext_fails_auth() {
        let mut enc = codec();
        let mut dec = codec();

        let mut frame = [0u8; MAX_FRAME_SIZE];
        let n = enc.encrypt_block(&[0x41u8; 100], &mut frame).unwrap();
        frame[IV_SIZE + 3] ^= 0x01;

        let mut out = [0u8; MAX_FRAME_SIZE];
        let err = dec.decrypt_block(&frame[..n], &mut out).unwrap_err();
        assert!(matches!(err, Error::AuthFailed));
    }

    #[test]
    fn test_tampered_iv_fails_auth() {
        let mut enc = codec();
        let mut dec = codec();

        let mut frame = [0u8; MAX_FRAME_SIZE];
        let n = enc.encrypt_block(b"some plaintext", &mut frame).unwrap();
        frame[0] ^= 0x80;

        let mut out = [0u8; MAX_FRAME_SIZE];
        let err = dec.decrypt_block(&frame[..n], &mut out).unwrap_err();
        assert!(matches!(err, Error::AuthFailed));
    }

    #[test]
    fn test_wrong_key_fails_auth() {
        let mut enc = codec();
        let mut dec = BlockCodec::new(SecretBytes::from_slice(&[0x22u8; KEY_SIZE])).unwrap();

        let mut frame = [0u8; MAX_FRAME_SIZE];
        let n = enc.encrypt_block(b"some plaintext", &mut frame).unwrap();

        let mut out = [0u8; MAX_FRAME_SIZE];
        let err = dec.decrypt_block(&frame[..n], &mut out).unwrap_err();
        assert!(matches!(err, Error::AuthFailed));
    }

    #[test]
    fn test_short_frame_rejected() {
        let mut dec = codec();
        let mut out = [0u8; MAX_FRAME_SIZE];
        let err = dec
            .decrypt_block(&[0u8; MIN_FRAME_SIZE - 1], &mut out)
            .unwrap_err();
        assert!(matches!(err, Error::DecryptFailed));
    }

    #[test]
    fn test_decrypt_does_not_advance_chain() {
        let mut enc = codec();
        let mut frame1 = [0u8; MAX_FRAME_SIZE];
        let mut frame2 = [0u8; MAX_FRAME_SIZE];
        let n1 = enc.encrypt_block(b"block one", &mut frame1).unwrap();
        let n2 = enc.encrypt_block(b"block two", &mut frame2).unwrap();

        // A decoder can process frames in any grouping without replaying
        // the producer chain, because each frame carries its IV.
        let mut dec = codec();
        let mut out = [0u8; MAX_FRAME_SIZE];
        let m2 = dec.decrypt_block(&frame2[..n2], &mut out).unwrap();
        assert_eq!(&out[..m2], b"block two");
        let m1 = dec.decrypt_block(&frame1[..n1], &mut out).unwrap();
        assert_eq!(&out[..m1], b"block one");
    }
}
