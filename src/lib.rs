//! # volcrypt
//!
//! A streaming AES-256 encryption filter for content-storage volumes.
//!
//! Files uploaded to a volume pass through this filter and come out as a
//! sequence of framed blocks, each `iv(16) ‖ ciphertext ‖ mac(32)`:
//! AES-256-CBC for confidentiality, HMAC-SHA-512 truncated to 256 bits
//! for authenticity, encrypt-then-MAC per block. Downloads verify and
//! strip the framing. The per-block IV is not random but chained: an
//! HMAC-SHA-1 of the previous chain state and the current plaintext, so
//! identical streams encrypt identically while repeated blocks still get
//! unique IVs.
//!
//! The volume key is derived from a password (bcrypt, then SHA-512 over
//! the textual hash), verified against a salted fingerprint stored with
//! the volume, and cached locally between sessions. A published
//! fingerprint copy in the volume's custom metadata detects password
//! rotation by other clients and invalidates the local cache before it
//! can be misused.
//!
//! ## Driving a session
//!
//! The host calls [`process`][Session::process] with whatever input and
//! output buffers it has, passing back the [`Action`] returned by the
//! previous call. [`Action::Repeat`] means "call me again with the same
//! input"; [`Action::DataEnd`] is returned exactly once, after the last
//! byte of the stream has surfaced.
//!
//! ```rust,no_run
//! use std::collections::HashMap;
//! use std::path::Path;
//! use volcrypt::{Action, Aes256Filter, Mode, TerminalPrompt};
//!
//! fn main() -> volcrypt::Result<()> {
//!     let mut meta: HashMap<String, Vec<u8>> = HashMap::new();
//!     let mut prompt = TerminalPrompt;
//!     let mut session = Aes256Filter::data_prepare(
//!         Mode::Upload,
//!         "report.pdf",
//!         None,
//!         Path::new("/var/lib/client/volumes/projects"),
//!         &mut meta,
//!         &mut prompt,
//!     )?;
//!
//!     let plaintext = std::fs::read("report.pdf")?;
//!     let mut out = vec![0u8; 65536];
//!     let mut action = Action::DataEnd; // the whole file fits one buffer
//!     loop {
//!         let (n, next) = session.process(&plaintext, &mut out, action)?;
//!         // ship out[..n] to the volume
//!         let _ = &out[..n];
//!         match next {
//!             Action::Repeat => action = Action::Repeat,
//!             _ => break,
//!         }
//!     }
//!     session.finish();
//!     Ok(())
//! }
//! ```
//!
//! ## Error handling
//!
//! All fallible operations return [`Result<T>`]. Setup problems (bad
//! volume configuration, wrong password, failed key derivation) surface
//! from `data_prepare`; tampered or foreign ciphertext surfaces from
//! `process` as [`Error::AuthFailed`] and latches the session. Key-cache
//! I/O never fails a session: it degrades to "no cache" with a warning.
//!
//! ## Scope
//!
//! The filter is a data-path cipher, not a key-exchange protocol: there
//! is no format versioning, no random-access decryption (streams are
//! strictly sequential) and no forward secrecy. Host concerns (the filter
//! registry, prompt UI and the volume metadata service) are consumed
//! through the [`host`] traits.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_op_in_unsafe_fn)]

pub mod config;
pub mod crypto;
pub mod error;
pub mod filter;
pub mod host;
pub mod session;

pub use config::{KeyPolicy, VolumeOptions};
pub use crypto::{
    FILTER_BLOCK_SIZE, FINGERPRINT_SIZE, KEY_SIZE, MAC_SIZE, MIN_PASSWORD_LEN, Password, SALT_SIZE,
};
pub use error::{Error, Result};
pub use filter::{Action, Aes256Filter, FILTER_INFO, FilterInfo, FilterType, Mode};
pub use host::{MetaStore, PasswordPrompt, TerminalPrompt};
pub use session::{META_FINGERPRINT_KEY, Session};
