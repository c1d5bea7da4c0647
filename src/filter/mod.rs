//! The host-facing stream filter.
//!
//! The filter registers with the host as a `CRYPT`-type stream filter and
//! lives on the prepare/finish axis: `init` and `shutdown` are trivial,
//! while [`data_prepare`][Aes256Filter::data_prepare] establishes a
//! [`Session`] whose [`process`][Session::process] pumps file data through
//! the cipher and whose [`finish`][Session::finish] wipes and releases it.
//!
//! The host drives `process` with an [`Action`] signal it echoes back from
//! the previous call, which lets the filter consume and produce through
//! arbitrarily sized buffers.

pub(crate) mod stream;

use std::path::Path;

use crate::Result;
use crate::host::{MetaStore, PasswordPrompt};
use crate::session::Session;

/// Stable identity of this filter towards the host registry.
#[derive(Debug, Clone, Copy)]
pub struct FilterInfo {
    /// Filter class.
    pub filter_type: FilterType,
    /// Stable registration UUID.
    pub uuid: &'static str,
    /// Short name used in volume configuration.
    pub name: &'static str,
    /// Human-readable summary.
    pub description: &'static str,
    /// ABI compatibility version as `(major, minor)`.
    pub abi_version: (u32, u32),
}

/// Filter classes known to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterType {
    /// Encryption/decryption filters.
    Crypt,
}

/// Registration record for the AES-256 filter.
pub const FILTER_INFO: FilterInfo = FilterInfo {
    filter_type: FilterType::Crypt,
    uuid: "35a5404d-1513-4009-904c-6ee5b0cd8634",
    name: "aes256",
    description: "Encrypt files with AES-256-CBC, authenticated with HMAC-SHA-512",
    abi_version: (1, 6),
};

/// Direction of the data flowing through a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Plaintext in, framed ciphertext out.
    Upload,
    /// Framed ciphertext in, plaintext out.
    Download,
}

/// Continuation signal exchanged with the host on every `process` call.
///
/// The host passes in the value returned by the previous call (`Normal`
/// for the first call of a buffer, `DataEnd` when the input stream is
/// exhausted) and the filter returns the value to pass next time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Feed the next input buffer.
    Normal,
    /// Call again with the same input buffer: the filter still has input
    /// to consume or output to drain.
    Repeat,
    /// The stream is complete; emitted exactly once, after all data has
    /// surfaced.
    DataEnd,
}

/// The AES-256 stream filter.
///
/// A unit type carrying the five host entry points. All per-file state
/// lives in the [`Session`] returned by
/// [`data_prepare`][Self::data_prepare].
#[derive(Debug, Default)]
pub struct Aes256Filter;

impl Aes256Filter {
    /// Host `init` entry point. The filter keeps no global state.
    pub fn init() -> Result<()> {
        Ok(())
    }

    /// Host `shutdown` entry point.
    pub fn shutdown() {}

    /// Host `data_prepare` entry point: establishes a session for one file.
    ///
    /// # Arguments
    ///
    /// * `mode` - transfer direction
    /// * `filename` - name of the file being transferred (for prompts and
    ///   logging only)
    /// * `cfgdata` - configuration bytes stored with the volume, if any
    /// * `cfgdir` - per-volume local state directory (key cache lives here)
    /// * `meta` - the volume's custom metadata store
    /// * `prompt` - interactive password entry
    ///
    /// # Errors
    ///
    /// Any error here is fatal for the transfer; see [`crate::Error`].
    pub fn data_prepare(
        mode: Mode,
        filename: &str,
        cfgdata: Option<&[u8]>,
        cfgdir: &Path,
        meta: &mut dyn MetaStore,
        prompt: &mut dyn PasswordPrompt,
    ) -> Result<Session> {
        Session::prepare(mode, filename, cfgdata, cfgdir, meta, prompt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_identity() {
        assert_eq!(FILTER_INFO.name, "aes256");
        assert_eq!(FILTER_INFO.uuid, "35a5404d-1513-4009-904c-6ee5b0cd8634");
        assert_eq!(FILTER_INFO.abi_version, (1, 6));
        assert_eq!(FILTER_INFO.filter_type, FilterType::Crypt);
    }

    #[test]
    fn test_trivial_entry_points() {
        Aes256Filter::init().unwrap();
        Aes256Filter::shutdown();
    }
}
