//! Locked memory for key material.
//!
//! Secrets held by a session (the 64-byte volume key, password bytes) must
//! not reach swap while they are live. [`SecretBytes`] pins its pages with
//! `mlock(2)` on Unix for the lifetime of the buffer and wipes the contents
//! before unlocking and releasing them, on every exit path.
//!
//! On platforms without `mlock` the buffer still zeroises on drop; the
//! missing page pinning is logged once per buffer as a warning.

use zeroize::Zeroize;

/// A heap buffer for secret bytes.
///
/// The backing pages are locked against paging while the buffer is alive.
/// Dropping the buffer wipes it and then unlocks the pages, in that order.
pub struct SecretBytes {
    buf: Box<[u8]>,
    locked: bool,
}

impl SecretBytes {
    /// Creates a zero-filled secret buffer of the given length.
    pub fn zeroed(len: usize) -> Self {
        let buf = vec![0u8; len].into_boxed_slice();
        let locked = lock_pages(&buf);
        Self { buf, locked }
    }

    /// Creates a secret buffer holding a copy of `bytes`.
    ///
    /// The copy is locked; the caller remains responsible for wiping the
    /// source.
    pub fn from_slice(bytes: &[u8]) -> Self {
        let mut secret = Self::zeroed(bytes.len());
        secret.buf.copy_from_slice(bytes);
        secret
    }

    /// Returns the secret bytes.
    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    /// Returns the secret bytes mutably.
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.buf
    }

    /// Returns the buffer length in bytes.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Returns true if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Returns true if the backing pages are pinned against swap.
    pub fn is_locked(&self) -> bool {
        self.locked
    }
}

impl Drop for SecretBytes {
    fn drop(&mut self) {
        // Wipe before the pages become swappable again.
        self.buf.zeroize();
        if self.locked {
            unlock_pages(&self.buf);
        }
    }
}

impl std::fmt::Debug for SecretBytes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretBytes")
            .field("len", &self.buf.len())
            .field("locked", &self.locked)
            .finish()
    }
}

#[cfg(unix)]
fn lock_pages(buf: &[u8]) -> bool {
    if buf.is_empty() {
        return false;
    }
    let ok = unsafe { libc::mlock(buf.as_ptr() as *const libc::c_void, buf.len()) == 0 };
    if !ok {
        log::warn!(
            "aes256: cannot lock {} bytes of key material in memory: {}",
            buf.len(),
            std::io::Error::last_os_error()
        );
    }
    ok
}

#[cfg(unix)]
fn unlock_pages(buf: &[u8]) {
    unsafe {
        libc::munlock(buf.as_ptr() as *const libc::c_void, buf.len());
    }
}

#[cfg(not(unix))]
fn lock_pages(buf: &[u8]) -> bool {
    if !buf.is_empty() {
        log::warn!("aes256: memory locking is not available on this platform");
    }
    false
}

#[cfg(not(unix))]
fn unlock_pages(_buf: &[u8]) {}
