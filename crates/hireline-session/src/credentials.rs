//! The credential store.
//!
//! Credentials live in two ownership domains:
//!
//! - [`AccessTokenSlot`]: the bearer token, held in memory only and gone
//!   after a restart
//! - [`PersistedIdentity`]: the account identity, written through to an
//!   [`IdentityStore`] so it survives a restart
//!
//! [`CredentialStore`] owns one of each and only reports the session as
//! authenticated when both are present.

use std::fmt;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use hireline_core::{Identity, RoleSet};
use hireline_http::TokenSource;

use crate::error::Result;

/// A bearer token. Its `Debug` output is redacted.
#[derive(Clone, PartialEq, Eq)]
pub struct BearerToken(String);

impl BearerToken {
    /// Wrap a token string.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Return the token string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BearerToken(<redacted>)")
    }
}

/// In-memory slot for the bearer token. Never persisted.
#[derive(Debug, Default)]
pub struct AccessTokenSlot {
    token: Option<BearerToken>,
}

impl AccessTokenSlot {
    fn get(&self) -> Option<&BearerToken> {
        self.token.as_ref()
    }

    fn set(&mut self, token: BearerToken) {
        self.token = Some(token);
    }

    fn clear(&mut self) {
        self.token = None;
    }
}

/// Backing storage for the identity half of the credential.
pub trait IdentityStore: Send + Sync {
    /// Load the persisted identity, if one exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage cannot be read or holds a corrupt document.
    fn load(&self) -> Result<Option<Identity>>;

    /// Persist the identity, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage cannot be written.
    fn save(&self, identity: &Identity) -> Result<()>;

    /// Remove the persisted identity. Removing nothing is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage cannot be written.
    fn clear(&self) -> Result<()>;
}

/// Identity storage backed by a JSON file.
#[derive(Debug, Clone)]
pub struct FileIdentityStore {
    path: PathBuf,
}

impl FileIdentityStore {
    /// Store the identity at `path`. Parent directories are created on save.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Get the file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(std::ffi::OsStr::to_os_string)
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl IdentityStore for FileIdentityStore {
    fn load(&self) -> Result<Option<Identity>> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    fn save(&self, identity: &Identity) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        // Write then rename so a crash never leaves a half-written identity.
        let temp = self.temp_path();
        {
            let mut file = fs::File::create(&temp)?;
            serde_json::to_writer(&mut file, identity)?;
            file.flush()?;
        }
        fs::rename(&temp, &self.path)?;
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Identity storage that lives only as long as the process.
#[derive(Debug, Default)]
pub struct MemoryIdentityStore {
    identity: Mutex<Option<Identity>>,
}

impl MemoryIdentityStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that already holds an identity, as after a restart.
    #[must_use]
    pub fn with_identity(identity: Identity) -> Self {
        Self {
            identity: Mutex::new(Some(identity)),
        }
    }
}

impl IdentityStore for MemoryIdentityStore {
    fn load(&self) -> Result<Option<Identity>> {
        Ok(self.identity.lock().clone())
    }

    fn save(&self, identity: &Identity) -> Result<()> {
        *self.identity.lock() = Some(identity.clone());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self.identity.lock() = None;
        Ok(())
    }
}

/// The identity half of the credential, written through to its backing store.
pub struct PersistedIdentity {
    current: Option<Identity>,
    backing: Arc<dyn IdentityStore>,
}

impl PersistedIdentity {
    fn open(backing: Arc<dyn IdentityStore>) -> Self {
        let current = match backing.load() {
            Ok(identity) => identity,
            Err(err) => {
                tracing::warn!(error = %err, "Discarding unreadable persisted identity");
                if let Err(err) = backing.clear() {
                    tracing::warn!(error = %err, "Failed to remove unreadable identity");
                }
                None
            }
        };
        Self { current, backing }
    }

    fn get(&self) -> Option<&Identity> {
        self.current.as_ref()
    }

    // Persistence failures never block the in-memory update.
    fn set(&mut self, identity: Identity) {
        if let Err(err) = self.backing.save(&identity) {
            tracing::warn!(error = %err, "Failed to persist identity");
        }
        self.current = Some(identity);
    }

    fn clear(&mut self) {
        if let Err(err) = self.backing.clear() {
            tracing::warn!(error = %err, "Failed to remove persisted identity");
        }
        self.current = None;
    }
}

impl fmt::Debug for PersistedIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PersistedIdentity")
            .field("current", &self.current)
            .finish_non_exhaustive()
    }
}

/// A point-in-time copy of both credential halves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    /// The in-memory bearer token.
    pub bearer_token: Option<BearerToken>,
    /// The persisted identity.
    pub identity: Option<Identity>,
}

impl Credential {
    /// Both halves present.
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        self.bearer_token.is_some() && self.identity.is_some()
    }
}

#[derive(Debug)]
struct Domains {
    token: AccessTokenSlot,
    identity: PersistedIdentity,
}

/// Holds the bearer token and the identity of the signed-in account.
///
/// Both halves sit behind one lock so that `set_auth` and `clear_auth` are
/// observed atomically.
#[derive(Debug)]
pub struct CredentialStore {
    domains: RwLock<Domains>,
}

impl CredentialStore {
    /// Open the store over a persistence backend.
    ///
    /// The identity is loaded from the backend; the token always starts absent.
    #[must_use]
    pub fn open(backing: Arc<dyn IdentityStore>) -> Self {
        Self {
            domains: RwLock::new(Domains {
                token: AccessTokenSlot::default(),
                identity: PersistedIdentity::open(backing),
            }),
        }
    }

    /// A store with no persistence beyond the process.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::open(Arc::new(MemoryIdentityStore::new()))
    }

    /// Set both halves at once.
    pub fn set_auth(&self, token: impl Into<String>, identity: Identity) {
        let mut domains = self.domains.write();
        domains.token.set(BearerToken::new(token));
        domains.identity.set(identity);
        tracing::debug!("Credentials set");
    }

    /// Clear both halves.
    pub fn clear_auth(&self) {
        let mut domains = self.domains.write();
        domains.token.clear();
        domains.identity.clear();
        tracing::debug!("Credentials cleared");
    }

    /// Replace only the bearer token.
    pub fn update_access_token(&self, token: impl Into<String>) {
        self.domains.write().token.set(BearerToken::new(token));
    }

    /// Replace the identity's roles with the server-confirmed set.
    ///
    /// Returns `false` and changes nothing when there is no identity.
    pub fn update_roles(&self, roles: RoleSet) -> bool {
        let mut domains = self.domains.write();
        let Some(mut identity) = domains.identity.get().cloned() else {
            return false;
        };
        identity.roles = roles;
        domains.identity.set(identity);
        tracing::debug!("Identity roles replaced");
        true
    }

    /// Returns `true` only when both the token and the identity are present.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        let domains = self.domains.read();
        domains.token.get().is_some() && domains.identity.get().is_some()
    }

    /// The current bearer token.
    #[must_use]
    pub fn access_token(&self) -> Option<BearerToken> {
        self.domains.read().token.get().cloned()
    }

    /// The current identity, which may be present without a token after a restart.
    #[must_use]
    pub fn identity(&self) -> Option<Identity> {
        self.domains.read().identity.get().cloned()
    }

    /// Roles of the authenticated account; empty unless authenticated.
    #[must_use]
    pub fn roles(&self) -> RoleSet {
        let domains = self.domains.read();
        match (domains.token.get(), domains.identity.get()) {
            (Some(_), Some(identity)) => identity.roles.clone(),
            _ => RoleSet::new(),
        }
    }

    /// Copy both halves under one read lock.
    #[must_use]
    pub fn snapshot(&self) -> Credential {
        let domains = self.domains.read();
        Credential {
            bearer_token: domains.token.get().cloned(),
            identity: domains.identity.get().cloned(),
        }
    }
}

impl TokenSource for CredentialStore {
    fn bearer_token(&self) -> Option<String> {
        self.access_token().map(|t| t.as_str().to_string())
    }
}
