//! Identity resolution for remote authentication.

use parking_lot::RwLock;

/// Credentials presented to the remote service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Stable account identifier.
    pub account: String,
    /// Bearer token sent with every request.
    pub token: String,
}

impl Identity {
    /// Creates an identity.
    pub fn new(account: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            account: account.into(),
            token: token.into(),
        }
    }
}

/// Source of the current identity.
///
/// `resolve` answers from whatever session state the host owns; `None`
/// means no identity is available and a sync pass must not start. Caching
/// is the provider's concern, not the caller's: see [`MemoizedIdentity`].
pub trait IdentityProvider: Send + Sync {
    /// The current identity, or `None` when signed out.
    fn resolve(&self) -> Option<Identity>;

    /// Drops any cached identity so the next `resolve` consults the source.
    ///
    /// The engine calls this when the remote rejects credentials. The
    /// default does nothing.
    fn invalidate(&self) {}
}

/// A provider with a fixed identity, for tests and single-account hosts.
#[derive(Debug, Clone)]
pub struct StaticIdentity {
    identity: Identity,
}

impl StaticIdentity {
    /// Creates a provider that always resolves `identity`.
    pub fn new(identity: Identity) -> Self {
        Self { identity }
    }
}

impl IdentityProvider for StaticIdentity {
    fn resolve(&self) -> Option<Identity> {
        Some(self.identity.clone())
    }
}

/// A provider that is always signed out.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoIdentity;

impl IdentityProvider for NoIdentity {
    fn resolve(&self) -> Option<Identity> {
        None
    }
}

/// Memoizes the first successful answer from a fallible source.
///
/// The source is typically a session lookup that is expensive or that fails
/// while a login is still in flight. A successful answer is cached until
/// [`invalidate`](IdentityProvider::invalidate) clears it; failed lookups
/// are not cached, so the source is consulted again on the next resolve.
pub struct MemoizedIdentity<F> {
    source: F,
    cached: RwLock<Option<Identity>>,
}

impl<F> MemoizedIdentity<F>
where
    F: Fn() -> Option<Identity>,
{
    /// Creates a memoizing provider over `source`.
    pub fn new(source: F) -> Self {
        Self {
            source,
            cached: RwLock::new(None),
        }
    }
}

impl<F> IdentityProvider for MemoizedIdentity<F>
where
    F: Fn() -> Option<Identity> + Send + Sync,
{
    fn resolve(&self) -> Option<Identity> {
        if let Some(identity) = self.cached.read().clone() {
            return Some(identity);
        }
        let fresh = (self.source)();
        if let Some(identity) = &fresh {
            *self.cached.write() = Some(identity.clone());
        }
        fresh
    }

    fn invalidate(&self) {
        *self.cached.write() = None;
    }
}
