//! Visibility & ownership policy.
//!
//! Every read and every mutation of authored content (articles, reviews)
//! goes through the functions in this module. The caller's identity is
//! always passed in explicitly; nothing here looks at request state.
//!
//! Rules:
//! - Published content is readable by anyone.
//! - A draft is readable only by its author.
//! - Only the author may update or delete, and a missing identity is
//!   reported separately from a wrong one.

use crate::auth::Identity;

/// Authored
///
/// Implemented by any resource that has an author and a published flag.
pub trait Authored {
    fn is_published(&self) -> bool;
    fn author_email(&self) -> &str;
}

/// PolicyError
///
/// Why a mutation was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PolicyError {
    /// No identity was presented.
    #[error("authentication required")]
    Unauthorized,
    /// An identity was presented but it is not the author's.
    #[error("only the author may modify this resource")]
    Forbidden,
}

/// Visibility
///
/// The set of content a caller may observe, in a form list queries can
/// translate into a filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Visibility {
    /// Anonymous callers: published content only.
    PublishedOnly,
    /// Signed-in callers: published content plus their own drafts.
    PublishedOrAuthoredBy(String),
}

impl Visibility {
    pub fn for_caller(caller: Option<&Identity>) -> Self {
        match caller {
            Some(identity) => Visibility::PublishedOrAuthoredBy(identity.email.clone()),
            None => Visibility::PublishedOnly,
        }
    }

    /// Whether a resource with these attributes falls inside the scope.
    pub fn admits(&self, published: bool, author_email: &str) -> bool {
        if published {
            return true;
        }
        match self {
            Visibility::PublishedOnly => false,
            Visibility::PublishedOrAuthoredBy(email) => email == author_email,
        }
    }

    /// The email whose drafts are visible, if any.
    pub fn draft_owner(&self) -> Option<&str> {
        match self {
            Visibility::PublishedOnly => None,
            Visibility::PublishedOrAuthoredBy(email) => Some(email.as_str()),
        }
    }
}

/// can_read
///
/// Published resources are readable by everyone; drafts only by the identity
/// whose email matches the author's.
pub fn can_read<R: Authored + ?Sized>(resource: &R, caller: Option<&Identity>) -> bool {
    Visibility::for_caller(caller).admits(resource.is_published(), resource.author_email())
}

/// can_mutate
///
/// Succeeds only for the author. A missing identity yields `Unauthorized`,
/// any other identity yields `Forbidden`.
pub fn can_mutate<R: Authored + ?Sized>(
    resource: &R,
    caller: Option<&Identity>,
) -> Result<(), PolicyError> {
    let identity = caller.ok_or(PolicyError::Unauthorized)?;
    if identity.email != resource.author_email() {
        return Err(PolicyError::Forbidden);
    }
    Ok(())
}
