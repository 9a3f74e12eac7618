//! Identity-field immutability check, independent of HTTP and storage.

/// Outcome of comparing a stored record's identifier with the one a payload carries.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IdentityCheck {
    Allow,
    Reject { existing: i64, candidate: i64 },
}

/// `existing` is the stored record's identifier, `candidate` the identifier present in the
/// payload (`None` when the payload omits it). Only a present, different identifier is rejected.
pub fn check_identity(existing: Option<i64>, candidate: Option<i64>) -> IdentityCheck {
    match (existing, candidate) {
        (Some(existing), Some(candidate)) if existing != candidate => {
            IdentityCheck::Reject { existing, candidate }
        }
        _ => IdentityCheck::Allow,
    }
}
