use ulid::Ulid;

/// Generates a new ULID-based ID with the given prefix.
///
/// # Examples
/// ```
/// let id = social_common::id::prefixed_ulid("usr");
/// assert!(id.starts_with("usr_"));
/// ```
pub fn prefixed_ulid(prefix: &str) -> String {
    format!("{}_{}", prefix, Ulid::new().to_string())
}

/// Marker trait for types that represent a prefixed ID.
pub trait PrefixedId {
    const PREFIX: &'static str;

    fn generate() -> String {
        prefixed_ulid(Self::PREFIX)
    }
}

/// Well-known ID prefixes.
pub mod prefix {
    pub const USER: &str = "usr";
    pub const POST: &str = "post";
    pub const COMMENT: &str = "cmt";
    pub const FRIEND_REQUEST: &str = "frq";
    pub const NOTIFICATION: &str = "ntf";
    pub const CONNECTION: &str = "conn";
    pub const ADMIN_ACTION: &str = "aud";
}
