/// Identity hash of an email address: MD5 of the trimmed, lowercased input,
/// as 32 lowercase hex characters.
///
/// This is a privacy mitigation, not a security boundary. It is deliberately
/// unkeyed so the same address always maps to the same identifier across
/// restarts, and so the digest doubles as a Gravatar lookup key.
pub fn identity_hash(email: &str) -> String {
    let normalized = email.trim().to_lowercase();
    format!("{:x}", md5::compute(normalized.as_bytes()))
}
