/// The value kept in the session store for a subject: a keyed fingerprint of
/// the one refresh token currently allowed to rotate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord(pub String);

impl SessionRecord {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}
