use crate::domain_model::TokenPair;

/// Client-side persistence of the two token values.
///
/// Both values are always set together or cleared together; how they travel
/// (cookies, headers) is up to the implementation.
pub trait CookieTransport: Send + Sync {
    fn persist(&self, tokens: &TokenPair);
    fn clear(&self);
}
