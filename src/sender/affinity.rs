use parking_lot::RwLock;

/// Session-affinity cookie echoed back to the collector on every request.
///
/// The held token is replaced wholesale by each response that carries
/// `Set-Cookie` headers. When two responses race, whichever completes last
/// wins.
#[derive(Debug, Default)]
pub struct SessionAffinity {
    enabled: bool,
    token: RwLock<Option<String>>,
}

impl SessionAffinity {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            token: RwLock::new(None),
        }
    }

    /// Value for the outgoing `Cookie` header, if one should be sent.
    pub fn token(&self) -> Option<String> {
        if !self.enabled {
            return None;
        }
        self.token.read().clone()
    }

    /// Rebuilds the token from a response's `Set-Cookie` values.
    ///
    /// Only the `name=value` pair of each cookie is kept; attributes such as
    /// `Path` or `Expires` are not echoed. Returns `true` when the token was
    /// replaced.
    pub fn update<S: AsRef<str>>(&self, set_cookies: &[S]) -> bool {
        if !self.enabled || set_cookies.is_empty() {
            return false;
        }

        let pairs: Vec<&str> = set_cookies
            .iter()
            .filter_map(|raw| raw.as_ref().split(';').next())
            .map(str::trim)
            .filter(|pair| !pair.is_empty())
            .collect();

        if pairs.is_empty() {
            return false;
        }

        *self.token.write() = Some(pairs.join("; "));
        true
    }
}
