use std::fmt;
use std::sync::{Arc, RwLock};

/// The signed-in user's access token, shared by every adapter of one
/// backend.
///
/// When empty, requests authenticate with the anonymous key only.
#[derive(Clone, Default)]
pub struct SessionToken {
    inner: Arc<RwLock<Option<String>>>,
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = if self.current().is_some() {
            "<signed in>"
        } else {
            "<anonymous>"
        };
        formatter.debug_tuple("SessionToken").field(&state).finish()
    }
}

impl SessionToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, access_token: impl Into<String>) {
        let mut slot = match self.inner.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *slot = Some(access_token.into());
    }

    pub fn clear(&self) {
        let mut slot = match self.inner.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *slot = None;
    }

    pub fn current(&self) -> Option<String> {
        match self.inner.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_token() {
        let token = SessionToken::new();
        let shared = token.clone();
        token.set("abc");
        assert_eq!(shared.current().as_deref(), Some("abc"));
        assert_eq!(format!("{shared:?}"), "SessionToken(\"<signed in>\")");
        shared.clear();
        assert_eq!(token.current(), None);
    }
}
