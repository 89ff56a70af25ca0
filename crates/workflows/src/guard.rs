//! Role, ownership, lifecycle and input checks shared by the services.

use marketplace::{LinkierError, Profile, ProfileId};

pub(crate) fn require_landlord(actor: &Profile, action: &str) -> Result<(), LinkierError> {
    if actor.is_landlord() {
        Ok(())
    } else {
        Err(LinkierError::forbidden(format!("only landlords can {action}")))
    }
}

pub(crate) fn require_student(actor: &Profile, action: &str) -> Result<(), LinkierError> {
    if actor.is_student() {
        Ok(())
    } else {
        Err(LinkierError::forbidden(format!("only students can {action}")))
    }
}

/// The actor must be `owner`.
pub(crate) fn require_self(
    actor: &Profile,
    owner: ProfileId,
    what: &str,
) -> Result<(), LinkierError> {
    if actor.id == owner {
        Ok(())
    } else {
        Err(LinkierError::forbidden(format!("this {what} belongs to someone else")))
    }
}

/// The actor must be one of the two parties.
pub(crate) fn require_party(
    actor: &Profile,
    a: ProfileId,
    b: ProfileId,
    what: &str,
) -> Result<(), LinkierError> {
    if actor.id == a || actor.id == b {
        Ok(())
    } else {
        Err(LinkierError::forbidden(format!("you are not part of this {what}")))
    }
}

/// Fails with [`LinkierError::InvalidTransition`] unless `allowed`.
pub(crate) fn require_transition(
    entity: &'static str,
    from: &'static str,
    to: &'static str,
    allowed: bool,
) -> Result<(), LinkierError> {
    if allowed {
        Ok(())
    } else {
        Err(LinkierError::InvalidTransition { entity, from, to })
    }
}

/// Trims `value` and checks it is non-empty and at most `max_chars` long.
pub(crate) fn required_text(
    field: &'static str,
    value: &str,
    max_chars: usize,
) -> Result<String, LinkierError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(LinkierError::validation(field, "must not be empty"));
    }
    if trimmed.chars().count() > max_chars {
        return Err(LinkierError::validation(
            field,
            format!("must be at most {max_chars} characters"),
        ));
    }
    Ok(trimmed.to_owned())
}

/// Like [`required_text`] but blank input becomes `None`.
pub(crate) fn optional_text(
    field: &'static str,
    value: Option<&str>,
    max_chars: usize,
) -> Result<Option<String>, LinkierError> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        Some(text) => required_text(field, text, max_chars).map(Some),
        None => Ok(None),
    }
}
