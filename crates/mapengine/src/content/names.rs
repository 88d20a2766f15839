use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResourceNameError {
    #[error("resource name is empty")]
    Empty,
    #[error("resource name is absolute")]
    LeadingSlash,
    #[error("resource name uses '\\\\' as a separator")]
    Backslash,
    #[error("resource name escapes its directory through '..'")]
    ParentTraversal,
    #[error("resource name contains '{character}'")]
    InvalidCharacter { character: char },
}

/// Resource names come from palette rows and class declarations and are joined onto search
/// directories, so they must stay relative and inside the directory.
pub(crate) fn validate_resource_name(name: &str) -> Result<(), ResourceNameError> {
    match name.chars().next() {
        None => return Err(ResourceNameError::Empty),
        Some('/') => return Err(ResourceNameError::LeadingSlash),
        Some(_) => {}
    }
    if let Some(character) = name.chars().find(|ch| !is_name_char(*ch)) {
        return Err(match character {
            '\\' => ResourceNameError::Backslash,
            character => ResourceNameError::InvalidCharacter { character },
        });
    }
    if name.split('/').any(|segment| segment == "..") {
        return Err(ResourceNameError::ParentTraversal);
    }
    Ok(())
}

fn is_name_char(ch: char) -> bool {
    ch.is_alphanumeric() || matches!(ch, '_' | '/' | '-' | '.' | ' ')
}
