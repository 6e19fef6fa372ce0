use palisade_rbac_types::name::{ResourceName, RoleName, ScopeName};

/// The scope name that expands to "all scopes of the resource" in principal-access
/// lookups.
pub const DEFAULT_SCOPE: &str = ".default";

/// Pluggable name validation, consulted before any I/O. Invalid names fail the
/// operation as bad requests.
pub trait NameValidator: Send + Sync {
    fn is_valid_resource_name(&self, name: &ResourceName) -> bool;

    fn is_valid_scope_name(&self, name: &ScopeName) -> bool;

    fn is_valid_role_name(&self, name: &RoleName) -> bool;

    /// Whether `name` designates the default scope.
    fn is_default_scope(&self, name: &ScopeName) -> bool;
}

/// Accepts non-empty names of up to 256 bytes without whitespace or the key-marker
/// separator `#`, and designates [`DEFAULT_SCOPE`] as the default scope.
///
/// Rejecting `#` is what keeps key formatting injective; the formatter itself never
/// escapes.
#[derive(Debug, Default, Copy, Clone)]
pub struct DefaultNameValidator;

impl DefaultNameValidator {
    fn is_valid(name: &str) -> bool {
        !name.is_empty()
            && name.len() <= 256
            && !name.contains('#')
            && !name.chars().any(char::is_whitespace)
    }
}

impl NameValidator for DefaultNameValidator {
    fn is_valid_resource_name(&self, name: &ResourceName) -> bool {
        Self::is_valid(name.as_str())
    }

    fn is_valid_scope_name(&self, name: &ScopeName) -> bool {
        Self::is_valid(name.as_str())
    }

    fn is_valid_role_name(&self, name: &RoleName) -> bool {
        Self::is_valid(name.as_str())
    }

    fn is_default_scope(&self, name: &ScopeName) -> bool {
        name.as_str() == DEFAULT_SCOPE
    }
}
