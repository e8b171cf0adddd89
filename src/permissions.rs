use crate::{claims::Claims, error::AuthError};

/// Checks that `claims` grant the `required` permission.
///
/// A token without any `permissions` claim points at a misconfigured issuer and is reported separately from a token
/// that simply lacks the permission.
pub fn check_permission(required: &str, claims: &Claims) -> Result<(), AuthError> {
    let permissions = claims
        .permissions()
        .ok_or(AuthError::ClaimsMissingPermissions)?;

    if permissions.iter().any(|granted| granted == required) {
        Ok(())
    } else {
        Err(AuthError::PermissionDenied)
    }
}
