use crate::error::PermissionDeniedError;

/// Permission the map and search features depend on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    Network,
    Location,
}

impl Permission {
    pub fn name(&self) -> &'static str {
        match self {
            Permission::Network => "network",
            Permission::Location => "location",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Permission::Network => "Download map tiles and query the geocoding service",
            Permission::Location => "Use coordinates for reverse geocoding",
        }
    }
}

/// Asks the user (or a policy) whether a permission is granted
pub trait PermissionPrompt {
    fn ask(&mut self, permission: Permission) -> bool;
}

/// Grants everything; for `--yes` and tests
pub struct AutoGrant;

impl PermissionPrompt for AutoGrant {
    fn ask(&mut self, _permission: Permission) -> bool {
        true
    }
}

impl<F> PermissionPrompt for F
where
    F: FnMut(Permission) -> bool,
{
    fn ask(&mut self, permission: Permission) -> bool {
        self(permission)
    }
}

pub struct PermissionsRequestor<P> {
    prompt: P,
    required: Vec<Permission>,
}

impl<P: PermissionPrompt> PermissionsRequestor<P> {
    pub fn new(prompt: P) -> Self {
        Self::with_permissions(prompt, vec![Permission::Network, Permission::Location])
    }

    pub fn with_permissions(prompt: P, required: Vec<Permission>) -> Self {
        Self { prompt, required }
    }

    pub fn required(&self) -> &[Permission] {
        &self.required
    }

    /// Ask for every required permission; all of them must be granted
    pub fn check(&mut self) -> Result<(), PermissionDeniedError> {
        let denied: Vec<Permission> = self
            .required
            .iter()
            .copied()
            .filter(|permission| !self.prompt.ask(*permission))
            .collect();

        if denied.is_empty() {
            Ok(())
        } else {
            Err(PermissionDeniedError { denied })
        }
    }

    /// Callback form of `check`
    pub fn request<G, D>(&mut self, on_granted: G, on_denied: D)
    where
        G: FnOnce(),
        D: FnOnce(PermissionDeniedError),
    {
        match self.check() {
            Ok(()) => on_granted(),
            Err(e) => on_denied(e),
        }
    }
}
