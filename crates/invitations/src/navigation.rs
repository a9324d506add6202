use crate::host::Scope;

/// Where the user is redirected after an invitation request, relative to the
/// host's root.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Navigation {
    location: String,
}

impl Navigation {
    pub fn redirect(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
        }
    }

    pub fn home() -> Self {
        Self::redirect("/")
    }

    pub fn edit_project(scope: &Scope) -> Self {
        Self::redirect(format!("/editProject.html?projectId={}", scope.external_id))
    }

    pub fn view_project(scope: &Scope) -> Self {
        Self::redirect(format!("/project.html?projectId={}", scope.external_id))
    }

    pub fn location(&self) -> &str {
        &self.location
    }
}
