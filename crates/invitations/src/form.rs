//! Submitted invitation properties and their validation errors.

use std::collections::BTreeMap;
use std::fmt;

pub const NAME_PARAM: &str = "name";
pub const ROLE_PARAM: &str = "role";
pub const GROUP_PARAM: &str = "group";
pub const WELCOME_TEXT_PARAM: &str = "welcomeText";
pub const MULTIUSER_PARAM: &str = "multiuser";

/// Raw request parameters of a creation/edit form.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InvitationForm {
    params: BTreeMap<String, String>,
}

impl InvitationForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Raw parameter value, as submitted.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// Parameter value, `None` when missing, empty, or only whitespace.
    pub fn non_blank(&self, key: &str) -> Option<&str> {
        self.param(key).filter(|v| !v.trim().is_empty())
    }

    pub fn name(&self) -> Option<&str> {
        self.non_blank(NAME_PARAM)
    }

    pub fn role(&self) -> Option<&str> {
        self.non_blank(ROLE_PARAM)
    }

    pub fn group(&self) -> Option<&str> {
        self.non_blank(GROUP_PARAM)
    }

    pub fn welcome_text(&self) -> &str {
        self.param(WELCOME_TEXT_PARAM).unwrap_or_default()
    }

    /// `true` only for a case-insensitive `"true"`.
    pub fn multiuser(&self) -> bool {
        self.param(MULTIUSER_PARAM)
            .is_some_and(|v| v.eq_ignore_ascii_case("true"))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for InvitationForm {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            params: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// One rejected form field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InvalidProperty {
    pub property: String,
    pub message: String,
}

impl InvalidProperty {
    pub fn new(property: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            message: message.into(),
        }
    }
}

/// Accumulated validation errors for a form.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ActionErrors {
    errors: Vec<InvalidProperty>,
}

impl ActionErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_error(&mut self, error: InvalidProperty) {
        self.errors.push(error);
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn errors(&self) -> &[InvalidProperty] {
        &self.errors
    }

    pub fn for_property(&self, property: &str) -> Option<&InvalidProperty> {
        self.errors.iter().find(|e| e.property == property)
    }
}

impl fmt::Display for ActionErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, e) in self.errors.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}: {}", e.property, e.message)?;
        }
        Ok(())
    }
}

/// Checks every invitation kind shares.
pub fn validate_common(form: &InvitationForm, errors: &mut ActionErrors) {
    if form.name().is_none() {
        errors.add_error(InvalidProperty::new(NAME_PARAM, "Name must be specified"));
    }
}
