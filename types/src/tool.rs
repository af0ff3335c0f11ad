//! Tool descriptors.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An invocable operation exposed to clients.
///
/// `allowed_roles` never leaves the server; an empty set means the tool is
/// public.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDescriptor {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub input_schema: Value,
    #[serde(skip)]
    pub allowed_roles: Vec<String>,
}

impl ToolDescriptor {
    pub fn new(name: impl Into<String>, description: impl Into<String>, input_schema: Value) -> Self {
        Self {
            name: name.into(),
            description: Some(description.into()),
            input_schema,
            allowed_roles: Vec::new(),
        }
    }

    /// Restrict the tool to the given roles.
    pub fn with_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_roles = roles.into_iter().map(Into::into).collect();
        self
    }

    pub fn is_public(&self) -> bool {
        self.allowed_roles.is_empty()
    }

    /// True when the tool is public or one of `roles` is allowed.
    /// Role names compare case-insensitively.
    pub fn permits<'a, I>(&self, roles: I) -> bool
    where
        I: IntoIterator<Item = &'a str>,
    {
        if self.is_public() {
            return true;
        }
        roles.into_iter().any(|role| {
            self.allowed_roles
                .iter()
                .any(|allowed| allowed.eq_ignore_ascii_case(role))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_roles_are_not_serialized() {
        let tool = ToolDescriptor::new("list_users", "Lists all registered users.", json!({}))
            .with_roles(["Owner"]);
        let value = serde_json::to_value(&tool).unwrap();
        assert!(value.get("allowedRoles").is_none());
        assert_eq!(value["inputSchema"], json!({}));
    }

    #[test]
    fn test_permits() {
        let public = ToolDescriptor::new("ping", "", json!({}));
        assert!(public.permits(std::iter::empty::<&str>()));

        let owner_only = ToolDescriptor::new("list_users", "", json!({})).with_roles(["Owner"]);
        assert!(owner_only.permits(["owner"]));
        assert!(!owner_only.permits(["Customer", "Manager"]));
        assert!(!owner_only.permits(std::iter::empty::<&str>()));
    }
}
