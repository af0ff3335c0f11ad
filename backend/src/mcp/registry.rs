//! Role-gated tool registry.
//!
//! The registry is built once at startup and shared read-only. Visibility is
//! computed per call from the caller's identity and never cached.

use commerce_mcp_types::ToolDescriptor;
use std::collections::HashMap;
use tracing::debug;

use crate::auth::Identity;

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("duplicate tool name '{0}'")]
    DuplicateTool(String),
}

/// Why a tool could not be resolved for a caller.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ToolAccessError {
    #[error("tool '{0}' not found")]
    NotFound(String),

    #[error("tool '{0}' is not permitted for this identity")]
    Forbidden(String),
}

/// Immutable catalog of invocable tools.
#[derive(Debug)]
pub struct ToolRegistry {
    tools: Vec<ToolDescriptor>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    /// Build a registry. Tool names must be unique.
    pub fn new(tools: impl IntoIterator<Item = ToolDescriptor>) -> Result<Self, RegistryError> {
        let mut registry = Self {
            tools: Vec::new(),
            index: HashMap::new(),
        };
        for tool in tools {
            if registry.index.contains_key(&tool.name) {
                return Err(RegistryError::DuplicateTool(tool.name));
            }
            registry
                .index
                .insert(tool.name.clone(), registry.tools.len());
            registry.tools.push(tool);
        }
        Ok(registry)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&ToolDescriptor> {
        self.index.get(name).map(|&i| &self.tools[i])
    }

    /// Tools visible to `identity`: public ones plus those sharing a role.
    pub fn list_for(&self, identity: &Identity) -> Vec<ToolDescriptor> {
        let visible: Vec<ToolDescriptor> = self
            .tools
            .iter()
            .filter(|tool| tool.permits(identity.role_names()))
            .cloned()
            .collect();
        debug!(
            "{} of {} tools visible for roles {:?}",
            visible.len(),
            self.tools.len(),
            identity.roles
        );
        visible
    }

    /// Resolve a tool by name, without any role check.
    pub fn resolve(&self, name: &str) -> Result<&ToolDescriptor, ToolAccessError> {
        self.get(name)
            .ok_or_else(|| ToolAccessError::NotFound(name.to_string()))
    }

    /// Resolve a tool by name and check that `identity` may call it.
    pub fn authorize(
        &self,
        name: &str,
        identity: &Identity,
    ) -> Result<&ToolDescriptor, ToolAccessError> {
        let tool = self.resolve(name)?;
        if tool.permits(identity.role_names()) {
            Ok(tool)
        } else {
            Err(ToolAccessError::Forbidden(name.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::catalog;
    use serde_json::json;

    fn identity(roles: &[&str]) -> Identity {
        Identity::new(None, roles.iter().copied(), "token")
    }

    fn names(tools: &[ToolDescriptor]) -> Vec<&str> {
        tools.iter().map(|t| t.name.as_str()).collect()
    }

    #[test]
    fn test_rejects_duplicate_names() {
        let result = ToolRegistry::new([
            ToolDescriptor::new("a", "", json!({})),
            ToolDescriptor::new("a", "", json!({})),
        ]);
        assert!(matches!(result, Err(RegistryError::DuplicateTool(name)) if name == "a"));
    }

    #[test]
    fn test_customer_sees_read_only_tools() {
        let registry = catalog::commerce_registry().unwrap();
        let visible = registry.list_for(&identity(&["Customer"]));
        let visible = names(&visible);

        for tool in ["list_products", "get_product", "list_categories", "get_category"] {
            assert!(visible.contains(&tool), "missing {}", tool);
        }
        for tool in [
            "update_user_role",
            "register_user",
            "delete_product",
            "add_product",
            "add_category",
            "list_users",
        ] {
            assert!(!visible.contains(&tool), "unexpected {}", tool);
        }
    }

    #[test]
    fn test_owner_sees_everything() {
        let registry = catalog::commerce_registry().unwrap();
        assert_eq!(registry.list_for(&identity(&["Owner"])).len(), registry.len());
    }

    #[test]
    fn test_listing_is_exactly_the_permitted_subset() {
        let registry = catalog::commerce_registry().unwrap();
        for roles in [
            vec![],
            vec!["Customer"],
            vec!["Manager"],
            vec!["manager", "customer"],
            vec!["Owner"],
            vec!["Auditor"],
        ] {
            let caller = identity(&roles);
            let visible = registry.list_for(&caller);
            for tool in &registry.tools {
                let permitted = tool.allowed_roles.is_empty()
                    || tool
                        .allowed_roles
                        .iter()
                        .any(|allowed| roles.iter().any(|r| allowed.eq_ignore_ascii_case(r)));
                assert_eq!(
                    visible.iter().any(|t| t.name == tool.name),
                    permitted,
                    "tool {} for roles {:?}",
                    tool.name,
                    roles
                );
            }
        }
    }

    #[test]
    fn test_public_tool_visible_without_roles() {
        let registry = ToolRegistry::new([
            ToolDescriptor::new("open", "", json!({})),
            ToolDescriptor::new("closed", "", json!({})).with_roles(["Owner"]),
        ])
        .unwrap();
        assert_eq!(names(&registry.list_for(&identity(&[]))), vec!["open"]);
    }

    #[test]
    fn test_authorize() {
        let registry = catalog::commerce_registry().unwrap();
        let customer = identity(&["Customer"]);

        assert!(registry.authorize("get_product", &customer).is_ok());
        assert_eq!(
            registry.authorize("delete_product", &customer),
            Err(ToolAccessError::Forbidden("delete_product".to_string()))
        );
        assert_eq!(
            registry.authorize("drop_database", &customer),
            Err(ToolAccessError::NotFound("drop_database".to_string()))
        );
        assert!(registry.resolve("delete_product").is_ok());
    }
}
