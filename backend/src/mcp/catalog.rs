//! The commerce tool catalog.

use commerce_mcp_types::ToolDescriptor;
use serde_json::{json, Value};

use super::registry::{RegistryError, ToolRegistry};

const OWNER: &str = "Owner";
const MANAGER: &str = "Manager";
const CUSTOMER: &str = "Customer";

fn no_arguments() -> Value {
    json!({
        "type": "object",
        "properties": {},
        "required": []
    })
}

/// Every tool exposed by the gateway.
pub fn commerce_tools() -> Vec<ToolDescriptor> {
    let mut tools = Vec::new();
    tools.extend(product_tools());
    tools.extend(category_tools());
    tools.extend(user_tools());
    tools.extend(admin_tools());
    tools
}

/// Registry over [`commerce_tools`].
pub fn commerce_registry() -> Result<ToolRegistry, RegistryError> {
    ToolRegistry::new(commerce_tools())
}

fn product_tools() -> Vec<ToolDescriptor> {
    vec![
        ToolDescriptor::new(
            "list_products",
            "Retrieves all products from the catalog.",
            no_arguments(),
        )
        .with_roles([OWNER, MANAGER, CUSTOMER]),
        ToolDescriptor::new(
            "get_product",
            "Retrieves a single product by its ID.",
            json!({
                "type": "object",
                "properties": {
                    "productId": { "type": "string" }
                },
                "required": ["productId"]
            }),
        )
        .with_roles([OWNER, MANAGER, CUSTOMER]),
        ToolDescriptor::new(
            "add_product",
            "Adds a new product to the catalog.",
            json!({
                "type": "object",
                "properties": {
                    "productName": { "type": "string" },
                    "categoryId": { "type": "integer" },
                    "price": { "type": "number" },
                    "quantityAvailable": { "type": "integer" }
                },
                "required": ["productName", "categoryId", "price", "quantityAvailable"]
            }),
        )
        .with_roles([OWNER, MANAGER]),
        ToolDescriptor::new(
            "delete_product",
            "Deletes a product by its ID.",
            json!({
                "type": "object",
                "properties": {
                    "productId": { "type": "string" }
                },
                "required": ["productId"]
            }),
        )
        .with_roles([OWNER]),
    ]
}

fn category_tools() -> Vec<ToolDescriptor> {
    vec![
        ToolDescriptor::new("list_categories", "Retrieves all categories.", no_arguments())
            .with_roles([OWNER, MANAGER, CUSTOMER]),
        ToolDescriptor::new(
            "get_category",
            "Retrieves a category by its ID.",
            json!({
                "type": "object",
                "properties": {
                    "categoryId": { "type": "integer" }
                },
                "required": ["categoryId"]
            }),
        )
        .with_roles([OWNER, MANAGER, CUSTOMER]),
        ToolDescriptor::new(
            "add_category",
            "Adds a new category.",
            json!({
                "type": "object",
                "properties": {
                    "categoryName": { "type": "string" }
                },
                "required": ["categoryName"]
            }),
        )
        .with_roles([OWNER, MANAGER]),
    ]
}

fn user_tools() -> Vec<ToolDescriptor> {
    vec![
        ToolDescriptor::new(
            "register_user",
            "Registers a new user.",
            json!({
                "type": "object",
                "properties": {
                    "emailId": { "type": "string" },
                    "userPassword": { "type": "string" },
                    "gender": { "type": "string" },
                    "dob": { "type": "string" },
                    "address": { "type": "string" }
                },
                "required": ["emailId", "userPassword"]
            }),
        )
        .with_roles([OWNER]),
        ToolDescriptor::new("list_users", "Lists all registered users.", no_arguments())
            .with_roles([OWNER]),
    ]
}

fn admin_tools() -> Vec<ToolDescriptor> {
    vec![ToolDescriptor::new(
        "update_user_role",
        "Updates the role of a user.",
        json!({
            "type": "object",
            "properties": {
                "emailId": { "type": "string" },
                "role": { "type": "string" }
            },
            "required": ["emailId", "role"]
        }),
    )
    .with_roles([OWNER])]
}
