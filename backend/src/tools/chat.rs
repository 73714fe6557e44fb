//! Chat workspace tools.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use sluice_types::ToolOutput;
use std::sync::Arc;

use super::{ToolDefinition, ToolError, ToolHandler};
use crate::chat::ChatApi;
use crate::directory::DirectoryStore;

pub const MESSAGE_SEND_TOOL: &str = "slack_message_send";
pub const GET_USERS_TOOL: &str = "slack_get_users";
pub const LOOKUP_USER_TOOL: &str = "slack_lookup_user";

fn parse_args<T: serde::de::DeserializeOwned>(arguments: Value) -> Result<T, ToolError> {
    serde_json::from_value(arguments).map_err(|e| ToolError::InvalidArguments(e.to_string()))
}

fn json_text(value: &impl serde::Serialize) -> Result<ToolOutput, ToolError> {
    serde_json::to_string(value)
        .map(ToolOutput::text)
        .map_err(|e| ToolError::Failed(format!("Failed to encode result: {}", e)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessageSendArgs {
    channel_id: String,
    message: String,
    #[serde(default)]
    blocks: Option<Value>,
}

/// Posts a message to a channel.
pub struct MessageSendTool {
    chat: Arc<dyn ChatApi>,
}

#[async_trait]
impl ToolHandler for MessageSendTool {
    async fn call(&self, arguments: Value) -> Result<ToolOutput, ToolError> {
        let args: MessageSendArgs = parse_args(arguments)?;
        if args.channel_id.trim().is_empty() {
            return Err(ToolError::InvalidArguments("channelId must not be empty".into()));
        }

        let response = self
            .chat
            .post_message(&args.channel_id, &args.message, args.blocks)
            .await?;
        json_text(&response)
    }
}

/// Lists active workspace members.
pub struct GetUsersTool {
    chat: Arc<dyn ChatApi>,
}

#[async_trait]
impl ToolHandler for GetUsersTool {
    async fn call(&self, _arguments: Value) -> Result<ToolOutput, ToolError> {
        let members = self.chat.active_members().await?;
        json_text(&members)
    }
}

#[derive(Debug, Deserialize)]
struct LookupUserArgs {
    email: String,
}

/// Looks a user up in the local directory cache.
pub struct LookupUserTool {
    directory: Arc<dyn DirectoryStore>,
}

#[async_trait]
impl ToolHandler for LookupUserTool {
    async fn call(&self, arguments: Value) -> Result<ToolOutput, ToolError> {
        let args: LookupUserArgs = parse_args(arguments)?;
        let user = self
            .directory
            .get_by_email(&args.email)
            .await
            .map_err(|e| ToolError::Failed(e.to_string()))?;

        match user {
            Some(user) => json_text(&user),
            None => Ok(ToolOutput::error(format!(
                "No cached user with email {}",
                args.email.trim()
            ))),
        }
    }
}

/// Tool candidates for the chat workspace, keyed by export name.
pub fn chat_tools(
    chat: Arc<dyn ChatApi>,
    directory: Arc<dyn DirectoryStore>,
) -> Vec<(String, ToolDefinition)> {
    vec![
        (
            "messageSend".to_string(),
            ToolDefinition::new(
                MESSAGE_SEND_TOOL,
                json!({
                    "type": "object",
                    "properties": {
                        "channelId": {
                            "type": "string",
                            "description": "Slack channel ID to send the message to."
                        },
                        "message": {
                            "type": "string",
                            "description": "Text of the message to send."
                        },
                        "blocks": {
                            "description": "Optional Slack blocks for rich formatting."
                        }
                    },
                    "required": ["channelId", "message"]
                }),
                Arc::new(MessageSendTool { chat: chat.clone() }),
            )
            .with_description("Send a message to a Slack channel."),
        ),
        (
            "getUsers".to_string(),
            ToolDefinition::new(
                GET_USERS_TOOL,
                json!({ "type": "object", "properties": {} }),
                Arc::new(GetUsersTool { chat }),
            )
            .with_description("Get a list of all Slack users."),
        ),
        (
            "lookupUser".to_string(),
            ToolDefinition::new(
                LOOKUP_USER_TOOL,
                json!({
                    "type": "object",
                    "properties": {
                        "email": {
                            "type": "string",
                            "description": "Email address of the user to find."
                        }
                    },
                    "required": ["email"]
                }),
                Arc::new(LookupUserTool { directory }),
            )
            .with_description("Find a Slack user ID by email using the cached user directory."),
        ),
    ]
}
