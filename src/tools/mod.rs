pub mod base;
pub mod expression;
pub mod group;
pub mod interaction;
pub mod jargon;
pub mod member;
pub mod memory;
pub mod mood;
pub mod registry;
pub mod sticker;

pub use base::{SpeakCallback, Tool, ToolContext, failure, success};
pub use registry::ToolRegistry;

use std::sync::Arc;

/// Registry with the full built-in tool set.
pub fn default_registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    // memory
    registry.register(Arc::new(memory::SaveMemoryTool));
    registry.register(Arc::new(memory::QueryMemoryTool));
    // members
    registry.register(Arc::new(member::UpdateMemberProfileTool));
    registry.register(Arc::new(member::GetMemberInfoTool));
    // expressions
    registry.register(Arc::new(expression::SaveExpressionTool));
    registry.register(Arc::new(expression::GetExpressionsTool));
    registry.register(Arc::new(expression::GetUncheckedExpressionsTool));
    registry.register(Arc::new(expression::ReviewExpressionTool));
    // jargon
    registry.register(Arc::new(jargon::SaveJargonTool));
    registry.register(Arc::new(jargon::GetUnverifiedJargonsTool));
    registry.register(Arc::new(jargon::ReviewJargonTool));
    // speaking
    registry.register(Arc::new(interaction::SpeakTool));
    registry.register(Arc::new(interaction::StayQuietTool));
    // group interaction
    registry.register(Arc::new(interaction::PokeTool));
    registry.register(Arc::new(interaction::ReactToMessageTool));
    registry.register(Arc::new(interaction::RecallMessageTool));
    // group info
    registry.register(Arc::new(group::GetCurrentTimeTool));
    registry.register(Arc::new(group::GetRecentMessagesTool));
    registry.register(Arc::new(group::GetGroupInfoTool));
    registry.register(Arc::new(group::GetGroupMemberDetailTool));
    registry.register(Arc::new(group::GetGroupNoticesTool));
    registry.register(Arc::new(group::GetEssenceMessagesTool));
    registry.register(Arc::new(group::GetMessageReactionsTool));
    registry.register(Arc::new(group::GetForwardMessageDetailTool));
    // stickers
    registry.register(Arc::new(sticker::SearchStickersTool));
    registry.register(Arc::new(sticker::SendStickerTool));
    // mood
    registry.register(Arc::new(mood::UpdateMoodTool));
    registry
}

#[cfg(test)]
mod tests;
