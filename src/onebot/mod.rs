pub mod client;
pub mod segments;
pub mod types;

pub use client::OneBotClient;
pub use types::{
    ApiResponse, CardMessage, EmojiReaction, EssenceMessage, FaceInfo, ForwardNode, GroupInfo,
    GroupMemberInfo, GroupMessage, GroupNotice, ImageInfo, MessageSource, ReplyInfo, VideoInfo,
};

#[cfg(test)]
mod tests;
