use super::Agent;
use crate::onebot::{FaceInfo, GroupMessage, ImageInfo, ReplyInfo};
use crate::utils::truncate_chars;
use chrono::{DateTime, Local, Utc};
use std::fmt::Write as _;
use std::sync::Arc;

/// Reply snippets are cut to this many characters in the transcript.
const REPLY_SNIPPET_CHARS: usize = 50;

/// Static id→name table for the common built-in QQ faces. Gateways usually
/// attach the name themselves; this covers the ones that arrive bare.
const FACE_NAMES: &[(i32, &str)] = &[
    (0, "惊讶"),
    (1, "撇嘴"),
    (4, "得意"),
    (5, "流泪"),
    (8, "睡"),
    (9, "大哭"),
    (10, "尴尬"),
    (12, "调皮"),
    (13, "呲牙"),
    (14, "微笑"),
    (16, "酷"),
    (21, "可爱"),
    (25, "困"),
    (27, "流汗"),
    (28, "憨笑"),
    (32, "疑问"),
    (33, "嘘"),
    (34, "晕"),
    (39, "再见"),
    (49, "拥抱"),
    (53, "蛋糕"),
    (63, "玫瑰"),
    (66, "爱心"),
    (76, "赞"),
    (77, "踩"),
    (78, "握手"),
    (79, "胜利"),
    (97, "擦汗"),
    (98, "抠鼻"),
    (99, "鼓掌"),
    (101, "坏笑"),
    (104, "哈欠"),
    (106, "委屈"),
    (111, "可怜"),
    (118, "抱拳"),
    (124, "OK"),
    (129, "挥手"),
    (146, "爆筋"),
    (171, "茶"),
    (173, "泪奔"),
    (174, "无奈"),
    (175, "卖萌"),
    (179, "doge"),
    (182, "笑哭"),
    (187, "幽灵"),
    (201, "点赞"),
    (212, "托腮"),
    (264, "捂脸"),
    (265, "辣眼睛"),
    (271, "吃瓜"),
    (277, "汪汪"),
    (282, "敬礼"),
    (285, "摸鱼"),
    (306, "牛气冲天"),
    (319, "比心"),
];

pub fn face_name(id: i32) -> Option<&'static str> {
    FACE_NAMES
        .iter()
        .find_map(|&(fid, name)| (fid == id).then_some(name))
}

pub fn render_face(face: &FaceInfo) -> String {
    let name = if face.name.is_empty() {
        face_name(face.id).unwrap_or("")
    } else {
        face.name.as_str()
    };
    if name.is_empty() {
        "[表情]".to_string()
    } else {
        format!("[表情:{}]", name)
    }
}

/// ` [回复 #id nick:"snippet"]` or ` [回复 #id]` when unresolved.
pub fn render_reply(reply: &ReplyInfo) -> String {
    if reply.content.is_empty() {
        format!(" [回复 #{}]", reply.message_id)
    } else {
        format!(
            " [回复 #{} {}:\"{}\"]",
            reply.message_id,
            reply.nickname,
            truncate_chars(&reply.content, REPLY_SNIPPET_CHARS)
        )
    }
}

/// ` [@你,@123,@全体成员]` for the transcript; empty when nothing is at-ed.
pub fn render_mentions(msg: &GroupMessage, self_id: i64) -> String {
    let mut parts: Vec<String> = Vec::new();
    if msg.mention_self {
        parts.push("@你".to_string());
    }
    for &uid in &msg.at_list {
        if uid != self_id {
            parts.push(format!("@{}", uid));
        }
    }
    if msg.mention_all {
        parts.push("@全体成员".to_string());
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" [{}]", parts.join(","))
    }
}

impl Agent {
    /// Render the buffer snapshot into the transcript the model reads.
    ///
    /// `[HH:MM:SS] #<id> <nick>(<uid>):[reply][mentions] <content>` per line.
    /// Photo images go through the vision client when available; sticker
    /// images show their description and, when new and auto-save is on, are
    /// queued for collection.
    pub(super) async fn render_transcript(
        self: &Arc<Self>,
        msgs: &[Arc<GroupMessage>],
        last_processed: Option<DateTime<Utc>>,
    ) -> String {
        let mut b = String::new();
        let self_id = self.bot_self_id();

        for msg in msgs {
            let is_new = last_processed.is_none_or(|t| msg.time > t);

            let mut content = msg.content.clone();
            for face in &msg.faces {
                content.push(' ');
                content.push_str(&render_face(face));
            }
            for img in &msg.images {
                content.push(' ');
                content.push_str(&self.render_image(img, is_new).await);
            }

            let _ = writeln!(
                b,
                "[{}] #{} {}({}):{}{} {}",
                msg.time.with_timezone(&Local).format("%H:%M:%S"),
                msg.message_id,
                msg.nickname,
                msg.user_id,
                msg.reply.as_ref().map(render_reply).unwrap_or_default(),
                render_mentions(msg, self_id),
                content,
            );
        }
        b
    }

    async fn render_image(self: &Arc<Self>, img: &ImageInfo, is_new: bool) -> String {
        if img.sub_type == 1 {
            // Sticker: description from vision when possible, else the
            // gateway summary.
            let mut desc = String::new();
            if let Some(vision) = &self.vision {
                if !img.url.is_empty() {
                    if let Ok(d) = vision.describe_image(&img.url).await {
                        desc = d;
                    }
                }
            }
            if desc.is_empty() && !img.summary.is_empty() {
                desc = img.summary.clone();
            }

            if is_new && self.cfg.sticker.auto_save && !img.url.is_empty() {
                let agent = self.clone();
                let url = img.url.clone();
                let description = desc.clone();
                tokio::spawn(async move {
                    agent.auto_save_sticker(url, description).await;
                });
            }

            if desc.is_empty() {
                "[表情包]".to_string()
            } else {
                format!("[表情包 描述:{}]", desc)
            }
        } else {
            // Plain photo.
            if let Some(vision) = &self.vision {
                if !img.url.is_empty() {
                    if let Ok(desc) = vision.describe_image(&img.url).await {
                        return desc;
                    }
                }
            }
            "[图片]".to_string()
        }
    }
}
