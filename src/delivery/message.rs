//! Webhook payloads for Discord and Slack.

use crate::model::{EntityKey, Member};
use chrono::Utc;
use serde::Serialize;

/// Members listed individually before the rest is summarized.
pub const MAX_LISTED: usize = 10;

const FOOTER: &str = "starwatch";
const ACTIVE_TEXT: &str = "starwatch is now active and monitoring your repositories!";
const DISCORD_GREEN: u32 = 0x00ff00;

fn repo_url(entity: &EntityKey) -> String {
    format!("https://github.com/{}/{}", entity.namespace, entity.name)
}

fn profile_url(member: &Member) -> String {
    format!("https://github.com/{}", member.login)
}

fn stars(count: usize) -> String {
    if count == 1 {
        "1 new star".to_string()
    } else {
        format!("{count} new stars")
    }
}

/// Body of a Discord incoming webhook call.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DiscordMessage {
    /// Plain text content.
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    /// Rich embeds.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    embeds: Vec<DiscordEmbed>,
}

/// One Discord embed.
#[derive(Debug, Clone, Serialize)]
pub struct DiscordEmbed {
    title: String,
    description: String,
    color: u32,
    timestamp: String,
    footer: DiscordFooter,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    fields: Vec<DiscordField>,
}

/// Embed footer.
#[derive(Debug, Clone, Serialize)]
pub struct DiscordFooter {
    text: String,
}

/// One `name: value` pair of an embed.
#[derive(Debug, Clone, Serialize)]
pub struct DiscordField {
    name: String,
    value: String,
    inline: bool,
}

impl DiscordMessage {
    /// Announce `members` as new stargazers of `entity`.
    pub fn announcement(entity: &EntityKey, members: &[Member]) -> Self {
        let mut fields: Vec<DiscordField> = members
            .iter()
            .take(MAX_LISTED)
            .map(|m| DiscordField {
                name: format!("⭐ {}", m.login),
                value: format!("[View Profile]({})", profile_url(m)),
                inline: true,
            })
            .collect();
        if members.len() > MAX_LISTED {
            fields.push(DiscordField {
                name: "And more...".to_string(),
                value: format!("+ {} more stargazers", members.len() - MAX_LISTED),
                inline: false,
            });
        }

        let embed = DiscordEmbed {
            title: "New GitHub Stars".to_string(),
            description: format!(
                "🌟 **{}** for [{entity}]({})!",
                stars(members.len()),
                repo_url(entity)
            ),
            color: DISCORD_GREEN,
            timestamp: Utc::now().to_rfc3339(),
            footer: DiscordFooter {
                text: FOOTER.to_string(),
            },
            fields,
        };
        Self {
            content: None,
            embeds: vec![embed],
        }
    }

    /// Connectivity check message.
    pub fn probe() -> Self {
        Self {
            content: Some(format!("🔔 {ACTIVE_TEXT}")),
            embeds: Vec::new(),
        }
    }
}

/// Body of a Slack incoming webhook call.
#[derive(Debug, Clone, Serialize)]
pub struct SlackMessage {
    #[serde(skip_serializing_if = "Option::is_none")]
    channel: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    username: String,
    icon_emoji: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    attachments: Vec<SlackAttachment>,
}

/// One Slack attachment.
#[derive(Debug, Clone, Serialize)]
pub struct SlackAttachment {
    color: String,
    title: String,
    title_link: String,
    text: String,
    footer: String,
    ts: i64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    fields: Vec<SlackField>,
}

/// One `title: value` pair of an attachment.
#[derive(Debug, Clone, Serialize)]
pub struct SlackField {
    title: String,
    value: String,
    short: bool,
}

impl SlackMessage {
    /// Announce `members` as new stargazers of `entity`, posted to
    /// `channel` when set.
    pub fn announcement(entity: &EntityKey, members: &[Member], channel: Option<&str>) -> Self {
        let url = repo_url(entity);
        let mut fields: Vec<SlackField> = members
            .iter()
            .take(MAX_LISTED)
            .map(|m| SlackField {
                title: m.login.clone(),
                value: format!("<{}|View Profile>", profile_url(m)),
                short: true,
            })
            .collect();
        if members.len() > MAX_LISTED {
            fields.push(SlackField {
                title: "And more...".to_string(),
                value: format!("{} more stargazers", members.len() - MAX_LISTED),
                short: false,
            });
        }

        let text = if members.len() == 1 {
            format!("Repository <{url}|{entity}> received a new star!")
        } else {
            format!(
                "Repository <{url}|{entity}> received {} new stars!",
                members.len()
            )
        };

        Self {
            channel: channel.map(str::to_string),
            text: None,
            username: FOOTER.to_string(),
            icon_emoji: ":star:".to_string(),
            attachments: vec![SlackAttachment {
                color: "good".to_string(),
                title: format!("⭐ {} for {entity}", stars(members.len())),
                title_link: url,
                text,
                footer: FOOTER.to_string(),
                ts: Utc::now().timestamp(),
                fields,
            }],
        }
    }

    /// Connectivity check message.
    pub fn probe(channel: Option<&str>) -> Self {
        Self {
            channel: channel.map(str::to_string),
            text: Some(format!("🔔 {ACTIVE_TEXT}")),
            username: FOOTER.to_string(),
            icon_emoji: ":robot_face:".to_string(),
            attachments: Vec::new(),
        }
    }
}
