//! InnerTube response parser

use chrono::{DateTime, TimeZone, Utc};

use super::types::*;
use crate::bot::types::ChatMessage;

/// Flatten a `get_live_chat` response into text chat messages, oldest first
pub fn parse_chat_response(response: InnerTubeChatResponse) -> Vec<ChatMessage> {
    let Some(contents) = response.continuation_contents else {
        return vec![];
    };
    let Some(continuation) = contents.live_chat_continuation else {
        return vec![];
    };
    let Some(actions) = continuation.actions else {
        return vec![];
    };

    actions.into_iter().flat_map(parse_action).collect()
}

/// Replay actions may wrap several messages
fn parse_action(action: ChatAction) -> Vec<ChatMessage> {
    if let Some(add_action) = action.add_chat_item_action {
        return parse_chat_item(add_action.item).into_iter().collect();
    }

    if let Some(replay_action) = action.replay_chat_item_action {
        if let Some(actions) = replay_action.actions {
            return actions
                .into_iter()
                .filter_map(|inner| {
                    inner
                        .add_chat_item_action
                        .and_then(|add_action| parse_chat_item(add_action.item))
                })
                .collect();
        }
    }

    vec![]
}

fn parse_chat_item(item: ChatItem) -> Option<ChatMessage> {
    parse_text_message(item.live_chat_text_message_renderer?)
}

fn parse_text_message(msg: LiveChatTextMessageRenderer) -> Option<ChatMessage> {
    let Some(author_id) = msg.author_external_channel_id.filter(|id| !id.is_empty()) else {
        log::debug!("Skipping message {} without author channel id", msg.id);
        return None;
    };

    let text = msg
        .message
        .as_ref()
        .and_then(|m| m.runs.as_deref())
        .map(runs_to_text)
        .unwrap_or_default();
    let (is_owner, is_moderator) = parse_author_badges(msg.author_badges.as_deref());

    Some(ChatMessage {
        id: msg.id,
        author_id,
        author_display_name: msg.author_name.map(|n| n.get_text()).unwrap_or_default(),
        text,
        published_at: parse_timestamp(msg.timestamp_usec.as_deref()),
        is_owner,
        is_moderator,
    })
}

/// Emoji render as their first shortcut (`:wave:`), falling back to the id
fn runs_to_text(runs: &[RunItem]) -> String {
    runs.iter()
        .filter_map(|run| {
            if let Some(text) = &run.text {
                return Some(text.clone());
            }
            let emoji = run.emoji.as_ref()?;
            if emoji.emoji_id.is_empty() {
                return None;
            }
            Some(
                emoji
                    .shortcuts
                    .as_ref()
                    .and_then(|s| s.first().cloned())
                    .unwrap_or_else(|| format!(":{}:", emoji.emoji_id)),
            )
        })
        .collect()
}

/// (is_owner, is_moderator)
fn parse_author_badges(badges: Option<&[AuthorBadge]>) -> (bool, bool) {
    let mut is_owner = false;
    let mut is_moderator = false;

    for badge in badges.unwrap_or_default() {
        let icon = badge
            .live_chat_author_badge_renderer
            .as_ref()
            .and_then(|r| r.icon.as_ref());
        match icon.map(|i| i.icon_type.as_str()) {
            Some("OWNER") => is_owner = true,
            Some("MODERATOR") => is_moderator = true,
            _ => {}
        }
    }

    (is_owner, is_moderator)
}

/// Microsecond timestamp; called for every message, so failures log at debug
fn parse_timestamp(timestamp_usec: Option<&str>) -> DateTime<Utc> {
    let Some(ts) = timestamp_usec else {
        return Utc::now();
    };
    match ts.parse::<i64>() {
        Ok(usec) => Utc.timestamp_micros(usec).single().unwrap_or_else(|| {
            log::debug!("Invalid timestamp microseconds: {}", usec);
            Utc::now()
        }),
        Err(e) => {
            log::debug!("Failed to parse timestamp '{}': {}", ts, e);
            Utc::now()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_action(id: &str, author: &str, runs: &str, badges: &str) -> String {
        format!(
            r#"{{"addChatItemAction": {{"item": {{"liveChatTextMessageRenderer": {{
                "id": "{id}",
                "message": {{"runs": {runs}}},
                "authorName": {{"simpleText": "{author}"}},
                "authorExternalChannelId": "UC_{author}",
                "timestampUsec": "1709294400000000",
                "authorBadges": {badges}
            }}}}}}}}"#
        )
    }

    fn response(actions: &[String]) -> InnerTubeChatResponse {
        let json = format!(
            r#"{{"continuationContents": {{"liveChatContinuation": {{"actions": [{}]}}}}}}"#,
            actions.join(",")
        );
        serde_json::from_str(&json).unwrap()
    }

    #[test]
    fn test_parse_text_message() {
        let messages = parse_chat_response(response(&[text_action(
            "m1",
            "Alice",
            r#"[{"text": "/discord"}]"#,
            "[]",
        )]));

        assert_eq!(messages.len(), 1);
        let msg = &messages[0];
        assert_eq!(msg.id, "m1");
        assert_eq!(msg.author_id, "UC_Alice");
        assert_eq!(msg.author_display_name, "Alice");
        assert_eq!(msg.text, "/discord");
        assert_eq!(msg.published_at.timestamp(), 1_709_294_400);
        assert!(!msg.is_owner_or_moderator());
    }

    #[test]
    fn test_emoji_runs_become_shortcuts() {
        let runs = r#"[
            {"text": "hi "},
            {"emoji": {"emojiId": "👋", "shortcuts": [":wave:"]}},
            {"emoji": {"emojiId": "UCxyz/abc"}},
            {"emoji": {"emojiId": ""}}
        ]"#;
        let messages = parse_chat_response(response(&[text_action("m1", "Bob", runs, "[]")]));
        assert_eq!(messages[0].text, "hi :wave::UCxyz/abc:");
    }

    #[test]
    fn test_badges() {
        let owner = r#"[{"liveChatAuthorBadgeRenderer": {"icon": {"iconType": "OWNER"}}}]"#;
        let moderator = r#"[
            {"liveChatAuthorBadgeRenderer": {"customThumbnail": {"thumbnails": []}}},
            {"liveChatAuthorBadgeRenderer": {"icon": {"iconType": "MODERATOR"}}}
        ]"#;
        let verified = r#"[{"liveChatAuthorBadgeRenderer": {"icon": {"iconType": "VERIFIED"}}}]"#;

        let messages = parse_chat_response(response(&[
            text_action("m1", "Owner", r#"[{"text": "a"}]"#, owner),
            text_action("m2", "Mod", r#"[{"text": "b"}]"#, moderator),
            text_action("m3", "Star", r#"[{"text": "c"}]"#, verified),
        ]));

        assert!(messages[0].is_owner);
        assert!(messages[1].is_moderator && !messages[1].is_owner);
        assert!(!messages[2].is_owner_or_moderator());
    }

    #[test]
    fn test_non_text_items_and_missing_author_are_skipped() {
        let paid = r#"{"addChatItemAction": {"item": {"liveChatPaidMessageRenderer": {"id": "p1"}}}}"#;
        let anonymous = r#"{"addChatItemAction": {"item": {"liveChatTextMessageRenderer": {"id": "a1"}}}}"#;
        let messages = parse_chat_response(response(&[
            paid.to_string(),
            anonymous.to_string(),
            text_action("m1", "Alice", r#"[{"text": "hi"}]"#, "[]"),
        ]));

        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].id, "m1");
    }

    #[test]
    fn test_replay_action_with_multiple_messages() {
        let replay = format!(
            r#"{{"replayChatItemAction": {{"actions": [{}, {}]}}}}"#,
            text_action("r1", "Alice", r#"[{"text": "one"}]"#, "[]"),
            text_action("r2", "Bob", r#"[{"text": "two"}]"#, "[]"),
        );
        let messages = parse_chat_response(response(&[replay]));
        let ids: Vec<_> = messages.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["r1", "r2"]);
    }

    #[test]
    fn test_empty_responses() {
        assert!(parse_chat_response(serde_json::from_str("{}").unwrap()).is_empty());
        assert!(parse_chat_response(response(&[])).is_empty());
    }

    #[test]
    fn test_parse_timestamp_fallback() {
        let before = Utc::now();
        assert!(parse_timestamp(Some("not-a-number")) >= before);
        assert!(parse_timestamp(None) >= before);
        assert_eq!(parse_timestamp(Some("0")).timestamp(), 0);
    }
}
