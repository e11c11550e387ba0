use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::domain::{
    conversation::ConversationSummary,
    message::Message,
    session::UserId,
    status::{AuthStatus, SessionSnapshot},
};

const TIMESTAMP_PLACEHOLDER: &str = "     ";
const EMPTY_LIST_TEXT: &str = "No conversations yet";

/// One text row per conversation: `HH:MM | Name  preview [n]`.
pub fn render_conversation_lines(summaries: &[ConversationSummary], width: usize) -> Vec<String> {
    if summaries.is_empty() {
        return vec![EMPTY_LIST_TEXT.to_owned()];
    }

    summaries
        .iter()
        .map(|summary| conversation_line(summary, width))
        .collect()
}

fn conversation_line(summary: &ConversationSummary, width: usize) -> String {
    let timestamp = format_conversation_timestamp(summary.last_message_at);
    let unread_badge = if summary.unread_count > 0 {
        format!(" [{}]", summary.unread_count)
    } else {
        String::new()
    };

    let head = format!("{:>5} | {} ", timestamp, summary.partner_display_name);
    let preview = normalize_preview(&summary.last_message_text);
    let available = width.saturating_sub(head.width() + unread_badge.width());

    format!("{head}{}{unread_badge}", truncate_with_ellipsis(&preview, available))
}

/// Messages of one thread, oldest first, with the signed-in user's own lines marked.
pub fn render_thread_lines(messages: &[&Message], me: &UserId, width: usize) -> Vec<String> {
    messages
        .iter()
        .map(|message| {
            let marker = if message.sender_id == *me { ">" } else { "<" };
            let state = if message.is_unread_for(me) { "*" } else { " " };
            let head = format!(
                "{:>5} {marker}{state} ",
                format_conversation_timestamp(message.created_at_unix_ms)
            );
            let available = width.saturating_sub(head.width());
            format!(
                "{head}{}",
                truncate_with_ellipsis(&normalize_preview(&message.content), available)
            )
        })
        .collect()
}

pub fn render_status_line(snapshot: &SessionSnapshot) -> String {
    match (snapshot.status, snapshot.current_session()) {
        (AuthStatus::Authenticated, Some(session)) => {
            format!("Signed in as {} ({})", session.display_name, session.user_id)
        }
        (AuthStatus::Unauthenticated, _) => "Not signed in".to_owned(),
        _ => "Checking session...".to_owned(),
    }
}

pub fn format_conversation_timestamp(timestamp_ms: i64) -> String {
    use chrono::{Local, TimeZone};

    let datetime = match Local.timestamp_millis_opt(timestamp_ms) {
        chrono::LocalResult::Single(dt) => dt,
        chrono::LocalResult::Ambiguous(dt, _) => dt,
        chrono::LocalResult::None => return TIMESTAMP_PLACEHOLDER.to_owned(),
    };

    if datetime.date_naive() == Local::now().date_naive() {
        datetime.format("%H:%M").to_string()
    } else {
        datetime.format("%d.%m").to_string()
    }
}

fn normalize_preview(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn truncate_with_ellipsis(text: &str, max_width: usize) -> String {
    if text.width() <= max_width {
        return text.to_owned();
    }
    if max_width <= 1 {
        return "…".repeat(max_width);
    }

    let mut truncated = String::new();
    let mut used = 0;
    for ch in text.chars() {
        let next = used + ch.width().unwrap_or(0);
        if next + 1 > max_width {
            break;
        }
        truncated.push(ch);
        used = next;
    }
    truncated.push('…');
    truncated
}
