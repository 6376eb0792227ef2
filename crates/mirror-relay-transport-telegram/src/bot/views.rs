//! View layer for bot UI components
//!
//! Contains the destination keyboard, callback data and every text the bot
//! sends. Texts are HTML; dynamic parts are escaped here.

use html_escape::encode_text;
use mirror_relay_core::upload::Host;
use mirror_relay_core::utils::human_size;
use mirror_relay_runtime::SelectionKind;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};

// ─────────────────────────────────────────────────────────────────────────────
// Callback data
// ─────────────────────────────────────────────────────────────────────────────

const CALLBACK_SEPARATOR: char = ':';

/// Callback data of a destination button, e.g. `up:gofile`.
#[must_use]
pub fn destination_callback(kind: SelectionKind, host: Host) -> String {
    format!("{}{CALLBACK_SEPARATOR}{}", kind.prefix(), host.key())
}

/// Parse destination-button callback data.
///
/// # Examples
///
/// ```
/// use mirror_relay_core::upload::Host;
/// use mirror_relay_runtime::SelectionKind;
/// use mirror_relay_transport_telegram::bot::views::parse_destination;
///
/// assert_eq!(
///     parse_destination("mi:uguu"),
///     Some((SelectionKind::Mirror, Host::Uguu))
/// );
/// assert_eq!(parse_destination("noop"), None);
/// ```
#[must_use]
pub fn parse_destination(data: &str) -> Option<(SelectionKind, Host)> {
    let (prefix, host) = data.split_once(CALLBACK_SEPARATOR)?;
    Some((SelectionKind::from_prefix(prefix)?, Host::from_key(host)?))
}

/// Inline keyboard with one button per host.
#[must_use]
pub fn destination_keyboard(kind: SelectionKind) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![Host::ALL
        .into_iter()
        .map(|host| InlineKeyboardButton::callback(host.display_name(), destination_callback(kind, host)))
        .collect::<Vec<_>>()])
}

// ─────────────────────────────────────────────────────────────────────────────
// Texts
// ─────────────────────────────────────────────────────────────────────────────

/// Trait for relay UI view rendering
pub trait RelayView {
    /// Welcome text with the command list and the task limit
    fn welcome(first_name: &str, task_limit: u64) -> String;

    /// `/u` sent without replying to a message
    fn reply_to_file_first() -> &'static str;

    /// `/u` replied to a message without document, video or photo
    fn no_media() -> &'static str;

    /// Destination prompt
    fn choose_destination(kind: SelectionKind) -> &'static str;

    /// Command sent without its URL argument
    fn usage(command: &str) -> String;

    /// Button clicked but nothing pending
    fn selection_missing(kind: SelectionKind) -> &'static str;

    /// Callback data that does not name a known action
    fn unknown_action() -> &'static str;

    /// First status line of a leech
    fn starting_download() -> &'static str;

    /// Attachment uploaded
    fn upload_done(host: Host, link: &str) -> String;

    /// Mirror finished (status message)
    fn mirror_done(host: Host, link: &str) -> String;

    /// Mirror finished (summary posted as a new message)
    fn mirror_summary(host: Host, filename: &str, size: u64, link: &str) -> String;

    /// Leech download exceeds what the bot may send
    fn leech_too_large(size: u64, limit: u64) -> String;

    /// Leech file is being sent into the chat
    fn uploading_to_telegram() -> &'static str;

    /// Leech delivered
    fn leech_done() -> &'static str;

    /// Failure line
    fn error(detail: &str) -> String;
}

/// Default English view
pub struct DefaultRelayView;

impl RelayView for DefaultRelayView {
    fn welcome(first_name: &str, task_limit: u64) -> String {
        format!(
            "Hello {}\n\
             Welcome to the free mirror bot.\n\n\
             • Reply to a file with /u (pick a host)\n\
             • /mirror &lt;url&gt; (mirror a URL, pick a host)\n\
             • /leech &lt;url&gt; (download a URL and send it here when possible)\n\n\
             Leech/mirror limit: {}",
            encode_text(first_name),
            human_size(task_limit)
        )
    }

    fn reply_to_file_first() -> &'static str {
        "Reply to a file first."
    }

    fn no_media() -> &'static str {
        "That message has no media (document/video/photo)."
    }

    fn choose_destination(kind: SelectionKind) -> &'static str {
        match kind {
            SelectionKind::Upload => "Upload where?",
            SelectionKind::Mirror => "Mirror where?",
        }
    }

    fn usage(command: &str) -> String {
        format!("Usage: /{command} &lt;url&gt;")
    }

    fn selection_missing(kind: SelectionKind) -> &'static str {
        match kind {
            SelectionKind::Upload => "File not found (send /u again).",
            SelectionKind::Mirror => "URL not found (send /mirror again).",
        }
    }

    fn unknown_action() -> &'static str {
        "Unknown action."
    }

    fn starting_download() -> &'static str {
        "Starting download..."
    }

    fn upload_done(host: Host, link: &str) -> String {
        format!("✅ Upload ({host}):\n{}", encode_text(link))
    }

    fn mirror_done(host: Host, link: &str) -> String {
        format!("✅ Mirror ({host}) finished:\n{}", encode_text(link))
    }

    fn mirror_summary(host: Host, filename: &str, size: u64, link: &str) -> String {
        format!(
            "✅ Mirror ({host}) finished\nName: {}\nSize: {}\nLink: {}",
            encode_text(filename),
            human_size(size),
            encode_text(link)
        )
    }

    fn leech_too_large(size: u64, limit: u64) -> String {
        format!(
            "❌ File is too large for the bot to send to Telegram.\n\
             Size: {} | Bot limit: {}\n\n\
             Options:\n\
             • Use /mirror &lt;url&gt; and pick a host to get a link.\n\
             • Or use a smaller version of the file.",
            human_size(size),
            human_size(limit)
        )
    }

    fn uploading_to_telegram() -> &'static str {
        "Uploading to Telegram... (this can take a few minutes)"
    }

    fn leech_done() -> &'static str {
        "Done ✅"
    }

    fn error(detail: &str) -> String {
        format!("❌ Error:\n{}", encode_text(detail))
    }
}

/// Notices sent to the owner chat.
pub mod owner {
    use super::{encode_text, human_size, Host};

    /// Attachment uploaded by a user
    #[must_use]
    pub fn upload(user_id: u64, host: Host, link: &str) -> String {
        format!(
            "Upload by {user_id}\nHost: {}\n{}",
            host.key(),
            encode_text(link)
        )
    }

    /// URL mirrored by a user
    #[must_use]
    pub fn mirror(user_id: u64, host: Host, size: u64, url: &str, link: &str) -> String {
        format!(
            "Mirror by {user_id}\nHost: {}\nSize: {}\n{}\n{}",
            host.key(),
            human_size(size),
            encode_text(url),
            encode_text(link)
        )
    }

    /// URL leeched into the chat
    #[must_use]
    pub fn leech(user_id: u64, url: &str, size: u64, filename: &str) -> String {
        format!(
            "Leech by {user_id}\n{}\nSize: {}\nFile: {}",
            encode_text(url),
            human_size(size),
            encode_text(filename)
        )
    }

    /// Leech refused because of the relay ceiling
    #[must_use]
    pub fn leech_rejected(user_id: u64, url: &str, size: u64) -> String {
        format!(
            "Leech refused (Telegram limit) for {user_id}\n{}\nSize: {}",
            encode_text(url),
            human_size(size)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use teloxide::types::InlineKeyboardButtonKind;

    #[test]
    fn keyboard_has_one_button_per_host() {
        let keyboard = destination_keyboard(SelectionKind::Upload);
        let data: Vec<String> = keyboard
            .inline_keyboard
            .iter()
            .flatten()
            .filter_map(|button| match &button.kind {
                InlineKeyboardButtonKind::CallbackData(data) => Some(data.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(data, vec!["up:gofile", "up:pixeldrain", "up:uguu"]);
    }

    #[test]
    fn callback_data_round_trips() {
        for kind in [SelectionKind::Upload, SelectionKind::Mirror] {
            for host in Host::ALL {
                assert_eq!(
                    parse_destination(&destination_callback(kind, host)),
                    Some((kind, host))
                );
            }
        }
    }

    #[test]
    fn unknown_actions_are_rejected() {
        assert_eq!(parse_destination("up:dropbox"), None);
        assert_eq!(parse_destination("zz:gofile"), None);
        assert_eq!(parse_destination(""), None);
    }

    #[test]
    fn dynamic_parts_are_escaped() {
        let text = DefaultRelayView::mirror_summary(Host::Uguu, "<b>x</b>.txt", 2048, "https://a/?a=1&b=2");
        assert!(text.contains("&lt;b&gt;x&lt;/b&gt;.txt"));
        assert!(text.contains("a=1&amp;b=2"));
        assert!(text.contains("Size: 2KB"));
        assert_eq!(DefaultRelayView::error("x < y"), "❌ Error:\nx &lt; y");
    }

    #[test]
    fn welcome_mentions_task_limit() {
        let text = DefaultRelayView::welcome("Ana", 60 * 1024 * 1024);
        assert!(text.starts_with("Hello Ana\n"));
        assert!(text.ends_with("Leech/mirror limit: 60MB"));
    }
}
