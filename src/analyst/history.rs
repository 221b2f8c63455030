use crate::models::chat::{ Role, Turn };

/// The most recent `min(window, len - 1)` turns before the last one, which is
/// the turn being answered. Empty when history use is disabled.
pub fn chat_history(turns: &[Turn], window: usize, enabled: bool) -> &[Turn] {
    if !enabled || turns.is_empty() {
        return &[];
    }
    let end = turns.len() - 1;
    let start = end.saturating_sub(window);
    &turns[start..end]
}

pub fn format_history_for_prompt(turns: &[Turn]) -> String {
    if turns.is_empty() {
        return String::new();
    }
    let mut result = String::new();
    for turn in turns {
        let role_display = match turn.role {
            Role::User => "User",
            Role::Assistant => "Assistant",
        };

        result.push_str(&format!("{}: {}\n", role_display, turn.content));
    }

    result
}
