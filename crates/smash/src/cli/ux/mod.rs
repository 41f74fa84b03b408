use console::{Style, StyledObject};

/// Kind of line printed by the cli, used for styling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    Success,
    Error,
}

pub fn style_text(text: &str, kind: MessageType) -> StyledObject<&str> {
    let style_obj = match kind {
        MessageType::Success => Style::new().green(),
        MessageType::Error => Style::new().red().bold(),
    };
    style_obj.apply_to(text)
}

pub fn present_error(error: anyhow::Error) {
    let error_text = style_text("ERROR:", MessageType::Error);
    eprintln!("\n{error_text} {error:#}");
}
