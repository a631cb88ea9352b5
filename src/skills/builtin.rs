//! Built-in skills: fixed trigger patterns with a parser that turns the
//! matched command into an action template.

use crate::intent::{Action, ActionTemplate};

/// A built-in skill. The handler returns `None` when the command matched a
/// trigger but names no operation the skill knows.
#[derive(Debug, Clone, Copy)]
pub struct BuiltinSkill {
    pub name: &'static str,
    pub patterns: &'static [&'static str],
    pub handler: fn(&str) -> Option<ActionTemplate>,
}

impl BuiltinSkill {
    pub fn matches(&self, lower: &str) -> bool {
        self.patterns.iter().any(|p| lower.contains(p))
    }
}

/// The built-in tier, in match order.
pub fn builtin_skills() -> Vec<BuiltinSkill> {
    vec![
        BuiltinSkill {
            name: "system_control",
            patterns: &["shutdown", "restart", "sleep", "lock"],
            handler: system_control,
        },
        BuiltinSkill {
            name: "media_control",
            patterns: &["play", "pause", "volume", "mute"],
            handler: media_control,
        },
        BuiltinSkill {
            name: "file_operations",
            patterns: &["create file", "delete file", "rename"],
            handler: file_operations,
        },
    ]
}

fn system_control(command: &str) -> Option<ActionTemplate> {
    let (operation, reply) = if command.contains("shutdown") {
        ("shutdown", "Shutting down the system.")
    } else if command.contains("restart") {
        ("restart", "Restarting the system.")
    } else if command.contains("sleep") {
        ("sleep", "Putting the system to sleep.")
    } else if command.contains("lock") {
        ("lock", "Locking the screen.")
    } else {
        return None;
    };
    Some(
        ActionTemplate::new(Action::System)
            .with_param("operation", operation)
            .with_reply(reply),
    )
}

fn media_control(command: &str) -> Option<ActionTemplate> {
    let (operation, reply) = if command.contains("play") || command.contains("pause") {
        ("playpause", "Toggled play/pause.")
    } else if command.contains("volume up") {
        ("volume_up", "Increased volume.")
    } else if command.contains("volume down") {
        ("volume_down", "Decreased volume.")
    } else if command.contains("mute") {
        ("mute", "Toggled mute.")
    } else {
        return None;
    };
    Some(
        ActionTemplate::new(Action::Media)
            .with_param("operation", operation)
            .with_reply(reply),
    )
}

fn file_operations(command: &str) -> Option<ActionTemplate> {
    for (trigger, operation, verb) in [
        ("create file", "create", "Created"),
        ("delete file", "delete", "Deleted"),
    ] {
        if let Some((_, rest)) = command.rsplit_once(trigger) {
            let path = rest.trim();
            if path.is_empty() {
                return None;
            }
            return Some(
                ActionTemplate::new(Action::File)
                    .with_param("operation", operation)
                    .with_param("path", path)
                    .with_reply(format!("{verb} file: {path}")),
            );
        }
    }
    None
}
