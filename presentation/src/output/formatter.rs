//! Formatting of backend notices into user-facing messages

use herd_application::NoticeFormatter;
use herd_domain::{InstanceId, PermissionRequest, SessionFailure, TodoItem, TodoUpdate};

/// Plain-text notices, suitable for chat transports without markup.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainNoticeFormatter;

impl PlainNoticeFormatter {
    fn todo_marker(item: &TodoItem) -> &'static str {
        match item.status.as_str() {
            "completed" | "done" => "[x]",
            "cancelled" => "[-]",
            "in_progress" => "[~]",
            _ => "[ ]",
        }
    }
}

impl NoticeFormatter for PlainNoticeFormatter {
    fn permission(&self, instance_id: &InstanceId, request: &PermissionRequest) -> String {
        let mut output = format!("Permission requested on {}\n", instance_id);
        output.push_str(&format!("{}\n", request.title));
        output.push_str(&format!("Type: {}\n", request.kind));
        if let Some(pattern) = &request.pattern {
            output.push_str(&format!("Pattern: {}\n", pattern));
        }
        output.push_str(&format!(
            "\nReply \"allow {id}\" to approve or \"deny {id}\" to reject.",
            id = request.permission_id
        ));
        output
    }

    fn todos(&self, update: &TodoUpdate) -> String {
        if update.todos.is_empty() {
            return "Todo list cleared.".to_string();
        }

        let done = update.todos.iter().filter(|t| t.is_done()).count();
        let mut output = format!("Todo progress: {}/{} done\n", done, update.todos.len());
        for item in &update.todos {
            output.push_str(&format!("\n{} {}", Self::todo_marker(item), item.content));
            if let Some(priority) = &item.priority {
                output.push_str(&format!(" ({})", priority));
            }
        }
        output
    }

    fn session_error(&self, failure: &SessionFailure) -> String {
        let heading = match &failure.name {
            Some(name) => format!("Backend error ({}):", name),
            None => "Backend error:".to_string(),
        };
        format!(
            "{}\n{}\n\nIf this keeps happening, switch to another provider or model and send your message again.",
            heading, failure.message
        )
    }
}
