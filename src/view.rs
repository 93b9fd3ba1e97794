// Rendering helpers for front ends over TaskStore

use crate::filter::Filter;
use crate::store::Stats;
use crate::task::Task;
use colored::Colorize;

/// Escape text for insertion into HTML markup
///
/// The store keeps task text verbatim; any markup renderer must run it
/// through this first.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// One terminal line per task: checkbox, id, text
pub fn render_task_line(task: &Task) -> String {
    if task.completed {
        format!(
            "{} {} {}",
            "[x]".green(),
            task.id.to_string().dimmed(),
            task.text.dimmed().strikethrough()
        )
    } else {
        format!("[ ] {} {}", task.id.to_string().dimmed(), task.text)
    }
}

/// The filtered list, or an empty-state message
pub fn render_list<'a, I>(tasks: I, filter: Filter) -> String
where
    I: IntoIterator<Item = &'a Task>,
{
    let lines: Vec<String> = tasks.into_iter().map(render_task_line).collect();
    if lines.is_empty() {
        return match filter {
            Filter::All => "No tasks yet. Add one to get started!".to_string(),
            Filter::Completed => "No completed tasks.".to_string(),
            Filter::Pending => "No pending tasks.".to_string(),
        };
    }
    lines.join("\n")
}

pub fn render_stats(stats: &Stats) -> String {
    format!(
        "{} total, {} completed, {} pending",
        stats.total.to_string().bold(),
        stats.completed.to_string().green(),
        stats.pending().to_string().yellow()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskId;

    fn plain() {
        colored::control::set_override(false);
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html(r#"<script>alert("x") & 'y'</script>"#),
            "&lt;script&gt;alert(&quot;x&quot;) &amp; &#39;y&#39;&lt;/script&gt;"
        );
        assert_eq!(escape_html("Buy milk"), "Buy milk");
    }

    #[test]
    fn test_render_task_line() {
        plain();
        let mut task = Task::new(TaskId(5), "Buy milk");
        assert_eq!(render_task_line(&task), "[ ] 5 Buy milk");
        task.completed = true;
        assert_eq!(render_task_line(&task), "[x] 5 Buy milk");
    }

    #[test]
    fn test_render_list_empty_states() {
        plain();
        assert_eq!(render_list(&[], Filter::Pending), "No pending tasks.");
        assert!(render_list(&[], Filter::All).starts_with("No tasks yet"));

        let tasks = [Task::new(TaskId(2), "b"), Task::new(TaskId(1), "a")];
        assert_eq!(render_list(&tasks, Filter::All), "[ ] 2 b\n[ ] 1 a");
    }

    #[test]
    fn test_render_stats() {
        plain();
        let stats = Stats { total: 5, completed: 3 };
        assert_eq!(render_stats(&stats), "5 total, 3 completed, 2 pending");
    }
}
