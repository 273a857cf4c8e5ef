/// Rendering logic: turns conversation entries into `Vec<Line<'static>>`.
///
/// - User turns: `>` prompt style
/// - Assistant turns: markdown with an `[assistant]` prefix, diagrams listed
///   below the text, thoughts under a `⎿` summary
/// - System turns: yellow one-liners

use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};

use super::markdown;
use crate::diagram::{self, DiagramBlock};
use crate::model::{Message, Role, TaskSession, TaskStatus, ThoughtEntry, TokenUsage};

const ASSISTANT_TAG: &str = "assistant";

pub fn render_message(msg: &Message, show_thoughts: bool) -> Vec<Line<'static>> {
    let mut lines = match msg.role {
        Role::User => render_user_message(&msg.content),
        Role::Assistant => render_assistant_message(&msg.content),
        Role::System => render_system_message(&msg.content),
    };

    if let Some(image) = &msg.image {
        let label = image.alt.as_deref().unwrap_or("image");
        lines.push(Line::from(Span::styled(
            format!("  [{label}: {}]", image.url),
            Style::default().fg(Color::Magenta),
        )));
    } else if msg.image_data.is_some() {
        lines.push(Line::from(Span::styled(
            "  [inline image]",
            Style::default().fg(Color::Magenta),
        )));
    }

    if let Some(refs) = msg.references.as_deref().filter(|r| !r.is_empty()) {
        lines.push(Line::from(Span::styled(
            "  References:",
            Style::default().fg(Color::DarkGray),
        )));
        for r in refs {
            lines.push(Line::from(vec![
                Span::styled("    · ", Style::default().fg(Color::DarkGray)),
                Span::styled(r.title.clone(), Style::default().fg(Color::White)),
                Span::styled(format!(" {}", r.url), Style::default().fg(Color::Blue)),
            ]));
        }
    }

    if msg.role == Role::Assistant {
        if let Some(thoughts) = msg.thoughts.as_deref().filter(|t| !t.is_empty()) {
            lines.extend(render_thoughts(thoughts, !show_thoughts));
        }
    }

    lines.push(Line::from(""));
    lines
}

fn render_user_message(text: &str) -> Vec<Line<'static>> {
    vec![Line::from(vec![
        Span::styled(
            "> ",
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(text.to_string(), Style::default().fg(Color::White)),
    ])]
}

fn render_assistant_message(text: &str) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    let md_lines = markdown::markdown_to_lines(&diagram::strip(text));

    let tag = Span::styled(
        format!("[{ASSISTANT_TAG}] "),
        Style::default()
            .fg(Color::Green)
            .add_modifier(Modifier::BOLD),
    );

    match md_lines.first() {
        Some(first) => {
            let mut first_spans = vec![tag];
            first_spans.extend(first.spans.iter().cloned());
            lines.push(Line::from(first_spans));
        }
        None => lines.push(Line::from(tag)),
    }

    let indent = " ".repeat(ASSISTANT_TAG.len() + 3);
    for md_line in md_lines.iter().skip(1) {
        let mut spans = vec![Span::raw(indent.clone())];
        spans.extend(md_line.spans.iter().cloned());
        lines.push(Line::from(spans));
    }

    for (i, block) in diagram::extract(text).iter().enumerate() {
        lines.extend(render_diagram(i + 1, block));
    }

    lines
}

fn render_system_message(text: &str) -> Vec<Line<'static>> {
    text.lines()
        .map(|l| {
            Line::from(Span::styled(
                l.to_string(),
                Style::default().fg(Color::Yellow),
            ))
        })
        .collect()
}

/// A diagram's source in a box, or the render error in its place.
pub fn render_diagram(index: usize, block: &DiagramBlock) -> Vec<Line<'static>> {
    let dim = Style::default().fg(Color::DarkGray);
    match diagram::validate(&block.code) {
        Ok(kind) => {
            let mut lines = vec![Line::from(vec![
                Span::styled("  ◆ ", Style::default().fg(Color::Magenta)),
                Span::styled(
                    format!("Diagram {index}"),
                    Style::default()
                        .fg(Color::Magenta)
                        .add_modifier(Modifier::BOLD),
                ),
                Span::styled(format!(" ({})", kind.keyword()), dim),
            ])];
            for code_line in block.code.lines() {
                lines.push(Line::from(vec![
                    Span::styled("  │ ", dim),
                    Span::styled(code_line.to_string(), Style::default().fg(Color::Yellow)),
                ]));
            }
            lines
        }
        Err(err) => vec![Line::from(vec![
            Span::styled("  ✗ ", Style::default().fg(Color::Red)),
            Span::styled(
                format!("Error rendering diagram: {err}"),
                Style::default().fg(Color::Red),
            ),
        ])],
    }
}

/// Thoughts attached to a finished assistant turn.
pub fn render_thoughts(thoughts: &[ThoughtEntry], collapsed: bool) -> Vec<Line<'static>> {
    let dim = Style::default().fg(Color::DarkGray);
    let count = thoughts.len();
    let summary = format!(
        "{} thought{}",
        count,
        if count == 1 { "" } else { "s" }
    );

    if collapsed {
        return vec![Line::from(vec![
            Span::styled("  ⎿  ", dim),
            Span::styled(
                format!("{summary} (Ctrl+T to expand)"),
                dim.add_modifier(Modifier::ITALIC),
            ),
        ])];
    }

    let mut lines = vec![Line::from(vec![
        Span::styled("  ⎿  ", dim),
        Span::styled(summary, dim.add_modifier(Modifier::ITALIC)),
    ])];
    for thought in thoughts {
        lines.extend(render_thought(thought));
    }
    lines
}

fn render_thought(thought: &ThoughtEntry) -> Vec<Line<'static>> {
    let dim = Style::default().fg(Color::DarkGray);
    let mut lines = Vec::new();
    let kind = if thought.kind.is_empty() {
        "thought"
    } else {
        thought.kind.as_str()
    };
    lines.push(Line::from(vec![
        Span::styled("    ⏺ ", Style::default().fg(Color::Blue)),
        Span::styled(kind.to_string(), Style::default().fg(Color::Cyan)),
        Span::styled(format!("  {}", thought.timestamp), dim),
    ]));
    for l in thought.display_content().lines() {
        lines.push(Line::from(Span::styled(format!("      {l}"), dim)));
    }
    lines
}

/// Live thoughts while the agent is working: the newest one plus a count.
pub fn render_live_thoughts(thoughts: &[ThoughtEntry]) -> Vec<Line<'static>> {
    let Some(last) = thoughts.last() else {
        return vec![Line::from(Span::styled(
            "  ⏺ Thinking...",
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::ITALIC),
        ))];
    };

    let mut lines = vec![Line::from(vec![
        Span::styled("  ⏺ ", Style::default().fg(Color::Yellow)),
        Span::styled(
            truncate_str(&last.display_content().replace('\n', " "), 120),
            Style::default().fg(Color::White),
        ),
    ])];

    let prev_count = thoughts.len() - 1;
    if prev_count > 0 {
        lines.push(Line::from(Span::styled(
            format!(
                "    +{} earlier thought{}",
                prev_count,
                if prev_count == 1 { "" } else { "s" }
            ),
            Style::default()
                .fg(Color::DarkGray)
                .add_modifier(Modifier::ITALIC),
        )));
    }
    lines
}

pub fn render_session(session: &TaskSession, current: bool) -> Line<'static> {
    let color = match session.status {
        TaskStatus::Active => Color::Green,
        TaskStatus::Paused => Color::Yellow,
        TaskStatus::Completed => Color::Blue,
        TaskStatus::Failed => Color::Red,
        TaskStatus::Unknown => Color::DarkGray,
    };
    let name_style = if current {
        Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::White)
    };
    let name = if session.task_name.is_empty() {
        session.task_id.as_str()
    } else {
        session.task_name.as_str()
    };
    Line::from(vec![
        Span::styled(" ● ", Style::default().fg(color)),
        Span::styled(truncate_str(name, 22), name_style),
    ])
}

/// Token counters for the status line, e.g. "↑1.2k ↓340 Σ1.5k".
pub fn format_tokens(usage: &TokenUsage) -> String {
    format!(
        "↑{} ↓{} Σ{}",
        format_compact_tokens(usage.prompt_tokens),
        format_compact_tokens(usage.candidates_tokens),
        format_compact_tokens(usage.total_tokens)
    )
}

fn format_compact_tokens(tokens: u64) -> String {
    if tokens >= 1_000_000 {
        format!("{:.1}m", tokens as f64 / 1_000_000.0)
    } else if tokens >= 10_000 {
        format!("{}k", tokens / 1000)
    } else if tokens >= 1_000 {
        format!("{:.1}k", tokens as f64 / 1000.0)
    } else {
        format!("{}", tokens)
    }
}

pub fn truncate_str(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{truncated}...")
    }
}
