/// Lightweight markdown to ratatui conversion for model output.
///
/// Handles headers, emphasis, inline code, links, quotes, rules, lists and
/// code fences. Diagram blocks are stripped before text reaches here.

use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};

const FENCE_RULE: &str = "──────────────────────────────────────";

pub fn markdown_to_lines(input: &str) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    let mut in_code_block = false;
    let dim = Style::default().fg(Color::DarkGray);

    for raw_line in input.lines() {
        if let Some(fence) = raw_line.trim_start().strip_prefix("```") {
            in_code_block = !in_code_block;
            if in_code_block {
                let lang = fence.trim();
                let label = if lang.is_empty() {
                    format!("  ┌{FENCE_RULE}")
                } else {
                    format!("  ┌─ {lang} {FENCE_RULE}")
                };
                lines.push(Line::from(Span::styled(label, dim)));
            } else {
                lines.push(Line::from(Span::styled(format!("  └{FENCE_RULE}"), dim)));
            }
            continue;
        }

        if in_code_block {
            lines.push(Line::from(vec![
                Span::styled("  │ ", dim),
                Span::styled(raw_line.to_string(), Style::default().fg(Color::Yellow)),
            ]));
            continue;
        }

        let trimmed = raw_line.trim();

        if let Some((level, rest)) = heading(trimmed) {
            let style = Style::default().fg(Color::Cyan).add_modifier(if level == 3 {
                Modifier::BOLD
            } else {
                Modifier::BOLD | Modifier::UNDERLINED
            });
            let indent = "  ".repeat(level.saturating_sub(1));
            lines.push(Line::from(Span::styled(format!("{indent}{rest}"), style)));
            continue;
        }

        if trimmed == "---" || trimmed == "***" {
            lines.push(Line::from(Span::styled(format!("  {FENCE_RULE}"), dim)));
            continue;
        }

        if let Some(rest) = trimmed.strip_prefix("> ") {
            let mut spans = vec![Span::styled("  ▎ ", dim)];
            spans.extend(
                parse_inline_markdown(rest)
                    .into_iter()
                    .map(|s| s.patch_style(Style::default().add_modifier(Modifier::ITALIC))),
            );
            lines.push(Line::from(spans));
            continue;
        }

        if let Some(rest) = trimmed.strip_prefix("- ").or_else(|| trimmed.strip_prefix("* ")) {
            let mut spans = vec![Span::styled("  · ", dim)];
            spans.extend(parse_inline_markdown(rest));
            lines.push(Line::from(spans));
            continue;
        }

        if let Some((number, rest)) = numbered_item(trimmed) {
            let mut spans = vec![Span::styled(format!("  {number}. "), dim)];
            spans.extend(parse_inline_markdown(rest));
            lines.push(Line::from(spans));
            continue;
        }

        if trimmed.is_empty() {
            lines.push(Line::from(""));
            continue;
        }

        let mut full_spans = vec![Span::raw("  ".to_string())];
        full_spans.extend(parse_inline_markdown(trimmed));
        lines.push(Line::from(full_spans));
    }

    lines
}

fn heading(line: &str) -> Option<(usize, &str)> {
    let hashes = line.chars().take_while(|c| *c == '#').count();
    if !(1..=3).contains(&hashes) {
        return None;
    }
    line[hashes..].strip_prefix(' ').map(|rest| (hashes, rest))
}

fn numbered_item(line: &str) -> Option<(&str, &str)> {
    let dot = line.find(". ")?;
    let prefix = &line[..dot];
    (!prefix.is_empty() && prefix.chars().all(|c| c.is_ascii_digit()))
        .then(|| (prefix, &line[dot + 2..]))
}

/// Parse inline markdown: **bold**, *italic*, `code`, [links](url), plain text.
fn parse_inline_markdown(input: &str) -> Vec<Span<'static>> {
    let mut spans = Vec::new();
    let mut chars = input.chars().peekable();
    let mut buf = String::new();

    while let Some(ch) = chars.next() {
        match ch {
            '`' => {
                if !buf.is_empty() {
                    spans.push(Span::raw(std::mem::take(&mut buf)));
                }
                let code: String = chars.by_ref().take_while(|c| *c != '`').collect();
                spans.push(Span::styled(code, Style::default().fg(Color::Yellow)));
            }
            '*' if chars.peek() == Some(&'*') => {
                chars.next();
                if !buf.is_empty() {
                    spans.push(Span::raw(std::mem::take(&mut buf)));
                }
                let mut bold = String::new();
                loop {
                    match chars.next() {
                        Some('*') if chars.peek() == Some(&'*') => {
                            chars.next();
                            break;
                        }
                        Some(c) => bold.push(c),
                        None => break,
                    }
                }
                spans.push(Span::styled(
                    bold,
                    Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
                ));
            }
            '*' => {
                if !buf.is_empty() {
                    spans.push(Span::raw(std::mem::take(&mut buf)));
                }
                let italic: String = chars.by_ref().take_while(|c| *c != '*').collect();
                spans.push(Span::styled(
                    italic,
                    Style::default().add_modifier(Modifier::ITALIC),
                ));
            }
            '[' => {
                let rest: String = chars.clone().collect();
                match split_link(&rest) {
                    Some((text, url, consumed)) => {
                        if !buf.is_empty() {
                            spans.push(Span::raw(std::mem::take(&mut buf)));
                        }
                        spans.push(Span::styled(
                            text.to_string(),
                            Style::default()
                                .fg(Color::Blue)
                                .add_modifier(Modifier::UNDERLINED),
                        ));
                        spans.push(Span::styled(
                            format!(" ({url})"),
                            Style::default().fg(Color::DarkGray),
                        ));
                        for _ in 0..consumed {
                            chars.next();
                        }
                    }
                    None => buf.push(ch),
                }
            }
            _ => buf.push(ch),
        }
    }

    if !buf.is_empty() {
        spans.push(Span::raw(buf));
    }

    if spans.is_empty() {
        spans.push(Span::raw(String::new()));
    }

    spans
}

/// `text](url)...` → (text, url, chars consumed after the opening bracket).
fn split_link(rest: &str) -> Option<(&str, &str, usize)> {
    let close = rest.find("](")?;
    let text = &rest[..close];
    let after = &rest[close + 2..];
    let end = after.find(')')?;
    let url = &after[..end];
    if text.is_empty() || url.is_empty() || text.contains('[') {
        return None;
    }
    let consumed = rest[..close + 2 + end + 1].chars().count();
    Some((text, url, consumed))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain(line: &Line<'_>) -> String {
        line.spans.iter().map(|s| s.content.as_ref()).collect()
    }

    #[test]
    fn fence_shows_language() {
        let lines = markdown_to_lines("```rust\nfn main() {}\n```");
        assert!(plain(&lines[0]).contains("─ rust "));
        assert_eq!(plain(&lines[1]), "  │ fn main() {}");
        assert!(plain(&lines[2]).starts_with("  └"));
    }

    #[test]
    fn link_keeps_url_visible() {
        let lines = markdown_to_lines("see [docs](https://example.com) now");
        assert_eq!(plain(&lines[0]), "  see docs (https://example.com) now");
    }

    #[test]
    fn unmatched_bracket_is_literal() {
        let lines = markdown_to_lines("array[0] stays");
        assert_eq!(plain(&lines[0]), "  array[0] stays");
    }

    #[test]
    fn headings_and_lists() {
        let lines = markdown_to_lines("## Plan\n1. first\n- second\n#nope");
        assert_eq!(plain(&lines[0]), "  Plan");
        assert_eq!(plain(&lines[1]), "  1. first");
        assert_eq!(plain(&lines[2]), "  · second");
        assert_eq!(plain(&lines[3]), "  #nope");
    }
}
