use super::super::render;
use super::{App, PALETTE};
use crate::actions::SUGGESTIONS;
use crate::store::View;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};

impl App {
    pub fn render(&mut self, f: &mut ratatui::Frame) {
        let banner_height = if self.store.error().is_some() { 1 } else { 0 };
        // Fixed bottom: divider(1) + input(1) + divider(1) + status(1) = 4 lines
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Min(1),
                Constraint::Length(banner_height),
                Constraint::Length(4),
            ])
            .split(f.area());

        let local = self.store.state().local;
        let content_area = if local.sidebar_open {
            let cols = Layout::default()
                .direction(Direction::Horizontal)
                .constraints([Constraint::Length(30), Constraint::Min(1)])
                .split(rows[0]);
            self.render_sidebar(f, cols[0]);
            cols[1]
        } else {
            rows[0]
        };

        let lines = match self.view {
            View::Chat => self.chat_lines(),
            View::Tasks => self.task_lines(),
        };
        self.render_scrolled(f, content_area, lines);

        if let Some(error) = self.store.error() {
            let banner = Paragraph::new(Line::from(vec![
                Span::styled(
                    " ERROR ",
                    Style::default().fg(Color::White).bg(Color::Red),
                ),
                Span::styled(format!(" {error}"), Style::default().fg(Color::Red)),
                Span::styled("  (Esc to dismiss)", Style::default().fg(Color::DarkGray)),
            ]));
            f.render_widget(banner, rows[1]);
        }

        self.render_input(f, rows[2]);

        if let Some(selected) = self.diagram_panel {
            self.render_diagram_panel(f, rows[0], selected);
        }
        if local.command_palette_open {
            self.render_palette(f);
        }
        if local.settings_open {
            self.render_settings(f);
        }
    }

    fn chat_lines(&self) -> Vec<Line<'static>> {
        let state = self.store.state();
        let mut lines: Vec<Line<'static>> = Vec::new();

        if state.conversation_history.is_empty() {
            lines.extend(self.banner.iter().cloned());
        }

        for msg in &state.conversation_history {
            lines.extend(render::render_message(msg, state.show_thoughts));
        }

        if state.is_thinking {
            if state.show_thoughts {
                lines.extend(render::render_live_thoughts(&state.agent_thoughts));
            }
            if let Some(reasoning) = state.latest_reasoning.as_deref() {
                lines.push(Line::from(Span::styled(
                    format!("    {}", render::truncate_str(reasoning, 160)),
                    Style::default()
                        .fg(Color::DarkGray)
                        .add_modifier(Modifier::ITALIC),
                )));
            }
        }

        if let Some(panel) = &self.thoughts_panel {
            lines.push(Line::from(Span::styled(
                format!("Thoughts for task {} (Esc to close)", panel.task_id),
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            )));
            if panel.entries.is_empty() {
                lines.push(Line::from(Span::styled(
                    "  No thoughts recorded.",
                    Style::default().fg(Color::DarkGray),
                )));
            } else {
                lines.extend(render::render_thoughts(&panel.entries, false));
            }
            lines.push(Line::from(""));
        }

        for notice in &self.notices {
            lines.push(Line::from(Span::styled(
                notice.clone(),
                Style::default().fg(Color::Yellow),
            )));
        }

        lines
    }

    fn task_lines(&self) -> Vec<Line<'static>> {
        let dim = Style::default().fg(Color::DarkGray);
        let mut lines = vec![
            Line::from(Span::styled(
                "Saved tasks",
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD | Modifier::UNDERLINED),
            )),
            Line::from(""),
        ];

        if self.saved_tasks.is_empty() {
            lines.push(Line::from(Span::styled(
                "  No saved tasks yet. /save <name> | <plan> adds one.",
                dim,
            )));
        }

        for (i, task) in self.saved_tasks.iter().enumerate() {
            let selected = i == self.selected_task;
            let marker = if selected { ">" } else { " " };
            let style = if selected {
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::White)
            };
            lines.push(Line::from(Span::styled(
                format!("  {marker} {}", task.name),
                style,
            )));
            let preview = if task.preview.is_empty() {
                &task.full_plan
            } else {
                &task.preview
            };
            lines.push(Line::from(Span::styled(
                format!("      {}", render::truncate_str(&preview.replace('\n', " "), 100)),
                dim,
            )));
            if selected {
                for plan_line in task.full_plan.lines() {
                    lines.push(Line::from(Span::styled(format!("      │ {plan_line}"), dim)));
                }
            }
        }

        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            "  ↑↓ select   Enter run   /update <name> | <plan>   /delete   Tab chat",
            dim,
        )));
        for notice in &self.notices {
            lines.push(Line::from(Span::styled(
                notice.clone(),
                Style::default().fg(Color::Yellow),
            )));
        }
        lines
    }

    fn render_sidebar(&self, f: &mut ratatui::Frame, area: Rect) {
        let state = self.store.state();
        let dim = Style::default().fg(Color::DarkGray);
        let mut lines: Vec<Line<'static>> = Vec::new();

        let title = if state.local.code_view_open {
            for l in state.execution_log.lines() {
                lines.push(Line::from(Span::styled(l.to_string(), dim)));
            }
            if lines.is_empty() {
                lines.push(Line::from(Span::styled("No execution log yet.", dim)));
            }
            " Execution log "
        } else {
            let current = state.current_task_id.as_deref();
            for session in &state.task_history {
                lines.push(render::render_session(
                    session,
                    current == Some(session.task_id.as_str()),
                ));
            }
            if state.task_history.is_empty() {
                lines.push(Line::from(Span::styled(" No tasks yet.", dim)));
            }
            lines.push(Line::from(""));
            lines.push(Line::from(Span::styled(
                " Suggested",
                Style::default().fg(Color::Cyan),
            )));
            for (i, s) in SUGGESTIONS.iter().enumerate() {
                lines.push(Line::from(Span::styled(format!(" /suggest {} {}", i + 1, s.name), dim)));
            }
            " Tasks "
        };

        let block = Block::default()
            .borders(Borders::RIGHT)
            .border_style(dim)
            .title(Span::styled(title, Style::default().fg(Color::Cyan)));
        let para = Paragraph::new(Text::from(lines))
            .block(block)
            .wrap(Wrap { trim: true });
        f.render_widget(para, area);
    }

    fn render_scrolled(&mut self, f: &mut ratatui::Frame, area: Rect, lines: Vec<Line<'static>>) {
        let width = area.width;
        let height = area.height as usize;

        let total_wrapped: usize = lines
            .iter()
            .map(|line| {
                let w = line.width();
                if w == 0 || width == 0 {
                    1
                } else {
                    w.div_ceil(width as usize)
                }
            })
            .sum();

        let max_scroll = total_wrapped.saturating_sub(height);
        self.scroll_offset = self.scroll_offset.min(max_scroll);
        let scroll_y = max_scroll.saturating_sub(self.scroll_offset);

        let output = Paragraph::new(Text::from(lines))
            .wrap(Wrap { trim: false })
            .scroll((u16::try_from(scroll_y).unwrap_or(u16::MAX), 0));
        f.render_widget(output, area);

        if self.scroll_offset > 0 {
            let indicator = Paragraph::new(Line::from(Span::styled(
                format!("  ··· {} more rows above ···", scroll_y),
                Style::default()
                    .fg(Color::DarkGray)
                    .add_modifier(Modifier::ITALIC),
            )));
            f.render_widget(indicator, Rect { height: 1, ..area });
        }
    }

    fn render_input(&self, f: &mut ratatui::Frame, area: Rect) {
        let state = self.store.state();
        let width = area.width;
        let divider = "─".repeat(width as usize);

        let mut input_spans = vec![
            Span::styled(
                "> ",
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::raw(self.input.clone()),
        ];
        if let Some(path) = &self.attachment {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            input_spans.push(Span::styled(
                format!("  [📎 {name}]"),
                Style::default().fg(Color::Magenta),
            ));
        }

        let status_color = if state.is_thinking {
            Color::Blue
        } else if state.continue_visible {
            Color::Yellow
        } else {
            Color::DarkGray
        };
        let mut status_spans = vec![
            Span::styled(
                format!(" {} ", render::truncate_str(&state.current_task_name, 24)),
                Style::default().fg(Color::Black).bg(Color::Cyan),
            ),
            Span::raw("  "),
            Span::styled(
                format!(" {} ", state.status_message),
                Style::default().fg(Color::White).bg(status_color),
            ),
            Span::raw("  "),
            Span::styled(
                render::format_tokens(&state.total_tokens),
                Style::default().fg(Color::DarkGray),
            ),
        ];
        if state.stop_visible && state.stop_interactive {
            status_spans.push(Span::styled("  /stop", Style::default().fg(Color::Red)));
        }
        if state.continue_visible {
            let style = if state.continue_interactive {
                Style::default().fg(Color::Green)
            } else {
                Style::default().fg(Color::DarkGray)
            };
            status_spans.push(Span::styled("  /continue", style));
        }
        if self.view == View::Tasks {
            status_spans.push(Span::styled(
                "  [saved tasks]",
                Style::default().fg(Color::Magenta),
            ));
        }

        let input_style = if state.user_input_interactive {
            Style::default().fg(Color::DarkGray)
        } else {
            Style::default().fg(Color::Red)
        };
        let bottom = Paragraph::new(vec![
            Line::from(Span::styled(divider.clone(), input_style)),
            Line::from(input_spans),
            Line::from(Span::styled(divider, Style::default().fg(Color::DarkGray))),
            Line::from(status_spans),
        ]);
        f.render_widget(bottom, area);

        let overlay_open = state.local.command_palette_open
            || state.local.settings_open
            || self.diagram_panel.is_some();
        if !overlay_open {
            let typed = u16::try_from(self.input.chars().count()).unwrap_or(u16::MAX);
            let cursor_x = area
                .x
                .saturating_add(2)
                .saturating_add(typed)
                .min(area.right().saturating_sub(1));
            f.set_cursor_position((cursor_x, area.y.saturating_add(1)));
        }
    }

    fn render_palette(&self, f: &mut ratatui::Frame) {
        let area = centered(f.area(), 44, PALETTE.len() as u16 + 2);
        let lines: Vec<Line<'static>> = PALETTE
            .iter()
            .enumerate()
            .map(|(i, (label, command))| {
                let selected = i == self.palette_selected;
                let style = if selected {
                    Style::default()
                        .fg(Color::Cyan)
                        .add_modifier(Modifier::BOLD)
                } else {
                    Style::default().fg(Color::White)
                };
                let marker = if selected { ">" } else { " " };
                Line::from(vec![
                    Span::styled(format!(" {marker} {label:<22}"), style),
                    Span::styled(command.trim().to_string(), Style::default().fg(Color::DarkGray)),
                ])
            })
            .collect();
        let block = Block::default()
            .borders(Borders::ALL)
            .title(" Commands ")
            .border_style(Style::default().fg(Color::Cyan));
        f.render_widget(Clear, area);
        f.render_widget(Paragraph::new(lines).block(block), area);
    }

    /// Right-hand panel stepping through the current task's diagrams.
    fn render_diagram_panel(&self, f: &mut ratatui::Frame, outer: Rect, selected: usize) {
        let width = (outer.width / 2).max(40).min(outer.width);
        let area = Rect {
            x: outer.right().saturating_sub(width),
            width,
            ..outer
        };
        let diagrams = self.current_diagrams();
        let dim = Style::default().fg(Color::DarkGray);

        let (title, mut lines) = if diagrams.is_empty() {
            (
                " Diagrams ".to_string(),
                vec![Line::from(Span::styled(" No diagrams available", dim))],
            )
        } else {
            let index = selected.min(diagrams.len() - 1);
            (
                format!(" Diagrams {} of {} ", index + 1, diagrams.len()),
                render::render_diagram(index + 1, &diagrams[index]),
            )
        };
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(" ←/→ switch   Esc close", dim)));

        let block = Block::default()
            .borders(Borders::ALL)
            .title(title)
            .border_style(Style::default().fg(Color::Magenta));
        f.render_widget(Clear, area);
        f.render_widget(
            Paragraph::new(lines).block(block).wrap(Wrap { trim: false }),
            area,
        );
    }

    fn render_settings(&self, f: &mut ratatui::Frame) {
        let area = centered(f.area(), 56, 7);
        let masked = "•".repeat(self.settings_input.chars().count());
        let mut lines = vec![
            Line::from(Span::styled(
                " API key",
                Style::default().fg(Color::Cyan),
            )),
            Line::from(vec![Span::raw(" > "), Span::raw(masked)]),
            Line::from(""),
        ];
        if let Some(message) = &self.settings_message {
            lines.push(Line::from(Span::styled(
                format!(" {message}"),
                Style::default().fg(Color::Yellow),
            )));
        }
        lines.push(Line::from(Span::styled(
            " Enter to save, Esc to close",
            Style::default().fg(Color::DarkGray),
        )));
        let block = Block::default()
            .borders(Borders::ALL)
            .title(" Settings ")
            .border_style(Style::default().fg(Color::Cyan));
        f.render_widget(Clear, area);
        f.render_widget(Paragraph::new(lines).block(block), area);
    }
}

fn centered(outer: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(outer.width);
    let height = height.min(outer.height);
    Rect {
        x: outer.x + (outer.width - width) / 2,
        y: outer.y + (outer.height - height) / 2,
        width,
        height,
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support;
    use crate::model::{Message, UiSnapshot};
    use ratatui::backend::TestBackend;
    use ratatui::Terminal;

    fn screen(terminal: &Terminal<TestBackend>) -> String {
        let buffer = terminal.backend().buffer();
        let mut out = String::new();
        for y in 0..buffer.area.height {
            for x in 0..buffer.area.width {
                out.push_str(buffer[(x, y)].symbol());
            }
            out.push('\n');
        }
        out
    }

    #[tokio::test]
    async fn draws_conversation_status_and_error() {
        let mut h = test_support::app("http://127.0.0.1:1");
        h.app.store.apply_server_snapshot(UiSnapshot {
            conversation_history: Some(vec![Message::user("hi"), Message::assistant("hello there")]),
            current_task_name: Some("Greeting".into()),
            status_message: Some("Task completed".into()),
            ..Default::default()
        });
        h.app.store.set_error("HTTP error! status: 500");

        let mut terminal = Terminal::new(TestBackend::new(100, 20)).unwrap();
        terminal.draw(|f| h.app.render(f)).unwrap();
        let text = screen(&terminal);

        assert!(text.contains("> hi"));
        assert!(text.contains("[assistant]"));
        assert!(text.contains("Greeting"));
        assert!(text.contains("Task completed"));
        assert!(text.contains("HTTP error! status: 500"));
        assert!(text.contains("Tasks"), "sidebar is open by default");
    }

    #[tokio::test]
    async fn palette_overlay_lists_commands() {
        let mut h = test_support::app("http://127.0.0.1:1");
        h.app.handle_key(crossterm::event::KeyEvent::new(
            crossterm::event::KeyCode::Char('p'),
            crossterm::event::KeyModifiers::CONTROL,
        ))
        .unwrap();
        let mut terminal = Terminal::new(TestBackend::new(100, 30)).unwrap();
        terminal.draw(|f| h.app.render(f)).unwrap();
        let text = screen(&terminal);
        assert!(text.contains("Commands"));
        assert!(text.contains("Continue task"));
    }

    #[tokio::test]
    async fn diagram_panel_shows_position_and_source() {
        let mut h = test_support::app("http://127.0.0.1:1");
        h.app.store.apply_server_snapshot(UiSnapshot {
            current_task_id: Some(Some("t1".into())),
            conversation_history: Some(vec![Message::assistant(
                "```mermaid\ngraph TD\nA-->B\n```\n```mermaid\npie\n\"x\": 1\n```",
            )]),
            ..Default::default()
        });
        h.app.open_diagram_panel();
        h.app.diagram_panel = Some(1);

        let mut terminal = Terminal::new(TestBackend::new(100, 24)).unwrap();
        terminal.draw(|f| h.app.render(f)).unwrap();
        let text = screen(&terminal);
        assert!(text.contains("Diagrams 2 of 2"));
        assert!(text.contains("Diagram 2 (pie)"));
    }

    #[tokio::test]
    async fn very_long_input_keeps_cursor_on_screen() {
        let mut h = test_support::app("http://127.0.0.1:1");
        h.app.input = "x".repeat(70_000);
        let mut terminal = Terminal::new(TestBackend::new(100, 20)).unwrap();
        terminal.draw(|f| h.app.render(f)).unwrap();
        let cursor = terminal.get_cursor_position().unwrap();
        assert_eq!(cursor.x, 99);
        assert_eq!(cursor.y, 17);
    }
}
