//! TUI rendering logic

use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Gauge, List, ListItem, ListState, Paragraph, Wrap},
};

use crate::cli::tui::app::App;
use crate::models::tui::PathPrompt;
use crate::models::{FocusedPane, StreamKind};
use crate::pipeline::Decision;

/// Main UI rendering function
pub fn ui(f: &mut Frame, app: &App) {
    // Main layout with help bar at bottom
    let main_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(3)])
        .split(f.area());

    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(38), Constraint::Percentage(62)])
        .split(main_chunks[0]);

    // Project status, steps, progress, files
    let left_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(7),
            Constraint::Min(7),
            Constraint::Length(3),
            Constraint::Percentage(30),
        ])
        .split(chunks[0]);

    // Tool output above the system log
    let right_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(70), Constraint::Percentage(30)])
        .split(chunks[1]);

    render_project_status(f, app, left_chunks[0]);
    render_steps(f, app, left_chunks[1]);
    render_progress(f, app, left_chunks[2]);
    render_files(f, app, left_chunks[3]);
    render_output(f, app, right_chunks[0]);

    // System log next to the command history
    let bottom_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
        .split(right_chunks[1]);
    render_system_log(f, app, bottom_chunks[0]);
    render_history(f, app, bottom_chunks[1]);
    render_help_bar(f, app, main_chunks[1]);

    // Popups, most urgent last so it ends up on top
    if app.show_help {
        render_help(f);
    }
    if app.confirm_quit {
        render_quit_confirm(f);
    }
    render_checkpoint(f, app);
    render_prompt(f, app);
    render_notice(f, app);
}

fn pane_block(title: String, focused: bool) -> Block<'static> {
    if focused {
        Block::default()
            .title(format!("{} [FOCUSED]", title))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan))
    } else {
        Block::default().title(title).borders(Borders::ALL)
    }
}

fn render_project_status(f: &mut Frame, app: &App, area: Rect) {
    let session = app.orchestrator.session();
    let label = |text: &'static str| Span::styled(text, Style::default().fg(Color::Gray));

    let lines = match &session.project {
        Some(project) => {
            let file_name = |path: Option<std::path::PathBuf>| match path {
                Some(path) => path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| path.display().to_string()),
                None => "-".to_string(),
            };
            let generator_style = match project.generator() {
                Some(crate::project::UNKNOWN_GENERATOR) => Style::default().fg(Color::Red),
                Some(_) => Style::default().fg(Color::Green),
                None => Style::default(),
            };
            vec![
                Line::from(vec![label("Project: "), Span::raw(project.name())]),
                Line::from(vec![label("IPSW:    "), Span::raw(file_name(project.firmware()))]),
                Line::from(vec![label("Blob:    "), Span::raw(file_name(project.blob()))]),
                Line::from(vec![
                    label("Gen:     "),
                    Span::styled(project.generator().unwrap_or("-").to_string(), generator_style),
                ]),
                Line::from(Span::styled(
                    app.status_line(),
                    Style::default().fg(Color::Yellow),
                )),
            ]
        }
        None => vec![
            Line::from("No project open"),
            Line::from(Span::styled(
                "[O]pen an existing directory or [N]ew project",
                Style::default().fg(Color::Gray),
            )),
            Line::from(""),
            Line::from(""),
            Line::from(Span::styled(
                app.status_line(),
                Style::default().fg(Color::Yellow),
            )),
        ],
    };

    let title = format!("🍎 m3rula {}", crate::VERSION);
    let paragraph = Paragraph::new(lines)
        .block(Block::default().title(title).borders(Borders::ALL))
        .wrap(Wrap { trim: true });
    f.render_widget(paragraph, area);
}

fn render_steps(f: &mut Frame, app: &App, area: Rect) {
    let session = app.orchestrator.session();
    let next = session.next_step();
    let enabled = session.steps_enabled();

    let items: Vec<ListItem> = session
        .steps
        .steps()
        .iter()
        .enumerate()
        .map(|(index, step)| {
            let name_style = if enabled {
                Style::default()
            } else {
                Style::default().fg(Color::DarkGray)
            };
            ListItem::new(Line::from(vec![
                Span::styled(
                    step.status.symbol(next == Some(index)),
                    Style::default().fg(step.status.color()),
                ),
                Span::raw(" "),
                Span::styled(step.label(), name_style),
            ]))
        })
        .collect();

    let title = format!("Steps: {}", session.pipeline_label());
    let list = List::new(items)
        .block(pane_block(title, app.focused_pane == FocusedPane::StepList))
        .highlight_style(
            Style::default()
                .bg(Color::DarkGray)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("▶ ");

    let mut state = ListState::default();
    if !session.steps.is_empty() {
        state.select(Some(app.selected_step));
    }
    f.render_stateful_widget(list, area, &mut state);
}

fn render_progress(f: &mut Frame, app: &App, area: Rect) {
    let steps = &app.orchestrator.session().steps;
    let (done, total) = steps.progress();
    let percent = steps.progress_percent();

    let gauge = Gauge::default()
        .block(Block::default().title("Progress").borders(Borders::ALL))
        .gauge_style(Style::default().fg(Color::Green).bg(Color::Black))
        .percent(percent)
        .label(format!("{}/{} ({}%)", done, total, percent));
    f.render_widget(gauge, area);
}

fn render_files(f: &mut Frame, app: &App, area: Rect) {
    let files = &app.orchestrator.session().files;
    let items: Vec<ListItem> = if files.is_empty() {
        vec![ListItem::new(Span::styled(
            "No files yet",
            Style::default().fg(Color::Gray),
        ))]
    } else {
        files
            .iter()
            .map(|file| ListItem::new(format!("{} {}", file.kind.symbol(), file.name)))
            .collect()
    };

    let title = format!("Files ({})", files.len());
    let list = List::new(items)
        .block(pane_block(title, app.focused_pane == FocusedPane::FileList))
        .highlight_style(Style::default().bg(Color::DarkGray));

    let mut state = ListState::default();
    if !files.is_empty() && app.focused_pane == FocusedPane::FileList {
        state.select(Some(app.selected_file.min(files.len() - 1)));
    }
    f.render_stateful_widget(list, area, &mut state);
}

fn render_output(f: &mut Frame, app: &App, area: Rect) {
    let available_height = area.height.saturating_sub(2) as usize;
    let total = app.output_len();
    let end = total.saturating_sub(app.scroll_back);
    let start = end.saturating_sub(available_height);

    let lines: Vec<Line> = if total == 0 {
        vec![Line::from(Span::styled(
            "No output yet",
            Style::default().fg(Color::Gray),
        ))]
    } else {
        app.output_lines()
            .skip(start)
            .take(end - start)
            .map(|line| {
                let style = match line.kind {
                    StreamKind::Command => Style::default()
                        .fg(Color::Cyan)
                        .add_modifier(Modifier::BOLD),
                    StreamKind::Stderr => Style::default().fg(Color::LightRed),
                    StreamKind::Stdout => Style::default(),
                };
                Line::from(Span::styled(line.text.as_str(), style))
            })
            .collect()
    };

    let indicator = if app.scroll_back == 0 { "🔄" } else { "📌" };
    let title = format!("Output ({} lines) {}", total, indicator);
    let paragraph = Paragraph::new(lines)
        .block(pane_block(title, app.focused_pane == FocusedPane::LogPane));
    f.render_widget(paragraph, area);
}

fn render_system_log(f: &mut Frame, app: &App, area: Rect) {
    let available_height = area.height.saturating_sub(2) as usize;
    let start = app.system_log.len().saturating_sub(available_height);

    let lines: Vec<Line> = app.system_log[start..]
        .iter()
        .map(|entry| {
            let style = match entry.level {
                log::Level::Error => Style::default().fg(Color::Red),
                log::Level::Warn => Style::default().fg(Color::Yellow),
                _ => Style::default(),
            };
            Line::from(Span::styled(entry.render(), style))
        })
        .collect();

    let paragraph = Paragraph::new(lines)
        .block(Block::default().title("System Log").borders(Borders::ALL));
    f.render_widget(paragraph, area);
}

fn render_history(f: &mut Frame, app: &App, area: Rect) {
    let available_height = area.height.saturating_sub(2) as usize;
    let start = app.history.len().saturating_sub(available_height);

    let items: Vec<ListItem> = if app.history.is_empty() {
        vec![ListItem::new(Span::styled(
            "No commands run",
            Style::default().fg(Color::Gray),
        ))]
    } else {
        app.history
            .iter()
            .skip(start)
            .map(|command| ListItem::new(format!("$ {}", command)))
            .collect()
    };

    let title = format!("History ({})", app.history.len());
    let list = List::new(items).block(Block::default().title(title).borders(Borders::ALL));
    f.render_widget(list, area);
}

fn render_help_bar(f: &mut Frame, app: &App, area: Rect) {
    let mut help_text = vec![
        Span::styled("[↑↓]Navigate ", Style::default().fg(Color::Cyan)),
        Span::styled("[Tab]Switch Pane ", Style::default().fg(Color::White)),
    ];

    if app.orchestrator.is_executing() {
        help_text.extend(vec![
            Span::styled(
                "⏳ Running... ",
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled("[Enter]Send ENTER ", Style::default().fg(Color::Green)),
            Span::styled("[S]Stop ", Style::default().fg(Color::Red)),
        ]);
    } else {
        help_text.extend(vec![
            Span::styled("[Enter]Run Step ", Style::default().fg(Color::Green)),
            Span::styled("[C]Chip ", Style::default().fg(Color::LightYellow)),
            Span::styled("[M]Mode ", Style::default().fg(Color::LightYellow)),
            Span::styled("[I]IPSW ", Style::default().fg(Color::Magenta)),
            Span::styled("[B]Blob ", Style::default().fg(Color::Magenta)),
            Span::styled("[O]Open ", Style::default().fg(Color::Magenta)),
            Span::styled("[N]New ", Style::default().fg(Color::Magenta)),
        ]);
    }
    help_text.extend(vec![
        Span::styled("[H/?]Help ", Style::default().fg(Color::Blue)),
        Span::styled("[Q]Quit", Style::default().fg(Color::Red)),
    ]);

    let help_bar = Paragraph::new(Line::from(help_text))
        .block(Block::default().borders(Borders::ALL))
        .style(Style::default().bg(Color::DarkGray));
    f.render_widget(help_bar, area);
}

fn render_checkpoint(f: &mut Frame, app: &App) {
    let Some(dialog) = &app.checkpoint else {
        return;
    };
    let checkpoint = &dialog.checkpoint;
    let area = centered_rect(50, 35, f.area());
    f.render_widget(Clear, area);

    let color = if checkpoint.success {
        Color::Green
    } else {
        Color::Red
    };
    let message = checkpoint.message();
    let mut lines: Vec<Line> = message.lines().map(Line::from).collect();
    lines.push(Line::from(""));

    let mut buttons = Vec::new();
    for (index, decision) in checkpoint.options().iter().enumerate() {
        let key = match decision {
            Decision::NextStep => "N",
            Decision::Retry => "R",
            Decision::Close => "C",
        };
        let style = if index == dialog.selected {
            Style::default()
                .bg(color)
                .fg(Color::Black)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(color)
        };
        buttons.push(Span::styled(format!(" [{}] {} ", key, decision.label()), style));
        buttons.push(Span::raw("  "));
    }
    lines.push(Line::from(buttons));

    let paragraph = Paragraph::new(lines)
        .block(
            Block::default()
                .title("Step finished")
                .borders(Borders::ALL)
                .border_style(Style::default().fg(color)),
        )
        .style(Style::default().bg(Color::Black))
        .wrap(Wrap { trim: true });
    f.render_widget(paragraph, area);
}

fn render_prompt(f: &mut Frame, app: &App) {
    let Some((kind, buffer)) = &app.prompt else {
        return;
    };
    let area = centered_rect(60, 20, f.area());
    f.render_widget(Clear, area);

    let hint = match kind {
        PathPrompt::OpenProject => "Enter an existing directory; project.json is created if missing",
        PathPrompt::Firmware | PathPrompt::Blob => "Enter the file path",
    };
    let lines = vec![
        Line::from(Span::styled(hint, Style::default().fg(Color::Gray))),
        Line::from(""),
        Line::from(vec![
            Span::styled("> ", Style::default().fg(Color::Cyan)),
            Span::raw(buffer.as_str()),
            Span::styled("█", Style::default().fg(Color::Cyan)),
        ]),
        Line::from(""),
        Line::from(vec![
            Span::styled("[Enter]", Style::default().fg(Color::Green)),
            Span::raw(" Confirm "),
            Span::styled("[ESC]", Style::default().fg(Color::Red)),
            Span::raw(" Cancel"),
        ]),
    ];

    let paragraph = Paragraph::new(lines)
        .block(
            Block::default()
                .title(kind.title())
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan)),
        )
        .style(Style::default().bg(Color::Black))
        .wrap(Wrap { trim: false });
    f.render_widget(paragraph, area);
}

fn render_notice(f: &mut Frame, app: &App) {
    let Some(message) = &app.notice else {
        return;
    };
    let area = centered_rect(60, 20, f.area());
    f.render_widget(Clear, area);

    let mut lines: Vec<Line> = message.lines().map(Line::from).collect();
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        "[Enter] OK",
        Style::default().fg(Color::Green),
    )));

    let paragraph = Paragraph::new(lines)
        .block(
            Block::default()
                .title("Notice")
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Yellow)),
        )
        .style(Style::default().bg(Color::Black))
        .wrap(Wrap { trim: true });
    f.render_widget(paragraph, area);
}

fn render_quit_confirm(f: &mut Frame) {
    let area = centered_rect(40, 15, f.area());
    f.render_widget(Clear, area);

    let lines = vec![
        Line::from("A step is still running."),
        Line::from("Stop it and quit?"),
        Line::from(""),
        Line::from(vec![
            Span::styled("[Y]", Style::default().fg(Color::Red)),
            Span::raw(" Stop and quit "),
            Span::styled("[N]", Style::default().fg(Color::Green)),
            Span::raw(" Keep running"),
        ]),
    ];
    let paragraph = Paragraph::new(lines)
        .block(
            Block::default()
                .title("Quit")
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Red)),
        )
        .style(Style::default().bg(Color::Black));
    f.render_widget(paragraph, area);
}

fn render_help(f: &mut Frame) {
    let area = centered_rect(60, 60, f.area());
    f.render_widget(Clear, area);

    let help_text = vec![
        Line::from("🍎 m3rula Help"),
        Line::from(""),
        Line::from("Navigation:"),
        Line::from("↑/↓ or j/k    Select step / file, scroll output (Output pane)"),
        Line::from("Tab           Switch between Steps, Files and Output"),
        Line::from("PgUp/PgDn     Scroll output by page (Output pane only)"),
        Line::from("Home/End      Jump to top/bottom of output (Output pane only)"),
        Line::from(""),
        Line::from("Project:"),
        Line::from("o             Open project directory"),
        Line::from("n             New project next to the current one"),
        Line::from("i / b         Select IPSW / SHSH blob"),
        Line::from("c / m         Toggle chip (A9/A10) / mode (Tethered/Untethered)"),
        Line::from("r             Re-read progress from the project directory"),
        Line::from(""),
        Line::from("Steps:"),
        Line::from("Enter         Run selected step (sends ENTER while running)"),
        Line::from("s             Stop the running step"),
        Line::from("l             Clear output"),
        Line::from("q/ESC         Quit"),
        Line::from(""),
        Line::from("Re-enter DFU mode before every step."),
    ];

    let help_paragraph = Paragraph::new(help_text)
        .block(Block::default().title("Help").borders(Borders::ALL))
        .style(Style::default().bg(Color::Black));
    f.render_widget(help_paragraph, area);
}

/// Create a centered rectangle
fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
