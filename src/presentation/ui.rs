use super::form::form_fields;
use super::input::{FormView, InputMode};
use crate::application::{Notice, NoticeLevel, StepState, Wizard};
use crate::domain::Stage;
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table, Wrap},
    Frame,
};

pub fn render_ui(f: &mut Frame, wizard: &Wizard, view: &FormView, notice: Option<&Notice>) {
    let violation_height = if wizard.violations().is_empty() {
        0
    } else {
        (wizard.violations().len() as u16 + 2).min(8)
    };
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Length(3),
            Constraint::Min(0),
            Constraint::Length(violation_height),
            Constraint::Length(3),
        ])
        .split(f.area());

    render_header(f, wizard, chunks[0]);
    render_stepper(f, wizard, chunks[1]);
    if wizard.step() == Stage::Review {
        render_summary(f, wizard, chunks[2]);
    } else {
        render_form(f, wizard, view, chunks[2]);
    }
    if violation_height > 0 {
        render_violations(f, wizard, chunks[3]);
    }
    render_status_bar(f, wizard, view, notice, chunks[4]);

    if view.show_help {
        render_help_popup(f, view.help_scroll);
    }
}

fn render_header(f: &mut Frame, wizard: &Wizard, area: Rect) {
    let application = wizard
        .application_id()
        .map_or_else(|| "new application".to_string(), |id| format!("application {id}"));
    let header = Paragraph::new(format!(
        "Admission Wizard | {application} | {}",
        wizard.step()
    ))
    .style(Style::default().fg(Color::Cyan));
    f.render_widget(header, area);
}

fn render_stepper(f: &mut Frame, wizard: &Wizard, area: Rect) {
    let limit = wizard.max_reachable();
    let mut spans = Vec::new();
    for stage in Stage::ALL {
        let style = if stage == wizard.step() {
            Style::default().bg(Color::Blue).fg(Color::White)
        } else if stage.number() <= wizard.completion_step() {
            Style::default().fg(Color::Green)
        } else if stage <= limit {
            Style::default().fg(Color::Yellow)
        } else {
            Style::default().fg(Color::DarkGray)
        };
        let marker = if stage.number() <= wizard.completion_step() { "✓" } else { " " };
        spans.push(Span::styled(format!(" {}{marker} ", stage.number()), style));
    }
    let stepper = Paragraph::new(Line::from(spans)).block(Block::default().borders(Borders::ALL).title("Stages"));
    f.render_widget(stepper, area);
}

fn render_form(f: &mut Frame, wizard: &Wizard, view: &FormView, area: Rect) {
    let fields = form_fields(wizard.step(), wizard.payloads());
    let visible = area.height.saturating_sub(2) as usize;
    let first = view.focus.saturating_sub(visible.saturating_sub(1));

    let rows = fields.iter().enumerate().skip(first).take(visible).map(|(index, field)| {
        let focused = index == view.focus;
        let value = match (&view.mode, focused) {
            (InputMode::Editing { buffer, .. }, true) | (InputMode::AttachPath { buffer, .. }, true) => {
                format!("{buffer}_")
            }
            _ => field.value.clone(),
        };
        let style = if focused {
            Style::default().bg(Color::Blue).fg(Color::White)
        } else {
            Style::default()
        };
        Row::new(vec![
            Cell::from(field.label.clone()).style(Style::default().fg(Color::Yellow)),
            Cell::from(value),
        ])
        .style(style)
    });

    let table = Table::new(rows, [Constraint::Length(24), Constraint::Min(10)])
        .block(Block::default().borders(Borders::ALL).title(wizard.step().title()))
        .column_spacing(1);
    f.render_widget(table, area);
}

fn render_summary(f: &mut Frame, wizard: &Wizard, area: Rect) {
    let mut lines = Vec::new();
    for (stage, entries) in wizard.review_summary() {
        lines.push(Line::styled(
            stage.to_string(),
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        ));
        if entries.is_empty() {
            lines.push(Line::from("  (nothing entered)"));
        }
        lines.extend(entries.into_iter().map(|entry| Line::from(format!("  {entry}"))));
    }
    lines.push(Line::from(""));
    lines.push(Line::from("Press Ctrl+N to acknowledge and submit the application."));
    let summary = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .block(Block::default().borders(Borders::ALL).title(Stage::Review.title()));
    f.render_widget(summary, area);
}

fn render_violations(f: &mut Frame, wizard: &Wizard, area: Rect) {
    let lines: Vec<Line> = wizard
        .violations()
        .iter()
        .map(|v| Line::from(v.to_string()))
        .collect();
    let widget = Paragraph::new(lines)
        .style(Style::default().fg(Color::Red))
        .block(Block::default().borders(Borders::ALL).title("Please fix"));
    f.render_widget(widget, area);
}

fn render_status_bar(f: &mut Frame, wizard: &Wizard, view: &FormView, notice: Option<&Notice>, area: Rect) {
    let (text, style) = match (&view.mode, wizard.state()) {
        (InputMode::Editing { .. }, _) => (
            "Editing (Enter to keep, Esc to cancel)".to_string(),
            Style::default().fg(Color::Green),
        ),
        (InputMode::AttachPath { slot, .. }, _) => (
            format!("Path of the file for {} (Enter to attach, Esc to cancel)", slot.label()),
            Style::default().fg(Color::Magenta),
        ),
        (InputMode::Navigate, StepState::Busy) => ("Submitting...".to_string(), Style::default().fg(Color::Yellow)),
        (InputMode::Navigate, StepState::Error(message)) => (message.clone(), Style::default().fg(Color::Red)),
        (InputMode::Navigate, StepState::Idle) => match notice {
            Some(notice) => (notice.message.clone(), notice_style(notice.level)),
            None => (
                "Ctrl+N: next | Ctrl+B: back | Ctrl+R/D: add/remove row | 1-8: jump | F1: help | Ctrl+Q: quit"
                    .to_string(),
                Style::default(),
            ),
        },
    };
    let status = Paragraph::new(text)
        .style(style)
        .block(Block::default().borders(Borders::ALL).title("Status"));
    f.render_widget(status, area);
}

fn notice_style(level: NoticeLevel) -> Style {
    match level {
        NoticeLevel::Info => Style::default(),
        NoticeLevel::Success => Style::default().fg(Color::Green),
        NoticeLevel::Warning => Style::default().fg(Color::Yellow),
        NoticeLevel::Error => Style::default().fg(Color::Red),
    }
}

fn render_help_popup(f: &mut Frame, scroll: usize) {
    let area = f.area();
    let popup_area = Rect {
        x: area.width / 10,
        y: area.height / 10,
        width: area.width * 4 / 5,
        height: area.height * 4 / 5,
    };

    f.render_widget(Clear, popup_area);

    let help_lines: Vec<&str> = HELP_TEXT.lines().collect();
    let visible_height = popup_area.height.saturating_sub(2) as usize;
    let start_line = scroll.min(help_lines.len().saturating_sub(visible_height));
    let end_line = (start_line + visible_height).min(help_lines.len());

    let help_widget = Paragraph::new(help_lines[start_line..end_line].join("\n"))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("Admission Wizard Help")
                .style(Style::default().fg(Color::Cyan)),
        )
        .style(Style::default().fg(Color::White));
    f.render_widget(help_widget, popup_area);
}

const HELP_TEXT: &str = r#"ADMISSION WIZARD

=== STAGES ===
1 Personal Details      surname, other names and email are required
2 Qualifications        institution, qualification and year per row
3 Examination Results   4-digit year, exam number, comma separated subjects
4 Memberships           optional
5 Work Experience       dates as YYYY-MM-DD
6 Seminars & Workshops  title, date and location for filled rows
7 Referees              numeric referee ID and relationship
8 Review & Acknowledge  submits the application

=== ATTACHMENTS ===
Photo and signature     JPEG, PNG or WebP, up to 5 MiB
Certificates            PDF up to 10 MiB, images up to 5 MiB

=== KEYS ===
Up/Down, Tab            Move between fields
Enter                   Edit field / choose a file
Esc                     Cancel editing
Ctrl+N                  Save this stage and continue
Ctrl+B                  Previous stage
1-8                     Jump to a completed stage
Ctrl+R                  Add a row
Ctrl+D                  Remove the focused row
Ctrl+X                  Remove the focused attachment
F1 or ?                 Toggle this help
Ctrl+Q                  Quit (your progress is kept)

Every change is saved locally as you type. Files you picked must be
selected again after restarting the wizard."#;
