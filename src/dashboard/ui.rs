use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

use super::app::App;
use super::widgets::{funnel_chart::draw_funnel_chart, line_chart::draw_line_chart, WidgetFrame};
use crate::models::WidgetKind;
use crate::reorder::WidgetPhase;

pub fn draw(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(
            [
                Constraint::Length(3),  // Header
                Constraint::Length(12), // Funnel
                Constraint::Min(10),    // Reorderable charts
                Constraint::Length(2),  // Help
            ]
            .as_ref(),
        )
        .split(f.size());

    draw_header(f, chunks[0], app);
    draw_fixed_widgets(f, chunks[1], app);
    draw_chart_grid(f, chunks[2], app);
    draw_help(f, chunks[3], app);
}

fn draw_header(f: &mut Frame, area: Rect, app: &App) {
    let last_update = app
        .last_update()
        .map(|t| t.format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "waiting".to_string());

    let header_text = vec![
        Span::raw("Backend: "),
        Span::styled(
            app.backend_name.clone(),
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ),
        Span::raw(" | Last Update: "),
        Span::raw(last_update),
    ];

    let header = Paragraph::new(Line::from(header_text))
        .style(Style::default().fg(Color::White))
        .block(
            Block::default()
                .title(" Dashboard ")
                .title_alignment(Alignment::Center)
                .borders(Borders::ALL)
                .style(Style::default().fg(Color::Cyan)),
        );

    f.render_widget(header, area);
}

fn draw_fixed_widgets(f: &mut Frame, area: Rect, app: &App) {
    for descriptor in app.composer.fixed() {
        let Some(widget) = app.composer.widget(descriptor.id) else {
            continue;
        };
        let frame = WidgetFrame {
            descriptor: *descriptor,
            view: widget.view(),
            phase: WidgetPhase::Idle,
            focused: false,
        };
        match descriptor.kind {
            WidgetKind::Funnel => draw_funnel_chart(f, area, &frame),
            WidgetKind::PageViews | WidgetKind::TimeOnPage => draw_line_chart(f, area, &frame),
        }
    }
}

fn draw_chart_grid(f: &mut Frame, area: Rect, app: &mut App) {
    let layout = app.layout();
    app.widget_areas.clear();
    if layout.is_empty() {
        let empty = Paragraph::new("No widgets in the stored layout")
            .alignment(Alignment::Center)
            .block(Block::default().borders(Borders::ALL));
        f.render_widget(empty, area);
        return;
    }

    let constraints: Vec<Constraint> = layout
        .iter()
        .map(|_| Constraint::Ratio(1, layout.len() as u32))
        .collect();
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints(constraints)
        .split(area);

    let focused = app.focused_id();
    for (descriptor, column) in layout.iter().zip(columns.iter()) {
        app.widget_areas.push((descriptor.id, *column));
        let Some(widget) = app.composer.widget(descriptor.id) else {
            continue;
        };
        let frame = WidgetFrame {
            descriptor: *descriptor,
            view: widget.view(),
            phase: app.phase(descriptor.id),
            focused: focused == Some(descriptor.id),
        };
        match descriptor.kind {
            WidgetKind::Funnel => draw_funnel_chart(f, *column, &frame),
            WidgetKind::PageViews | WidgetKind::TimeOnPage => draw_line_chart(f, *column, &frame),
        }
    }
}

fn draw_help(f: &mut Frame, area: Rect, app: &App) {
    let key = |k: &'static str| Span::styled(k, Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD));

    let mut help_text = vec![
        Span::raw("["),
        key("q"),
        Span::raw("]uit ["),
        key("←→"),
        Span::raw("] focus ["),
        key("space"),
        Span::raw("] pick up / drop ["),
        key("esc"),
        Span::raw("] cancel ["),
        key("r"),
        Span::raw("]efresh  or drag with the mouse"),
    ];
    if let Some(status) = &app.status {
        help_text.push(Span::raw(" | "));
        help_text.push(Span::styled(status.clone(), Style::default().fg(Color::Cyan)));
    }

    let help = Paragraph::new(Line::from(help_text))
        .style(Style::default().fg(Color::DarkGray))
        .block(Block::default().borders(Borders::TOP))
        .alignment(Alignment::Center);

    f.render_widget(help, area);
}
