use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Bar, BarChart, BarGroup, Paragraph},
    Frame,
};

use super::{format_number, WidgetFrame};

const HEADLINES: [&str; 3] = ["Total Page Views", "Single Page Views", "Leads"];
const STAGE_COLORS: [Color; 3] = [
    Color::Rgb(30, 86, 217),
    Color::Rgb(46, 133, 255),
    Color::Rgb(100, 210, 166),
];

/// The three headline figures, in funnel order. Missing stages read as zero.
pub fn headline_values(values: &[f64]) -> [f64; 3] {
    [0usize, 1, 2].map(|i| values.get(i).copied().unwrap_or(0.0))
}

pub fn draw_funnel_chart(f: &mut Frame, area: Rect, frame: &WidgetFrame) {
    let title = frame.descriptor.kind.title().to_string();
    let Some(snapshot) = &frame.view.snapshot else {
        f.render_widget(frame.placeholder(title), area);
        return;
    };

    let block = frame.block(title);
    let inner = block.inner(area);
    f.render_widget(block, area);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(2), Constraint::Min(3)].as_ref())
        .split(inner);

    // Headline figures
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Ratio(1, 3); 3].as_ref())
        .split(chunks[0]);
    for ((label, value), column) in HEADLINES
        .iter()
        .zip(headline_values(&snapshot.values))
        .zip(columns.iter())
    {
        let lines = vec![
            Line::from(Span::styled(*label, Style::default().fg(Color::Gray))),
            Line::from(Span::styled(
                format_number(value),
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            )),
        ];
        f.render_widget(Paragraph::new(lines).alignment(Alignment::Center), *column);
    }

    // One bar per stage, widest first
    let bars: Vec<Bar> = snapshot
        .labels
        .iter()
        .zip(snapshot.values.iter())
        .enumerate()
        .map(|(i, (label, value))| {
            Bar::default()
                .label(Line::from(label.clone()))
                .value(value.max(0.0) as u64)
                .text_value(format_number(*value))
                .style(Style::default().fg(STAGE_COLORS[i % STAGE_COLORS.len()]))
        })
        .collect();

    let chart = BarChart::default()
        .direction(Direction::Horizontal)
        .bar_width(1)
        .bar_gap(1)
        .value_style(Style::default().fg(Color::White).add_modifier(Modifier::BOLD))
        .data(BarGroup::default().bars(&bars));

    f.render_widget(chart, chunks[1]);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headline_values_pad_missing_stages() {
        assert_eq!(headline_values(&[34560.0, 4560.0, 1250.0, 9.0]), [34560.0, 4560.0, 1250.0]);
        assert_eq!(headline_values(&[10.0]), [10.0, 0.0, 0.0]);
        assert_eq!(headline_values(&[]), [0.0, 0.0, 0.0]);
    }
}
