use ratatui::{
    layout::Rect,
    style::{Color, Style},
    symbols,
    text::Span,
    widgets::{Axis, Chart, Dataset, GraphType},
    Frame,
};

use super::{format_number, WidgetFrame};
use crate::models::WidgetKind;

const MAX_X_LABELS: usize = 5;

/// X-axis ticks for a series of `n` points.
///
/// ratatui spreads axis labels evenly over the bounds, so ticks sit on a grid
/// of every `ceil(n / 5)`-th point and `max` is padded to the next multiple of
/// that step. Grid slots past the last point get an empty label.
#[derive(Debug, Clone, PartialEq)]
pub struct XAxisTicks {
    pub labels: Vec<String>,
    pub max: f64,
}

pub fn x_axis_ticks(labels: &[String]) -> XAxisTicks {
    let total = labels.len();
    if total <= MAX_X_LABELS {
        return XAxisTicks {
            labels: labels.to_vec(),
            max: total.saturating_sub(1).max(1) as f64,
        };
    }
    let step = total.div_ceil(MAX_X_LABELS);
    let slots = (total - 1).div_ceil(step);
    XAxisTicks {
        labels: (0..=slots)
            .map(|slot| labels.get(slot * step).cloned().unwrap_or_default())
            .collect(),
        max: (slots * step) as f64,
    }
}

fn accent(kind: WidgetKind) -> Color {
    match kind {
        WidgetKind::PageViews => Color::Rgb(75, 192, 192),
        WidgetKind::TimeOnPage => Color::Rgb(0, 123, 255),
        WidgetKind::Funnel => Color::Rgb(30, 86, 217),
    }
}

pub fn draw_line_chart(f: &mut Frame, area: Rect, frame: &WidgetFrame) {
    let kind = frame.descriptor.kind;
    let Some(snapshot) = &frame.view.snapshot else {
        f.render_widget(frame.placeholder(kind.title().to_string()), area);
        return;
    };

    let title = format!("{} · {}", kind.title(), format_number(snapshot.aggregate));

    let data_points: Vec<(f64, f64)> = snapshot
        .values
        .iter()
        .enumerate()
        .map(|(i, v)| (i as f64, *v))
        .collect();

    // Add 10% headroom above the highest point
    let max_value = snapshot.max_value();
    let y_max = if max_value > 0.0 { max_value * 1.1 } else { 1.0 };
    let ticks = x_axis_ticks(&snapshot.labels);
    let x_labels: Vec<Span> = ticks.labels.into_iter().map(Span::raw).collect();

    let y_labels: Vec<Span> = (0..=4)
        .map(|i| Span::raw(format_number((y_max * i as f64 / 4.0).round())))
        .collect();

    let datasets = vec![Dataset::default()
        .marker(symbols::Marker::Braille)
        .graph_type(GraphType::Line)
        .style(Style::default().fg(accent(kind)))
        .data(&data_points)];

    let chart = Chart::new(datasets)
        .block(frame.block(title))
        .x_axis(
            Axis::default()
                .style(Style::default().fg(Color::Gray))
                .labels(x_labels)
                .bounds([0.0, ticks.max]),
        )
        .y_axis(
            Axis::default()
                .style(Style::default().fg(Color::Gray))
                .labels(y_labels)
                .bounds([0.0, y_max]),
        );

    f.render_widget(chart, area);
}
