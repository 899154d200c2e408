pub mod funnel_chart;
pub mod line_chart;

use ratatui::{
    layout::Alignment,
    style::{Color, Modifier, Style},
    widgets::{Block, Borders, Paragraph},
};

use crate::live::WidgetView;
use crate::models::WidgetDescriptor;
use crate::reorder::WidgetPhase;

/// Everything a renderer needs for one widget on one frame.
pub struct WidgetFrame {
    pub descriptor: WidgetDescriptor,
    pub view: WidgetView,
    pub phase: WidgetPhase,
    pub focused: bool,
}

impl WidgetFrame {
    pub fn block(&self, title: String) -> Block<'static> {
        let title = if self.view.failures > 0 && self.view.snapshot.is_some() {
            format!(" {} (stale) ", title)
        } else {
            format!(" {} ", title)
        };

        let border = match (self.phase, self.focused) {
            (WidgetPhase::Dragging, _) => Style::default().fg(Color::DarkGray),
            (WidgetPhase::HoverTarget, _) => Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
            (WidgetPhase::Idle, true) => Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            (WidgetPhase::Idle, false) => Style::default(),
        };

        let block = Block::default().title(title).borders(Borders::ALL).border_style(border);
        match self.phase {
            WidgetPhase::Dragging => block.style(Style::default().add_modifier(Modifier::DIM)),
            WidgetPhase::HoverTarget => block.style(Style::default().bg(Color::Rgb(40, 40, 40))),
            WidgetPhase::Idle => block,
        }
    }

    pub fn placeholder(&self, title: String) -> Paragraph<'static> {
        Paragraph::new("Loading chart...")
            .alignment(Alignment::Center)
            .style(Style::default().fg(Color::DarkGray))
            .block(self.block(title))
    }
}

pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{}", value as i64)
    } else {
        format!("{:.1}", value)
    }
}
