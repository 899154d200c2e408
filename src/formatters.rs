use colored::Colorize;
use prettytable::{format, Cell, Row, Table};
use serde::Serialize;

use crate::models::{OrderRecord, WidgetCatalog, WidgetDescriptor, WidgetId};

#[derive(Debug, Serialize)]
struct OrderReport<'a> {
    key: i64,
    sequence: &'a [WidgetId],
    layout: Vec<LayoutEntry>,
    unknown: Vec<WidgetId>,
}

#[derive(Debug, Serialize)]
struct LayoutEntry {
    position: usize,
    id: WidgetId,
    kind: String,
    title: &'static str,
}

fn layout_entries(layout: &[WidgetDescriptor]) -> Vec<LayoutEntry> {
    layout
        .iter()
        .enumerate()
        .map(|(i, d)| LayoutEntry {
            position: i + 1,
            id: d.id,
            kind: d.kind.to_string(),
            title: d.kind.title(),
        })
        .collect()
}

/// Ids in the stored sequence that the catalog does not know.
pub fn unknown_ids(catalog: &WidgetCatalog, record: &OrderRecord) -> Vec<WidgetId> {
    record
        .sequence
        .iter()
        .copied()
        .filter(|&id| catalog.find(id).is_none())
        .collect()
}

pub fn format_order_table(layout: &[WidgetDescriptor]) -> String {
    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_NO_LINESEP_WITH_TITLE);
    table.set_titles(Row::new(vec![
        Cell::new("Position").style_spec("bFc"),
        Cell::new("Id").style_spec("bFc"),
        Cell::new("Kind").style_spec("bFc"),
        Cell::new("Title").style_spec("bFc"),
    ]));

    for entry in layout_entries(layout) {
        table.add_row(Row::new(vec![
            Cell::new(&entry.position.to_string()),
            Cell::new(&entry.id.to_string()),
            Cell::new(&entry.kind),
            Cell::new(entry.title),
        ]));
    }

    table.to_string()
}

pub fn format_order_json(
    record: &OrderRecord,
    layout: &[WidgetDescriptor],
    catalog: &WidgetCatalog,
) -> Result<String, serde_json::Error> {
    let report = OrderReport {
        key: record.key,
        sequence: &record.sequence,
        layout: layout_entries(layout),
        unknown: unknown_ids(catalog, record),
    };
    serde_json::to_string_pretty(&report)
}

pub fn print_order_summary(record: &OrderRecord, catalog: &WidgetCatalog) {
    println!(
        "{} {:?}",
        "Stored order:".bold(),
        record.sequence
    );
    let unknown = unknown_ids(catalog, record);
    if !unknown.is_empty() {
        println!(
            "{} {:?}",
            "Ignored unknown widget ids:".yellow(),
            unknown
        );
    }
}
