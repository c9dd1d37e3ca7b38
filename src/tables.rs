use comfy_table::{Attribute, Cell, CellAlignment, Color, Table, modifiers, presets};

use crate::core::batch::MetricBatch;

#[must_use]
pub fn build_batch_table(batch: &MetricBatch) -> Table {
    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED).apply_modifier(modifiers::UTF8_ROUND_CORNERS);
    table.enforce_styling();
    table.set_header(vec!["Name", "Value"]);

    let attributes = &batch.common.attributes;
    table.add_row(vec![
        Cell::new("mode").add_attribute(Attribute::Dim),
        Cell::new(&attributes.mode).set_alignment(CellAlignment::Right),
    ]);
    table.add_row(vec![
        Cell::new("status").add_attribute(Attribute::Dim),
        Cell::new(&attributes.status).set_alignment(CellAlignment::Right).fg(
            if attributes.status == "Connected" { Color::Green } else { Color::Red },
        ),
    ]);

    for record in &batch.metrics {
        table.add_row(vec![
            Cell::new(&record.name),
            Cell::new(record.value)
                .set_alignment(CellAlignment::Right)
                .fg(if record.value == 0.0 { Color::DarkGrey } else { Color::Reset }),
        ]);
    }
    table
}

/// Format the number with `_` between the digit groups, like `1_718_000_000_123`.
#[must_use]
pub fn group_digits(number: i64) -> String {
    let digits = number.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() * 4 / 3 + 1);
    if number < 0 {
        grouped.push('-');
    }
    for (i, digit) in digits.chars().enumerate() {
        if i != 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('_');
        }
        grouped.push(digit);
    }
    grouped
}
