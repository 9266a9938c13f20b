use std::borrow::Cow;
use std::fmt::Write as _;

use crate::schema::GeneratedSchema;

const SUMMARY_HEADERS: &[&str] = &["column", "type", "nullable", "nulls", "null %", "detail"];

/// Renders one line per column: identifier, SQL type, nullability, null
/// counts and the most telling statistic for the inferred type.
pub fn render_schema_summary(schema: &GeneratedSchema) -> String {
    let headers = SUMMARY_HEADERS
        .iter()
        .map(|header| header.to_string())
        .collect::<Vec<_>>();
    let rows = schema
        .columns
        .iter()
        .map(|column| {
            let metadata = &column.metadata;
            vec![
                column.name.clone(),
                column.sql_type.clone(),
                if metadata.is_nullable() { "yes" } else { "no" }.to_string(),
                format!("{}/{}", metadata.null_count, metadata.total_count),
                format!("{:.1}", metadata.null_percentage),
                column_detail(column),
            ]
        })
        .collect::<Vec<_>>();
    render_table(&headers, &rows)
}

fn column_detail(column: &crate::schema::SchemaColumn) -> String {
    let metadata = &column.metadata;
    if let (Some(min), Some(max)) = (metadata.min_value, metadata.max_value) {
        return format!("{min} .. {max}");
    }
    if let (Some(min), Some(max)) = (&metadata.min_date, &metadata.max_date) {
        return format!("{min} .. {max}");
    }
    if let (Some(min), Some(max), Some(avg)) =
        (metadata.min_length, metadata.max_length, metadata.avg_length)
    {
        return format!("len {min} .. {max} (avg {avg:.1})");
    }
    String::new()
}

pub fn render_table(headers: &[String], rows: &[Vec<String>]) -> String {
    let column_count = headers.len();
    let mut widths = headers.iter().map(|h| display_width(h)).collect::<Vec<_>>();

    for row in rows {
        for (idx, cell) in row.iter().enumerate().take(column_count) {
            widths[idx] = widths[idx].max(display_width(cell));
        }
    }

    let mut output = String::new();
    let _ = writeln!(output, "{}", format_row(headers, &widths));

    let separator_widths = widths.iter().map(|w| (*w).max(3)).collect::<Vec<usize>>();
    let separator_cells = separator_widths
        .iter()
        .map(|w| "-".repeat(*w))
        .collect::<Vec<_>>();
    let _ = writeln!(output, "{}", format_row(&separator_cells, &separator_widths));

    for row in rows {
        let _ = writeln!(output, "{}", format_row(row, &widths));
    }

    output
}

pub fn print_schema_summary(schema: &GeneratedSchema) {
    println!("{} ({})", schema.table_name, schema.dialect);
    print!("{}", render_schema_summary(schema));
}

fn format_row(values: &[String], widths: &[usize]) -> String {
    let mut cells = Vec::with_capacity(values.len());
    for (idx, value) in values.iter().enumerate().take(widths.len()) {
        let sanitized = sanitize_cell(value);
        let padding = widths[idx].saturating_sub(display_width(&sanitized));
        let mut cell = sanitized.into_owned();
        cell.push_str(&" ".repeat(padding));
        cells.push(cell);
    }
    cells.join("  ").trim_end().to_string()
}

fn display_width(value: &str) -> usize {
    value.chars().count()
}

fn sanitize_cell(value: &str) -> Cow<'_, str> {
    if value.contains(['\n', '\r', '\t']) {
        Cow::Owned(value.replace(['\n', '\r', '\t'], " "))
    } else {
        Cow::Borrowed(value)
    }
}
