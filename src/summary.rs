//! Cart Summary
//!
//! Renders a guest's carts as a table followed by per-cart subtotals.

use std::io;

use smallvec::SmallVec;
use tabled::{
    builder::Builder,
    grid::config::HorizontalLine,
    settings::{
        Alignment, Color, Style, Theme,
        object::{Columns, Rows},
    },
};
use thiserror::Error;

use crate::{
    cart::{CartTotalError, line_total},
    engine::CartEngine,
    lines::{Line, Price},
};

/// Errors that can occur when rendering a summary.
#[derive(Debug, Error)]
pub enum SummaryError {
    /// Writing to the output failed.
    #[error("failed to write cart summary")]
    IO,

    /// A line or cart total could not be computed.
    #[error(transparent)]
    Total(#[from] CartTotalError),
}

/// Render every non-empty cart in `engine` to `out`.
///
/// # Errors
///
/// Returns an error if a total cannot be computed or the output cannot be written.
pub fn write_to(engine: &CartEngine, mut out: impl io::Write) -> Result<(), SummaryError> {
    if engine.is_empty() {
        return writeln!(out, "\nAll carts are empty.\n").map_err(|_err| SummaryError::IO);
    }

    let mut builder = Builder::default();
    let mut section_rows: SmallVec<[usize; 3]> = SmallVec::new();

    builder.push_record(["", "Cart", "Item", "Qty", "Unit Price", "Total"]);

    let mut row = 1;

    row = append_section(
        &mut builder,
        &mut section_rows,
        row,
        "Shop",
        engine.shop().iter(),
    )?;
    row = append_section(
        &mut builder,
        &mut section_rows,
        row,
        &service_label(engine),
        engine.service().iter(),
    )?;
    append_section(
        &mut builder,
        &mut section_rows,
        row,
        "Amenities",
        engine.amenities().iter(),
    )?;

    write_table(&mut out, builder, &section_rows)?;

    let subtotals: SmallVec<[(&str, Price); 3]> = [
        ("Shop", engine.shop().total()?),
        ("Dining", engine.service().total()?),
        ("Amenities", engine.amenities().total()?),
    ]
    .into_iter()
    .filter(|(_label, total)| !total.is_zero())
    .collect();

    for (label, total) in subtotals {
        writeln!(out, " {label:<10} {:>12}", total.to_string())
            .map_err(|_err| SummaryError::IO)?;
    }

    writeln!(out, " \x1b[1m{:<10} {:>12}\x1b[0m\n", "Items:", engine.count())
        .map_err(|_err| SummaryError::IO)
}

fn service_label(engine: &CartEngine) -> String {
    match engine.service().locked_service_type() {
        Some(service_type) => format!("Dining ({service_type})"),
        None => "Dining".to_string(),
    }
}

fn append_section<'a, L, I>(
    builder: &mut Builder,
    section_rows: &mut SmallVec<[usize; 3]>,
    mut row: usize,
    label: &str,
    lines: I,
) -> Result<usize, SummaryError>
where
    L: Line + 'a,
    I: Iterator<Item = &'a L>,
{
    let start = row;

    for (idx, line) in lines.enumerate() {
        let cart = if idx == 0 { label } else { "" };

        builder.push_record([
            format!("#{}", idx + 1),
            cart.to_string(),
            line.name().to_string(),
            line.quantity().to_string(),
            line.price().to_string(),
            line_total(line)?.to_string(),
        ]);

        row += 1;
    }

    if row > start {
        section_rows.push(start);
    }

    Ok(row)
}

fn write_table(
    out: &mut impl io::Write,
    builder: Builder,
    section_rows: &[usize],
) -> Result<(), SummaryError> {
    let mut table = builder.build();
    let mut theme = Theme::from(Style::modern_rounded());
    let separator = HorizontalLine::new(Some('─'), Some('┼'), Some('├'), Some('┤'));

    theme.remove_horizontal_lines();
    theme.insert_horizontal_line(1, separator);

    for &row in section_rows {
        if row > 1 {
            theme.insert_horizontal_line(row, separator);
        }
    }

    table.with(theme);
    table.modify(Rows::first(), Color::BOLD);
    table.modify(Columns::new(3..6), Alignment::right());

    writeln!(out, "\n{table}").map_err(|_err| SummaryError::IO)
}
