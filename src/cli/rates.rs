use crate::cli::ui;
use crate::core::rates::RateMatrix;
use comfy_table::Cell;
use rust_decimal::Decimal;

// Display order within a base currency table
fn section_rank(quote: &str) -> u8 {
    if quote.starts_with("addr:") {
        2
    } else if matches!(quote, "XAU" | "XAG" | "XPT" | "XPD") {
        1
    } else {
        0
    }
}

fn format_rate(rate: &Decimal) -> String {
    rate.round_dp(10).normalize().to_string()
}

/// Renders one table per base currency: quote symbol, rate per 1 unit of
/// the base, and the unit price of the quote expressed in the base.
pub fn display_matrix(matrix: &RateMatrix, bases: &[String]) {
    let count = bases.len();
    for (i, base) in bases.iter().enumerate() {
        println!("{}", render_base_table(matrix, base));
        if i + 1 < count {
            ui::print_separator();
        }
    }
}

fn render_base_table(matrix: &RateMatrix, base: &str) -> String {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Symbol"),
        ui::header_cell(&format!("Per 1 {base}")),
        ui::header_cell(&format!("Price ({base})")),
    ]);

    let mut quotes: Vec<(&String, &Decimal)> = matrix
        .quotes(base)
        .map(|row| row.iter().collect())
        .unwrap_or_default();
    quotes.sort_by(|a, b| (section_rank(a.0), a.0).cmp(&(section_rank(b.0), b.0)));

    for (quote, rate) in &quotes {
        let unit_price = Decimal::ONE.checked_div(**rate);
        table.add_row(vec![
            Cell::new(quote),
            ui::rate_cell(&format_rate(rate)),
            unit_price.map_or_else(ui::na_cell, |price| ui::rate_cell(&format_rate(&price))),
        ]);
    }

    let mut output = format!("Rates: {}\n\n", ui::style_text(base, ui::StyleType::Title));
    output.push_str(&table.to_string());
    output.push_str(&format!(
        "\n\n{}",
        ui::style_text(&format!("{} symbols", quotes.len()), ui::StyleType::Subtle)
    ));
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_section_ordering() {
        assert!(section_rank("USD") < section_rank("XAU"));
        assert!(section_rank("XAU") < section_rank("addr:0xabc"));
        // Crypto tickers sort with the alphabetic block
        assert_eq!(section_rank("BTC"), section_rank("USD"));
    }

    #[test]
    fn test_format_rate_trims_trailing_zeros() {
        assert_eq!(
            format_rate(&Decimal::from_str("0.000540000").unwrap()),
            "0.00054"
        );
        assert_eq!(format_rate(&Decimal::from_str("1.08").unwrap()), "1.08");
    }

    #[test]
    fn test_render_contains_all_quotes() {
        let mut matrix = RateMatrix::new();
        matrix.insert("EUR", "USD", Decimal::from_str("1.08").unwrap());
        matrix.insert("EUR", "XAU", Decimal::from_str("0.00054").unwrap());

        let rendered = render_base_table(&matrix, "EUR");
        assert!(rendered.contains("USD"));
        assert!(rendered.contains("XAU"));
        assert!(rendered.contains("1.08"));
        assert!(rendered.contains("2 symbols"));
    }
}
