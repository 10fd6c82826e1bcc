//! Fixed-width text tables for report output.

use std::fmt::Write as _;

/// Columns whose every non-empty cell parses as a number are right-aligned.
pub fn render_table(headers: &[String], rows: &[Vec<String>]) -> String {
    let column_count = headers.len();
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (idx, cell) in row.iter().enumerate().take(column_count) {
            widths[idx] = widths[idx].max(cell.chars().count());
        }
    }

    let numeric: Vec<bool> = (0..column_count)
        .map(|idx| {
            let mut any = false;
            for row in rows {
                match row.get(idx).map(String::as_str) {
                    Some("") | None => {}
                    Some(cell) => {
                        if cell.trim_end_matches('%').parse::<f64>().is_err() {
                            return false;
                        }
                        any = true;
                    }
                }
            }
            any
        })
        .collect();

    let mut output = String::new();
    write_row(&mut output, headers, &widths, &numeric);
    let separators: Vec<String> = widths.iter().map(|w| "-".repeat((*w).max(3))).collect();
    let separator_widths: Vec<usize> = separators.iter().map(String::len).collect();
    write_row(&mut output, &separators, &separator_widths, &numeric);
    for row in rows {
        write_row(&mut output, row, &widths, &numeric);
    }
    output
}

pub fn print_table(headers: &[String], rows: &[Vec<String>]) {
    print!("{}", render_table(headers, rows));
}

fn write_row(output: &mut String, cells: &[String], widths: &[usize], numeric: &[bool]) {
    let mut line = String::new();
    for (idx, cell) in cells.iter().enumerate() {
        if idx >= widths.len() {
            break;
        }
        if idx > 0 {
            line.push_str("  ");
        }
        let sanitized: String = cell
            .chars()
            .map(|c| if matches!(c, '\n' | '\r' | '\t') { ' ' } else { c })
            .collect();
        let padding = widths[idx].saturating_sub(sanitized.chars().count());
        if numeric.get(idx).copied().unwrap_or(false) {
            line.push_str(&" ".repeat(padding));
            line.push_str(&sanitized);
        } else {
            line.push_str(&sanitized);
            line.push_str(&" ".repeat(padding));
        }
    }
    let _ = writeln!(output, "{}", line.trim_end());
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(data: &[&[&str]]) -> Vec<Vec<String>> {
        data.iter()
            .map(|row| row.iter().map(|c| c.to_string()).collect())
            .collect()
    }

    #[test]
    fn renders_header_separator_and_rows() {
        let headers = vec!["state".to_string(), "total".to_string()];
        let body = rows(&[&["Nebraska", "1500.00"], &["Iowa", "75.50"]]);
        let rendered = render_table(&headers, &body);
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("state"));
        assert!(lines[1].starts_with("---"));
        assert!(lines[2].starts_with("Nebraska"));
    }

    #[test]
    fn numeric_columns_right_align() {
        let headers = vec!["value".to_string()];
        let body = rows(&[&["5.00"], &["1500.00"]]);
        let rendered = render_table(&headers, &body);
        let lines: Vec<&str> = rendered.lines().collect();
        assert!(lines[2].ends_with("5.00"));
        assert_eq!(lines[2].chars().count(), lines[3].chars().count());
    }

    #[test]
    fn control_characters_are_flattened() {
        let headers = vec!["note".to_string()];
        let body = rows(&[&["line\nbreak"]]);
        let rendered = render_table(&headers, &body);
        assert!(rendered.contains("line break"));
    }
}
