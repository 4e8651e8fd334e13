// Plain-text and LaTeX renderings of a `Report`.

use crate::report::{ItemSummary, Report};

/// Renders a report to text
pub trait Formatter {
    fn format(&self, report: &Report) -> String;

    fn print(&self, report: &Report) {
        println!("{}", self.format(report));
    }
}

fn header(report: &Report) -> Vec<&'static str> {
    let mut columns = vec!["Id", "Name", "First date", "Last date", "Annotations"];
    if report.include_missing {
        columns.extend(["Missing >1h", "Missing >1d"]);
    }
    columns
}

fn cells(item: &ItemSummary, include_missing: bool) -> Vec<String> {
    let mut cells = vec![
        item.id.to_string(),
        item.name.clone(),
        item.first_date.to_string(),
        item.last_date.to_string(),
        item.num_annotations.to_string(),
    ];
    if include_missing {
        cells.push(percent(item.perc_missing_hour));
        cells.push(percent(item.perc_missing_day));
    }
    cells
}

fn percent(ratio: Option<f64>) -> String {
    match ratio {
        Some(r) => format!("{:.2}%", r * 100.0),
        None => "-".to_string(),
    }
}

/// Tab-separated columns with a dashed banner per house
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainFormatter;

impl PlainFormatter {
    const NAME_WIDTH: usize = 30;

    fn line(cells: &[String]) -> String {
        let mut out = format!(
            "{:>4}\t{:>30}\t{:>20}\t{:>20}\t{:>5}",
            cells[0], cells[1], cells[2], cells[3], cells[4]
        );
        for extra in &cells[5..] {
            out.push_str(&format!("\t{:>12}", extra));
        }
        out
    }
}

impl Formatter for PlainFormatter {
    fn format(&self, report: &Report) -> String {
        let header: Vec<String> = header(report).into_iter().map(String::from).collect();
        let mut out = vec![Self::line(&header)];

        for house in &report.houses {
            out.push(format!("{0} House {1:2} {0}", "-".repeat(42), house.house_id));
            for item in &house.items {
                let mut cells = cells(item, report.include_missing);
                cells[1] = cells[1].chars().take(Self::NAME_WIDTH).collect();
                out.push(Self::line(&cells));
            }
        }

        out.join("\n")
    }
}

/// `tabular` environment with one multicolumn row per house
#[derive(Debug, Default, Clone)]
pub struct LatexFormatter {
    /// Column spec; `|c|c|...` when unset
    pub alignment: Option<String>,
}

impl LatexFormatter {
    pub fn with_alignment(alignment: impl Into<String>) -> Self {
        Self {
            alignment: Some(alignment.into()),
        }
    }
}

impl Formatter for LatexFormatter {
    fn format(&self, report: &Report) -> String {
        let columns = header(report);
        let count = columns.len();
        let alignment = self
            .alignment
            .clone()
            .unwrap_or_else(|| format!("|{}", "c|".repeat(count)));

        let mut buf = Vec::new();
        buf.push(format!("\\begin{{tabular}}{{{}}}", alignment));
        buf.push("\\hline".to_string());
        let bold: Vec<String> = columns.iter().map(|c| bold(c)).collect();
        buf.push(format!("{} \\\\ \\hline", bold.join("   &  ")));

        for house in &report.houses {
            buf.push(format!(
                "\\multicolumn{{{}}}{{|c|}}{{\\textbf{{House {}}}}} \\\\ \\hline",
                count, house.house_id
            ));
            for item in &house.items {
                let cells = cells(item, report.include_missing);
                let escaped: Vec<String> = cells[1..].iter().map(|c| escape(c)).collect();
                buf.push(format!(
                    "{}   &    {} \\\\ \\hline",
                    cells[0],
                    escaped.join("   &   ")
                ));
            }
        }

        buf.push("\\end{tabular}".to_string());
        buf.join("\n")
    }
}

fn bold(s: &str) -> String {
    format!("\\textbf{{{}}}", s)
}

/// Escape LaTeX special characters; a bare `{}` is kept
pub fn escape(s: &str) -> String {
    if s == "{}" {
        return s.to_string();
    }

    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\textbackslash "),
            '~' => out.push_str("\\textasciitilde "),
            '^' => out.push_str("\\textasciicircum "),
            '_' | '%' | '$' | '#' | '{' | '}' | '&' => {
                out.push('\\');
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    out
}
