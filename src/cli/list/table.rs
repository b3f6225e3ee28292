use std::fmt::{self, Write};

/// Plain-text table whose header cells contain no whitespace, so the output can be
/// split by `awk` or `cut`.
pub(crate) struct Table {
    header: Vec<String>,
    body: Vec<Vec<String>>,
    print_header: bool,
}

impl Table {
    pub(crate) fn with_header(header: &[&str]) -> Table {
        debug_assert!(
            header.iter().all(|h| !h.contains(char::is_whitespace)),
            "table header contains whitespace"
        );

        Table {
            header: header.iter().map(|h| h.to_string()).collect(),
            body: Vec::new(),
            print_header: true,
        }
    }

    pub(crate) fn print_header(&mut self, print_header: bool) {
        self.print_header = print_header;
    }

    /// Rows shorter than the header are padded with `-`, longer rows are truncated.
    pub(crate) fn add_row(&mut self, mut row: Vec<String>) {
        row.resize(self.header.len(), "-".to_string());

        self.body.push(row);
    }

    fn visible_rows(&self) -> impl Iterator<Item = &Vec<String>> {
        let header = self.print_header.then_some(&self.header);

        header.into_iter().chain(self.body.iter())
    }

    fn column_widths(&self) -> Vec<usize> {
        let mut widths = vec![0usize; self.header.len()];

        for row in self.visible_rows() {
            for (width, cell) in widths.iter_mut().zip(row) {
                *width = (*width).max(cell.chars().count());
            }
        }

        widths
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let widths = self.column_widths();

        for row in self.visible_rows() {
            let last = row.len().saturating_sub(1);

            for (i, cell) in row.iter().enumerate() {
                if i == last {
                    f.write_str(cell)?;
                } else {
                    write!(f, "{:<width$}  ", cell, width = widths[i])?;
                }
            }

            f.write_char('\n')?;
        }

        Ok(())
    }
}

/// Listings that can be rendered as a [`Table`]
pub(crate) trait IntoTable {
    fn into_table(self) -> Table;
}
