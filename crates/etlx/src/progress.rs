// ai
//! 📊 progress.rs — "Are we there yet?" asked the rows. "We don't know how far there is," said the bar.
//!
//! 🧠 Knowledge graph:
//! - Each source worker owns one [`EntityProgress`] and calls `record_page` once per page.
//! - Sources don't know their row count up front, so this is a spinner with a scoreboard,
//!   not a bar with a finish line.
//! - Rows in and rows out are tracked apart: repeat-shaped composition fans out,
//!   inner joins thin out, and the gap between the two is the interesting number.
//! - Rates come from a 5-second sliding window. Advisory only. A hidden spinner
//!   (`progress = false`) still counts, it just doesn't draw.
//!
//! 🦆 The duck is counting too. It has lost count. It does not care.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use comfy_table::{Cell, CellAlignment, ContentArrangement, Table, presets::NOTHING};
use indicatif::{ProgressBar, ProgressStyle};

const RATE_WINDOW: Duration = Duration::from_secs(5);

/// 🔢 12345678 → "12,345,678". Digits in threes, like a barbershop trio.
fn with_commas(n: u64) -> String {
    let digits = n.to_string();
    let lead = digits.len() % 3;
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, digit) in digits.char_indices() {
        if i != 0 && (i + 3 - lead) % 3 == 0 {
            out.push(',');
        }
        out.push(digit);
    }
    out
}

/// ⏱️ 3725s → "1h 02m 05s", 65s → "1m 05s", 7s → "7s".
fn short_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    match (secs / 3600, (secs % 3600) / 60, secs % 60) {
        (0, 0, s) => format!("{s}s"),
        (0, m, s) => format!("{m}m {s:02}s"),
        (h, m, s) => format!("{h}h {m:02}m {s:02}s"),
    }
}

#[derive(Debug, Clone, Copy)]
struct Sample {
    at: Instant,
    rows_in: u64,
    rows_out: u64,
}

/// 📊 Rows read and rows written for one entity, plus the spinner that brags about them.
pub(crate) struct EntityProgress {
    entity: String,
    pages: u64,
    rows_in: u64,
    rows_out: u64,
    spinner: ProgressBar,
    samples: VecDeque<Sample>,
    started: Instant,
}

impl std::fmt::Debug for EntityProgress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityProgress")
            .field("entity", &self.entity)
            .field("pages", &self.pages)
            .field("rows_in", &self.rows_in)
            .field("rows_out", &self.rows_out)
            .finish()
    }
}

impl EntityProgress {
    pub(crate) fn new(entity: &str, enabled: bool) -> Self {
        let spinner = if enabled {
            ProgressBar::new_spinner()
        } else {
            ProgressBar::hidden()
        };
        // -- 🎨 literal template; a rejected one just means the default spinner
        let style = ProgressStyle::default_spinner()
            .template("{spinner} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        spinner.set_style(style);

        let started = Instant::now();
        Self {
            entity: entity.to_string(),
            pages: 0,
            rows_in: 0,
            rows_out: 0,
            spinner,
            samples: VecDeque::from([Sample {
                at: started,
                rows_in: 0,
                rows_out: 0,
            }]),
            started,
        }
    }

    /// 📄 One page went through: `rows_in` decoded, `rows_out` left after composition.
    pub(crate) fn record_page(&mut self, rows_in: u64, rows_out: u64) {
        self.pages += 1;
        self.rows_in += rows_in;
        self.rows_out += rows_out;

        let now = Instant::now();
        while self
            .samples
            .front()
            .is_some_and(|oldest| now.duration_since(oldest.at) > RATE_WINDOW)
        {
            self.samples.pop_front();
        }
        self.samples.push_back(Sample {
            at: now,
            rows_in: self.rows_in,
            rows_out: self.rows_out,
        });

        if !self.spinner.is_hidden() {
            self.spinner.set_message(self.scoreboard());
            self.spinner.tick();
        }
    }

    pub(crate) fn finish(&self) {
        if !self.spinner.is_hidden() {
            self.spinner.finish_with_message(self.scoreboard());
        }
    }

    /// 🏎️ (rows in/s, rows out/s) over the sliding window.
    fn rates(&self) -> (f64, f64) {
        match (self.samples.front(), self.samples.back()) {
            (Some(oldest), Some(newest)) => {
                let elapsed = newest.at.duration_since(oldest.at).as_secs_f64();
                if elapsed <= 0.0 {
                    return (0.0, 0.0);
                }
                (
                    newest.rows_in.saturating_sub(oldest.rows_in) as f64 / elapsed,
                    newest.rows_out.saturating_sub(oldest.rows_out) as f64 / elapsed,
                )
            }
            _ => (0.0, 0.0),
        }
    }

    fn scoreboard(&self) -> String {
        let (in_rate, out_rate) = self.rates();
        let right = |text: String| Cell::new(text).set_alignment(CellAlignment::Right);

        let mut table = Table::new();
        table.load_preset(NOTHING);
        table.set_content_arrangement(ContentArrangement::Dynamic);
        table.add_row(vec![
            right(format!("{} rows in", with_commas(self.rows_in))),
            right(format!("{} rows/s", with_commas(in_rate as u64))),
        ]);
        table.add_row(vec![
            right(format!("{} rows out", with_commas(self.rows_out))),
            right(format!("{} rows/s", with_commas(out_rate as u64))),
        ]);
        table.add_row(vec![
            right(format!("{} pages", with_commas(self.pages))),
            right(format!("{} elapsed", short_duration(self.started.elapsed()))),
        ]);
        format!("entity: {}\n{}", self.entity, table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn the_one_where_big_numbers_get_commas() {
        assert_eq!(with_commas(0), "0");
        assert_eq!(with_commas(999), "999");
        assert_eq!(with_commas(1_000), "1,000");
        assert_eq!(with_commas(12_345_678), "12,345,678");
    }

    #[test]
    fn the_one_where_time_is_a_flat_circle() {
        assert_eq!(short_duration(Duration::from_secs(7)), "7s");
        assert_eq!(short_duration(Duration::from_secs(65)), "1m 05s");
        assert_eq!(short_duration(Duration::from_secs(3725)), "1h 02m 05s");
    }

    #[test]
    fn the_one_where_a_hidden_spinner_still_counts() {
        let mut the_progress = EntityProgress::new("Orders", false);
        the_progress.record_page(2, 6);
        the_progress.record_page(3, 0);
        assert_eq!(the_progress.pages, 2);
        assert_eq!(the_progress.rows_in, 5);
        assert_eq!(the_progress.rows_out, 6);
        assert!(the_progress.scoreboard().contains("entity: Orders"));
        the_progress.finish();
    }
}
