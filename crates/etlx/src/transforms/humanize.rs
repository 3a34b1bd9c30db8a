//! 🗣️ humanize — `PascalCaseThings` become sentences, timestamps become "3 days ago".

use chrono::{NaiveDateTime, Utc};

use crate::common::{Row, Value};
use crate::schema::FieldType;
use crate::transforms::{
    Accepts, BuildContext, BuildError, FieldRef, Output, Registration, Returns, Signature,
    Transform, TransformContext, TransformRegistry,
};

pub(crate) fn register(registry: &mut TransformRegistry) {
    registry.register(
        &["humanize"],
        Registration {
            signature: Signature::Named(&[]),
            accepts: Accepts::TextOrDate,
            returns: Returns::Fixed(FieldType::String),
            build,
        },
    );
}

fn build(ctx: &mut BuildContext<'_>) -> Result<Box<dyn Transform>, BuildError> {
    Ok(Box::new(Humanize {
        input: ctx.single_input()?,
        output: ctx.output(),
        now: || Utc::now().naive_utc(),
    }))
}

#[derive(Debug)]
struct Humanize {
    input: FieldRef,
    output: Output,
    now: fn() -> NaiveDateTime,
}

impl Transform for Humanize {
    fn transform(&mut self, row: &mut Row, _ctx: &mut TransformContext<'_>) {
        let humanized = match self.input.read(row) {
            Value::Null => String::new(),
            Value::DateTime(then) => humanize_span(*then, (self.now)()),
            other => humanize_text(&other.to_string()),
        };
        self.output.write(row, Value::String(humanized));
    }
}

/// 🗣️ `PascalCaseInput` → `Pascal case input`, `snake_case_input` → `snake case input`.
/// All-caps words (acronyms) keep their caps. All-caps input is returned untouched.
pub fn humanize_text(input: &str) -> String {
    if !input.chars().any(char::is_lowercase) {
        return input.to_string();
    }
    if input.contains(['_', '-']) {
        let spaced: Vec<&str> = input.split(['_', '-', ' ']).filter(|w| !w.is_empty()).collect();
        return capitalize_first(&spaced.join(" "));
    }

    let chars: Vec<char> = input.chars().collect();
    let mut words: Vec<String> = Vec::new();
    let mut current = String::new();
    for (i, &c) in chars.iter().enumerate() {
        if c.is_whitespace() {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            continue;
        }
        let previous = i.checked_sub(1).map(|p| chars[p]);
        let next = chars.get(i + 1).copied();
        let boundary = match previous {
            Some(p) if c.is_uppercase() => {
                p.is_lowercase()
                    || p.is_ascii_digit()
                    // -- 🔠 end of an acronym: the last capital of "HTMLPage" starts "Page"
                    || (p.is_uppercase() && next.is_some_and(char::is_lowercase))
            }
            Some(p) if c.is_ascii_digit() => p.is_alphabetic(),
            _ => false,
        };
        if boundary && !current.is_empty() {
            words.push(std::mem::take(&mut current));
        }
        current.push(c);
    }
    if !current.is_empty() {
        words.push(current);
    }

    let sentence = words
        .iter()
        .map(|word| {
            let acronym = word.chars().count() > 1 && !word.chars().any(char::is_lowercase);
            if acronym { word.clone() } else { word.to_lowercase() }
        })
        .collect::<Vec<_>>()
        .join(" ");
    capitalize_first(&sentence)
}

fn capitalize_first(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// ⏳ How long ago (or how far ahead) `then` is, relative to `now`, in words.
pub fn humanize_span(then: NaiveDateTime, now: NaiveDateTime) -> String {
    let future = then > now;
    let span = if future { then - now } else { now - then };
    let milliseconds = span.num_milliseconds();
    let seconds = span.num_seconds();
    let minutes = span.num_minutes();
    let hours = span.num_hours();
    let days = span.num_days();

    if milliseconds < 500 {
        return "now".to_string();
    }
    let (amount, unit) = if seconds < 60 {
        (seconds.max(1), "second")
    } else if seconds < 120 {
        return relative("a minute", future);
    } else if minutes < 60 {
        (minutes, "minute")
    } else if minutes < 120 {
        return relative("an hour", future);
    } else if hours < 24 {
        (hours, "hour")
    } else if hours < 48 {
        return if future { "tomorrow" } else { "yesterday" }.to_string();
    } else if days < 28 {
        (days, "day")
    } else if days < 365 {
        ((days as f64 / 29.5).floor() as i64, "month")
    } else {
        (days / 365, "year")
    };

    if amount <= 1 {
        relative(&format!("one {unit}"), future)
    } else {
        relative(&format!("{amount} {unit}s"), future)
    }
}

fn relative(amount: &str, future: bool) -> String {
    if future {
        format!("{amount} from now")
    } else {
        format!("{amount} ago")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    #[test]
    fn the_one_where_code_learns_to_speak() {
        assert_eq!(humanize_text("PascalCaseInputString"), "Pascal case input string");
        assert_eq!(humanize_text("Underscored_input_string"), "Underscored input string");
        assert_eq!(humanize_text("HTMLPageTitle"), "HTML page title");
        assert_eq!(humanize_text("Address2Line"), "Address 2 line");
        assert_eq!(humanize_text("NASA"), "NASA");
    }

    #[test]
    fn the_one_where_time_is_relative() {
        let now = NaiveDate::from_ymd_opt(2020, 6, 15)
            .and_then(|d| d.and_hms_opt(12, 0, 0))
            .expect("valid date");
        let ago = |d: Duration| humanize_span(now - d, now);
        assert_eq!(ago(Duration::milliseconds(100)), "now");
        assert_eq!(ago(Duration::seconds(1)), "one second ago");
        assert_eq!(ago(Duration::seconds(30)), "30 seconds ago");
        assert_eq!(ago(Duration::seconds(90)), "a minute ago");
        assert_eq!(ago(Duration::minutes(10)), "10 minutes ago");
        assert_eq!(ago(Duration::minutes(90)), "an hour ago");
        assert_eq!(ago(Duration::hours(5)), "5 hours ago");
        assert_eq!(ago(Duration::hours(30)), "yesterday");
        assert_eq!(ago(Duration::days(3)), "3 days ago");
        assert_eq!(ago(Duration::days(40)), "one month ago");
        assert_eq!(ago(Duration::days(100)), "3 months ago");
        assert_eq!(ago(Duration::days(800)), "2 years ago");
        assert_eq!(humanize_span(now + Duration::days(3), now), "3 days from now");
        assert_eq!(humanize_span(now + Duration::hours(30), now), "tomorrow");
    }
}
