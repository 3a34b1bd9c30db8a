//! 🕰️ tolocaltime — shift a naive timestamp from one zone's wall clock to another's.
//!
//! Zones are fixed offsets: `UTC`, `Z`, `GMT`, `+05:30`, `-0800`, `UTC-5`, or one of the
//! common standard-time names (`Eastern Standard Time`, `PST`, ...). Daylight saving is not
//! applied; a standard-time name always means its standard offset.

use chrono::{Duration, FixedOffset};

use crate::common::{Row, Value};
use crate::schema::FieldType;
use crate::transforms::{
    Accepts, BuildContext, BuildError, FieldRef, Output, Registration, Returns, Signature,
    Transform, TransformContext, TransformRegistry,
};

pub(crate) fn register(registry: &mut TransformRegistry) {
    registry.register(
        &["tolocaltime"],
        Registration {
            signature: Signature::Named(&[("to_time_zone", None), ("from_time_zone", Some("UTC"))]),
            accepts: Accepts::Date,
            returns: Returns::Fixed(FieldType::DateTime),
            build,
        },
    );
}

const NAMED_ZONES: &[(&str, i32)] = &[
    ("utc", 0),
    ("z", 0),
    ("gmt", 0),
    ("gmt standard time", 0),
    ("coordinated universal time", 0),
    ("est", -5),
    ("eastern standard time", -5),
    ("cst", -6),
    ("central standard time", -6),
    ("mst", -7),
    ("mountain standard time", -7),
    ("us mountain standard time", -7),
    ("pst", -8),
    ("pacific standard time", -8),
    ("akst", -9),
    ("alaskan standard time", -9),
    ("hst", -10),
    ("hawaiian standard time", -10),
    ("cet", 1),
    ("central european standard time", 1),
    ("w. europe standard time", 1),
    ("eet", 2),
    ("e. europe standard time", 2),
    ("ist", 5 * 60 + 30),
    ("india standard time", 5 * 60 + 30),
    ("jst", 9),
    ("tokyo standard time", 9),
];

/// 🌍 A zone name or offset, as a fixed offset from UTC.
pub fn parse_zone(raw: &str) -> Option<FixedOffset> {
    let lowered = raw.trim().to_ascii_lowercase();
    if let Some((_, hours_or_minutes)) = NAMED_ZONES.iter().find(|(name, _)| *name == lowered) {
        // -- 🕐 anything beyond ±14 is minutes (India, we see you)
        let seconds = if hours_or_minutes.abs() > 14 {
            hours_or_minutes * 60
        } else {
            hours_or_minutes * 3600
        };
        return FixedOffset::east_opt(seconds);
    }

    let offset = lowered
        .strip_prefix("utc")
        .or_else(|| lowered.strip_prefix("gmt"))
        .unwrap_or(&lowered)
        .trim();
    let (sign, digits) = match offset.chars().next()? {
        '+' => (1, &offset[1..]),
        '-' => (-1, &offset[1..]),
        _ => return None,
    };
    let (hours, minutes) = match digits.split_once(':') {
        Some((h, m)) => (h.parse::<i32>().ok()?, m.parse::<i32>().ok()?),
        None if digits.len() == 4 && digits.is_ascii() => (digits[..2].parse().ok()?, digits[2..].parse().ok()?),
        None => (digits.parse().ok()?, 0),
    };
    if hours > 14 || minutes >= 60 {
        return None;
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

fn build(ctx: &mut BuildContext<'_>) -> Result<Box<dyn Transform>, BuildError> {
    let zone = |ctx: &BuildContext<'_>, key: &str| -> Result<FixedOffset, BuildError> {
        let raw = ctx.require(key)?;
        parse_zone(raw).ok_or_else(|| ctx.invalid(format!("'{raw}' is not a time zone we know")))
    };
    let from = zone(ctx, "from_time_zone")?;
    let to = zone(ctx, "to_time_zone")?;
    Ok(Box::new(ToLocalTime {
        shift: Duration::seconds(i64::from(to.local_minus_utc() - from.local_minus_utc())),
        input: ctx.single_input()?,
        output: ctx.output(),
    }))
}

#[derive(Debug)]
struct ToLocalTime {
    shift: Duration,
    input: FieldRef,
    output: Output,
}

impl Transform for ToLocalTime {
    fn transform(&mut self, row: &mut Row, ctx: &mut TransformContext<'_>) {
        let shifted = match self.input.read(row) {
            Value::DateTime(dt) => match dt.checked_add_signed(self.shift) {
                Some(shifted) => Value::DateTime(shifted),
                None => {
                    ctx.error(format!("{dt} shifted by {} is out of range", self.shift));
                    return;
                }
            },
            Value::Null => Value::Null,
            other => {
                ctx.error(format!("'{}' = '{other}' is not a date", self.input.alias()));
                return;
            }
        };
        self.output.write(row, shifted);
    }
}
