use std::fmt::Write as _;

use chrono::NaiveDateTime;

const FIELDS: [(&str, &str); 6] = [
    ("yyyy", "%Y"),
    ("MM", "%m"),
    ("dd", "%d"),
    ("HH", "%H"),
    ("mm", "%M"),
    ("ss", "%S"),
];

/// Format `t` with the filename date language.
///
/// The letter groups `yyyy`, `MM`, `dd`, `HH`, `mm` and `ss` become zero-padded numeric fields.
/// Everything else, including `:` and `-`, is copied through unchanged. Matching is
/// case-sensitive and greedy from the left, so `MMM` is month followed by a literal `M`.
pub fn format_timestamp(fmt: &str, t: &NaiveDateTime) -> String {
    let mut out = String::with_capacity(fmt.len() + 8);
    let _ = write!(out, "{}", t.format(&to_strftime(fmt)));
    out
}

/// Translate the letter groups to `strftime` specifiers, escaping literal `%`.
fn to_strftime(fmt: &str) -> String {
    let mut spec = String::with_capacity(fmt.len() * 2);
    let mut rest = fmt;
    'scan: while !rest.is_empty() {
        for (group, field) in FIELDS {
            if let Some(r) = rest.strip_prefix(group) {
                spec.push_str(field);
                rest = r;
                continue 'scan;
            }
        }
        let mut chars = rest.chars();
        match chars.next() {
            Some('%') => spec.push_str("%%"),
            Some(c) => spec.push(c),
            None => {}
        }
        rest = chars.as_str();
    }
    spec
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, mo, d)
            .unwrap()
            .and_hms_opt(h, mi, s)
            .unwrap()
    }

    #[test]
    fn date_only() {
        let t = at(2025, 10, 18, 17, 21, 18);
        assert_eq!(format_timestamp("yyyyMMdd", &t), "20251018");
    }

    #[test]
    fn separators_pass_through() {
        let t = at(2025, 1, 2, 3, 4, 5);
        assert_eq!(
            format_timestamp("yyyy-MM-dd HH:mm:ss", &t),
            "2025-01-02 03:04:05"
        );
    }

    #[test]
    fn case_distinguishes_month_from_minute() {
        let t = at(2025, 7, 9, 8, 45, 0);
        assert_eq!(format_timestamp("MM/mm", &t), "07/45");
    }

    #[test]
    fn unknown_letters_are_literal() {
        let t = at(2025, 7, 9, 8, 45, 0);
        assert_eq!(format_timestamp("yy_Hh_MMM", &t), "yy_Hh_07M");
        assert_eq!(format_timestamp("", &t), "");
    }

    #[test]
    fn percent_is_not_a_specifier() {
        let t = at(2025, 7, 9, 8, 45, 0);
        assert_eq!(format_timestamp("%Y_yyyy%", &t), "%Y_2025%");
    }
}
