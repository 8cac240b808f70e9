use chrono::{NaiveDate, NaiveDateTime};

/// Export dates are ISO dates, sometimes with a time part or in German notation.
pub(crate) fn parse_export_date(value: &str) -> Option<NaiveDate> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Some(date);
    }

    if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S") {
        return Some(dt.date());
    }

    NaiveDate::parse_from_str(trimmed, "%d.%m.%Y").ok()
}

/// Only values flagged abnormal and deviating upwards feed the scores.
pub(crate) fn is_abnormal_high(is_normal: Option<&str>, deviation: Option<&str>) -> bool {
    let abnormal = is_normal
        .map(|flag| {
            matches!(
                flag.trim().to_ascii_lowercase().as_str(),
                "0" | "false" | "nein" | "n"
            )
        })
        .unwrap_or(false);
    let high = deviation
        .map(|value| {
            matches!(
                value.trim().to_ascii_uppercase().as_str(),
                "+" | "H" | "HIGH"
            )
        })
        .unwrap_or(false);

    abnormal && high
}

/// `"FORNAME NAME"`, skipping whichever part is missing.
pub(crate) fn display_name(forename: Option<&str>, name: Option<&str>) -> String {
    forename
        .into_iter()
        .chain(name)
        .map(str::trim)
        .collect::<Vec<_>>()
        .join(" ")
}
