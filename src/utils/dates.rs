use chrono::NaiveDate;

/// Parse a date the way filings actually write them: ISO (2023-06-30)
/// first, then the US slash form (06/30/2023). Anything else is treated as
/// unparseable rather than guessed at.
pub fn parse_date(input: &str) -> Option<NaiveDate> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }
    NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(input, "%m/%d/%Y"))
        .map_err(|_| log::warn!("unrecognized date format: {}", input))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_iso_and_us_formats() {
        let expected = NaiveDate::from_ymd_opt(2023, 6, 30).unwrap();
        assert_eq!(parse_date("2023-06-30"), Some(expected));
        assert_eq!(parse_date("06/30/2023"), Some(expected));
        assert_eq!(parse_date(" 2023-06-30 "), Some(expected));
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(parse_date(""), None);
        assert_eq!(parse_date("June 30"), None);
        assert_eq!(parse_date("2023-13-01"), None);
    }
}
