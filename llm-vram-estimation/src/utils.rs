use fancy_regex::Regex;

/// Groups the integer part of `value` in thousands, e.g. `131072` -> `131,072`.
pub fn format_tokens(value: f64) -> String {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let digits = (value.max(0.0).floor() as u64).to_string();
    match Regex::new(r"(?<=\d)(?=(\d{3})+$)") {
        Ok(re) => re.replace_all(&digits, ",").to_string(),
        Err(_) => digits,
    }
}

pub fn format_gb(value: f64) -> String {
    format!("{value:.2} GB")
}

pub fn format_speed(value: f64) -> String {
    format!("{value:.1} tok/s")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_tokens() {
        assert_eq!(format_tokens(0.0), "0");
        assert_eq!(format_tokens(512.0), "512");
        assert_eq!(format_tokens(8192.0), "8,192");
        assert_eq!(format_tokens(131_072.9), "131,072");
        assert_eq!(format_tokens(1_234_567.0), "1,234,567");
    }

    #[test]
    fn test_format_units() {
        assert_eq!(format_gb(21.6), "21.60 GB");
        assert_eq!(format_speed(122.926), "122.9 tok/s");
    }
}
