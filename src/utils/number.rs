/// Format `value` with at most `max_decimals` fractional digits, dropping trailing zeros
/// (`0.5` → "0.5", `1.0` → "1", `0.126` → "0.13" at two decimals).
pub fn format_trimmed(value: f64, max_decimals: usize) -> String {
    let mut s = format!("{:.*}", max_decimals, value);
    if s.contains('.') {
        while s.ends_with('0') {
            s.pop();
        }
        if s.ends_with('.') {
            s.pop();
        }
    }
    if s == "-0" {
        s = "0".to_string();
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_trimmed() {
        assert_eq!(format_trimmed(0.5, 2), "0.5");
        assert_eq!(format_trimmed(1.0, 2), "1");
        assert_eq!(format_trimmed(12.3456, 2), "12.35");
        assert_eq!(format_trimmed(0.1, 6), "0.1");
        assert_eq!(format_trimmed(2.0 / 3.0, 6), "0.666667");
        assert_eq!(format_trimmed(0.0, 6), "0");
        assert_eq!(format_trimmed(-0.0001, 2), "0");
        assert_eq!(format_trimmed(150.0, 2), "150");
    }
}
