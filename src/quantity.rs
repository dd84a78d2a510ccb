//! CPU and memory quantity codec.
//!
//! CPU is normalized to milli-cores, memory to plain units using decimal
//! multipliers for the `Ki`/`Mi`/`Gi`/... suffixes kubectl prints.

const MEMORY_SUFFIXES: [(&str, i64); 5] = [
    ("Ki", 1_000),
    ("Mi", 1_000_000),
    ("Gi", 1_000_000_000),
    ("Ti", 1_000_000_000_000),
    ("Pi", 1_000_000_000_000_000),
];

/// Parse a CPU quantity (`"2"`, `"0.5"`, `"250m"`) into milli-cores.
pub fn parse_cpu(s: &str) -> Option<i64> {
    let s = s.trim();
    let (number, scale) = match s.strip_suffix('m') {
        Some(milli) => (milli, 1.0),
        None => (s, 1000.0),
    };
    let value: f64 = number.parse().ok()?;
    if !value.is_finite() {
        return None;
    }
    Some((value * scale) as i64)
}

/// Parse a memory quantity (`"128Mi"`) into units. Bare numbers and unknown
/// suffixes are rejected.
pub fn parse_memory(s: &str) -> Option<i64> {
    let s = s.trim();
    MEMORY_SUFFIXES.iter().find_map(|(suffix, scale)| {
        let base: i64 = s.strip_suffix(suffix)?.parse().ok()?;
        base.checked_mul(*scale)
    })
}

pub fn format_memory(n: i64) -> String {
    let (suffix, value) = MEMORY_SUFFIXES
        .iter()
        .rev()
        .map(|(suffix, scale)| (*suffix, n as f64 / *scale as f64))
        .find(|(_, value)| *value >= 1.0)
        .unwrap_or_else(|| (MEMORY_SUFFIXES[0].0, n as f64 / MEMORY_SUFFIXES[0].1 as f64));

    if value >= 100.0 {
        format!("{:.0} {}", value, suffix)
    } else {
        format!("{:.2} {}", value, suffix)
    }
}

pub fn format_cpu(n: i64) -> String {
    format!("{}", n as f64 / 1000.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reparse(formatted: &str) -> f64 {
        let (number, suffix) = formatted.split_once(' ').unwrap();
        let scale = MEMORY_SUFFIXES
            .iter()
            .find(|(s, _)| *s == suffix)
            .map(|(_, scale)| *scale)
            .unwrap();
        number.parse::<f64>().unwrap() * scale as f64
    }

    #[test]
    fn test_parse_cpu() {
        assert_eq!(parse_cpu("500m"), Some(500));
        assert_eq!(parse_cpu("2"), Some(2000));
        assert_eq!(parse_cpu("0.5"), Some(500));
        assert_eq!(parse_cpu("1.5m"), Some(1));
        assert_eq!(parse_cpu("abc"), None);
        assert_eq!(parse_cpu(""), None);
        assert_eq!(parse_cpu("NaN"), None);
    }

    #[test]
    fn test_parse_memory() {
        assert_eq!(parse_memory("128Mi"), Some(128_000_000));
        assert_eq!(parse_memory("1Gi"), Some(1_000_000_000));
        assert_eq!(parse_memory("3882716Ki"), Some(3_882_716_000));
        assert_eq!(parse_memory("2Ti"), Some(2_000_000_000_000));
        assert_eq!(parse_memory("128Xi"), None);
        assert_eq!(parse_memory("1024"), None);
        assert_eq!(parse_memory("1.5Gi"), None);
        assert_eq!(parse_memory("Mi"), None);
    }

    #[test]
    fn test_format_memory_prefix_and_precision() {
        assert_eq!(format_memory(128_000_000), "128 Mi");
        assert_eq!(format_memory(1_500_000_000), "1.50 Gi");
        assert_eq!(format_memory(42_000), "42.00 Ki");
        assert_eq!(format_memory(500), "0.50 Ki");
        assert_eq!(format_memory(0), "0.00 Ki");
    }

    #[test]
    fn test_format_cpu() {
        assert_eq!(format_cpu(500), "0.5");
        assert_eq!(format_cpu(2000), "2");
        assert_eq!(format_cpu(1250), "1.25");
    }

    #[test]
    fn test_memory_round_trip_within_tolerance() {
        for input in ["128Mi", "1Gi", "1536Mi", "3882716Ki", "750Ki", "12Gi"] {
            let parsed = parse_memory(input).unwrap();
            let formatted = format_memory(parsed);
            let back = reparse(&formatted);
            let tolerance = parsed as f64 * 0.01;
            assert!(
                (back - parsed as f64).abs() <= tolerance,
                "{} -> {} -> {}",
                input,
                formatted,
                back
            );
        }
    }
}
