use super::Formatted;

pub const IEC_BYTES: &[&str] = &["B", "KiB", "MiB", "GiB", "TiB", "PiB", "EiB"];
pub const SI_BYTES: &[&str] = &["B", "kB", "MB", "GB", "TB", "PB", "EB"];
pub const SI_BITS: &[&str] = &["b", "kb", "Mb", "Gb", "Tb", "Pb", "Eb"];
pub const SHORT: &[&str] = &["", " K", " Mil", " Bil", " Tri"];

/// Render `value` with no more than `decimals` fractional digits.
///
/// Without an explicit precision the number is rounded to two places and
/// trailing zeros are trimmed, so `1.0` renders as `"1"`.
pub fn to_fixed(value: f64, decimals: Option<usize>) -> String {
    if !value.is_finite() {
        return value.to_string();
    }
    match decimals {
        Some(d) => format!("{:.*}", d, value),
        None => {
            let s = format!("{:.2}", value);
            let s = s.trim_end_matches('0').trim_end_matches('.');
            if s == "-0" {
                "0".to_string()
            } else {
                s.to_string()
            }
        }
    }
}

/// Scale `value` by powers of `k` and attach the matching unit.
///
/// `0` (and non-finite input) always maps to the first unit. The scale index
/// is clamped to the last available unit.
pub fn format_unit(value: f64, units: &[&str], k: f64, decimals: Option<usize>) -> Formatted {
    let first = units.first().copied().unwrap_or_default();
    if value == 0.0 || !value.is_finite() || k <= 1.0 || units.is_empty() {
        return Formatted::new(to_fixed(if value.is_finite() { value } else { 0.0 }, decimals))
            .with_suffix(first);
    }
    let mut scaled = value;
    let mut index = 0usize;
    while scaled.abs() >= k && index + 1 < units.len() {
        scaled /= k;
        index += 1;
    }
    Formatted::new(to_fixed(scaled, decimals)).with_suffix(units[index])
}

pub fn none(value: f64, decimals: Option<usize>) -> Formatted {
    Formatted::new(to_fixed(value, decimals))
}

pub fn short(value: f64, decimals: Option<usize>) -> Formatted {
    format_unit(value, SHORT, 1000.0, decimals)
}

pub fn bytes_iec(value: f64, decimals: Option<usize>) -> Formatted {
    format_unit(value, IEC_BYTES, 1024.0, decimals)
}

pub fn bytes_si(value: f64, decimals: Option<usize>) -> Formatted {
    format_unit(value, SI_BYTES, 1000.0, decimals)
}

pub fn bits_si(value: f64, decimals: Option<usize>) -> Formatted {
    format_unit(value, SI_BITS, 1000.0, decimals)
}

pub fn percent(value: f64, decimals: Option<usize>) -> Formatted {
    Formatted::new(to_fixed(value, decimals)).with_suffix("%")
}

pub fn percent_unit(value: f64, decimals: Option<usize>) -> Formatted {
    percent(value * 100.0, decimals)
}

pub fn currency_usd(value: f64, decimals: Option<usize>) -> Formatted {
    let mut out = short(value, decimals);
    out.prefix = Some("$".into());
    out
}

/// Milliseconds, promoted to the largest whole time unit.
pub fn milliseconds(value: f64, decimals: Option<usize>) -> Formatted {
    const STEPS: &[(f64, &str)] = &[
        (1.0, " ms"),
        (1000.0, " s"),
        (60_000.0, " min"),
        (3_600_000.0, " hour"),
        (86_400_000.0, " day"),
        (604_800_000.0, " week"),
        (31_536_000_000.0, " year"),
    ];
    let abs = value.abs();
    let (div, unit) = STEPS
        .iter()
        .rev()
        .find(|(div, _)| abs >= *div)
        .copied()
        .unwrap_or(STEPS[0]);
    Formatted::new(to_fixed(value / div, decimals)).with_suffix(unit)
}

pub fn seconds(value: f64, decimals: Option<usize>) -> Formatted {
    milliseconds(value * 1000.0, decimals)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_scale_by_1024() {
        let f = format_unit(1024.0, IEC_BYTES, 1024.0, None);
        assert_eq!(f.value, "1");
        assert_eq!(f.suffix.as_deref(), Some("KiB"));
        assert_eq!(f.prefix, None);
    }

    #[test]
    fn zero_uses_first_unit() {
        let f = format_unit(0.0, IEC_BYTES, 1024.0, None);
        assert_eq!(f.value, "0");
        assert_eq!(f.suffix.as_deref(), Some("B"));
    }

    #[test]
    fn clamps_to_largest_unit() {
        let f = format_unit(1e30, SI_BYTES, 1000.0, Some(0));
        assert_eq!(f.suffix.as_deref(), Some("EB"));
    }

    #[test]
    fn small_values_stay_in_base_unit() {
        let f = format_unit(0.5, IEC_BYTES, 1024.0, None);
        assert_eq!(f.value, "0.5");
        assert_eq!(f.suffix.as_deref(), Some("B"));
    }

    #[test]
    fn explicit_decimals_are_kept() {
        assert_eq!(to_fixed(1.0, Some(2)), "1.00");
        assert_eq!(to_fixed(1.256, None), "1.26");
    }

    #[test]
    fn milliseconds_promote() {
        let f = milliseconds(90_000.0, None);
        assert_eq!(f.value, "1.5");
        assert_eq!(f.suffix.as_deref(), Some(" min"));
    }
}
