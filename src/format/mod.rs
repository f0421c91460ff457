pub mod units;

use hashlink::LinkedHashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

pub use units::{format_unit, to_fixed};

/// A formatted number split into its display parts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Formatted {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suffix: Option<String>,
}

impl Formatted {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            prefix: None,
            value: value.into(),
            suffix: None,
        }
    }

    /// Empty suffixes are dropped.
    pub fn with_suffix(mut self, suffix: &str) -> Self {
        self.suffix = (!suffix.is_empty()).then(|| suffix.to_string());
        self
    }
}

impl fmt::Display for Formatted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let suffix = self.suffix.as_deref().unwrap_or_default();
        // Bare unit names such as `KiB` get a separating space.
        let sep = match suffix.chars().next() {
            Some(c) if c.is_alphabetic() => " ",
            _ => "",
        };
        write!(
            f,
            "{}{}{sep}{suffix}",
            self.prefix.as_deref().unwrap_or_default(),
            self.value,
        )
    }
}

/// Identifies a formatter, e.g. `data` / `bytes`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatCategory {
    pub category: String,
    pub value: String,
    pub label: String,
}

impl FormatCategory {
    pub fn new(category: &str, value: &str, label: &str) -> Self {
        Self {
            category: category.into(),
            value: value.into(),
            label: label.into(),
        }
    }

    pub fn key(&self) -> String {
        format_key(&self.category, &self.value)
    }
}

pub fn format_key(category: &str, value: &str) -> String {
    format!("{category}_{value}")
}

pub type FormatFn = Arc<dyn Fn(f64, Option<usize>) -> Formatted + Send + Sync>;

#[derive(Clone)]
pub struct Formatter {
    pub category: FormatCategory,
    format: FormatFn,
}

impl Formatter {
    pub fn new(
        category: FormatCategory,
        format: impl Fn(f64, Option<usize>) -> Formatted + Send + Sync + 'static,
    ) -> Self {
        Self {
            category,
            format: Arc::new(format),
        }
    }

    pub fn format(&self, value: f64, decimals: Option<usize>) -> Formatted {
        (self.format)(value, decimals)
    }
}

/// Formatters keyed by `category_value`.
#[derive(Clone)]
pub struct FormatRegistry {
    map: LinkedHashMap<String, Formatter>,
    fallback: Formatter,
}

impl Default for FormatRegistry {
    fn default() -> Self {
        Self {
            map: LinkedHashMap::new(),
            fallback: Formatter::new(FormatCategory::new("none", "none", "None"), units::none),
        }
    }
}

impl FormatRegistry {
    pub fn with_defaults() -> Self {
        let mut reg = Self::default();
        reg.register(Formatter::new(
            FormatCategory::new("none", "none", "None"),
            units::none,
        ))
        .register(Formatter::new(
            FormatCategory::new("short", "short", "Short"),
            units::short,
        ))
        .register(Formatter::new(
            FormatCategory::new("data", "bytes", "bytes(IEC)"),
            units::bytes_iec,
        ))
        .register(Formatter::new(
            FormatCategory::new("data", "decbytes", "bytes(SI)"),
            units::bytes_si,
        ))
        .register(Formatter::new(
            FormatCategory::new("data", "bits", "bits(SI)"),
            units::bits_si,
        ))
        .register(Formatter::new(
            FormatCategory::new("time", "ms", "milliseconds (ms)"),
            units::milliseconds,
        ))
        .register(Formatter::new(
            FormatCategory::new("time", "s", "seconds (s)"),
            units::seconds,
        ))
        .register(Formatter::new(
            FormatCategory::new("percent", "percent", "Percent (0-100)"),
            units::percent,
        ))
        .register(Formatter::new(
            FormatCategory::new("percent", "percentunit", "Percent (0.0-1.0)"),
            units::percent_unit,
        ))
        .register(Formatter::new(
            FormatCategory::new("currency", "usd", "Dollars ($)"),
            units::currency_usd,
        ));
        reg
    }

    pub fn register(&mut self, formatter: Formatter) -> &mut Self {
        let key = formatter.category.key();
        if let Some(slot) = self.map.get_mut(&key) {
            *slot = formatter;
        } else {
            self.map.insert(key, formatter);
        }
        self
    }

    /// Resolve a formatter; unknown keys yield the plain number formatter.
    pub fn get(&self, key: &str) -> &Formatter {
        self.map.get(key).unwrap_or(&self.fallback)
    }

    pub fn find(&self, key: &str) -> Option<&Formatter> {
        self.map.get(key)
    }

    pub fn format(&self, key: &str, value: f64, decimals: Option<usize>) -> Formatted {
        self.get(key).format(value, decimals)
    }

    pub fn formatters(&self) -> impl Iterator<Item = &Formatter> {
        self.map.values()
    }

    /// Categories grouped by their `category` field, in registration order.
    pub fn categories(&self) -> Vec<(String, Vec<FormatCategory>)> {
        let mut groups: Vec<(String, Vec<FormatCategory>)> = Vec::new();
        for f in self.map.values() {
            match groups.iter_mut().find(|(c, _)| *c == f.category.category) {
                Some((_, list)) => list.push(f.category.clone()),
                None => groups.push((f.category.category.clone(), vec![f.category.clone()])),
            }
        }
        groups
    }
}
