//! Interface selection policy.

use glob::Pattern;

use crate::error::ConfigError;
use crate::model::{CounterTable, Counters};

/// Which interface(s) feed the rate computation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionPolicy {
    /// One interface, by name.
    Fixed(String),
    /// The busiest interface, found by probing.
    AutoDetect,
    /// Sum of every interface matching any of the patterns.
    Pattern(Vec<Pattern>),
}

impl SelectionPolicy {
    /// Parses a selector string.
    ///
    /// - empty or `auto` (any case): [`SelectionPolicy::AutoDetect`]
    /// - anything containing `,`, `*` or `?`: a comma-separated pattern list
    /// - otherwise: a literal interface name
    pub fn parse(selector: &str) -> Result<Self, ConfigError> {
        let selector = selector.trim();
        if selector.is_empty() || selector.eq_ignore_ascii_case("auto") {
            return Ok(SelectionPolicy::AutoDetect);
        }

        if !selector.contains(|c: char| matches!(c, ',' | '*' | '?')) {
            return Ok(SelectionPolicy::Fixed(selector.to_string()));
        }

        let patterns = selector
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(|part| {
                Pattern::new(part).map_err(|e| ConfigError::Pattern {
                    pattern: part.to_string(),
                    reason: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        if patterns.is_empty() {
            return Err(ConfigError::Pattern {
                pattern: selector.to_string(),
                reason: "no interface names in list".to_string(),
            });
        }

        Ok(SelectionPolicy::Pattern(patterns))
    }

    /// Human-readable label: the interface name, the joined pattern list, or `auto`.
    pub fn label(&self) -> String {
        match self {
            SelectionPolicy::Fixed(name) => name.clone(),
            SelectionPolicy::AutoDetect => "auto".to_string(),
            SelectionPolicy::Pattern(patterns) => pattern_label(patterns),
        }
    }
}

/// Joins patterns back into selector form.
pub fn pattern_label(patterns: &[Pattern]) -> String {
    patterns
        .iter()
        .map(Pattern::as_str)
        .collect::<Vec<_>>()
        .join(",")
}

/// Whether `name` matches any of `patterns` (case-sensitive).
pub fn matches_any(patterns: &[Pattern], name: &str) -> bool {
    patterns.iter().any(|p| p.matches(name))
}

/// Sums the counters of every interface matching any pattern.
///
/// Each interface is counted once even when several patterns match it.
pub fn aggregate(table: &CounterTable, patterns: &[Pattern]) -> Counters {
    table
        .iter()
        .filter(|entry| matches_any(patterns, &entry.name))
        .fold(Counters::default(), |sum, entry| {
            sum.saturating_add(entry.counters)
        })
}

/// Sorted names of the interfaces [`aggregate`] sums.
pub fn members(table: &CounterTable, patterns: &[Pattern]) -> Vec<String> {
    let mut names: Vec<String> = table
        .iter()
        .filter(|entry| matches_any(patterns, &entry.name))
        .map(|entry| entry.name.clone())
        .collect();
    names.sort();
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patterns(selector: &str) -> Vec<Pattern> {
        match SelectionPolicy::parse(selector).unwrap() {
            SelectionPolicy::Pattern(p) => p,
            other => panic!("expected patterns, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_auto() {
        assert_eq!(SelectionPolicy::parse("auto").unwrap(), SelectionPolicy::AutoDetect);
        assert_eq!(SelectionPolicy::parse(" AUTO ").unwrap(), SelectionPolicy::AutoDetect);
        assert_eq!(SelectionPolicy::parse("").unwrap(), SelectionPolicy::AutoDetect);
    }

    #[test]
    fn test_parse_fixed() {
        assert_eq!(
            SelectionPolicy::parse(" br-lan ").unwrap(),
            SelectionPolicy::Fixed("br-lan".into())
        );
    }

    #[test]
    fn test_parse_patterns() {
        let p = patterns("eth*, wlan0,,");
        assert_eq!(pattern_label(&p), "eth*,wlan0");

        // A comma turns even literal names into a list.
        let p = patterns("eth0,eth1");
        assert_eq!(p.len(), 2);
    }

    #[test]
    fn test_parse_invalid() {
        assert!(SelectionPolicy::parse("eth[*").is_err());
        assert!(SelectionPolicy::parse(", ,").is_err());
    }

    #[test]
    fn test_aggregate() {
        let table: CounterTable = [
            ("eth0".to_string(), Counters::new(10, 20)),
            ("eth1".to_string(), Counters::new(5, 5)),
            ("wlan0".to_string(), Counters::new(1, 1)),
            ("lo".to_string(), Counters::new(100, 100)),
            ("wlan1".to_string(), Counters::new(1000, 1000)),
        ]
        .into_iter()
        .collect();

        assert_eq!(
            aggregate(&table, &patterns("eth*,wlan0")),
            Counters::new(16, 26)
        );
    }

    #[test]
    fn test_members_sorted() {
        let table: CounterTable = [
            ("wlan1".to_string(), Counters::new(1, 1)),
            ("eth0".to_string(), Counters::new(1, 1)),
            ("wlan0".to_string(), Counters::new(1, 1)),
            ("br-lan".to_string(), Counters::new(1, 1)),
        ]
        .into_iter()
        .collect();

        assert_eq!(members(&table, &patterns("wlan*,eth0")), vec!["eth0", "wlan0", "wlan1"]);
        assert!(members(&table, &patterns("tun*,")).is_empty());
    }

    #[test]
    fn test_aggregate_counts_interface_once() {
        let table: CounterTable = [("eth0".to_string(), Counters::new(10, 20))]
            .into_iter()
            .collect();
        assert_eq!(aggregate(&table, &patterns("eth*,eth0")), Counters::new(10, 20));
    }

    #[test]
    fn test_matching_is_case_sensitive() {
        let p = patterns("ETH*,wlan?");
        assert!(!matches_any(&p, "eth0"));
        assert!(matches_any(&p, "ETH0"));
        assert!(matches_any(&p, "wlan1"));
        assert!(!matches_any(&p, "wlan10"));
    }
}
