//! Per-tool output line classification
//!
//! Each tool has an ordered rule table (matcher, color) evaluated
//! first-match-wins; the matching engine itself is tool-agnostic. Ping is the
//! one tool whose rules also parse a value out of the line (the round-trip
//! time), so it gets a dedicated path in front of its table. Classification
//! never fails: unmatched lines pass through with the tool's fallback color.

use crate::catalog::ToolKind;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;


/// Round-trip time in a ping line, e.g. `time=23.4 ms` or `time<1 ms`
static RTT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"time[<=](\d+\.?\d*)\s*ms").expect("rtt regex is valid")
});

/// Color tag attached to a classified line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    Green,
    Yellow,
    Red,
    Cyan,
    Gray,
}

/// Classification of one output line; derived per line, never stored
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineAnnotation {
    pub text: String,
    pub tool: ToolKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<Color>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
}

/// One entry in a tool's rule table
struct Rule {
    matcher: Matcher,
    color: Color,
}

enum Matcher {
    /// Line contains any of the needles
    ContainsAny(&'static [&'static str]),
    /// Case-insensitive contains; needles must be lowercase
    ContainsAnyIgnoreCase(&'static [&'static str]),
    /// Line starts with any of the needles
    PrefixAny(&'static [&'static str]),
    /// Case-insensitive prefix; needles must be lowercase
    PrefixAnyIgnoreCase(&'static [&'static str]),
    /// Any whitespace-delimited token equals one of the needles
    WordAny(&'static [&'static str]),
}

impl Matcher {
    fn matches(&self, line: &str) -> bool {
        match self {
            Matcher::ContainsAny(needles) => needles.iter().any(|n| line.contains(n)),
            Matcher::ContainsAnyIgnoreCase(needles) => {
                let lower = line.to_ascii_lowercase();
                needles.iter().any(|n| lower.contains(n))
            }
            Matcher::PrefixAny(needles) => needles.iter().any(|n| line.starts_with(n)),
            Matcher::PrefixAnyIgnoreCase(needles) => {
                let lower = line.to_ascii_lowercase();
                needles.iter().any(|n| lower.starts_with(n))
            }
            Matcher::WordAny(needles) => line
                .split_whitespace()
                .any(|token| needles.contains(&token)),
        }
    }
}

const WHOIS_RULES: &[Rule] = &[
    Rule {
        matcher: Matcher::PrefixAnyIgnoreCase(&["registrar", "registrant", "name server", "status"]),
        color: Color::Cyan,
    },
    Rule {
        matcher: Matcher::ContainsAnyIgnoreCase(&["date"]),
        color: Color::Yellow,
    },
    Rule {
        matcher: Matcher::ContainsAny(&["No match", "NOT FOUND"]),
        color: Color::Red,
    },
    Rule {
        matcher: Matcher::PrefixAny(&["%", "#"]),
        color: Color::Gray,
    },
];

const NSLOOKUP_RULES: &[Rule] = &[
    Rule {
        matcher: Matcher::ContainsAny(&["Name:", "Server:"]),
        color: Color::Cyan,
    },
    Rule {
        matcher: Matcher::ContainsAny(&["Address:"]),
        color: Color::Yellow,
    },
    Rule {
        matcher: Matcher::ContainsAny(&["NXDOMAIN", "can't find"]),
        color: Color::Red,
    },
    Rule {
        matcher: Matcher::ContainsAny(&["Non-authoritative"]),
        color: Color::Gray,
    },
];

// ANSWER SECTION is itself a `;;` comment line, so it must be ordered first.
const DIG_RULES: &[Rule] = &[
    Rule {
        matcher: Matcher::ContainsAny(&["ANSWER SECTION"]),
        color: Color::Cyan,
    },
    Rule {
        matcher: Matcher::ContainsAny(&["NXDOMAIN"]),
        color: Color::Red,
    },
    Rule {
        matcher: Matcher::WordAny(&["A", "AAAA", "CNAME"]),
        color: Color::Yellow,
    },
    Rule {
        matcher: Matcher::ContainsAny(&[";;"]),
        color: Color::Gray,
    },
];

const PORTSCAN_RULES: &[Rule] = &[
    Rule {
        matcher: Matcher::ContainsAny(&["succeeded", "open"]),
        color: Color::Green,
    },
    Rule {
        matcher: Matcher::ContainsAny(&["failed", "closed", "refused"]),
        color: Color::Red,
    },
];

const HOST_RULES: &[Rule] = &[
    Rule {
        matcher: Matcher::ContainsAny(&["has address", "domain name pointer", "mail is handled"]),
        color: Color::Yellow,
    },
    Rule {
        matcher: Matcher::ContainsAny(&["NXDOMAIN", "not found"]),
        color: Color::Red,
    },
    Rule {
        matcher: Matcher::ContainsAny(&[";;"]),
        color: Color::Gray,
    },
];

const IPCALC_RULES: &[Rule] = &[
    Rule {
        matcher: Matcher::ContainsAny(&["Address:", "Netmask:", "Network:"]),
        color: Color::Cyan,
    },
    Rule {
        matcher: Matcher::ContainsAny(&["HostMin:", "HostMax:", "Broadcast:"]),
        color: Color::Yellow,
    },
    Rule {
        matcher: Matcher::ContainsAny(&["Hosts/Net:"]),
        color: Color::Green,
    },
    Rule {
        matcher: Matcher::ContainsAny(&["ERROR", "INVALID"]),
        color: Color::Red,
    },
];

/// Rule table and fallback color for unmatched lines
fn rules_for(tool: ToolKind) -> (&'static [Rule], Option<Color>) {
    match tool {
        ToolKind::Ping => (&[], None),
        ToolKind::Whois => (WHOIS_RULES, None),
        ToolKind::Nslookup => (NSLOOKUP_RULES, None),
        ToolKind::Dig => (DIG_RULES, None),
        ToolKind::Portscan => (PORTSCAN_RULES, Some(Color::Gray)),
        ToolKind::Host => (HOST_RULES, None),
        ToolKind::Ipcalc => (IPCALC_RULES, None),
    }
}

/// Classify one output line for a tool.
///
/// Returns `None` exactly when the trimmed line is blank; blank lines are
/// never emitted to the client.
pub fn classify(tool: ToolKind, line: &str) -> Option<LineAnnotation> {
    if line.trim().is_empty() {
        return None;
    }

    if tool == ToolKind::Ping {
        return Some(classify_ping(line));
    }

    let (rules, fallback) = rules_for(tool);
    let color = rules
        .iter()
        .find(|rule| rule.matcher.matches(line))
        .map(|rule| rule.color)
        .or(fallback);

    Some(LineAnnotation {
        text: line.to_string(),
        tool,
        color,
        value: None,
    })
}

/// Ping lines carry a parsed round-trip time, banded into three colors.
fn classify_ping(line: &str) -> LineAnnotation {
    if let Some(rtt) = RTT_RE
        .captures(line)
        .and_then(|captures| captures.get(1))
        .and_then(|rtt| rtt.as_str().parse::<f64>().ok())
    {
        return LineAnnotation {
            text: line.to_string(),
            tool: ToolKind::Ping,
            color: Some(band(rtt)),
            value: Some(rtt),
        };
    }

    let color = if line.contains("Request timeout") || line.contains("unreachable") {
        Some(Color::Gray)
    } else {
        None
    };

    LineAnnotation {
        text: line.to_string(),
        tool: ToolKind::Ping,
        color,
        value: None,
    }
}

/// Band a round-trip time in milliseconds
fn band(rtt: f64) -> Color {
    if rtt < 30.0 {
        Color::Green
    } else if rtt <= 80.0 {
        Color::Yellow
    } else {
        Color::Red
    }
}
