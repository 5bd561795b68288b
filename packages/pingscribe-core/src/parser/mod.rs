//! Multi-dialect ping output parsing.
//!
//! Every ping implementation prints a slightly different transcript. This
//! module detects which dialect produced a blob of output and extracts a
//! normalized [`PingStats`] record from it:
//! - Linux iputils: `rtt min/avg/max/mdev`, replies tagged `icmp_seq=`
//! - BusyBox: `round-trip min/avg/max`, replies tagged `seq=`
//! - macOS/BSD: `round-trip min/avg/max/stddev`, replies tagged `icmp_seq=`
//! - Windows: `Packets: Sent = ...`, replies starting with `Reply from`
//!
//! Parsing is total: malformed or truncated input yields a partial record,
//! never an error. Fields the output did not contain stay unset; an absent
//! rtt deviation is `None`, never 0.

mod busybox;
mod generic;
mod linux;
mod macos;
mod windows;

use std::collections::HashSet;
use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// The text format a given ping implementation produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dialect {
    /// iputils ping as shipped on most Linux distributions.
    Linux,
    /// BusyBox ping (Alpine, embedded systems).
    Busybox,
    /// macOS and the BSD family.
    MacosBsd,
    /// Windows ping.exe.
    Windows,
    /// No recognized anchor; parsed with the best-effort generic grammar.
    Unknown,
}

impl Dialect {
    /// Detect the dialect of a raw output blob.
    ///
    /// Probes a fixed-priority list of anchor substrings; the first match
    /// wins, so the same input always yields the same tag. Empty, truncated
    /// or garbled input falls through to [`Dialect::Unknown`].
    pub fn detect(text: &str) -> Dialect {
        if text.contains("Ping statistics for")
            || text.contains("Reply from ")
            || text.contains("Pinging ")
        {
            return Dialect::Windows;
        }
        if text.contains("round-trip min/avg/max/stddev") {
            return Dialect::MacosBsd;
        }
        if text.contains("round-trip min/avg/max =") {
            return Dialect::Busybox;
        }
        if text.contains("mdev") {
            return Dialect::Linux;
        }
        // Summary present but no rtt line: the BSD family and BusyBox both
        // say "N packets received" where iputils says just "N received".
        if text.contains("packets received") {
            if text.contains("icmp_seq=") {
                return Dialect::MacosBsd;
            }
            if text.contains(" seq=") {
                return Dialect::Busybox;
            }
            return Dialect::MacosBsd;
        }
        if text.contains("packets transmitted,") && text.contains(" received,") {
            return Dialect::Linux;
        }
        // Reply lines only (interrupted before the summary printed).
        if text.contains("icmp_seq=") {
            return Dialect::Linux;
        }
        if text.contains(" seq=") {
            return Dialect::Busybox;
        }
        Dialect::Unknown
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Dialect::Linux => "linux",
            Dialect::Busybox => "busybox",
            Dialect::MacosBsd => "macos_bsd",
            Dialect::Windows => "windows",
            Dialect::Unknown => "unknown",
        };
        write!(f, "{}", name)
    }
}

impl std::str::FromStr for Dialect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "linux" | "iputils" => Ok(Dialect::Linux),
            "busybox" | "alpine" => Ok(Dialect::Busybox),
            "macos_bsd" | "macos-bsd" | "macos" | "bsd" => Ok(Dialect::MacosBsd),
            "windows" => Ok(Dialect::Windows),
            "unknown" => Ok(Dialect::Unknown),
            other => Err(format!("unrecognized dialect '{}'", other)),
        }
    }
}

/// One parsed ICMP echo reply line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplyRecord {
    /// Sequence number; Windows replies carry none.
    pub seq: Option<u64>,
    pub ttl: Option<u32>,
    pub time_ms: Option<f64>,
    /// Marked `(DUP!)` by ping, or reusing an already-seen sequence number.
    pub duplicate: bool,
    /// Wall-clock receive time from the iputils `-D` prefix.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub timestamp: Option<DateTime<Utc>>,
}

/// Normalized ping statistics extracted from one transcript.
///
/// Every field is optional: a dialect that does not report a value leaves it
/// `None`. Zero and "absent" are distinct throughout, in particular for
/// `rtt_mdev` and `duplicates`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PingStats {
    /// Destination as printed in the statistics headline.
    pub destination: Option<String>,
    pub transmitted: Option<u64>,
    pub received: Option<u64>,
    /// Computed from the counts as `(transmitted - received) / transmitted`;
    /// undefined (`None`) when nothing was transmitted.
    pub loss_pct: Option<f64>,
    pub rtt_min: Option<f64>,
    pub rtt_avg: Option<f64>,
    pub rtt_max: Option<f64>,
    /// Mean deviation (Linux) or standard deviation (BSD family) of the
    /// round-trip times. `None` for dialects that do not report one.
    pub rtt_mdev: Option<f64>,
    /// `None` when the dialect cannot report duplicates at all.
    pub duplicates: Option<u64>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub replies: Vec<ReplyRecord>,
}

impl PingStats {
    /// Record the transmitted/received counts and derive the loss rate.
    fn set_counts(&mut self, transmitted: u64, received: u64) {
        self.transmitted = Some(transmitted);
        self.received = Some(received);
        self.loss_pct = if transmitted > 0 {
            Some((transmitted - received) as f64 / transmitted as f64 * 100.0)
        } else {
            None
        };
    }

    /// Count of replies flagged as duplicates.
    fn flagged_duplicates(&self) -> u64 {
        self.replies.iter().filter(|r| r.duplicate).count() as u64
    }
}

/// Outcome of a parse attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct Parsed {
    pub stats: PingStats,
    /// True when the required transmitted/received counts could not be
    /// extracted; whatever else matched is still in `stats`.
    pub partial: bool,
}

/// Parse a raw transcript with the given dialect's grammar.
///
/// Total over arbitrary input: garbage or truncated text yields
/// `partial = true` with everything that still matched.
pub fn parse(dialect: Dialect, text: &str) -> Parsed {
    let parsed = match dialect {
        Dialect::Linux => linux::parse(text),
        Dialect::Busybox => busybox::parse(text),
        Dialect::MacosBsd => macos::parse(text),
        Dialect::Windows => windows::parse(text),
        Dialect::Unknown => generic::parse(text),
    };
    tracing::debug!(dialect = %dialect, partial = parsed.partial, "parsed ping output");
    parsed
}

/// Look for an explicit host-failure message in the output.
///
/// Returns the first matching line, for transcripts where ping itself said
/// the destination is unusable (host down, name resolution failed) rather
/// than producing statistics.
pub fn host_failure(text: &str) -> Option<String> {
    const MARKERS: [&str; 10] = [
        "destination host unreachable",
        "destination net unreachable",
        "unknown host",
        "name or service not known",
        "temporary failure in name resolution",
        "cannot resolve",
        "could not find host",
        "network is unreachable",
        "no route to host",
        "request timed out",
    ];

    for line in text.lines() {
        let lower = line.to_lowercase();
        if MARKERS.iter().any(|marker| lower.contains(marker)) {
            return Some(line.trim().to_string());
        }
    }
    None
}

/// Parse a number that may use a localized decimal comma.
fn num(s: &str) -> Option<f64> {
    s.trim().replace(',', ".").parse().ok()
}

fn parse_epoch(s: &str) -> Option<DateTime<Utc>> {
    let epoch: f64 = s.parse().ok()?;
    let secs = epoch.trunc() as i64;
    let nanos = (epoch.fract() * 1e9).round() as u32;
    DateTime::from_timestamp(secs, nanos)
}

/// Collect reply lines matching the dialect's reply pattern.
///
/// The pattern supplies named groups `seq`, `ttl`, `time` and optionally
/// `ts`. A reply is flagged duplicate when the line ends in `(DUP!)` or
/// when its sequence number was already seen.
fn collect_replies(text: &str, pattern: &Regex) -> Vec<ReplyRecord> {
    let mut seen = HashSet::new();
    let mut replies = Vec::new();

    for line in text.lines() {
        let Some(caps) = pattern.captures(line) else {
            continue;
        };
        let seq: Option<u64> = caps.name("seq").and_then(|m| m.as_str().parse().ok());
        let ttl = caps.name("ttl").and_then(|m| m.as_str().parse().ok());
        let time_ms = caps.name("time").and_then(|m| num(m.as_str()));
        let timestamp = caps.name("ts").and_then(|m| parse_epoch(m.as_str()));

        let repeated = seq.map(|s| !seen.insert(s)).unwrap_or(false);
        let duplicate = line.trim_end().ends_with("(DUP!)") || repeated;

        replies.push(ReplyRecord {
            seq,
            ttl,
            time_ms,
            duplicate,
            timestamp,
        });
    }
    replies
}

/// Destination from the Unix-family `--- X ping statistics ---` headline.
fn headline_destination(text: &str) -> Option<String> {
    static HEADLINE: OnceLock<Regex> = OnceLock::new();
    let re = HEADLINE.get_or_init(|| Regex::new(r"--- (.+) ping statistics ---").unwrap());

    re.captures(text).map(|caps| caps[1].to_string())
}

/// Extract counts from a summary capture, rejecting corrupted lines.
///
/// A summary claiming more received than transmitted packets is treated as
/// garbage: the counts stay unset and the parse is reported partial.
fn counts_from(caps: &regex::Captures<'_>) -> Option<(u64, u64)> {
    let tx: u64 = caps.name("tx")?.as_str().parse().ok()?;
    let rx: u64 = caps.name("rx")?.as_str().parse().ok()?;
    if rx > tx {
        return None;
    }
    Some((tx, rx))
}

#[cfg(test)]
mod tests {
    use super::*;

    const LINUX_TEXT: &str = "\
PING google.com (216.58.196.238) 56(84) bytes of data.

--- google.com ping statistics ---
60 packets transmitted, 60 received, 0% packet loss, time 59153ms
rtt min/avg/max/mdev = 61.425/99.731/212.597/27.566 ms
";

    const BUSYBOX_TEXT: &str = "\
PING heise.de (193.99.144.80): 56 data bytes

--- heise.de ping statistics ---
5 packets transmitted, 5 packets received, 0% packet loss
round-trip min/avg/max = 0.638/0.683/0.746 ms
";

    const MACOS_TEXT: &str = "\
PING github.com (192.30.255.113): 56 data bytes

--- github.com ping statistics ---
10 packets transmitted, 10 packets received, 0.0% packet loss
round-trip min/avg/max/stddev = 218.391/283.477/405.879/70.170 ms
";

    const WINDOWS_TEXT: &str = "\
Pinging 192.168.207.100 with 32 bytes of data:
Request timed out.

Ping statistics for 192.168.207.100:
    Packets: Sent = 4, Received = 0, Lost = 4 (100% loss),
";

    #[test]
    fn test_detect_dialects() {
        assert_eq!(Dialect::detect(LINUX_TEXT), Dialect::Linux);
        assert_eq!(Dialect::detect(BUSYBOX_TEXT), Dialect::Busybox);
        assert_eq!(Dialect::detect(MACOS_TEXT), Dialect::MacosBsd);
        assert_eq!(Dialect::detect(WINDOWS_TEXT), Dialect::Windows);
        assert_eq!(Dialect::detect(""), Dialect::Unknown);
        assert_eq!(Dialect::detect("random garbage\n\0\x01"), Dialect::Unknown);
    }

    #[test]
    fn test_detect_is_deterministic() {
        for text in [LINUX_TEXT, BUSYBOX_TEXT, MACOS_TEXT, WINDOWS_TEXT, ""] {
            let first = Dialect::detect(text);
            for _ in 0..3 {
                assert_eq!(Dialect::detect(text), first);
            }
        }
    }

    #[test]
    fn test_detect_truncated_replies_only() {
        let linux = "64 bytes from 8.8.8.8: icmp_seq=1 ttl=117 time=12.3 ms\n";
        assert_eq!(Dialect::detect(linux), Dialect::Linux);

        let busybox = "64 bytes from 192.168.2.106: seq=0 ttl=64 time=0.936 ms\n";
        assert_eq!(Dialect::detect(busybox), Dialect::Busybox);
    }

    #[test]
    fn test_parse_is_total() {
        for dialect in [
            Dialect::Linux,
            Dialect::Busybox,
            Dialect::MacosBsd,
            Dialect::Windows,
            Dialect::Unknown,
        ] {
            for text in ["", "garbage \u{fffd}\x00", "PING\n\n\n", "time=abc ms"] {
                let parsed = parse(dialect, text);
                assert!(parsed.partial, "{dialect} should be partial on {text:?}");
                assert_eq!(parsed.stats.transmitted, None);
                assert_eq!(parsed.stats.received, None);
            }
        }
    }

    #[test]
    fn test_loss_formula_holds() {
        let cases = [
            (Dialect::Linux, LINUX_TEXT),
            (Dialect::Busybox, BUSYBOX_TEXT),
            (Dialect::MacosBsd, MACOS_TEXT),
            (Dialect::Windows, WINDOWS_TEXT),
        ];
        for (dialect, text) in cases {
            let stats = parse(dialect, text).stats;
            let (tx, rx) = (stats.transmitted.unwrap(), stats.received.unwrap());
            assert!(rx <= tx);
            let expected = (tx - rx) as f64 / tx as f64 * 100.0;
            assert!((stats.loss_pct.unwrap() - expected).abs() < 1e-9);
        }
    }

    #[test]
    fn test_corrupted_counts_rejected() {
        // More received than transmitted can only come from a mangled line.
        let text = "\
--- 10.0.0.1 ping statistics ---
3 packets transmitted, 7 received, 0% packet loss, time 2004ms
";
        let parsed = parse(Dialect::Linux, text);
        assert!(parsed.partial);
        assert_eq!(parsed.stats.transmitted, None);
        assert_eq!(parsed.stats.received, None);
    }

    #[test]
    fn test_host_failure_markers() {
        assert_eq!(
            host_failure("From 192.168.207.128 icmp_seq=1 Destination Host Unreachable"),
            Some("From 192.168.207.128 icmp_seq=1 Destination Host Unreachable".to_string())
        );
        assert_eq!(
            host_failure("ping: unknown host nosuchhost.invalid"),
            Some("ping: unknown host nosuchhost.invalid".to_string())
        );
        assert_eq!(
            host_failure("ping: connect: Network is unreachable"),
            Some("ping: connect: Network is unreachable".to_string())
        );
        assert_eq!(host_failure(LINUX_TEXT), None);
    }

    #[test]
    fn test_dialect_round_trip_names() {
        for dialect in [
            Dialect::Linux,
            Dialect::Busybox,
            Dialect::MacosBsd,
            Dialect::Windows,
            Dialect::Unknown,
        ] {
            let name = dialect.to_string();
            assert_eq!(name.parse::<Dialect>().unwrap(), dialect);
        }
        assert!("plan9".parse::<Dialect>().is_err());
    }

    #[test]
    fn test_localized_decimal_comma() {
        assert_eq!(num("12,5"), Some(12.5));
        assert_eq!(num("12.5"), Some(12.5));
        assert_eq!(num("not a number"), None);
    }

    #[test]
    fn test_epoch_timestamp() {
        let ts = parse_epoch("1469935478.674442").unwrap();
        assert_eq!(ts.timestamp(), 1469935478);
    }
}
