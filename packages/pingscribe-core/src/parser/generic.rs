//! Best-effort grammar for output no detector anchor recognized.
//!
//! Tries the union of the known summary, rtt and reply shapes. Fields that
//! only some dialects can express (duplicate counts in particular) stay
//! unset rather than guessed.

use std::sync::OnceLock;

use regex::Regex;

use super::{Parsed, PingStats};

fn unix_summary_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?P<tx>\d+) packets transmitted, (?P<rx>\d+)(?: packets)? received").unwrap()
    })
}

fn windows_summary_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"Packets: Sent = (?P<tx>\d+), Received = (?P<rx>\d+)").unwrap())
}

fn slash_rtt_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?:rtt|round-trip) min/avg/max(?:/(?:mdev|stddev|sdev))? = (?P<min>[0-9.,]+)/(?P<avg>[0-9.,]+)/(?P<max>[0-9.,]+)(?:/(?P<mdev>[0-9.,]+))? ms",
        )
        .unwrap()
    })
}

fn windows_rtt_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"Minimum = (?P<min>[0-9.,]+)ms, Maximum = (?P<max>[0-9.,]+)ms, Average = (?P<avg>[0-9.,]+)ms",
        )
        .unwrap()
    })
}

fn unix_reply_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"\d+ bytes from .*?\b(?:icmp_)?seq=(?P<seq>\d+) ttl=(?P<ttl>\d+) time=(?P<time>[0-9.,]+) ?ms",
        )
        .unwrap()
    })
}

fn windows_reply_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)Reply from .*?: bytes=\d+ time[=<](?P<time>[0-9.,]+) ?ms TTL=(?P<ttl>\d+)")
            .unwrap()
    })
}

pub(super) fn parse(text: &str) -> Parsed {
    let mut stats = PingStats {
        destination: super::headline_destination(text),
        ..PingStats::default()
    };

    stats.replies = super::collect_replies(text, unix_reply_re());
    if stats.replies.is_empty() {
        stats.replies = super::collect_replies(text, windows_reply_re());
    }

    let mut partial = true;
    let counts = unix_summary_re()
        .captures(text)
        .or_else(|| windows_summary_re().captures(text))
        .and_then(|c| super::counts_from(&c));
    if let Some((tx, rx)) = counts {
        stats.set_counts(tx, rx);
        partial = false;
    }

    if let Some(caps) = slash_rtt_re().captures(text) {
        stats.rtt_min = super::num(&caps["min"]);
        stats.rtt_avg = super::num(&caps["avg"]);
        stats.rtt_max = super::num(&caps["max"]);
        stats.rtt_mdev = caps.name("mdev").and_then(|m| super::num(m.as_str()));
    } else if let Some(caps) = windows_rtt_re().captures(text) {
        stats.rtt_min = super::num(&caps["min"]);
        stats.rtt_avg = super::num(&caps["avg"]);
        stats.rtt_max = super::num(&caps["max"]);
    }

    Parsed { stats, partial }
}
