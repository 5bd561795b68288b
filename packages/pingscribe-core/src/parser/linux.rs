//! Grammar for iputils ping output (the common Linux dialect).

use std::sync::OnceLock;

use regex::Regex;

use super::{Parsed, PingStats};

fn summary_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        // iputils: "60 packets transmitted, 60 received, 0% packet loss, time 59153ms"
        // with optional "+N duplicates," and "+N errors," clauses in between.
        Regex::new(r"(?P<tx>\d+) packets transmitted, (?P<rx>\d+) received").unwrap()
    })
}

fn duplicates_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\+(?P<dup>\d+) duplicates,").unwrap())
}

fn rtt_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        // Older iputils releases spell the prefix "round-trip".
        Regex::new(
            r"(?:rtt|round-trip) min/avg/max/mdev = (?P<min>[0-9.,]+)/(?P<avg>[0-9.,]+)/(?P<max>[0-9.,]+)/(?P<mdev>[0-9.,]+) ms",
        )
        .unwrap()
    })
}

fn reply_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        // "[1469935478.674442] 64 bytes from 8.8.8.8: icmp_seq=1 ttl=117 time=12.3 ms"
        // (the timestamp prefix appears with `ping -D`)
        Regex::new(
            r"(?:\[(?P<ts>[0-9.]+)\]\s+)?\d+ bytes from .*?icmp_seq=(?P<seq>\d+) ttl=(?P<ttl>\d+) time=(?P<time>[0-9.,]+) ?ms",
        )
        .unwrap()
    })
}

pub(super) fn parse(text: &str) -> Parsed {
    let mut stats = PingStats {
        destination: super::headline_destination(text),
        replies: super::collect_replies(text, reply_re()),
        ..PingStats::default()
    };

    let mut partial = true;
    if let Some(counts) = summary_re().captures(text).and_then(|c| super::counts_from(&c)) {
        stats.set_counts(counts.0, counts.1);
        partial = false;

        // iputils reports duplicates in the summary; absence means zero.
        stats.duplicates = Some(
            duplicates_re()
                .captures(text)
                .and_then(|c| c["dup"].parse().ok())
                .unwrap_or_else(|| stats.flagged_duplicates()),
        );
    }

    if let Some(caps) = rtt_re().captures(text) {
        stats.rtt_min = super::num(&caps["min"]);
        stats.rtt_avg = super::num(&caps["avg"]);
        stats.rtt_max = super::num(&caps["max"]);
        stats.rtt_mdev = super::num(&caps["mdev"]);
    }

    Parsed { stats, partial }
}
