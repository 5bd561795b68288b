//! Grammar for macOS and BSD-family ping output.

use std::sync::OnceLock;

use regex::Regex;

use super::{Parsed, PingStats};

fn summary_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        // "5 packets transmitted, 5 packets received, 0.0% packet loss"
        Regex::new(r"(?P<tx>\d+) packets transmitted, (?P<rx>\d+) packets received,").unwrap()
    })
}

fn duplicates_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\+?(?P<dup>\d+) duplicates,").unwrap())
}

fn rtt_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"round-trip min/avg/max/stddev = (?P<min>[0-9.,]+)/(?P<avg>[0-9.,]+)/(?P<max>[0-9.,]+)/(?P<mdev>[0-9.,]+) ms",
        )
        .unwrap()
    })
}

fn reply_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        // "64 bytes from 172.217.6.238: icmp_seq=0 ttl=53 time=20.482 ms"
        Regex::new(
            r"\d+ bytes from .*?icmp_seq=(?P<seq>\d+) ttl=(?P<ttl>\d+) time=(?P<time>[0-9.,]+) ?ms",
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

        // BSD only mentions duplicates in the summary when there were some;
        // without reply detail a quiet summary is indistinguishable from an
        // implementation that never reports them.
        stats.duplicates = duplicates_re()
            .captures(text)
            .and_then(|c| c["dup"].parse().ok())
            .or_else(|| {
                (!stats.replies.is_empty()).then(|| stats.flagged_duplicates())
            });
    }

    if let Some(caps) = rtt_re().captures(text) {
        stats.rtt_min = super::num(&caps["min"]);
        stats.rtt_avg = super::num(&caps["avg"]);
        stats.rtt_max = super::num(&caps["max"]);
        // stddev lands in the same slot mdev uses on Linux.
        stats.rtt_mdev = super::num(&caps["mdev"]);
    }

    Parsed { stats, partial }
}
