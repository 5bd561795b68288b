//! Grammar for BusyBox ping output (Alpine and embedded systems).

use std::sync::OnceLock;

use regex::Regex;

use super::{Parsed, PingStats};

fn summary_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        // "10 packets transmitted, 9 packets received, 2 duplicates, 10% packet loss"
        Regex::new(r"(?P<tx>\d+) packets transmitted, (?P<rx>\d+) packets received,").unwrap()
    })
}

fn duplicates_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?P<dup>\d+) duplicates,").unwrap())
}

fn rtt_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        // BusyBox reports no deviation figure.
        Regex::new(
            r"round-trip min/avg/max = (?P<min>[0-9.,]+)/(?P<avg>[0-9.,]+)/(?P<max>[0-9.,]+) ms",
        )
        .unwrap()
    })
}

fn reply_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        // "64 bytes from 192.168.2.106: seq=0 ttl=64 time=0.936 ms"
        Regex::new(
            r"\d+ bytes from .*?\bseq=(?P<seq>\d+) ttl=(?P<ttl>\d+) time=(?P<time>[0-9.,]+) ?ms",
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
        // mdev stays None: BusyBox never reports one.
    }

    Parsed { stats, partial }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alpine_success() {
        let text = "\
PING heise.de (193.99.144.80): 56 data bytes

--- heise.de ping statistics ---
5 packets transmitted, 5 packets received, 0% packet loss
round-trip min/avg/max = 0.638/0.683/0.746 ms
";
        let parsed = parse(text);
        assert!(!parsed.partial);
        let stats = parsed.stats;
        assert_eq!(stats.destination.as_deref(), Some("heise.de"));
        assert_eq!(stats.transmitted, Some(5));
        assert_eq!(stats.received, Some(5));
        assert_eq!(stats.loss_pct, Some(0.0));
        assert_eq!(stats.rtt_min, Some(0.638));
        assert_eq!(stats.rtt_avg, Some(0.683));
        assert_eq!(stats.rtt_max, Some(0.746));
        // Absent and zero are different things.
        assert_eq!(stats.rtt_mdev, None);
        assert_eq!(stats.duplicates, Some(0));
    }

    #[test]
    fn test_duplicates_and_loss() {
        let text = "\
PING 192.168.2.106 (192.168.2.106): 56 data bytes
64 bytes from 192.168.2.106: seq=0 ttl=64 time=0.936 ms
64 bytes from 192.168.2.106: seq=0 ttl=64 time=1.003 ms (DUP!)
64 bytes from 192.168.2.106: seq=1 ttl=64 time=0.802 ms
64 bytes from 192.168.2.106: seq=9 ttl=64 time=1.144 ms
64 bytes from 192.168.2.106: seq=9 ttl=64 time=1.219 ms (DUP!)

--- 192.168.2.106 ping statistics ---
10 packets transmitted, 9 packets received, 2 duplicates, 10% packet loss
round-trip min/avg/max = 0.613/0.930/1.219 ms
";
        let parsed = parse(text);
        assert!(!parsed.partial);
        let stats = &parsed.stats;
        assert_eq!(stats.transmitted, Some(10));
        assert_eq!(stats.received, Some(9));
        assert!((stats.loss_pct.unwrap() - 10.0).abs() < 1e-9);
        assert_eq!(stats.duplicates, Some(2));

        assert_eq!(stats.replies.len(), 5);
        assert!(stats.replies[1].duplicate);
        assert!(stats.replies[4].duplicate);
        assert!(!stats.replies[0].duplicate);
        assert_eq!(stats.replies[1].seq, Some(0));
    }

    #[test]
    fn test_duplicate_flag_from_repeated_seq() {
        // Some builds drop the (DUP!) marker; a reused sequence number still
        // flags the reply.
        let text = "\
64 bytes from 10.0.0.1: seq=3 ttl=64 time=0.7 ms
64 bytes from 10.0.0.1: seq=3 ttl=64 time=0.9 ms
";
        let parsed = parse(text);
        assert!(!parsed.stats.replies[0].duplicate);
        assert!(parsed.stats.replies[1].duplicate);
    }

    #[test]
    fn test_truncated_output_is_partial() {
        let text = "PING heise.de (193.99.144.80): 56 data bytes\n";
        let parsed = parse(text);
        assert!(parsed.partial);
        assert_eq!(parsed.stats.transmitted, None);
        assert_eq!(parsed.stats.duplicates, None);
    }
}
