//! Grammar for Windows ping.exe output.

use std::sync::OnceLock;

use regex::Regex;

use super::{Parsed, PingStats};

fn headline_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // Greedy match so IPv6 destinations keep their colons.
    RE.get_or_init(|| Regex::new(r"(?m)^Ping statistics for (?P<dst>.+):\s*$").unwrap())
}

fn summary_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        // "    Packets: Sent = 10, Received = 10, Lost = 0 (0% loss),"
        Regex::new(r"Packets: Sent = (?P<tx>\d+), Received = (?P<rx>\d+)").unwrap()
    })
}

fn rtt_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        // "    Minimum = 56ms, Maximum = 194ms, Average = 107ms"
        Regex::new(
            r"Minimum = (?P<min>[0-9.,]+)ms, Maximum = (?P<max>[0-9.,]+)ms, Average = (?P<avg>[0-9.,]+)ms",
        )
        .unwrap()
    })
}

fn reply_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        // "Reply from 216.58.196.238: bytes=32 time=87ms TTL=51"
        // ("time<1ms" appears for sub-millisecond replies)
        Regex::new(r"(?i)Reply from .*?: bytes=\d+ time[=<](?P<time>[0-9.,]+) ?ms TTL=(?P<ttl>\d+)")
            .unwrap()
    })
}

pub(super) fn parse(text: &str) -> Parsed {
    let mut stats = PingStats {
        destination: headline_re().captures(text).map(|c| c["dst"].to_string()),
        replies: super::collect_replies(text, reply_re()),
        ..PingStats::default()
    };

    let mut partial = true;
    if let Some(counts) = summary_re().captures(text).and_then(|c| super::counts_from(&c)) {
        stats.set_counts(counts.0, counts.1);
        partial = false;
    }

    if let Some(caps) = rtt_re().captures(text) {
        stats.rtt_min = super::num(&caps["min"]);
        stats.rtt_avg = super::num(&caps["avg"]);
        stats.rtt_max = super::num(&caps["max"]);
    }

    // Windows neither marks duplicates nor numbers its replies, so the
    // duplicate count stays unreported rather than zero.
    Parsed { stats, partial }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_windows_success() {
        let text = "\
Pinging google.com [216.58.196.238] with 32 bytes of data:
Reply from 216.58.196.238: bytes=32 time=87ms TTL=51
Reply from 216.58.196.238: bytes=32 time=97ms TTL=51
Reply from 216.58.196.238: bytes=32 time=56ms TTL=51
Reply from 216.58.196.238: bytes=32 time=95ms TTL=51
Reply from 216.58.196.238: bytes=32 time=194ms TTL=51

Ping statistics for 216.58.196.238:
    Packets: Sent = 5, Received = 5, Lost = 0 (0% loss),
Approximate round trip times in milli-seconds:
    Minimum = 56ms, Maximum = 194ms, Average = 107ms
";
        let parsed = parse(text);
        assert!(!parsed.partial);
        let stats = parsed.stats;
        assert_eq!(stats.destination.as_deref(), Some("216.58.196.238"));
        assert_eq!(stats.transmitted, Some(5));
        assert_eq!(stats.received, Some(5));
        assert_eq!(stats.loss_pct, Some(0.0));
        assert_eq!(stats.rtt_min, Some(56.0));
        assert_eq!(stats.rtt_avg, Some(107.0));
        assert_eq!(stats.rtt_max, Some(194.0));
        assert_eq!(stats.rtt_mdev, None);
        assert_eq!(stats.duplicates, None);

        assert_eq!(stats.replies.len(), 5);
        assert_eq!(stats.replies[0].seq, None);
        assert_eq!(stats.replies[0].ttl, Some(51));
        assert_eq!(stats.replies[0].time_ms, Some(87.0));
    }

    #[test]
    fn test_request_timed_out() {
        let text = "\
Pinging 192.168.207.100 with 32 bytes of data:
Request timed out.
Request timed out.
Request timed out.
Request timed out.

Ping statistics for 192.168.207.100:
    Packets: Sent = 4, Received = 0, Lost = 4 (100% loss),
";
        let parsed = parse(text);
        assert!(!parsed.partial);
        let stats = parsed.stats;
        assert_eq!(stats.transmitted, Some(4));
        assert_eq!(stats.received, Some(0));
        assert_eq!(stats.loss_pct, Some(100.0));
        assert_eq!(stats.rtt_min, None);
        assert!(stats.replies.is_empty());
    }

    #[test]
    fn test_sub_millisecond_reply() {
        let text = "Reply from 10.0.0.1: bytes=32 time<1ms TTL=128\n";
        let parsed = parse(text);
        assert!(parsed.partial);
        assert_eq!(parsed.stats.replies.len(), 1);
        assert_eq!(parsed.stats.replies[0].time_ms, Some(1.0));
    }

    #[test]
    fn test_headline_without_body_is_partial() {
        let text = "\
Pinging 192.168.207.100 with 32 bytes of data:
Request timed out.

Ping statistics for 192.168.207.100:
";
        let parsed = parse(text);
        assert!(parsed.partial);
        assert_eq!(parsed.stats.destination.as_deref(), Some("192.168.207.100"));
        assert_eq!(parsed.stats.transmitted, None);
    }
}
