use std::sync::LazyLock;

use regex::Regex;

use crate::models::media::Cue;

static BLOCK_SEPARATOR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n\s*\n").unwrap());
static TIMESTAMP_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d{2}:\d{2}:\d{2},\d{3})\s*-->\s*(\d{2}:\d{2}:\d{2},\d{3})").unwrap()
});

/// Parses SRT-style timed text. Blocks are separated by blank lines; the
/// first line is the cue index, the second the timestamp pair, the rest the
/// caption. Blocks whose second line is not a timestamp pair are skipped.
pub fn parse_srt(content: &str) -> Vec<Cue> {
    BLOCK_SEPARATOR
        .split(content.trim())
        .filter_map(parse_block)
        .collect()
}

fn parse_block(block: &str) -> Option<Cue> {
    let lines: Vec<&str> = block
        .trim()
        .split('\n')
        .map(|l| l.trim_end_matches('\r'))
        .collect();
    if lines.len() < 3 {
        return None;
    }

    let caps = TIMESTAMP_LINE.captures(lines[1])?;
    let start = caps.get(1)?.as_str().to_string();
    let end = caps.get(2)?.as_str().to_string();
    let text = lines[2..].join("\n").trim().to_string();

    Some(Cue {
        timestamp: format!("{} --> {}", start, end),
        start,
        end,
        text,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_CUES: &str = "1\n00:00:01,000 --> 00:00:04,500\nHello there\n\n2\n00:00:05,000 --> 00:00:07,250\nSecond line\nwraps here\n";

    #[test]
    fn parses_two_cues() {
        let cues = parse_srt(TWO_CUES);
        assert_eq!(cues.len(), 2);
        assert_eq!(cues[0].timestamp, "00:00:01,000 --> 00:00:04,500");
        assert_eq!(cues[0].start, "00:00:01,000");
        assert_eq!(cues[0].end, "00:00:04,500");
        assert_eq!(cues[0].text, "Hello there");
        assert_eq!(cues[1].timestamp, "00:00:05,000 --> 00:00:07,250");
        assert_eq!(cues[1].text, "Second line\nwraps here");
    }

    #[test]
    fn block_without_timestamp_is_dropped() {
        let srt = "1\nnot a timestamp\nignored\n\n2\n00:00:05,000 --> 00:00:06,000\nkept";
        let cues = parse_srt(srt);
        assert_eq!(cues.len(), 1);
        assert_eq!(cues[0].text, "kept");
    }

    #[test]
    fn short_blocks_are_dropped() {
        let srt = "1\n00:00:01,000 --> 00:00:02,000\n\n2\n00:00:03,000 --> 00:00:04,000\ntext";
        let cues = parse_srt(srt);
        assert_eq!(cues.len(), 1);
        assert_eq!(cues[0].start, "00:00:03,000");
    }

    #[test]
    fn handles_crlf_line_endings() {
        let srt = "1\r\n00:00:01,000 --> 00:00:02,000\r\nfirst\r\nsecond\r\n\r\n2\r\n00:00:03,000 --> 00:00:04,000\r\nthird\r\n";
        let cues = parse_srt(srt);
        assert_eq!(cues.len(), 2);
        assert_eq!(cues[0].text, "first\nsecond");
        assert_eq!(cues[1].text, "third");
    }

    #[test]
    fn tolerates_tight_arrow_spacing() {
        let cues = parse_srt("7\n01:02:03,004-->01:02:05,006\nx");
        assert_eq!(cues[0].timestamp, "01:02:03,004 --> 01:02:05,006");
    }

    #[test]
    fn empty_input_yields_no_cues() {
        assert!(parse_srt("").is_empty());
        assert!(parse_srt("   \n\n  ").is_empty());
    }
}
