//! SRT to WebVTT conversion.

const VTT_HEADER: &str = "WEBVTT\n\n";
const TIMING_ARROW: &str = " --> ";

/// Converts SubRip subtitles to WebVTT.
///
/// Cue-index lines (a number directly followed by a timing line) are dropped
/// and the millisecond separator in timing lines becomes a dot. Everything
/// else is copied through line by line.
pub fn srt_to_vtt(srt: &str) -> String {
    let srt = srt.strip_prefix('\u{feff}').unwrap_or(srt);
    let lines: Vec<&str> = srt.lines().collect();

    let mut vtt = String::with_capacity(VTT_HEADER.len() + srt.len());
    vtt.push_str(VTT_HEADER);

    for (i, line) in lines.iter().enumerate() {
        if is_timing(line) {
            vtt.push_str(&line.replace(',', "."));
            vtt.push('\n');
            continue;
        }
        let next_is_timing = lines.get(i + 1).is_some_and(|next| is_timing(next));
        if next_is_timing && is_cue_index(line) {
            continue;
        }
        vtt.push_str(line);
        vtt.push('\n');
    }
    vtt
}

fn is_timing(line: &str) -> bool {
    line.contains(TIMING_ARROW)
}

fn is_cue_index(line: &str) -> bool {
    let line = line.trim();
    !line.is_empty() && line.bytes().all(|b| b.is_ascii_digit())
}
