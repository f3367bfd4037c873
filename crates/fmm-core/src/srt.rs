// crates/fmm-core/src/srt.rs
//
// Subtitle interchange: SRT import/export (the on-disk format itself, not
// the burn-in filter — that lives in fmm-media's filter graph composer),
// basic SMI sync-block import, and ASS override-tag helpers used when a
// segment's style diverges from the track default at export time.

use crate::error::ModelError;
use crate::model::style::SubtitleStyle;
use crate::model::subtitle::{SubtitleSegment, SubtitleTrack};
use crate::time::{ms_to_srt_time, parse_flexible_timecode};

/// Render a track to standard SRT: `NN\nHH:MM:SS,mmm --> HH:MM:SS,mmm\ntext\n\n`.
pub fn track_to_srt(track: &SubtitleTrack) -> String {
    let mut out = String::new();
    for (i, seg) in track.segments.iter().enumerate() {
        out.push_str(&format!(
            "{}\n{} --> {}\n{}\n\n",
            i + 1,
            ms_to_srt_time(seg.start_ms),
            ms_to_srt_time(seg.end_ms),
            seg.text
        ));
    }
    out
}

/// Parse an SRT document into a new track named "Imported".
pub fn srt_to_track(srt: &str) -> Result<SubtitleTrack, ModelError> {
    let mut track = SubtitleTrack::new("Imported", "en");
    for block in srt.split("\n\n").map(str::trim).filter(|b| !b.is_empty()) {
        let mut lines = block.lines();
        let _index_line = lines.next();
        let time_line = lines.next().ok_or_else(|| ModelError::InvalidTimecode {
            token: block.to_string(),
            expected: "SRT block with an arrow-separated time line".to_string(),
        })?;
        let (start_raw, end_raw) = time_line.split_once("-->").ok_or_else(|| {
            ModelError::InvalidTimecode {
                token: time_line.to_string(),
                expected: "HH:MM:SS,mmm --> HH:MM:SS,mmm".to_string(),
            }
        })?;
        let start_ms = parse_srt_timestamp(start_raw.trim())?;
        let end_ms = parse_srt_timestamp(end_raw.trim())?;
        let text = lines.collect::<Vec<_>>().join("\n");
        track.add_segment(SubtitleSegment::new(start_ms, end_ms, text))?;
    }
    Ok(track)
}

fn parse_srt_timestamp(text: &str) -> Result<i64, ModelError> {
    // SRT uses a comma millisecond separator; the shared timecode parser
    // expects a dot, so normalize before delegating.
    parse_flexible_timecode(&text.replacen(',', ".", 1), 0.0)
}

/// Minimal SMI (SAMI) import: pulls `<SYNC Start=N>` blocks and the text
/// that follows up to the next `<SYNC>`, treating each block's end as the
/// next block's start (SMI has no explicit end time).
pub fn smi_to_track(smi: &str) -> Result<SubtitleTrack, ModelError> {
    let mut track = SubtitleTrack::new("Imported", "en");
    let mut starts = Vec::new();
    let mut texts = Vec::new();

    let lower = smi.to_lowercase();
    let mut rest = smi;
    let mut lower_rest = lower.as_str();
    while let Some(tag_pos) = lower_rest.find("<sync") {
        let after_tag = &rest[tag_pos..];
        let close = after_tag.find('>').ok_or_else(|| ModelError::InvalidTimecode {
            token: "<sync ...".to_string(),
            expected: "closed <SYNC Start=N> tag".to_string(),
        })?;
        let tag = &after_tag[..close];
        let start_ms = extract_smi_start(tag)?;

        let body_start = tag_pos + close + 1;
        let next_sync = lower_rest[body_start..].find("<sync").map(|p| p + body_start);
        let body_end = next_sync.unwrap_or(rest.len());
        let body = strip_tags(&rest[body_start..body_end]);

        starts.push(start_ms);
        texts.push(body.trim().to_string());

        rest = &rest[body_end..];
        lower_rest = &lower_rest[body_end..];
    }

    for i in 0..starts.len() {
        let text = &texts[i];
        if text.is_empty() {
            continue;
        }
        let end_ms = starts.get(i + 1).copied().unwrap_or(starts[i] + 2000);
        if end_ms <= starts[i] {
            continue;
        }
        track.add_segment(SubtitleSegment::new(starts[i], end_ms, text.clone()))?;
    }
    Ok(track)
}

fn extract_smi_start(tag: &str) -> Result<i64, ModelError> {
    let lower = tag.to_lowercase();
    let key_pos = lower.find("start=").ok_or_else(|| ModelError::InvalidTimecode {
        token: tag.to_string(),
        expected: "Start=N attribute".to_string(),
    })?;
    let value_start = key_pos + "start=".len();
    let value: String = tag[value_start..]
        .trim_start_matches(['"', '\''])
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    value.parse::<i64>().map_err(|_| ModelError::InvalidTimecode {
        token: tag.to_string(),
        expected: "numeric Start= value".to_string(),
    })
}

fn strip_tags(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out.replace("&nbsp;", " ").trim().to_string()
}

/// Render a style's divergence from `default` as ASS override tags
/// (`\1c&H..&\b1\i1`) for embedding ahead of a segment's burned-in text,
/// used only when a per-segment style differs from the track default.
pub fn style_override_tags(style: &SubtitleStyle, default: &SubtitleStyle) -> String {
    let mut tags = String::new();
    if style.font_color != default.font_color {
        tags.push_str(&format!("\\1c&H{}&", bgr_hex(&style.font_color)));
    }
    if style.font_bold != default.font_bold {
        tags.push_str(&format!("\\b{}", if style.font_bold { 1 } else { 0 }));
    }
    if style.font_italic != default.font_italic {
        tags.push_str(&format!("\\i{}", if style.font_italic { 1 } else { 0 }));
    }
    if style.outline_color != default.outline_color {
        tags.push_str(&format!("\\3c&H{}&", bgr_hex(&style.outline_color)));
    }
    if (style.outline_width - default.outline_width).abs() > f32::EPSILON {
        tags.push_str(&format!("\\bord{}", style.outline_width));
    }
    if tags.is_empty() {
        String::new()
    } else {
        format!("{{{tags}}}")
    }
}

/// ASS colors are `&HBBGGRR&`; convert from our stored `#RRGGBB`.
fn bgr_hex(rrggbb: &str) -> String {
    let hex = rrggbb.trim_start_matches('#');
    if hex.len() != 6 {
        return "FFFFFF".to_string();
    }
    format!("{}{}{}", &hex[4..6], &hex[2..4], &hex[0..2]).to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn srt_roundtrip() {
        let mut track = SubtitleTrack::new("Default", "en");
        track.add_segment(SubtitleSegment::new(0, 1500, "hello")).unwrap();
        track.add_segment(SubtitleSegment::new(2000, 3500, "world")).unwrap();

        let srt = track_to_srt(&track);
        assert!(srt.starts_with("1\n00:00:00,000 --> 00:00:01,500\nhello\n\n"));

        let parsed = srt_to_track(&srt).unwrap();
        assert_eq!(parsed.segments.len(), 2);
        assert_eq!(parsed.segments[0].start_ms, 0);
        assert_eq!(parsed.segments[1].text, "world");
    }

    #[test]
    fn srt_import_rejects_malformed_time_line() {
        let bad = "1\nnot-a-time\nhello\n\n";
        assert!(srt_to_track(bad).is_err());
    }

    #[test]
    fn smi_basic_sync_blocks() {
        let smi = r#"<SYNC Start=1000><P>Hello there<SYNC Start=3000><P>General Kenobi"#;
        let track = smi_to_track(smi).unwrap();
        assert_eq!(track.segments.len(), 2);
        assert_eq!(track.segments[0].start_ms, 1000);
        assert_eq!(track.segments[0].end_ms, 3000);
        assert_eq!(track.segments[0].text, "Hello there");
        assert_eq!(track.segments[1].text, "General Kenobi");
    }

    #[test]
    fn ass_override_tags_only_for_divergent_fields() {
        let default = SubtitleStyle::default();
        let mut style = default.clone();
        style.font_bold = true;
        style.font_color = "#FF0000".to_string();

        let tags = style_override_tags(&style, &default);
        assert!(tags.contains("\\b1"));
        assert!(tags.contains("\\1c&H0000FF&"));
    }

    #[test]
    fn ass_override_tags_empty_when_identical() {
        let default = SubtitleStyle::default();
        assert_eq!(style_override_tags(&default, &default), "");
    }
}
