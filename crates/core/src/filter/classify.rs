//! Fixed file taxonomy: video, subtitle and sample detection.

use once_cell::sync::Lazy;
use regex_lite::Regex;

const VIDEO_EXTENSIONS: &[&str] = &[
    "mp4", "mkv", "avi", "wmv", "mov", "flv", "m4v", "webm", "ts", "m2ts", "mts", "rmvb", "rm",
    "mpg", "mpeg", "3gp", "vob",
];

const SUBTITLE_EXTENSIONS: &[&str] = &["srt", "ass", "ssa", "sub", "idx", "vtt", "sup", "smi"];

/// Word markers for sample/preview material, delimited by anything that is
/// not a letter or digit so that e.g. "examples" or "previewer" do not match.
static SAMPLE_MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(^|[^a-z0-9])(sample|preview|trailer|teaser|promo)([^a-z0-9]|$)")
        .expect("sample marker pattern is valid")
});

/// Advertising files that release groups bundle next to the real content.
const PROMOTIONAL_FRAGMENTS: &[&str] = &[
    "宣传",
    "广告",
    "最新地址",
    "更多精彩",
    "社区最新情报",
    "直播",
    "聚合全网",
    "免费看",
];

/// Returns true if the extension (lowercase, no dot) is a video container.
pub fn is_video_extension(ext: &str) -> bool {
    VIDEO_EXTENSIONS.contains(&ext)
}

/// Returns true if the extension (lowercase, no dot) is a subtitle format.
pub fn is_subtitle_extension(ext: &str) -> bool {
    SUBTITLE_EXTENSIONS.contains(&ext)
}

/// Returns true if any component of the path looks like sample or
/// promotional material.
pub fn is_sample_path(path: &str) -> bool {
    path.split(['/', '\\'])
        .filter(|component| !component.is_empty())
        .any(|component| {
            let stem = strip_extension(component);
            SAMPLE_MARKER.is_match(stem)
                || PROMOTIONAL_FRAGMENTS
                    .iter()
                    .any(|fragment| stem.contains(fragment))
        })
}

/// Lowercase extension of the final path component, without the dot.
pub(crate) fn extension_of(name: &str) -> String {
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => ext.to_lowercase(),
        _ => String::new(),
    }
}

fn strip_extension(component: &str) -> &str {
    match component.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => component,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_video_extensions() {
        assert!(is_video_extension("mp4"));
        assert!(is_video_extension("mkv"));
        assert!(is_video_extension("rmvb"));
        assert!(!is_video_extension("nfo"));
        assert!(!is_video_extension("srt"));
        assert!(!is_video_extension(""));
    }

    #[test]
    fn test_subtitle_extensions() {
        assert!(is_subtitle_extension("srt"));
        assert!(is_subtitle_extension("ass"));
        assert!(!is_subtitle_extension("mp4"));
    }

    #[test]
    fn test_sample_detection_basic() {
        assert!(is_sample_path("sample.mkv"));
        assert!(is_sample_path("Sample.mkv"));
        assert!(is_sample_path("movie-sample.mp4"));
        assert!(is_sample_path("movie.SAMPLE.mp4"));
        assert!(is_sample_path("Movie Trailer.mp4"));
        assert!(is_sample_path("preview_01.mp4"));
    }

    #[test]
    fn test_sample_detection_directory() {
        assert!(is_sample_path("Movie (2020)/Sample/movie.mkv"));
        assert!(is_sample_path("Movie\\sample\\clip.mkv"));
    }

    #[test]
    fn test_sample_detection_no_false_positives() {
        assert!(!is_sample_path("Movie (2020)/movie.mkv"));
        assert!(!is_sample_path("examples.mkv"));
        assert!(!is_sample_path("previewer.mkv"));
        assert!(!is_sample_path("Sampler Platter.mkv"));
    }

    #[test]
    fn test_promotional_fragments() {
        assert!(is_sample_path("ABC-123/社区最新情报.mp4"));
        assert!(is_sample_path("更多精彩.txt"));
        assert!(!is_sample_path("ABC-123/ABC-123.mp4"));
    }

    #[test]
    fn test_extension_of() {
        assert_eq!(extension_of("movie.MKV"), "mkv");
        assert_eq!(extension_of("archive.tar.gz"), "gz");
        assert_eq!(extension_of("README"), "");
        assert_eq!(extension_of(".hidden"), "");
        assert_eq!(extension_of("trailing."), "");
    }
}
