//! Default output filename for a recording started without `-o/--out`.

use std::path::PathBuf;

/// `YYMMDDHHMMSS.mp4` in the current working directory.
pub fn default_output_path(now: chrono::DateTime<chrono::Local>) -> PathBuf {
    PathBuf::from(format!("{}.mp4", now.format("%y%m%d%H%M%S")))
}

/// Normalizes any extension to `.mp4` regardless of input.
pub fn coerce_mp4_extension(path: PathBuf) -> PathBuf {
    path.with_extension("mp4")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn default_path_follows_the_yymmddhhmmss_pattern() {
        let now = chrono::Local.with_ymd_and_hms(2026, 7, 28, 14, 35, 27).unwrap();
        assert_eq!(default_output_path(now), PathBuf::from("260728143527.mp4"));
    }

    #[test]
    fn extension_is_coerced_regardless_of_input() {
        assert_eq!(coerce_mp4_extension(PathBuf::from("clip.mkv")), PathBuf::from("clip.mp4"));
        assert_eq!(coerce_mp4_extension(PathBuf::from("clip")), PathBuf::from("clip.mp4"));
    }
}
