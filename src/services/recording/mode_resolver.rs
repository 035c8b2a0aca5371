//! Parameter/mode resolver: translate the *realized* source combination
//! (what actually initialized, not just what was requested) into a
//! concrete [`MuxerVariant`].

use crate::services::muxer::MuxerVariant;

/// Which sources actually came up, after init/probe — as opposed to
/// [`crate::models::SourceMask`], which is what was *requested*.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RealizedSources {
    pub video_ok: bool,
    pub system_audio_ok: bool,
    pub mic_ok: bool,
}

impl RealizedSources {
    pub fn dual_track(&self) -> bool {
        self.system_audio_ok && self.mic_ok
    }

    pub fn any_audio(&self) -> bool {
        self.system_audio_ok || self.mic_ok
    }
}

/// Picks one of the five variants. Returns `None` when
/// no source combination is viable (nothing initialized at all) — callers
/// must have already treated that as a fatal init error before reaching
/// here.
pub fn resolve_variant(sources: RealizedSources) -> Option<MuxerVariant> {
    match (sources.video_ok, sources.system_audio_ok, sources.mic_ok) {
        (true, false, false) => Some(MuxerVariant::VideoOnly),
        (true, true, true) => Some(MuxerVariant::VideoPlusDualAudio),
        (true, true, false) | (true, false, true) => Some(MuxerVariant::VideoPlusCombinedAudio),
        (false, true, true) => Some(MuxerVariant::AudioOnlyDual),
        (false, true, false) | (false, false, true) => Some(MuxerVariant::AudioOnlySingle),
        (false, false, false) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn video_only_when_no_audio_realized() {
        let s = RealizedSources { video_ok: true, system_audio_ok: false, mic_ok: false };
        assert_eq!(resolve_variant(s), Some(MuxerVariant::VideoOnly));
    }

    #[test]
    fn video_plus_dual_audio_when_both_realized() {
        let s = RealizedSources { video_ok: true, system_audio_ok: true, mic_ok: true };
        assert_eq!(resolve_variant(s), Some(MuxerVariant::VideoPlusDualAudio));
        assert!(s.dual_track());
    }

    #[test]
    fn video_plus_combined_for_either_single_audio_source() {
        let system_only = RealizedSources { video_ok: true, system_audio_ok: true, mic_ok: false };
        let mic_only = RealizedSources { video_ok: true, system_audio_ok: false, mic_ok: true };
        assert_eq!(resolve_variant(system_only), Some(MuxerVariant::VideoPlusCombinedAudio));
        assert_eq!(resolve_variant(mic_only), Some(MuxerVariant::VideoPlusCombinedAudio));
    }

    #[test]
    fn audio_only_variants_mirror_the_video_ones_without_video() {
        let dual = RealizedSources { video_ok: false, system_audio_ok: true, mic_ok: true };
        let single = RealizedSources { video_ok: false, system_audio_ok: false, mic_ok: true };
        assert_eq!(resolve_variant(dual), Some(MuxerVariant::AudioOnlyDual));
        assert_eq!(resolve_variant(single), Some(MuxerVariant::AudioOnlySingle));
    }

    #[test]
    fn nothing_realized_resolves_to_none() {
        let s = RealizedSources { video_ok: false, system_audio_ok: false, mic_ok: false };
        assert_eq!(resolve_variant(s), None);
    }
}
