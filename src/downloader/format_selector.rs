// FormatSelector - yt-dlp format specs for the local tool strategy
//
// The primary selector asks for the best quality in the target container; the
// fallback selector is looser and skips merging, for sources where the preferred
// streams are unavailable.

/// Which of the two invocations is being built
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectorPass {
    Primary,
    Fallback,
}

impl SelectorPass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Fallback => "fallback",
        }
    }
}

pub struct FormatSelector;

impl FormatSelector {
    /// Container extension for the emitted file
    pub fn extension(audio_only: bool) -> &'static str {
        if audio_only {
            "mp3"
        } else {
            "mp4"
        }
    }

    /// Get format spec for yt-dlp
    pub fn get_format_spec(audio_only: bool, pass: SelectorPass) -> &'static str {
        match (audio_only, pass) {
            (true, SelectorPass::Primary) => "bestaudio/best",
            (true, SelectorPass::Fallback) => "ba/b",
            (false, SelectorPass::Primary) => "bv*+ba/best",
            (false, SelectorPass::Fallback) => "best",
        }
    }

    /// Format arguments (`-f` plus post-processing) for one invocation
    pub fn format_args(audio_only: bool, pass: SelectorPass) -> Vec<String> {
        let mut args = vec![
            "-f".to_string(),
            Self::get_format_spec(audio_only, pass).to_string(),
        ];

        if audio_only {
            args.extend([
                "-x".to_string(),
                "--audio-format".to_string(),
                "mp3".to_string(),
            ]);
        } else if pass == SelectorPass::Primary {
            // Merged output lands in a predictable container
            args.push("--merge-output-format".to_string());
            args.push("mp4".to_string());
        }

        args
    }
}
