// Failure diagnostics - classifies downloader stderr
//
// The classification is a static description, so it is safe to pass to
// clients even though the stderr it came from is not.

/// Reasons a source might refuse a download
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockingReason {
    /// HTTP 403 Forbidden - general access denied
    Http403Forbidden,

    /// Rate limiting (429 or similar)
    RateLimited,

    /// Bot detection triggered
    BotDetection,

    /// Age-restricted content requiring login
    AgeRestricted,

    /// Geographic restriction
    GeoBlocked,

    /// Private video requiring authorization
    PrivateVideo,

    /// Video deleted or unavailable
    VideoUnavailable,

    /// DRM-protected or paid content
    DrmProtected,

    /// The tool has no extractor for this site
    UnsupportedUrl,

    /// Network timeout (soft IP block or slow source)
    NetworkTimeout,
}

impl BlockingReason {
    /// No format selector can work around these
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            Self::DrmProtected | Self::VideoUnavailable | Self::PrivateVideo | Self::UnsupportedUrl
        )
    }

    /// Human-readable description
    pub fn description(&self) -> &'static str {
        match self {
            Self::Http403Forbidden => "access denied (HTTP 403)",
            Self::RateLimited => "rate limited by source",
            Self::BotDetection => "bot detection triggered",
            Self::AgeRestricted => "age-restricted content",
            Self::GeoBlocked => "geographic restriction",
            Self::PrivateVideo => "private video",
            Self::VideoUnavailable => "video unavailable",
            Self::DrmProtected => "DRM-protected content",
            Self::UnsupportedUrl => "unsupported URL",
            Self::NetworkTimeout => "timed out",
        }
    }
}

/// Analyze error message and return blocking reason
pub fn diagnose_error(error: &str) -> Option<BlockingReason> {
    let lower = error.to_lowercase();

    // Check patterns in order of specificity
    if lower.contains("drm")
        || lower.contains("widevine")
        || lower.contains("requires purchase")
        || lower.contains("youtube premium")
    {
        return Some(BlockingReason::DrmProtected);
    }

    if lower.contains("unsupported url") {
        return Some(BlockingReason::UnsupportedUrl);
    }

    if lower.contains("age-restricted") || lower.contains("sign in to confirm your age") {
        return Some(BlockingReason::AgeRestricted);
    }

    if lower.contains("private video") || lower.contains("video is private") {
        return Some(BlockingReason::PrivateVideo);
    }

    if lower.contains("video unavailable")
        || lower.contains("video has been removed")
        || lower.contains("no longer available")
    {
        return Some(BlockingReason::VideoUnavailable);
    }

    if lower.contains("not available in your country") || lower.contains("blocked in your country") {
        return Some(BlockingReason::GeoBlocked);
    }

    if lower.contains("429") || lower.contains("rate limit") || lower.contains("too many requests") {
        return Some(BlockingReason::RateLimited);
    }

    if lower.contains("confirm you're not a bot")
        || lower.contains("captcha")
        || lower.contains("unusual traffic")
    {
        return Some(BlockingReason::BotDetection);
    }

    if lower.contains("403") || lower.contains("forbidden") {
        return Some(BlockingReason::Http403Forbidden);
    }

    if lower.contains("timeout") || lower.contains("timed out") {
        return Some(BlockingReason::NetworkTimeout);
    }

    None
}
