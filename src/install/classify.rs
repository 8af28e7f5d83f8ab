//! Failure classification for dependency installs.
//!
//! One failure class gets special treatment: `editdistance` (a transitive
//! dependency of funasr) failing to build a native wheel. It has a known
//! remedy, so it selects the pinned-wheel fallback and may bypass the retry
//! cooldown.

use crate::process::ProcessResult;

/// Lower-case output fragments that identify the native build failure.
pub const NATIVE_BUILD_FAILURE_MARKERS: &[&str] = &[
    "building wheel for editdistance",
    "no matching distribution found for editdistance",
    "failed building wheel for editdistance",
];

/// Known-good pinned versions, tried in order, binary wheels only.
pub const PINNED_COMPATIBLE: &[&str] = &[
    "editdistance==0.6.2",
    "editdistance==0.7.0",
    "editdistance==0.7.1",
];

/// Whether text contains a native-build-failure marker.
pub fn mentions_native_build_failure(text: &str) -> bool {
    let lower = text.to_lowercase();
    NATIVE_BUILD_FAILURE_MARKERS
        .iter()
        .any(|marker| lower.contains(marker))
}

/// Whether an install result failed on the native build.
pub fn is_native_build_failure(result: &ProcessResult) -> bool {
    mentions_native_build_failure(&result.combined_output())
}

/// Whether a cached failure may skip its cooldown.
///
/// Only the native build failure qualifies, and only when the no-deps
/// strategy is enabled, since that strategy avoids building the wheel.
pub fn cooldown_bypass_allowed(cached_detail: &str, no_deps_enabled: bool) -> bool {
    no_deps_enabled && mentions_native_build_failure(cached_detail)
}

/// Distribution names in a requirement string, without version specifiers.
///
/// `"funasr torch==2.1 modelscope>=1.9"` yields `["funasr", "torch", "modelscope"]`.
pub fn package_names(spec: &str) -> Vec<String> {
    spec.split_whitespace()
        .filter_map(|req| {
            let end = req
                .find(|c: char| matches!(c, '=' | '<' | '>' | '!' | '~' | ';' | '[' | '@'))
                .unwrap_or(req.len());
            let name = req[..end].trim();
            (!name.is_empty()).then(|| name.to_string())
        })
        .collect()
}
