//! Shared HTTP constants (headers, cache tags, problem URIs).

pub(crate) const HEADER_API_KEY: &str = "x-api-key";
pub(crate) const HEADER_REQUEST_ID: &str = "x-request-id";
pub(crate) const HEADER_CACHE_TAG: &str = "cache-tag";

/// Cache tag equal to the settings record's identity; attached to every
/// successful gate response so a later save invalidates all of them at once.
pub(crate) const CACHE_TAG_EXPOSURE_SETTINGS: &str = "settings:exposure";

pub(crate) const PROBLEM_INTERNAL: &str = "https://vitrine.dev/problems/internal";
pub(crate) const PROBLEM_UNAUTHORIZED: &str = "https://vitrine.dev/problems/unauthorized";
pub(crate) const PROBLEM_FORBIDDEN: &str = "https://vitrine.dev/problems/forbidden";
pub(crate) const PROBLEM_NOT_EXPOSED: &str = "https://vitrine.dev/problems/not-exposed";
pub(crate) const PROBLEM_NOTHING_EXPOSED: &str = "https://vitrine.dev/problems/nothing-exposed";
pub(crate) const PROBLEM_VALIDATION_FAILED: &str =
    "https://vitrine.dev/problems/validation-failed";
pub(crate) const PROBLEM_DELIVERY_FAILED: &str = "https://vitrine.dev/problems/delivery-failed";
pub(crate) const PROBLEM_SERVICE_UNAVAILABLE: &str =
    "https://vitrine.dev/problems/service-unavailable";
