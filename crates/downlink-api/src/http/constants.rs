//! Shared HTTP constants (headers, problem URIs).

pub(crate) const HEADER_API_KEY: &str = "x-downlink-api-key";
pub(crate) const HEADER_REQUEST_ID: &str = "x-request-id";

pub(crate) const PROBLEM_INTERNAL: &str = "https://downlink.dev/problems/internal";
pub(crate) const PROBLEM_UNAUTHORIZED: &str = "https://downlink.dev/problems/unauthorized";
pub(crate) const PROBLEM_BAD_REQUEST: &str = "https://downlink.dev/problems/bad-request";
pub(crate) const PROBLEM_CONFLICT: &str = "https://downlink.dev/problems/conflict";
pub(crate) const PROBLEM_NOT_FOUND: &str = "https://downlink.dev/problems/not-found";
pub(crate) const PROBLEM_UPSTREAM_FAILURE: &str = "https://downlink.dev/problems/upstream-failure";
