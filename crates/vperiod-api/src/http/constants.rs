//! Header names and problem type URIs.

pub(crate) const HEADER_REQUEST_ID: &str = "x-request-id";
pub(crate) const HEADER_LAST_EVENT_ID: &str = "last-event-id";
pub(crate) const SSE_KEEP_ALIVE_SECS: u64 = 20;

pub(crate) const PROBLEM_INTERNAL: &str = "https://vperiod.dev/problems/internal";
pub(crate) const PROBLEM_BAD_REQUEST: &str = "https://vperiod.dev/problems/bad-request";
pub(crate) const PROBLEM_FORBIDDEN: &str = "https://vperiod.dev/problems/forbidden";
pub(crate) const PROBLEM_NOT_FOUND: &str = "https://vperiod.dev/problems/not-found";
pub(crate) const PROBLEM_CONFLICT: &str = "https://vperiod.dev/problems/conflict";
