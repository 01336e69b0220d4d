pub mod canonical;
pub mod client;
pub mod raw_message;

/// Gmail API quota units per request type. The API grants 250 units per
/// second per user; every request draws its cost from a shared bucket.
pub mod api_quota {
    pub const QUOTA_PER_SECOND: usize = 250;

    pub const MESSAGES_LIST: usize = 5;
    pub const MESSAGES_GET: usize = 5;
    pub const MESSAGES_MODIFY: usize = 5;
}
