//! Fuzz the parsers that see raw client input.
//!
//! Path ids, task statuses, pagination parameters and CORS origins all come
//! straight from the request. None of these functions may panic, whatever
//! the bytes.
//!
//! ```bash
//! cargo +nightly fuzz run fuzz_request_input -- -max_total_time=60
//! ```

#![no_main]

use libfuzzer_sys::fuzz_target;
use taskboard::middleware::origin_allowed;
use taskboard::models::ListQuery;
use taskboard::validation::{Pagination, parse_id, parse_status, require_text};

fuzz_target!(|data: &[u8]| {
    let Ok(s) = std::str::from_utf8(data) else {
        return;
    };

    let _ = parse_id(s, "project");
    let _ = parse_status(Some(s));
    let _ = require_text(Some(s.to_string()), "Name is required");

    // Split the input so page and limit vary independently
    let mid = (0..=s.len() / 2)
        .rev()
        .find(|i| s.is_char_boundary(*i))
        .unwrap_or(0);
    let (page, limit) = s.split_at(mid);
    if let Some(pagination) = Pagination::from_query(&ListQuery {
        page: Some(page.to_string()),
        limit: Some(limit.to_string()),
    }) {
        assert!(pagination.limit >= 1);
        let _ = pagination.offset();
    }

    let allowed = [
        "*.example.com".to_string(),
        "https://app.example.com".to_string(),
    ];
    let _ = origin_allowed(s, &allowed);
});
